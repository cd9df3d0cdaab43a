//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, LlmProvider, StoreBackend};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `BOOKGEN_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `BOOKGEN_LLM__URL=http://llm-server:11434`
/// - `BOOKGEN_LLM__PROVIDER=fake`
/// - `BOOKGEN_STORE__BACKEND=memory`
/// - `BOOKGEN_GENERATION__CONCURRENCY=4`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("llm.provider", "http")?
        .set_default("llm.url", "http://localhost:11434")?
        .set_default("llm.model", "llama3")?
        .set_default("llm.timeout_secs", 300)?
        .set_default("database.path", "data/bookgen.db")?
        .set_default("database.max_connections", 5)?
        .set_default("store.backend", "sqlite")?
        .set_default("generation.concurrency", 6)?
        .set_default("generation.retry_attempts", 3)?
        .set_default("generation.retry_delay_ms", 2000)?
        .set_default("generation.space_id", "default")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: BOOKGEN_LLM__MODEL=mistral
    builder = builder.add_source(
        Environment::with_prefix("BOOKGEN")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.generation.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "Generation concurrency cannot be 0".to_string(),
        ));
    }

    if config.generation.retry_attempts == 0 || config.generation.chapter_retries == 0 {
        return Err(ConfigError::ValidationError(
            "Retry attempts cannot be 0".to_string(),
        ));
    }

    if config.llm.provider == LlmProvider::Http && config.llm.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "LLM URL cannot be empty".to_string(),
        ));
    }

    if config.store.backend == StoreBackend::Sqlite && config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    if config.generation.space_id.is_empty() {
        return Err(ConfigError::ValidationError(
            "Space id cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("LLM Provider: {:?}", config.llm.provider);
    if config.llm.provider == LlmProvider::Http {
        tracing::info!("LLM URL: {}", config.llm.url);
        tracing::info!("LLM Model: {}", config.llm.model);
        tracing::info!("LLM Timeout: {}s", config.llm.timeout_secs);
    }
    tracing::info!("Store Backend: {:?}", config.store.backend);
    if config.store.backend == StoreBackend::Sqlite {
        tracing::info!("Database: {}", config.database.path);
    }
    tracing::info!("Space: {}", config.generation.space_id);
    tracing::info!("Concurrency: {}", config.generation.concurrency);
    tracing::info!(
        "Paragraph Retries: {} x {}ms",
        config.generation.retry_attempts,
        config.generation.retry_delay_ms
    );
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
