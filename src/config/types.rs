//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 语言模型配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 文档存储配置
    #[serde(default)]
    pub store: StoreConfig,

    /// 生成流程配置
    #[serde(default)]
    pub generation: GenerationConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 语言模型后端类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// HTTP 推理服务
    #[default]
    Http,
    /// 内置固定回复，离线调试用
    Fake,
}

/// 语言模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    /// 推理服务基础 URL
    #[serde(default = "default_llm_url")]
    pub url: String,

    /// 模型名称
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

fn default_llm_timeout() -> u64 {
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            url: default_llm_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/bookgen.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 文档存储后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// 进程内存储，进程退出即丢失
    Memory,
}

/// 文档存储配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

/// 生成流程配置
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// 扩写阶段并发数
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// 段落扩写最大尝试次数
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// 段落扩写重试间隔（毫秒）
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// 单章模板生成最大尝试次数
    #[serde(default = "default_five")]
    pub chapter_retries: u32,

    #[serde(default = "default_five")]
    pub chapter_list_repair_iterations: u32,

    #[serde(default = "default_five")]
    pub paragraph_ideas_repair_iterations: u32,

    #[serde(default = "default_expansion_repair")]
    pub expansion_repair_iterations: u32,

    #[serde(default = "default_regenerate_repair")]
    pub expansion_regenerate_repair_iterations: u32,

    #[serde(default = "default_refinement_repair")]
    pub refinement_repair_iterations: u32,

    /// 文档所属空间
    #[serde(default = "default_space_id")]
    pub space_id: String,
}

fn default_concurrency() -> usize {
    6
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_five() -> u32 {
    5
}

fn default_expansion_repair() -> u32 {
    1
}

fn default_regenerate_repair() -> u32 {
    2
}

fn default_refinement_repair() -> u32 {
    3
}

fn default_space_id() -> String {
    "default".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            chapter_retries: default_five(),
            chapter_list_repair_iterations: default_five(),
            paragraph_ideas_repair_iterations: default_five(),
            expansion_repair_iterations: default_expansion_repair(),
            expansion_regenerate_repair_iterations: default_regenerate_repair(),
            refinement_repair_iterations: default_refinement_repair(),
            space_id: default_space_id(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
