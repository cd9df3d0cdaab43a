//! Bookgen - 整书生成
//!
//! 用法: `bookgen <parameters.json>`
//!
//! 先运行模板任务，再以模板为输入运行成书任务，最后输出成书文档 id。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bookgen::application::ports::{DocumentStorePort, TextGeneratorPort, TextSanitizerPort};
use bookgen::application::services::{
    ContentExpander, ContentExpanderConfig, JsonRepairer, ParagraphRewriter, RefinementPipeline,
    RetryPolicy, TemplateGenerator, TemplateGeneratorConfig,
};
use bookgen::application::{
    BookJob, GenerateBook, GenerateBookHandler, GenerateTemplate, GenerateTemplateHandler,
    JobTask, TemplateJob,
};
use bookgen::config::{load_config, print_config, AppConfig, LlmProvider, StoreBackend};
use bookgen::domain::book::{SpaceId, PERSONALITY_KEY};
use bookgen::infrastructure::adapters::{
    FakeLlmClient, HtmlEntitySanitizer, HttpLlmClient, HttpLlmClientConfig,
};
use bookgen::infrastructure::events::EventPublisher;
use bookgen::infrastructure::memory::InMemoryDocumentStore;
use bookgen::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteDocumentStore,
};
use serde_json::{Map, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("Bookgen - 整书生成");
    print_config(&config);

    let params_path = std::env::args()
        .nth(1)
        .context("Usage: bookgen <parameters.json>")?;
    let raw = tokio::fs::read_to_string(&params_path)
        .await
        .with_context(|| format!("Failed to read parameters from {}", params_path))?;
    let parameters: Map<String, Value> =
        serde_json::from_str(&raw).context("Parameters must be a JSON object")?;

    let generator = build_generator(&config)?;
    if !generator.health_check().await {
        anyhow::bail!("LLM backend at {} is not reachable", config.llm.url);
    }
    let store = build_store(&config).await?;
    let sanitizer: Arc<dyn TextSanitizerPort> = Arc::new(HtmlEntitySanitizer);
    let events = Arc::new(EventPublisher::new());
    let repairer = Arc::new(JsonRepairer::new(generator.clone()));
    let generation = &config.generation;

    // 模板任务
    let template_generator = Arc::new(TemplateGenerator::new(
        generator.clone(),
        store.clone(),
        repairer.clone(),
        TemplateGeneratorConfig {
            chapter_retries: generation.chapter_retries,
            chapter_list_repair_iterations: generation.chapter_list_repair_iterations,
            paragraph_ideas_repair_iterations: generation.paragraph_ideas_repair_iterations,
        },
    ));
    let template_handler = Arc::new(GenerateTemplateHandler::new(
        template_generator,
        sanitizer.clone(),
        events.clone(),
    ));

    // 成书任务
    let retry = RetryPolicy::new(
        generation.retry_attempts,
        Duration::from_millis(generation.retry_delay_ms),
    );
    let expander = ContentExpander::new(
        generator.clone(),
        store.clone(),
        repairer.clone(),
        ContentExpanderConfig {
            concurrency: generation.concurrency,
            retry,
            repair_iterations: generation.expansion_repair_iterations,
            regenerate_repair_iterations: generation.expansion_regenerate_repair_iterations,
        },
    );
    let rewriter = Arc::new(ParagraphRewriter::new(
        generator,
        store.clone(),
        repairer,
        retry,
        generation.refinement_repair_iterations,
    ));
    let pipeline = Arc::new(RefinementPipeline::standard(
        store.clone(),
        sanitizer,
        rewriter,
    ));
    let book_handler = Arc::new(GenerateBookHandler::new(
        store,
        expander,
        pipeline,
        events.clone(),
    ));

    let space_id = SpaceId::new(generation.space_id.clone());
    let personality = parameters
        .get(PERSONALITY_KEY)
        .and_then(Value::as_str)
        .map(str::to_string);

    let template_job = TemplateJob::new(
        GenerateTemplate::new(space_id.clone(), parameters),
        template_handler,
        events.clone(),
    );
    let template_id = template_job
        .run()
        .await
        .context("Template generation failed")?;
    tracing::info!(template_id = %template_id, "Template ready");

    let book_job = BookJob::new(
        GenerateBook::new(space_id, template_id, personality),
        book_handler,
        events,
    );
    let book_id = book_job.run().await.context("Book generation failed")?;

    tracing::debug!(info = %book_job.relevant_info(), "Book job finished");
    println!("{}", book_id);

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!("{},bookgen={}", config.log.level, config.log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_generator(config: &AppConfig) -> anyhow::Result<Arc<dyn TextGeneratorPort>> {
    let generator: Arc<dyn TextGeneratorPort> = match config.llm.provider {
        LlmProvider::Http => {
            let llm_config = HttpLlmClientConfig::new(&config.llm.url, &config.llm.model)
                .with_timeout(config.llm.timeout_secs);
            Arc::new(HttpLlmClient::new(llm_config)?)
        }
        LlmProvider::Fake => {
            tracing::warn!("Using canned LLM responses");
            Arc::new(FakeLlmClient::canned())
        }
    };
    Ok(generator)
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStorePort>> {
    let store: Arc<dyn DocumentStorePort> = match config.store.backend {
        StoreBackend::Sqlite => {
            // 确保数据目录存在
            if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let db_config = DatabaseConfig {
                database_url: config.database.database_url(),
                max_connections: config.database.max_connections,
            };
            let pool = create_pool(&db_config).await?;
            run_migrations(&pool).await?;
            Arc::new(SqliteDocumentStore::new(pool))
        }
        StoreBackend::Memory => Arc::new(InMemoryDocumentStore::new()),
    };
    Ok(store)
}
