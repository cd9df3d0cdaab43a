//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（文本生成、文档存储、文本转义、任务事件）
//! - services: 修复、重试、调度，以及模板生成 / 扩写 / 润色
//! - commands: 两个生成任务的命令及处理器
//! - jobs: 宿主可调度的任务
//! - error: 应用层错误定义

pub mod commands;
pub mod context;
pub mod error;
pub mod jobs;
pub mod ports;
pub mod services;

// Re-exports
pub use commands::{
    handlers::{BookOutcome, GenerateBookHandler, GenerateTemplateHandler},
    GenerateBook, GenerateTemplate, DOCUMENT_ID_KEY,
};

pub use context::JobContext;
pub use error::ApplicationError;
pub use jobs::{BookJob, JobStatus, JobTask, TemplateJob};

pub use ports::{
    DocumentStorePort, GeneratedText, JobEvent, JobEventLevel, JobEventSink, LlmError,
    RepositoryError, TextGeneratorPort, TextSanitizerPort,
};

pub use services::{
    ContentExpander, ContentExpanderConfig, Exhaustion, ExpansionOutcome, JsonRepairer,
    ParagraphRewriter, RefinementPipeline, RefinementStage, RepairError, RepairOptions,
    RetryPolicy, TaskQueue, TemplateGenerator, TemplateGeneratorConfig, TemplateOutcome,
};
