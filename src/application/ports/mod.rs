//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口：
//! 文本生成、文档持久化、文本转义、任务事件

mod document_store;
mod job_events;
mod text_generator;
mod text_sanitizer;

pub use document_store::{DocumentStorePort, RepositoryError};
pub use job_events::{JobEvent, JobEventLevel, JobEventSink};
pub use text_generator::{GeneratedText, LlmError, TextGeneratorPort};
pub use text_sanitizer::TextSanitizerPort;
