//! Bookgen - 基于大语言模型的整书生成系统
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Book Context: 文档、章节、段落与书籍参数
//! - JSON Repair: 模型输出的确定性修复阶段
//!
//! 应用层 (application/):
//! - Ports: 端口定义（TextGenerator, DocumentStore, TextSanitizer, JobEventSink）
//! - Services: 模板生成、内容扩写、润色流水线、JSON 修复、重试与任务队列
//! - Commands: 生成模板 / 生成整书命令及处理器
//! - Jobs: 任务包装与状态
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP LLM Client, Fake LLM Client, HTML 实体转义
//! - Memory / Persistence: 内存与 SQLite 文档存储
//! - Events: 任务事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
