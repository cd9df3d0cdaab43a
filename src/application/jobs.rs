//! Job Tasks - 宿主可调度的任务
//!
//! 宿主只认识 JobTask：运行、取消、序列化、查询相关信息。
//! 两个实现分别包装模板生成与成书生成的 handler。

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::application::commands::handlers::{GenerateBookHandler, GenerateTemplateHandler};
use crate::application::commands::{GenerateBook, GenerateTemplate};
use crate::application::error::ApplicationError;
use crate::application::ports::{JobEventLevel, JobEventSink};
use crate::domain::book::DocumentId;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
struct JobState {
    status: JobStatus,
    document_id: Option<DocumentId>,
    error: Option<String>,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            status: JobStatus::Pending,
            document_id: None,
            error: None,
        }
    }
}

/// 任务状态的共享部分
struct JobRecord {
    job_id: Uuid,
    events: Arc<dyn JobEventSink>,
    state: Mutex<JobState>,
}

impl JobRecord {
    fn new(job_id: Uuid, events: Arc<dyn JobEventSink>) -> Self {
        Self {
            job_id,
            events,
            state: Mutex::new(JobState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self) {
        self.lock().status = JobStatus::Running;
    }

    fn finish(&self, result: &Result<DocumentId, ApplicationError>) {
        let mut state = self.lock();
        match result {
            Ok(document_id) => {
                state.status = JobStatus::Completed;
                state.document_id = Some(document_id.clone());
            }
            Err(e) => {
                state.status = JobStatus::Failed;
                state.error = Some(e.to_string());
            }
        }
    }

    fn snapshot(&self) -> JobState {
        self.lock().clone()
    }

    fn relevant_info(&self) -> Value {
        let history = self.events.history(self.job_id);
        let count = |level: JobEventLevel| history.iter().filter(|e| e.level == level).count();
        let state = self.snapshot();
        json!({
            "jobId": self.job_id,
            "status": state.status,
            "documentId": state.document_id,
            "lastEvent": history.last(),
            "events": history.len(),
            "progress": count(JobEventLevel::Progress),
            "warnings": count(JobEventLevel::Warning),
        })
    }
}

/// 宿主可调度的任务
#[async_trait]
pub trait JobTask: Send + Sync {
    fn job_id(&self) -> Uuid;

    fn kind(&self) -> &'static str;

    /// 运行到结束，返回产出文档 id
    async fn run(&self) -> Result<DocumentId, ApplicationError>;

    /// 不支持中途取消，只记录请求
    fn cancel(&self) {
        tracing::warn!(job_id = %self.job_id(), kind = self.kind(), "Cancel requested; not supported mid-flight");
    }

    /// 任务快照（类型、id、参数、状态、产出文档）
    fn serialize(&self) -> Value;

    /// 最近事件与进度计数
    fn relevant_info(&self) -> Value;
}

/// 模板生成任务
pub struct TemplateJob {
    command: GenerateTemplate,
    handler: Arc<GenerateTemplateHandler>,
    record: JobRecord,
}

impl TemplateJob {
    pub fn new(
        command: GenerateTemplate,
        handler: Arc<GenerateTemplateHandler>,
        events: Arc<dyn JobEventSink>,
    ) -> Self {
        let record = JobRecord::new(command.job_id, events);
        Self {
            command,
            handler,
            record,
        }
    }
}

#[async_trait]
impl JobTask for TemplateJob {
    fn job_id(&self) -> Uuid {
        self.command.job_id
    }

    fn kind(&self) -> &'static str {
        "template"
    }

    async fn run(&self) -> Result<DocumentId, ApplicationError> {
        self.record.start();
        let result = self
            .handler
            .handle(self.command.clone())
            .await
            .map(|outcome| outcome.document_id);
        self.record.finish(&result);
        result
    }

    fn serialize(&self) -> Value {
        let state = self.record.snapshot();
        json!({
            "kind": self.kind(),
            "jobId": self.command.job_id,
            "spaceId": self.command.space_id,
            "parameters": self.command.parameters,
            "status": state.status,
            "documentId": state.document_id,
            "error": state.error,
        })
    }

    fn relevant_info(&self) -> Value {
        self.record.relevant_info()
    }
}

/// 成书生成任务
pub struct BookJob {
    command: GenerateBook,
    handler: Arc<GenerateBookHandler>,
    record: JobRecord,
}

impl BookJob {
    pub fn new(
        command: GenerateBook,
        handler: Arc<GenerateBookHandler>,
        events: Arc<dyn JobEventSink>,
    ) -> Self {
        let record = JobRecord::new(command.job_id, events);
        Self {
            command,
            handler,
            record,
        }
    }
}

#[async_trait]
impl JobTask for BookJob {
    fn job_id(&self) -> Uuid {
        self.command.job_id
    }

    fn kind(&self) -> &'static str {
        "book"
    }

    async fn run(&self) -> Result<DocumentId, ApplicationError> {
        self.record.start();
        let result = self
            .handler
            .handle(self.command.clone())
            .await
            .map(|outcome| outcome.document_id);
        self.record.finish(&result);
        result
    }

    fn serialize(&self) -> Value {
        let state = self.record.snapshot();
        json!({
            "kind": self.kind(),
            "jobId": self.command.job_id,
            "spaceId": self.command.space_id,
            "parameters": {
                "documentId": self.command.template_id,
                "personality": self.command.personality,
            },
            "status": state.status,
            "documentId": state.document_id,
            "error": state.error,
        })
    }

    fn relevant_info(&self) -> Value {
        self.record.relevant_info()
    }
}
