//! Job Events Port - 任务进度事件
//!
//! 宿主通过事件流观察任务进度；每个任务以一个带 finished 标记的终止事件结束

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::book::{ChapterId, DocumentId};

/// 事件级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventLevel {
    Progress,
    Info,
    Warning,
    Error,
    Success,
}

impl JobEventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEventLevel::Progress => "progress",
            JobEventLevel::Info => "info",
            JobEventLevel::Warning => "warning",
            JobEventLevel::Error => "error",
            JobEventLevel::Success => "success",
        }
    }
}

/// 任务事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub level: JobEventLevel,
    pub message: String,
    /// 终止事件为 true
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<ChapterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job_id: Uuid, level: JobEventLevel, message: impl Into<String>) -> Self {
        Self {
            job_id,
            level,
            message: message.into(),
            finished: false,
            document_id: None,
            chapter_id: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_document(mut self, document_id: DocumentId) -> Self {
        self.document_id = Some(document_id);
        self
    }

    pub fn with_chapter(mut self, chapter_id: ChapterId) -> Self {
        self.chapter_id = Some(chapter_id);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn finished(mut self) -> Self {
        self.finished = true;
        self
    }
}

/// Job Event Sink
///
/// 发布是同步且不会失败的；没有订阅者时事件被丢弃
pub trait JobEventSink: Send + Sync {
    fn publish(&self, event: JobEvent);

    /// 指定任务已发布的事件（按发布顺序）；不保留历史的实现返回空
    fn history(&self, _job_id: Uuid) -> Vec<JobEvent> {
        Vec::new()
    }
}
