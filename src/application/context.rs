//! 任务上下文
//!
//! 每个任务一个不可变的上下文值，显式传入各组件：
//! 任务 id、工作空间、人设提示、事件出口

use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{JobEvent, JobEventLevel, JobEventSink};
use crate::domain::book::SpaceId;

/// 任务上下文
#[derive(Clone)]
pub struct JobContext {
    job_id: Uuid,
    space_id: SpaceId,
    personality: Option<String>,
    events: Arc<dyn JobEventSink>,
}

impl JobContext {
    pub fn new(
        space_id: SpaceId,
        personality: Option<String>,
        events: Arc<dyn JobEventSink>,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            space_id,
            personality,
            events,
        }
    }

    /// 使用宿主分配的任务 id
    pub fn with_job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn space_id(&self) -> &SpaceId {
        &self.space_id
    }

    pub fn personality(&self) -> Option<&str> {
        self.personality.as_deref()
    }

    /// 构造本任务的事件
    pub fn event(&self, level: JobEventLevel, message: impl Into<String>) -> JobEvent {
        JobEvent::new(self.job_id, level, message)
    }

    pub fn emit(&self, event: JobEvent) {
        self.events.publish(event);
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.emit(self.event(JobEventLevel::Progress, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(self.event(JobEventLevel::Info, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(self.event(JobEventLevel::Warning, message));
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("space_id", &self.space_id)
            .field("personality", &self.personality)
            .finish()
    }
}
