//! Event Publisher Implementation
//!
//! 任务事件推送：按任务保存事件历史。
//! 每个事件同时以对应级别写入 tracing。

use dashmap::DashMap;
use uuid::Uuid;

use crate::application::ports::{JobEvent, JobEventLevel, JobEventSink};

/// 事件发布器
pub struct EventPublisher {
    /// job_id -> 已发布事件
    history: DashMap<Uuid, Vec<JobEvent>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            history: DashMap::new(),
        }
    }

    /// 指定任务已发布的事件
    pub fn history(&self, job_id: Uuid) -> Vec<JobEvent> {
        self.history
            .get(&job_id)
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn trace(event: &JobEvent) {
        let document_id = event.document_id.as_ref().map(|id| id.as_str()).unwrap_or("");
        match event.level {
            JobEventLevel::Progress => tracing::debug!(
                job_id = %event.job_id,
                text = %event.message,
                "Job progress"
            ),
            JobEventLevel::Info => tracing::info!(
                job_id = %event.job_id,
                document_id = %document_id,
                text = %event.message,
                "Job info"
            ),
            JobEventLevel::Warning => tracing::warn!(
                job_id = %event.job_id,
                text = %event.message,
                "Job warning"
            ),
            JobEventLevel::Error => tracing::error!(
                job_id = %event.job_id,
                text = %event.message,
                error = ?event.error,
                finished = event.finished,
                "Job error"
            ),
            JobEventLevel::Success => tracing::info!(
                job_id = %event.job_id,
                document_id = %document_id,
                text = %event.message,
                finished = event.finished,
                "Job succeeded"
            ),
        }
    }
}

impl JobEventSink for EventPublisher {
    fn publish(&self, event: JobEvent) {
        Self::trace(&event);

        self.history.entry(event.job_id).or_default().push(event);
    }

    fn history(&self, job_id: Uuid) -> Vec<JobEvent> {
        EventPublisher::history(self, job_id)
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_kept_per_job() {
        let publisher = EventPublisher::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        publisher.publish(JobEvent::new(a, JobEventLevel::Progress, "one"));
        publisher.publish(JobEvent::new(b, JobEventLevel::Progress, "other"));
        publisher.publish(JobEvent::new(a, JobEventLevel::Success, "two").finished());

        let history = publisher.history(a);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].message, "two");
        assert!(history[1].finished);

        assert_eq!(publisher.history(b).len(), 1);
        assert!(publisher.history(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_sink_history_matches_inherent_history() {
        let publisher = EventPublisher::new();
        let job_id = Uuid::new_v4();
        publisher.publish(JobEvent::new(job_id, JobEventLevel::Error, "boom").finished());

        let sink: &dyn JobEventSink = &publisher;
        assert_eq!(sink.history(job_id).len(), 1);
        assert_eq!(sink.history(job_id)[0].message, "boom");
    }
}
