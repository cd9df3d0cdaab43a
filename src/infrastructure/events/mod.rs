//! Events - 任务事件发布

mod publisher;

pub use publisher::EventPublisher;
