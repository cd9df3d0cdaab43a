//! Application Services - 生成流程的组成部件
//!
//! - json_repairer: 结构化文本修复
//! - retry: 固定次数重试
//! - task_queue: 有界并发调度
//! - template_generator / content_expander / refinement: 三个生成阶段

pub mod content_expander;
pub mod json_repairer;
pub mod prompts;
pub mod refinement;
pub mod retry;
pub mod task_queue;
pub mod template_generator;

pub use content_expander::{ContentExpander, ContentExpanderConfig, ExpansionOutcome};
pub use json_repairer::{JsonRepairer, ParagraphText, RepairError, RepairOptions};
pub use refinement::{
    DeepBookExpansion, DeepChapterExpansion, DeepParagraphExpansion, ParagraphRewriter,
    ProceduralRefinement, RefinementPipeline, RefinementStage, StyleCorrection,
    TransitionEnhancer,
};
pub use retry::{Exhaustion, RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
pub use task_queue::{TaskQueue, DEFAULT_CONCURRENCY};
pub use template_generator::{TemplateGenerator, TemplateGeneratorConfig, TemplateOutcome};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::application::context::JobContext;
    use crate::domain::book::SpaceId;
    use crate::infrastructure::events::EventPublisher;

    /// 测试用上下文，返回事件发布器以便检查事件历史
    pub fn test_context() -> (JobContext, Arc<EventPublisher>) {
        let events = Arc::new(EventPublisher::new());
        let ctx = JobContext::new(SpaceId::new("test-space"), None, events.clone());
        (ctx, events)
    }
}
