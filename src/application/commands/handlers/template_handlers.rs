//! GenerateTemplate Handler
//!
//! 参数归一化 -> 模板生成 -> 终止事件（成功或失败，恰好一个，带 finished）

use std::sync::Arc;

use crate::application::commands::GenerateTemplate;
use crate::application::context::JobContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{JobEventLevel, JobEventSink, TextSanitizerPort};
use crate::application::services::{TemplateGenerator, TemplateOutcome};
use crate::domain::book::BookSpec;

/// GenerateTemplate Handler
pub struct GenerateTemplateHandler {
    generator: Arc<TemplateGenerator>,
    sanitizer: Arc<dyn TextSanitizerPort>,
    events: Arc<dyn JobEventSink>,
}

impl GenerateTemplateHandler {
    pub fn new(
        generator: Arc<TemplateGenerator>,
        sanitizer: Arc<dyn TextSanitizerPort>,
        events: Arc<dyn JobEventSink>,
    ) -> Self {
        Self {
            generator,
            sanitizer,
            events,
        }
    }

    pub async fn handle(
        &self,
        command: GenerateTemplate,
    ) -> Result<TemplateOutcome, ApplicationError> {
        let normalized = BookSpec::normalize(command.parameters, |s| self.sanitizer.unsanitize(s));
        let personality = normalized
            .as_ref()
            .ok()
            .and_then(|n| n.spec.personality())
            .map(str::to_string);
        let ctx = JobContext::new(command.space_id, personality, self.events.clone())
            .with_job_id(command.job_id);

        tracing::info!(job_id = %ctx.job_id(), space_id = %ctx.space_id(), "Template generation started");

        let result = match normalized {
            Ok(params) => {
                self.generator
                    .generate(&ctx, &params.spec, params.directive.as_deref())
                    .await
            }
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    job_id = %ctx.job_id(),
                    document_id = %outcome.document_id,
                    "Template generation finished"
                );
                ctx.emit(
                    ctx.event(JobEventLevel::Success, "Finished generating book template")
                        .with_document(outcome.document_id.clone())
                        .finished(),
                );
            }
            Err(e) => {
                tracing::error!(job_id = %ctx.job_id(), error = %e, "Template generation failed");
                ctx.emit(
                    ctx.event(
                        JobEventLevel::Error,
                        format!("Error generating book template: {}", e),
                    )
                    .with_error(e.to_string())
                    .finished(),
                );
            }
        }

        result
    }
}
