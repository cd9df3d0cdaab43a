//! GenerateBook Handler
//!
//! 读取模板 -> 创建成书文档 -> 并发扩写 -> 串行润色 -> 终止事件

use std::sync::Arc;

use crate::application::commands::GenerateBook;
use crate::application::context::JobContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{DocumentStorePort, JobEventLevel, JobEventSink};
use crate::application::services::{ContentExpander, ExpansionOutcome, RefinementPipeline};
use crate::domain::book::{book_title_from_template, DocumentId, NewDocument};

/// 成书生成结果
#[derive(Debug, Clone)]
pub struct BookOutcome {
    pub document_id: DocumentId,
    pub expansion: ExpansionOutcome,
}

/// GenerateBook Handler
pub struct GenerateBookHandler {
    store: Arc<dyn DocumentStorePort>,
    expander: ContentExpander,
    pipeline: Arc<RefinementPipeline>,
    events: Arc<dyn JobEventSink>,
}

impl GenerateBookHandler {
    pub fn new(
        store: Arc<dyn DocumentStorePort>,
        expander: ContentExpander,
        pipeline: Arc<RefinementPipeline>,
        events: Arc<dyn JobEventSink>,
    ) -> Self {
        Self {
            store,
            expander,
            pipeline,
            events,
        }
    }

    pub async fn handle(&self, command: GenerateBook) -> Result<BookOutcome, ApplicationError> {
        let ctx = JobContext::new(command.space_id, command.personality, self.events.clone())
            .with_job_id(command.job_id);

        tracing::info!(
            job_id = %ctx.job_id(),
            template_id = %command.template_id,
            "Book generation started"
        );

        let result = self.generate(&ctx, &command.template_id).await;

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    job_id = %ctx.job_id(),
                    document_id = %outcome.document_id,
                    failed_paragraphs = outcome.expansion.failed,
                    "Book generation finished"
                );
                ctx.emit(
                    ctx.event(
                        JobEventLevel::Success,
                        format!(
                            "Book Generation and Refinement Completed Successfully. Book ID: {}",
                            outcome.document_id
                        ),
                    )
                    .with_document(outcome.document_id.clone())
                    .finished(),
                );
            }
            Err(e) => {
                tracing::error!(job_id = %ctx.job_id(), error = %e, "Book generation failed");
                ctx.emit(
                    ctx.event(
                        JobEventLevel::Error,
                        format!("Encountered an error: {} while Generating Book", e),
                    )
                    .with_error(e.to_string())
                    .finished(),
                );
            }
        }

        result
    }

    async fn generate(
        &self,
        ctx: &JobContext,
        template_id: &DocumentId,
    ) -> Result<BookOutcome, ApplicationError> {
        ctx.progress(format!("Loading template book document: {}...", template_id));
        let template = self.store.get_document(ctx.space_id(), template_id).await?;
        ctx.info(format!("Template Book Document Loaded:{}", template.title));

        let document_id = self
            .store
            .add_document(
                ctx.space_id(),
                NewDocument {
                    title: book_title_from_template(&template.title),
                    abstract_text: template.abstract_text.clone(),
                },
            )
            .await
            .map_err(|e| {
                ApplicationError::skeleton(format!("failed to create book document: {}", e))
            })?;
        ctx.emit(
            ctx.event(
                JobEventLevel::Info,
                format!("Book Document Created with ID: {}", document_id),
            )
            .with_document(document_id.clone()),
        );

        let expansion = self.expander.expand(ctx, &template, &document_id).await?;

        ctx.progress("Book Generation Completed. Started refining the book...");
        self.pipeline.run(ctx, &document_id).await?;
        ctx.progress("Book Refinement Completed.");

        Ok(BookOutcome {
            document_id,
            expansion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{
        ContentExpanderConfig, JsonRepairer, ParagraphRewriter, RetryPolicy,
    };
    use crate::domain::book::SpaceId;
    use crate::infrastructure::adapters::{FakeLlmClient, HtmlEntitySanitizer};
    use crate::infrastructure::events::EventPublisher;
    use crate::infrastructure::memory::InMemoryDocumentStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_missing_template_ends_with_error_event() {
        let events = Arc::new(EventPublisher::new());
        let client = Arc::new(FakeLlmClient::canned());
        let store = Arc::new(InMemoryDocumentStore::new());
        let repairer = Arc::new(JsonRepairer::new(client.clone()));
        let retry = RetryPolicy::new(1, Duration::ZERO);
        let expander = ContentExpander::new(
            client.clone(),
            store.clone(),
            repairer.clone(),
            ContentExpanderConfig {
                retry,
                ..Default::default()
            },
        );
        let rewriter = Arc::new(ParagraphRewriter::new(client, store.clone(), repairer, retry, 3));
        let pipeline = Arc::new(RefinementPipeline::standard(
            store.clone(),
            Arc::new(HtmlEntitySanitizer),
            rewriter,
        ));
        let handler = GenerateBookHandler::new(store, expander, pipeline, events.clone());

        let command = GenerateBook::new(SpaceId::new("s"), DocumentId::new("nope"), None);
        let job_id = command.job_id;
        let err = handler.handle(command).await.unwrap_err();

        assert!(matches!(err, ApplicationError::NotFound { .. }));
        let history = events.history(job_id);
        let last = history.last().unwrap();
        assert!(last.finished);
        assert_eq!(last.level, JobEventLevel::Error);
        assert!(last.message.contains("while Generating Book"));
    }
}
