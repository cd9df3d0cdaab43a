//! Refinement Pipeline - 成书润色
//!
//! 按顺序执行一组润色阶段，每个阶段都在内存中的成书上原地改写段落，
//! 并逐段写回存储。阶段之间、段落之间严格串行：
//! 后面的段落看到的是前面段落润色后的文本、后面段落的原始文本。

use async_trait::async_trait;
use std::sync::Arc;

use crate::application::context::JobContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{DocumentStorePort, TextGeneratorPort, TextSanitizerPort};
use crate::application::services::json_repairer::{JsonRepairer, ParagraphText, RepairOptions};
use crate::application::services::prompts;
use crate::application::services::retry::RetryPolicy;
use crate::domain::book::{Document, DocumentId, ParagraphId, ParagraphPosition};

/// 润色阶段
#[async_trait]
pub trait RefinementStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// 单个段落失败不应返回错误；返回错误意味着整个成书任务失败
    async fn refine(&self, ctx: &JobContext, book: &mut Document) -> Result<(), ApplicationError>;
}

/// 段落改写：生成（容忍失败的重试）-> 修复 -> 写回
pub struct ParagraphRewriter {
    generator: Arc<dyn TextGeneratorPort>,
    store: Arc<dyn DocumentStorePort>,
    repairer: Arc<JsonRepairer>,
    retry: RetryPolicy,
    repair_iterations: u32,
}

impl ParagraphRewriter {
    pub fn new(
        generator: Arc<dyn TextGeneratorPort>,
        store: Arc<dyn DocumentStorePort>,
        repairer: Arc<JsonRepairer>,
        retry: RetryPolicy,
        repair_iterations: u32,
    ) -> Self {
        Self {
            generator,
            store,
            repairer,
            retry,
            repair_iterations,
        }
    }

    /// 返回写回的新文本；生成重试耗尽时返回 None
    pub async fn rewrite(
        &self,
        ctx: &JobContext,
        book_id: &DocumentId,
        paragraph_id: &ParagraphId,
        prompt: &str,
    ) -> Result<Option<String>, ApplicationError> {
        let label = format!("refining paragraph {}", paragraph_id);
        let response = self
            .retry
            .retry_or_none(ctx, &label, || {
                self.generator
                    .generate_text(ctx.space_id(), prompt, ctx.personality())
            })
            .await;
        let Some(response) = response else {
            return Ok(None);
        };

        let options =
            RepairOptions::new(self.repair_iterations).with_schema(prompts::PARAGRAPH_TEXT_SCHEMA);
        let text = self
            .repairer
            .repair_into::<ParagraphText>(ctx, &response.message, &options)
            .await?
            .text;

        self.store
            .update_paragraph_text(ctx.space_id(), book_id, paragraph_id, &text)
            .await?;
        Ok(Some(text))
    }
}

/// 按位置带上下文逐段润色
pub struct ProceduralRefinement {
    rewriter: Arc<ParagraphRewriter>,
}

impl ProceduralRefinement {
    pub fn new(rewriter: Arc<ParagraphRewriter>) -> Self {
        Self { rewriter }
    }
}

#[async_trait]
impl RefinementStage for ProceduralRefinement {
    fn name(&self) -> &'static str {
        "procedural refinement"
    }

    async fn refine(&self, ctx: &JobContext, book: &mut Document) -> Result<(), ApplicationError> {
        let book_id = book.id.clone();
        let chapter_count = book.chapters.len();

        for chapter_index in 0..chapter_count {
            let len = book.chapters[chapter_index].paragraphs.len();
            for index in 0..len {
                ctx.progress(format!(
                    "Applying procedural refinement to paragraph {}/{} in chapter {}/{}...",
                    index + 1,
                    len,
                    chapter_index + 1,
                    chapter_count
                ));

                let chapter = &book.chapters[chapter_index];
                let position = ParagraphPosition::classify(index, len);
                let previous = position
                    .has_previous()
                    .then(|| chapter.paragraphs[index - 1].text.as_str());
                let next = position
                    .has_next()
                    .then(|| chapter.paragraphs[index + 1].text.as_str());
                let current = &chapter.paragraphs[index];
                let prompt = prompts::refinement_prompt(
                    &book.abstract_text,
                    &chapter.title,
                    &chapter.idea,
                    previous,
                    &current.text,
                    next,
                );
                let paragraph_id = current.id.clone();
                tracing::debug!(
                    job_id = %ctx.job_id(),
                    position = position.as_str(),
                    prompt = %prompt,
                    "Refinement prompt"
                );

                match self.rewriter.rewrite(ctx, &book_id, &paragraph_id, &prompt).await {
                    Ok(Some(text)) => {
                        book.chapters[chapter_index].paragraphs[index].text = text;
                        ctx.info(format!(
                            "Successfully applied procedural refinement to paragraph {}/{} in chapter {}/{}.",
                            index + 1,
                            len,
                            chapter_index + 1,
                            chapter_count
                        ));
                    }
                    Ok(None) => ctx.warning(format!(
                        "Failed to refine paragraph {} in chapter {}. Proceeding with the original paragraph.",
                        index + 1,
                        chapter_index + 1
                    )),
                    Err(e) => ctx.warning(format!(
                        "Error while refining paragraph {}/{} in chapter {}/{}. Error: {}. Proceeding with the original paragraph.",
                        index + 1,
                        len,
                        chapter_index + 1,
                        chapter_count,
                        e
                    )),
                }
            }
        }
        Ok(())
    }
}

/// 只根据前一段调整段落开头
pub struct TransitionEnhancer {
    rewriter: Arc<ParagraphRewriter>,
}

impl TransitionEnhancer {
    pub fn new(rewriter: Arc<ParagraphRewriter>) -> Self {
        Self { rewriter }
    }
}

#[async_trait]
impl RefinementStage for TransitionEnhancer {
    fn name(&self) -> &'static str {
        "transition enhancement"
    }

    async fn refine(&self, ctx: &JobContext, book: &mut Document) -> Result<(), ApplicationError> {
        let book_id = book.id.clone();

        for chapter_index in 0..book.chapters.len() {
            let len = book.chapters[chapter_index].paragraphs.len();
            for index in 0..len {
                let chapter = &book.chapters[chapter_index];
                ctx.progress(format!(
                    "Applying transition enhancement to paragraph {}/{} in chapter {}...",
                    index + 1,
                    len,
                    chapter.title
                ));

                let previous = (index > 0).then(|| chapter.paragraphs[index - 1].text.as_str());
                let current = &chapter.paragraphs[index];
                let prompt = prompts::transition_prompt(previous, &current.text);
                let paragraph_id = current.id.clone();

                match self.rewriter.rewrite(ctx, &book_id, &paragraph_id, &prompt).await {
                    Ok(Some(text)) => book.chapters[chapter_index].paragraphs[index].text = text,
                    Ok(None) => ctx.warning(format!(
                        "Failed to refine paragraph ID: {} in chapter ID: {}. Skipping this paragraph.",
                        paragraph_id, book.chapters[chapter_index].id
                    )),
                    Err(e) => ctx.warning(format!(
                        "Error while enhancing transition for paragraph {}/{}: {}",
                        index + 1,
                        len,
                        e
                    )),
                }
            }
        }
        Ok(())
    }
}

/// 暂不执行任何改写的阶段
macro_rules! inert_stage {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        #[async_trait]
        impl RefinementStage for $name {
            fn name(&self) -> &'static str {
                $label
            }

            async fn refine(
                &self,
                _ctx: &JobContext,
                _book: &mut Document,
            ) -> Result<(), ApplicationError> {
                Ok(())
            }
        }
    };
}

inert_stage!(StyleCorrection, "style correction");
inert_stage!(DeepParagraphExpansion, "deep paragraph expansion");
inert_stage!(DeepChapterExpansion, "deep chapter expansion");
inert_stage!(DeepBookExpansion, "deep book expansion");

/// 润色流水线
pub struct RefinementPipeline {
    store: Arc<dyn DocumentStorePort>,
    sanitizer: Arc<dyn TextSanitizerPort>,
    stages: Vec<Box<dyn RefinementStage>>,
}

impl RefinementPipeline {
    pub fn new(
        store: Arc<dyn DocumentStorePort>,
        sanitizer: Arc<dyn TextSanitizerPort>,
        stages: Vec<Box<dyn RefinementStage>>,
    ) -> Self {
        Self {
            store,
            sanitizer,
            stages,
        }
    }

    /// 默认阶段顺序
    pub fn standard(
        store: Arc<dyn DocumentStorePort>,
        sanitizer: Arc<dyn TextSanitizerPort>,
        rewriter: Arc<ParagraphRewriter>,
    ) -> Self {
        let stages: Vec<Box<dyn RefinementStage>> = vec![
            Box::new(ProceduralRefinement::new(rewriter.clone())),
            Box::new(TransitionEnhancer::new(rewriter)),
            Box::new(StyleCorrection),
            Box::new(DeepParagraphExpansion),
            Box::new(DeepChapterExpansion),
            Box::new(DeepBookExpansion),
        ];
        Self::new(store, sanitizer, stages)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// 读取成书并依次执行所有阶段，返回润色后的内存副本
    pub async fn run(
        &self,
        ctx: &JobContext,
        document_id: &DocumentId,
    ) -> Result<Document, ApplicationError> {
        let mut book = self.store.get_document(ctx.space_id(), document_id).await?;
        book.abstract_text = self.sanitizer.unsanitize(&book.abstract_text);

        for stage in &self.stages {
            ctx.progress(format!("Applying {} to the book...", stage.name()));
            if let Err(e) = stage.refine(ctx, &mut book).await {
                tracing::error!(
                    job_id = %ctx.job_id(),
                    stage = stage.name(),
                    error = %e,
                    "Refinement stage failed"
                );
                return Err(e);
            }
            ctx.info(format!("Successfully applied {} to the book.", stage.name()));
        }

        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::LlmError;
    use crate::application::services::test_support::test_context;
    use crate::domain::book::{NewChapter, NewDocument, NewParagraph};
    use crate::infrastructure::adapters::{FakeLlmClient, HtmlEntitySanitizer};
    use crate::infrastructure::memory::InMemoryDocumentStore;
    use std::time::Duration;

    /// 从提示词中取出 "**Current Paragraph**" 的内容
    fn current_of(prompt: &str) -> String {
        prompt
            .split("**Current Paragraph**:\n\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap_or_default()
            .to_string()
    }

    async fn seed_book(
        store: &InMemoryDocumentStore,
        ctx: &JobContext,
        texts: &[&str],
    ) -> DocumentId {
        let space_id = ctx.space_id();
        let id = store
            .add_document(
                space_id,
                NewDocument {
                    title: "book_Orbit".to_string(),
                    abstract_text: "{&quot;title&quot;:&quot;Orbit&quot;}".to_string(),
                },
            )
            .await
            .unwrap();
        let chapter_id = store
            .add_chapter(
                space_id,
                &id,
                NewChapter {
                    title: "Launch".to_string(),
                    idea: "Leaving".to_string(),
                },
            )
            .await
            .unwrap();
        for text in texts {
            store
                .add_paragraph(space_id, &id, &chapter_id, NewParagraph::new(*text))
                .await
                .unwrap();
        }
        id
    }

    fn rewriter(
        client: Arc<FakeLlmClient>,
        store: Arc<InMemoryDocumentStore>,
    ) -> Arc<ParagraphRewriter> {
        let repairer = Arc::new(JsonRepairer::new(client.clone()));
        Arc::new(ParagraphRewriter::new(
            client,
            store,
            repairer,
            RetryPolicy::new(3, Duration::from_millis(1)),
            3,
        ))
    }

    fn procedural_only(
        client: Arc<FakeLlmClient>,
        store: Arc<InMemoryDocumentStore>,
    ) -> RefinementPipeline {
        let stages: Vec<Box<dyn RefinementStage>> = vec![Box::new(ProceduralRefinement::new(
            rewriter(client, store.clone()),
        ))];
        RefinementPipeline::new(store, Arc::new(HtmlEntitySanitizer), stages)
    }

    #[tokio::test]
    async fn test_sequential_refinement_sees_refined_previous_and_original_next() {
        let (ctx, _) = test_context();
        let store = Arc::new(InMemoryDocumentStore::new());
        let book_id = seed_book(&store, &ctx, &["P0", "P1", "P2"]).await;
        let client = Arc::new(FakeLlmClient::new(|prompt| {
            Ok(format!(r#"{{"text":"R({})"}}"#, current_of(prompt)))
        }));

        let book = procedural_only(client.clone(), store.clone())
            .run(&ctx, &book_id)
            .await
            .unwrap();

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 3);

        // P0: 第一段，没有上下文
        assert!(!prompts[0].contains("**Previous Paragraph**"));
        assert!(!prompts[0].contains("**Next Paragraph**"));
        // P1: 前一段已润色，后一段仍是原文
        assert!(prompts[1].contains("**Previous Paragraph**:\n\"R(P0)\""));
        assert!(prompts[1].contains("**Next Paragraph**:\n\"P2\""));
        // P2: 最后一段，只有前一段
        assert!(prompts[2].contains("**Previous Paragraph**:\n\"R(P1)\""));
        assert!(!prompts[2].contains("**Next Paragraph**"));

        // 摘要已还原转义
        assert!(prompts[0].contains(r#"{"title":"Orbit"}"#));

        let texts: Vec<_> = book.chapters[0].paragraphs.iter().map(|p| p.text.clone()).collect();
        assert_eq!(texts, vec!["R(P0)", "R(P1)", "R(P2)"]);
        let stored = store.get_document(ctx.space_id(), &book_id).await.unwrap();
        assert_eq!(stored.chapters[0].paragraphs[1].text, "R(P1)");
    }

    #[tokio::test]
    async fn test_paragraph_failure_keeps_original_text() {
        let (ctx, events) = test_context();
        let store = Arc::new(InMemoryDocumentStore::new());
        let book_id = seed_book(&store, &ctx, &["P0", "P1"]).await;
        let client = Arc::new(FakeLlmClient::new(|prompt| {
            if current_of(prompt) == "P0" {
                Err(LlmError::Timeout)
            } else {
                Ok(r#"{"text":"better"}"#.to_string())
            }
        }));

        let book = procedural_only(client, store.clone())
            .run(&ctx, &book_id)
            .await
            .unwrap();

        assert_eq!(book.chapters[0].paragraphs[0].text, "P0");
        assert_eq!(book.chapters[0].paragraphs[1].text, "better");
        assert!(events
            .history(ctx.job_id())
            .iter()
            .any(|e| e.message.contains("Proceeding with the original paragraph")));
    }

    #[tokio::test]
    async fn test_transition_pass_uses_only_predecessor() {
        let (ctx, _) = test_context();
        let store = Arc::new(InMemoryDocumentStore::new());
        let book_id = seed_book(&store, &ctx, &["P0", "P1", "P2"]).await;
        let client = Arc::new(FakeLlmClient::new(|prompt| {
            Ok(format!(r#"{{"text":"T({})"}}"#, current_of(prompt)))
        }));
        let stages: Vec<Box<dyn RefinementStage>> =
            vec![Box::new(TransitionEnhancer::new(rewriter(client.clone(), store.clone())))];
        let pipeline = RefinementPipeline::new(store, Arc::new(HtmlEntitySanitizer), stages);

        pipeline.run(&ctx, &book_id).await.unwrap();

        let prompts = client.prompts();
        assert!(prompts.iter().all(|p| !p.contains("Next Paragraph")));
        assert!(prompts[1].contains("**Previous Paragraph**:\n\"T(P0)\""));
    }

    #[tokio::test]
    async fn test_standard_stage_order() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let client = Arc::new(FakeLlmClient::fixed("{}"));
        let pipeline = RefinementPipeline::standard(
            store.clone(),
            Arc::new(HtmlEntitySanitizer),
            rewriter(client, store),
        );

        assert_eq!(
            pipeline.stage_names(),
            vec![
                "procedural refinement",
                "transition enhancement",
                "style correction",
                "deep paragraph expansion",
                "deep chapter expansion",
                "deep book expansion",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_book_fails_pipeline() {
        let (ctx, _) = test_context();
        let store = Arc::new(InMemoryDocumentStore::new());
        let client = Arc::new(FakeLlmClient::fixed("{}"));

        let err = procedural_only(client, store)
            .run(&ctx, &DocumentId::new("missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }
}
