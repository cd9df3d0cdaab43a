//! Template Generator - 书籍模板生成
//!
//! 流程:
//! 1. 创建模板文档（摘要为归一化参数的 JSON）
//! 2. 生成章节列表并按顺序写入
//! 3. 各章节并行生成段落构思；单章重试耗尽后写入一个兜底段落
//!
//! 1、2 失败则整个任务失败；3 中单章失败不影响其它章节。

use futures_util::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::application::context::JobContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{DocumentStorePort, JobEventLevel, TextGeneratorPort};
use crate::application::services::json_repairer::{JsonRepairer, RepairOptions};
use crate::application::services::prompts;
use crate::application::services::retry::RetryPolicy;
use crate::domain::book::{
    template_title, BookSpec, ChapterId, DocumentId, NewChapter, NewDocument, NewParagraph,
    FAILED_CHAPTER_TEMPLATE_TEXT,
};

/// 章节列表，兼容 `{chapters: [...]}` 与裸数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChapterList {
    Wrapped { chapters: Vec<NewChapter> },
    Bare(Vec<NewChapter>),
}

impl ChapterList {
    fn into_chapters(self) -> Vec<NewChapter> {
        match self {
            ChapterList::Wrapped { chapters } => chapters,
            ChapterList::Bare(chapters) => chapters,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParagraphIdea {
    idea: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParagraphIdeas {
    Wrapped { paragraphs: Vec<ParagraphIdea> },
    Bare(Vec<ParagraphIdea>),
}

impl ParagraphIdeas {
    fn into_ideas(self) -> Vec<String> {
        let ideas = match self {
            ParagraphIdeas::Wrapped { paragraphs } => paragraphs,
            ParagraphIdeas::Bare(paragraphs) => paragraphs,
        };
        ideas.into_iter().map(|p| p.idea).collect()
    }
}

/// 模板生成配置
#[derive(Debug, Clone)]
pub struct TemplateGeneratorConfig {
    /// 单章段落构思生成的尝试次数
    pub chapter_retries: u32,
    pub chapter_list_repair_iterations: u32,
    pub paragraph_ideas_repair_iterations: u32,
}

impl Default for TemplateGeneratorConfig {
    fn default() -> Self {
        Self {
            chapter_retries: 5,
            chapter_list_repair_iterations: 5,
            paragraph_ideas_repair_iterations: 5,
        }
    }
}

/// 模板生成结果
#[derive(Debug, Clone)]
pub struct TemplateOutcome {
    pub document_id: DocumentId,
    pub chapter_count: usize,
    /// 写入兜底段落的章节数
    pub failed_chapters: usize,
}

/// 模板生成器
pub struct TemplateGenerator {
    generator: Arc<dyn TextGeneratorPort>,
    store: Arc<dyn DocumentStorePort>,
    repairer: Arc<JsonRepairer>,
    config: TemplateGeneratorConfig,
}

impl TemplateGenerator {
    pub fn new(
        generator: Arc<dyn TextGeneratorPort>,
        store: Arc<dyn DocumentStorePort>,
        repairer: Arc<JsonRepairer>,
        config: TemplateGeneratorConfig,
    ) -> Self {
        Self {
            generator,
            store,
            repairer,
            config,
        }
    }

    pub async fn generate(
        &self,
        ctx: &JobContext,
        spec: &BookSpec,
        directive: Option<&str>,
    ) -> Result<TemplateOutcome, ApplicationError> {
        let title = spec
            .title()
            .ok_or_else(|| ApplicationError::validation("title is required"))?;
        let book_data = spec.to_abstract();

        // 1. 模板文档
        let document_id = self
            .store
            .add_document(
                ctx.space_id(),
                NewDocument {
                    title: template_title(title),
                    abstract_text: book_data.clone(),
                },
            )
            .await
            .map_err(|e| ApplicationError::skeleton(format!("failed to create document: {}", e)))?;

        tracing::info!(job_id = %ctx.job_id(), document_id = %document_id, "Template document created");
        ctx.emit(
            ctx.event(
                JobEventLevel::Info,
                format!("Document created with id {}", document_id),
            )
            .with_document(document_id.clone()),
        );

        // 2. 章节列表
        ctx.progress("Generating chapter list");
        let prompt = prompts::chapter_list_prompt(directive, &book_data);
        tracing::debug!(job_id = %ctx.job_id(), prompt = %prompt, "Chapter list prompt");
        let response = self
            .generator
            .generate_text(ctx.space_id(), &prompt, ctx.personality())
            .await?;
        let chapters = self
            .repairer
            .repair_into::<ChapterList>(
                ctx,
                &response.message,
                &RepairOptions::new(self.config.chapter_list_repair_iterations)
                    .with_schema(prompts::CHAPTER_LIST_SCHEMA),
            )
            .await?
            .into_chapters();

        if chapters.is_empty() {
            ctx.warning("Chapter list is empty");
        }

        let mut chapter_ids: Vec<ChapterId> = Vec::with_capacity(chapters.len());
        for chapter in &chapters {
            let chapter_id = self
                .store
                .add_chapter(ctx.space_id(), &document_id, chapter.clone())
                .await
                .map_err(|e| {
                    ApplicationError::skeleton(format!(
                        "failed to create chapter '{}': {}",
                        chapter.title, e
                    ))
                })?;
            chapter_ids.push(chapter_id);
        }
        ctx.info(format!("Created {} chapters", chapters.len()));

        // 3. 各章段落构思（并行）
        let total = chapters.len();
        let results = join_all(
            chapters
                .iter()
                .zip(chapter_ids.iter())
                .enumerate()
                .map(|(index, (chapter, chapter_id))| {
                    self.generate_chapter(
                        ctx,
                        spec,
                        &book_data,
                        &document_id,
                        index,
                        total,
                        chapter,
                        chapter_id,
                    )
                }),
        )
        .await;
        let failed_chapters = results.into_iter().filter(|fell_back| *fell_back).count();

        tracing::info!(
            job_id = %ctx.job_id(),
            document_id = %document_id,
            chapters = total,
            failed_chapters,
            "Template generated"
        );

        Ok(TemplateOutcome {
            document_id,
            chapter_count: total,
            failed_chapters,
        })
    }

    /// 生成并写入单章段落构思，返回是否写入了兜底段落
    #[allow(clippy::too_many_arguments)]
    async fn generate_chapter(
        &self,
        ctx: &JobContext,
        spec: &BookSpec,
        book_data: &str,
        document_id: &DocumentId,
        index: usize,
        total: usize,
        chapter: &NewChapter,
        chapter_id: &ChapterId,
    ) -> bool {
        let count = spec.paragraph_count(index);
        ctx.progress(format!(
            "Generating paragraphs for chapter {}/{}: {}",
            index + 1,
            total,
            chapter.title
        ));

        let policy = RetryPolicy::new(self.config.chapter_retries, Duration::ZERO);
        let label = format!("chapter {} template", index + 1);
        let ideas = policy
            .retry_or_none(ctx, &label, || {
                self.generate_ideas(ctx, book_data, chapter, count)
            })
            .await;

        let (texts, fell_back) = match ideas {
            Some(ideas) => {
                if let Some(expected) = count {
                    if ideas.len() != expected as usize {
                        ctx.warning(format!(
                            "Chapter {} requested {} paragraphs but got {}",
                            index + 1,
                            expected,
                            ideas.len()
                        ));
                    }
                }
                (ideas, false)
            }
            None => {
                tracing::error!(
                    job_id = %ctx.job_id(),
                    chapter_index = index,
                    "Chapter template generation exhausted retries"
                );
                (vec![FAILED_CHAPTER_TEMPLATE_TEXT.to_string()], true)
            }
        };

        for text in texts {
            if let Err(e) = self
                .store
                .add_paragraph(ctx.space_id(), document_id, chapter_id, NewParagraph::new(text))
                .await
            {
                ctx.warning(format!(
                    "Failed to store paragraph for chapter {}: {}",
                    index + 1,
                    e
                ));
            }
        }

        ctx.emit(
            ctx.event(
                JobEventLevel::Progress,
                format!("Chapter {}/{} template done", index + 1, total),
            )
            .with_document(document_id.clone())
            .with_chapter(chapter_id.clone()),
        );
        fell_back
    }

    async fn generate_ideas(
        &self,
        ctx: &JobContext,
        book_data: &str,
        chapter: &NewChapter,
        count: Option<u32>,
    ) -> Result<Vec<String>, ApplicationError> {
        let prompt =
            prompts::paragraph_ideas_prompt(book_data, &chapter.title, &chapter.idea, count);
        tracing::debug!(job_id = %ctx.job_id(), prompt = %prompt, "Paragraph ideas prompt");
        let response = self
            .generator
            .generate_text(ctx.space_id(), &prompt, ctx.personality())
            .await?;
        let ideas = self
            .repairer
            .repair_into::<ParagraphIdeas>(
                ctx,
                &response.message,
                &RepairOptions::new(self.config.paragraph_ideas_repair_iterations)
                    .with_schema(prompts::PARAGRAPH_IDEAS_SCHEMA),
            )
            .await?
            .into_ideas();
        Ok(ideas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::test_context;
    use crate::infrastructure::adapters::FakeLlmClient;
    use crate::infrastructure::memory::InMemoryDocumentStore;
    use serde_json::json;

    fn spec(value: serde_json::Value) -> BookSpec {
        let map = value.as_object().cloned().unwrap();
        BookSpec::normalize(map, |s| s.to_string()).unwrap().spec
    }

    fn generator(
        client: Arc<FakeLlmClient>,
        store: Arc<InMemoryDocumentStore>,
    ) -> TemplateGenerator {
        let repairer = Arc::new(JsonRepairer::new(client.clone()));
        TemplateGenerator::new(client, store, repairer, TemplateGeneratorConfig::default())
    }

    #[tokio::test]
    async fn test_generates_chapters_and_ideas() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::new(|prompt| {
            if prompt.contains("list of chapters") {
                Ok(r#"```json
{"chapters":[{"title":"Launch","idea":"Leaving"},{"title":"Return","idea":"Coming home"}]}
```"#
                    .to_string())
            } else if prompt.contains("\"Launch\"") {
                Ok(r#"{"paragraphs":[{"idea":"a"},{"idea":"b"}]}"#.to_string())
            } else {
                Ok(r#"[{"idea":"c"}]"#.to_string())
            }
        }));
        let store = Arc::new(InMemoryDocumentStore::new());

        let outcome = generator(client, store.clone())
            .generate(
                &ctx,
                &spec(json!({"title": "Orbit", "chaptersIdeaCountByChapter": [2, 1]})),
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.chapter_count, 2);
        assert_eq!(outcome.failed_chapters, 0);

        let doc = store
            .get_document(ctx.space_id(), &outcome.document_id)
            .await
            .unwrap();
        assert_eq!(doc.title, "template_Orbit");
        assert_eq!(doc.chapters[0].title, "Launch");
        let texts: Vec<_> = doc.chapters[0].paragraphs.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(doc.chapters[1].paragraphs[0].text, "c");

        let abstract_value: serde_json::Value = serde_json::from_str(&doc.abstract_text).unwrap();
        assert_eq!(abstract_value["title"], "Orbit");
    }

    #[tokio::test]
    async fn test_chapter_failure_falls_back_to_stub() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::new(|prompt| {
            if prompt.contains("list of chapters") {
                Ok(r#"[{"title":"Only","idea":"x"}]"#.to_string())
            } else {
                Ok("never json".to_string())
            }
        }));
        let store = Arc::new(InMemoryDocumentStore::new());

        let outcome = generator(client, store.clone())
            .generate(&ctx, &spec(json!({"title": "Orbit", "ideasPerChapter": 3})), None)
            .await
            .unwrap();

        assert_eq!(outcome.failed_chapters, 1);
        let doc = store
            .get_document(ctx.space_id(), &outcome.document_id)
            .await
            .unwrap();
        assert_eq!(doc.chapters[0].paragraphs.len(), 1);
        assert_eq!(doc.chapters[0].paragraphs[0].text, FAILED_CHAPTER_TEMPLATE_TEXT);
    }

    #[tokio::test]
    async fn test_unrepairable_chapter_list_fails_job() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::fixed("no chapters here"));
        let store = Arc::new(InMemoryDocumentStore::new());

        let err = generator(client, store)
            .generate(&ctx, &spec(json!({"title": "Orbit"})), None)
            .await
            .unwrap_err();

        assert!(err.is_repair_exhausted());
    }

    #[tokio::test]
    async fn test_directive_is_embedded_in_chapter_prompt() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::fixed(r#"{"chapters":[]}"#));
        let store = Arc::new(InMemoryDocumentStore::new());

        generator(client.clone(), store)
            .generate(&ctx, &spec(json!({"title": "Orbit"})), Some("Three acts"))
            .await
            .unwrap();

        assert!(client.prompts()[0].contains("Three acts"));
    }
}
