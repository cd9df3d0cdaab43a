//! Content Expander - 段落扩写
//!
//! 先按模板建好成书骨架（章节 + 占位段落 + 构思备注），骨架任一步失败则整体失败。
//! 然后每个段落一个扩写任务，交给 TaskQueue 并发执行；等待队列空闲后返回。
//! 每个任务只写自己的段落 id，重试耗尽后写入错误标记文本。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::application::context::JobContext;
use crate::application::error::ApplicationError;
use crate::application::ports::{DocumentStorePort, TextGeneratorPort};
use crate::application::services::json_repairer::{JsonRepairer, ParagraphText, RepairOptions};
use crate::application::services::prompts;
use crate::application::services::retry::RetryPolicy;
use crate::application::services::task_queue::{TaskQueue, DEFAULT_CONCURRENCY};
use crate::domain::book::{
    expansion_error_text, Document, DocumentId, NewChapter, NewParagraph, ParagraphId,
    ParagraphUpdate, PLACEHOLDER_TEXT,
};

/// 扩写配置
#[derive(Debug, Clone)]
pub struct ContentExpanderConfig {
    pub concurrency: usize,
    /// 整个扩写任务的重试策略
    pub retry: RetryPolicy,
    pub repair_iterations: u32,
    /// 首次修复失败后重新生成时的修复预算
    pub regenerate_repair_iterations: u32,
}

impl Default for ContentExpanderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            repair_iterations: 1,
            regenerate_repair_iterations: 2,
        }
    }
}

/// 扩写结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionOutcome {
    pub paragraphs: usize,
    /// 写入错误标记的段落数
    pub failed: usize,
}

/// 单个段落的扩写任务
#[derive(Debug, Clone)]
struct ExpansionJob {
    chapter_index: usize,
    paragraph_index: usize,
    chapter_title: String,
    chapter_idea: String,
    idea: String,
    paragraph_id: ParagraphId,
}

impl ExpansionJob {
    fn label(&self) -> String {
        format!(
            "paragraph {} in chapter {}",
            self.paragraph_index + 1,
            self.chapter_index + 1
        )
    }
}

/// 段落扩写器
#[derive(Clone)]
pub struct ContentExpander {
    generator: Arc<dyn TextGeneratorPort>,
    store: Arc<dyn DocumentStorePort>,
    repairer: Arc<JsonRepairer>,
    config: ContentExpanderConfig,
}

impl ContentExpander {
    pub fn new(
        generator: Arc<dyn TextGeneratorPort>,
        store: Arc<dyn DocumentStorePort>,
        repairer: Arc<JsonRepairer>,
        config: ContentExpanderConfig,
    ) -> Self {
        Self {
            generator,
            store,
            repairer,
            config,
        }
    }

    /// 按模板扩写成书
    pub async fn expand(
        &self,
        ctx: &JobContext,
        template: &Document,
        book_id: &DocumentId,
    ) -> Result<ExpansionOutcome, ApplicationError> {
        let jobs = self.create_skeleton(ctx, template, book_id).await?;
        let total = jobs.len();
        ctx.info(format!("Book skeleton created with {} paragraphs", total));

        let queue = TaskQueue::new(self.config.concurrency);
        let failed = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let book_data: Arc<str> = Arc::from(template.abstract_text.as_str());

        for job in jobs {
            let this = self.clone();
            let ctx = ctx.clone();
            let book_id = book_id.clone();
            let book_data = book_data.clone();
            let failed = failed.clone();
            let completed = completed.clone();

            queue.push(move || async move {
                let label = job.label();
                let result = this
                    .config
                    .retry
                    .retry(&ctx, &label, || {
                        this.expand_paragraph(&ctx, &book_data, &book_id, &job)
                    })
                    .await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                match result {
                    Ok(()) => {
                        ctx.progress(format!("Expanded paragraph {}/{}", done, total));
                        Ok(())
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::SeqCst);
                        ctx.warning(format!("Failed to expand {}: {}", label, e));
                        this.store
                            .update_paragraph(
                                ctx.space_id(),
                                &book_id,
                                ParagraphUpdate {
                                    id: job.paragraph_id.clone(),
                                    text: expansion_error_text(&e.to_string()),
                                },
                            )
                            .await
                            .map_err(ApplicationError::from)
                    }
                }
            });
        }

        // 生成阶段与润色阶段之间的同步点
        queue.on_idle().await;

        let outcome = ExpansionOutcome {
            paragraphs: total,
            failed: failed.load(Ordering::SeqCst),
        };
        tracing::info!(
            job_id = %ctx.job_id(),
            book_id = %book_id,
            paragraphs = outcome.paragraphs,
            failed = outcome.failed,
            "Book expansion finished"
        );
        Ok(outcome)
    }

    async fn create_skeleton(
        &self,
        ctx: &JobContext,
        template: &Document,
        book_id: &DocumentId,
    ) -> Result<Vec<ExpansionJob>, ApplicationError> {
        let space_id = ctx.space_id();
        let mut jobs = Vec::with_capacity(template.paragraph_count());

        for (chapter_index, chapter) in template.chapters.iter().enumerate() {
            let chapter_id = self
                .store
                .add_chapter(
                    space_id,
                    book_id,
                    NewChapter {
                        title: chapter.title.clone(),
                        idea: chapter.idea.clone(),
                    },
                )
                .await
                .map_err(|e| {
                    ApplicationError::skeleton(format!(
                        "failed to create chapter {}: {}",
                        chapter_index + 1,
                        e
                    ))
                })?;

            for (paragraph_index, stub) in chapter.paragraphs.iter().enumerate() {
                let paragraph_id = self
                    .store
                    .add_paragraph(
                        space_id,
                        book_id,
                        &chapter_id,
                        NewParagraph::new(PLACEHOLDER_TEXT),
                    )
                    .await
                    .map_err(|e| {
                        ApplicationError::skeleton(format!("failed to create paragraph: {}", e))
                    })?;
                self.store
                    .update_paragraph_comment(space_id, book_id, &paragraph_id, &stub.text)
                    .await
                    .map_err(|e| {
                        ApplicationError::skeleton(format!("failed to store paragraph idea: {}", e))
                    })?;

                jobs.push(ExpansionJob {
                    chapter_index,
                    paragraph_index,
                    chapter_title: chapter.title.clone(),
                    chapter_idea: chapter.idea.clone(),
                    idea: stub.text.clone(),
                    paragraph_id,
                });
            }

            tracing::debug!(
                job_id = %ctx.job_id(),
                chapter_index,
                paragraphs = chapter.paragraphs.len(),
                "Chapter skeleton created"
            );
        }

        Ok(jobs)
    }

    /// 生成 -> 修复 -> （失败则重新生成一次）-> 写回
    async fn expand_paragraph(
        &self,
        ctx: &JobContext,
        book_data: &str,
        book_id: &DocumentId,
        job: &ExpansionJob,
    ) -> Result<(), ApplicationError> {
        let prompt = prompts::paragraph_expansion_prompt(
            book_data,
            &job.chapter_title,
            &job.chapter_idea,
            &job.idea,
        );
        tracing::debug!(job_id = %ctx.job_id(), prompt = %prompt, "Paragraph expansion prompt");

        let response = self
            .generator
            .generate_text(ctx.space_id(), &prompt, ctx.personality())
            .await?;
        let options = RepairOptions::new(self.config.repair_iterations)
            .with_schema(prompts::PARAGRAPH_TEXT_SCHEMA);

        let text = match self
            .repairer
            .repair_into::<ParagraphText>(ctx, &response.message, &options)
            .await
        {
            Ok(paragraph) => paragraph.text,
            Err(e) => {
                tracing::debug!(
                    job_id = %ctx.job_id(),
                    paragraph_id = %job.paragraph_id,
                    error = %e,
                    "Regenerating paragraph after repair failure"
                );
                let response = self
                    .generator
                    .generate_text(ctx.space_id(), &prompt, ctx.personality())
                    .await?;
                let options = RepairOptions::new(self.config.regenerate_repair_iterations)
                    .with_schema(prompts::PARAGRAPH_TEXT_SCHEMA);
                self.repairer
                    .repair_into::<ParagraphText>(ctx, &response.message, &options)
                    .await?
                    .text
            }
        };

        self.store
            .update_paragraph(
                ctx.space_id(),
                book_id,
                ParagraphUpdate {
                    id: job.paragraph_id.clone(),
                    text,
                },
            )
            .await?;
        Ok(())
    }
}
