//! Document Store Port - 文档持久化抽象
//!
//! 文档 -> 章节 -> 段落 的增量写入接口
//! 具体实现在 infrastructure 层（SQLite / 内存）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::book::{
    ChapterId, Document, DocumentId, NewChapter, NewDocument, NewParagraph, ParagraphId,
    ParagraphUpdate, SpaceId,
};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Document Store Port
///
/// 每个写操作只触及自己的 id，并发任务之间没有读-改-写竞争
#[async_trait]
pub trait DocumentStorePort: Send + Sync {
    /// 获取文档当前状态（含章节与段落，按位置排序）
    async fn get_document(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
    ) -> Result<Document, RepositoryError>;

    /// 新建文档
    async fn add_document(
        &self,
        space_id: &SpaceId,
        document: NewDocument,
    ) -> Result<DocumentId, RepositoryError>;

    /// 追加章节
    async fn add_chapter(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        chapter: NewChapter,
    ) -> Result<ChapterId, RepositoryError>;

    /// 追加段落
    async fn add_paragraph(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        chapter_id: &ChapterId,
        paragraph: NewParagraph,
    ) -> Result<ParagraphId, RepositoryError>;

    /// 整体更新段落
    async fn update_paragraph(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        update: ParagraphUpdate,
    ) -> Result<(), RepositoryError>;

    /// 只更新段落文本
    async fn update_paragraph_text(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        paragraph_id: &ParagraphId,
        text: &str,
    ) -> Result<(), RepositoryError>;

    /// 只更新段落备注
    async fn update_paragraph_comment(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        paragraph_id: &ParagraphId,
        comment: &str,
    ) -> Result<(), RepositoryError>;
}
