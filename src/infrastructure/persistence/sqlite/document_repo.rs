//! SQLite Document Store
//!
//! 章节与段落带 position 列，读取时按插入顺序返回

use async_trait::async_trait;
use chrono::Utc;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{DocumentStorePort, RepositoryError};
use crate::domain::book::{
    Chapter, ChapterId, Document, DocumentId, NewChapter, NewDocument, NewParagraph, Paragraph,
    ParagraphId, ParagraphUpdate, SpaceId,
};

/// SQLite Document Store
pub struct SqliteDocumentStore {
    pool: DbPool,
}

impl SqliteDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn ensure_document(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
    ) -> Result<(), RepositoryError> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT id FROM documents WHERE id = ? AND space_id = ?")
                .bind(document_id.as_str())
                .bind(space_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        found
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(document_id.to_string()))
    }

    async fn update_paragraph_column(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        paragraph_id: &ParagraphId,
        column: ParagraphColumn,
        value: &str,
    ) -> Result<(), RepositoryError> {
        self.ensure_document(space_id, document_id).await?;

        let sql = match column {
            ParagraphColumn::Text => {
                "UPDATE paragraphs SET text = ?, updated_at = ? WHERE id = ? AND document_id = ?"
            }
            ParagraphColumn::Comment => {
                "UPDATE paragraphs SET comment = ?, updated_at = ? WHERE id = ? AND document_id = ?"
            }
        };
        let result = sqlx::query(sql)
            .bind(value)
            .bind(Utc::now().to_rfc3339())
            .bind(paragraph_id.as_str())
            .bind(document_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(paragraph_id.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum ParagraphColumn {
    Text,
    Comment,
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::DatabaseError(e.to_string())
}

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    title: String,
    #[sqlx(rename = "abstract")]
    abstract_text: String,
}

#[derive(FromRow)]
struct ChapterRow {
    id: String,
    title: String,
    idea: String,
}

#[derive(FromRow)]
struct ParagraphRow {
    id: String,
    chapter_id: String,
    text: String,
    comment: Option<String>,
}

impl From<ParagraphRow> for Paragraph {
    fn from(row: ParagraphRow) -> Self {
        Paragraph {
            id: ParagraphId::new(row.id),
            text: row.text,
            comment: row.comment,
        }
    }
}

#[async_trait]
impl DocumentStorePort for SqliteDocumentStore {
    async fn get_document(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
    ) -> Result<Document, RepositoryError> {
        let row: DocumentRow = sqlx::query_as(
            "SELECT id, title, abstract FROM documents WHERE id = ? AND space_id = ?",
        )
        .bind(document_id.as_str())
        .bind(space_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| RepositoryError::NotFound(document_id.to_string()))?;

        let chapter_rows: Vec<ChapterRow> = sqlx::query_as(
            "SELECT id, title, idea FROM chapters WHERE document_id = ? ORDER BY position",
        )
        .bind(document_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let paragraph_rows: Vec<ParagraphRow> = sqlx::query_as(
            "SELECT id, chapter_id, text, comment FROM paragraphs WHERE document_id = ? ORDER BY position",
        )
        .bind(document_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut by_chapter: HashMap<String, Vec<Paragraph>> = HashMap::new();
        for row in paragraph_rows {
            by_chapter
                .entry(row.chapter_id.clone())
                .or_default()
                .push(Paragraph::from(row));
        }

        let chapters = chapter_rows
            .into_iter()
            .map(|row| Chapter {
                paragraphs: by_chapter.remove(&row.id).unwrap_or_default(),
                id: ChapterId::new(row.id),
                title: row.title,
                idea: row.idea,
            })
            .collect();

        Ok(Document {
            id: DocumentId::new(row.id),
            title: row.title,
            abstract_text: row.abstract_text,
            chapters,
        })
    }

    async fn add_document(
        &self,
        space_id: &SpaceId,
        document: NewDocument,
    ) -> Result<DocumentId, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO documents (id, space_id, title, abstract, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(space_id.as_str())
        .bind(&document.title)
        .bind(&document.abstract_text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        tracing::debug!(space_id = %space_id, document_id = %id, title = %document.title, "Document inserted");
        Ok(DocumentId::new(id))
    }

    async fn add_chapter(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        chapter: NewChapter,
    ) -> Result<ChapterId, RepositoryError> {
        self.ensure_document(space_id, document_id).await?;

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO chapters (id, document_id, position, title, idea)
            SELECT ?, ?, COALESCE(MAX(position), -1) + 1, ?, ?
            FROM chapters WHERE document_id = ?
            "#,
        )
        .bind(&id)
        .bind(document_id.as_str())
        .bind(&chapter.title)
        .bind(&chapter.idea)
        .bind(document_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(ChapterId::new(id))
    }

    async fn add_paragraph(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        chapter_id: &ChapterId,
        paragraph: NewParagraph,
    ) -> Result<ParagraphId, RepositoryError> {
        self.ensure_document(space_id, document_id).await?;

        let chapter: Option<(String,)> =
            sqlx::query_as("SELECT id FROM chapters WHERE id = ? AND document_id = ?")
                .bind(chapter_id.as_str())
                .bind(document_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        if chapter.is_none() {
            return Err(RepositoryError::NotFound(chapter_id.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO paragraphs (id, document_id, chapter_id, position, text, comment, updated_at)
            SELECT ?, ?, ?, COALESCE(MAX(position), -1) + 1, ?, NULL, ?
            FROM paragraphs WHERE chapter_id = ?
            "#,
        )
        .bind(&id)
        .bind(document_id.as_str())
        .bind(chapter_id.as_str())
        .bind(&paragraph.text)
        .bind(Utc::now().to_rfc3339())
        .bind(chapter_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(ParagraphId::new(id))
    }

    async fn update_paragraph(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        update: ParagraphUpdate,
    ) -> Result<(), RepositoryError> {
        self.update_paragraph_column(
            space_id,
            document_id,
            &update.id,
            ParagraphColumn::Text,
            &update.text,
        )
        .await
    }

    async fn update_paragraph_text(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        paragraph_id: &ParagraphId,
        text: &str,
    ) -> Result<(), RepositoryError> {
        self.update_paragraph_column(
            space_id,
            document_id,
            paragraph_id,
            ParagraphColumn::Text,
            text,
        )
        .await
    }

    async fn update_paragraph_comment(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        paragraph_id: &ParagraphId,
        comment: &str,
    ) -> Result<(), RepositoryError> {
        self.update_paragraph_column(
            space_id,
            document_id,
            paragraph_id,
            ParagraphColumn::Comment,
            comment,
        )
        .await
    }
}
