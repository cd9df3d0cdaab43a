//! In-Memory Document Store Implementation

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{DocumentStorePort, RepositoryError};
use crate::domain::book::{
    Chapter, ChapterId, Document, DocumentId, NewChapter, NewDocument, NewParagraph, Paragraph,
    ParagraphId, ParagraphUpdate, SpaceId,
};

/// 内存文档存储
///
/// 文档按 (space_id, document_id) 存放，写操作只锁住所在文档
#[derive(Default)]
pub struct InMemoryDocumentStore {
    /// "space_id/document_id" -> Document
    documents: DashMap<String, Document>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 文档数量
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn key(space_id: &SpaceId, document_id: &DocumentId) -> String {
        format!("{}/{}", space_id, document_id)
    }

    fn with_paragraph<F>(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        paragraph_id: &ParagraphId,
        apply: F,
    ) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut Paragraph),
    {
        let mut document = self
            .documents
            .get_mut(&Self::key(space_id, document_id))
            .ok_or_else(|| RepositoryError::NotFound(document_id.to_string()))?;
        let paragraph = document
            .chapters
            .iter_mut()
            .flat_map(|c| c.paragraphs.iter_mut())
            .find(|p| &p.id == paragraph_id)
            .ok_or_else(|| RepositoryError::NotFound(paragraph_id.to_string()))?;
        apply(paragraph);
        Ok(())
    }
}

#[async_trait]
impl DocumentStorePort for InMemoryDocumentStore {
    async fn get_document(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
    ) -> Result<Document, RepositoryError> {
        self.documents
            .get(&Self::key(space_id, document_id))
            .map(|d| d.clone())
            .ok_or_else(|| RepositoryError::NotFound(document_id.to_string()))
    }

    async fn add_document(
        &self,
        space_id: &SpaceId,
        document: NewDocument,
    ) -> Result<DocumentId, RepositoryError> {
        let id = DocumentId::new(Uuid::new_v4().to_string());
        self.documents.insert(
            Self::key(space_id, &id),
            Document {
                id: id.clone(),
                title: document.title,
                abstract_text: document.abstract_text,
                chapters: Vec::new(),
            },
        );
        tracing::debug!(space_id = %space_id, document_id = %id, "Document added");
        Ok(id)
    }

    async fn add_chapter(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        chapter: NewChapter,
    ) -> Result<ChapterId, RepositoryError> {
        let mut document = self
            .documents
            .get_mut(&Self::key(space_id, document_id))
            .ok_or_else(|| RepositoryError::NotFound(document_id.to_string()))?;
        let id = ChapterId::new(Uuid::new_v4().to_string());
        document.chapters.push(Chapter {
            id: id.clone(),
            title: chapter.title,
            idea: chapter.idea,
            paragraphs: Vec::new(),
        });
        Ok(id)
    }

    async fn add_paragraph(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        chapter_id: &ChapterId,
        paragraph: NewParagraph,
    ) -> Result<ParagraphId, RepositoryError> {
        let mut document = self
            .documents
            .get_mut(&Self::key(space_id, document_id))
            .ok_or_else(|| RepositoryError::NotFound(document_id.to_string()))?;
        let chapter = document
            .chapters
            .iter_mut()
            .find(|c| &c.id == chapter_id)
            .ok_or_else(|| RepositoryError::NotFound(chapter_id.to_string()))?;
        let id = ParagraphId::new(Uuid::new_v4().to_string());
        chapter.paragraphs.push(Paragraph {
            id: id.clone(),
            text: paragraph.text,
            comment: None,
        });
        Ok(id)
    }

    async fn update_paragraph(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        update: ParagraphUpdate,
    ) -> Result<(), RepositoryError> {
        let ParagraphUpdate { id, text } = update;
        self.with_paragraph(space_id, document_id, &id, |p| p.text = text)
    }

    async fn update_paragraph_text(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        paragraph_id: &ParagraphId,
        text: &str,
    ) -> Result<(), RepositoryError> {
        self.with_paragraph(space_id, document_id, paragraph_id, |p| {
            p.text = text.to_string()
        })
    }

    async fn update_paragraph_comment(
        &self,
        space_id: &SpaceId,
        document_id: &DocumentId,
        paragraph_id: &ParagraphId,
        comment: &str,
    ) -> Result<(), RepositoryError> {
        self.with_paragraph(space_id, document_id, paragraph_id, |p| {
            p.comment = Some(comment.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_document(title: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            abstract_text: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let store = InMemoryDocumentStore::new();
        let space = SpaceId::new("space-1");

        let doc_id = store.add_document(&space, new_document("book_Orbit")).await.unwrap();
        let chapter_id = store
            .add_chapter(
                &space,
                &doc_id,
                NewChapter {
                    title: "Launch".to_string(),
                    idea: "Leaving".to_string(),
                },
            )
            .await
            .unwrap();
        let p1 = store
            .add_paragraph(&space, &doc_id, &chapter_id, NewParagraph::new("first"))
            .await
            .unwrap();
        let p2 = store
            .add_paragraph(&space, &doc_id, &chapter_id, NewParagraph::new("second"))
            .await
            .unwrap();

        store
            .update_paragraph(
                &space,
                &doc_id,
                ParagraphUpdate {
                    id: p1.clone(),
                    text: "one".to_string(),
                },
            )
            .await
            .unwrap();
        store.update_paragraph_text(&space, &doc_id, &p2, "two").await.unwrap();
        store.update_paragraph_comment(&space, &doc_id, &p2, "idea").await.unwrap();

        let doc = store.get_document(&space, &doc_id).await.unwrap();
        assert_eq!(doc.title, "book_Orbit");
        assert_eq!(doc.chapters.len(), 1);
        let paragraphs = &doc.chapters[0].paragraphs;
        assert_eq!(paragraphs[0].id, p1);
        assert_eq!(paragraphs[0].text, "one");
        assert_eq!(paragraphs[1].text, "two");
        assert_eq!(paragraphs[1].comment.as_deref(), Some("idea"));
    }

    #[tokio::test]
    async fn test_documents_are_scoped_by_space() {
        let store = InMemoryDocumentStore::new();
        let doc_id = store
            .add_document(&SpaceId::new("a"), new_document("x"))
            .await
            .unwrap();

        let result = store.get_document(&SpaceId::new("b"), &doc_id).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_entities_are_not_found() {
        let store = InMemoryDocumentStore::new();
        let space = SpaceId::new("s");
        let missing = DocumentId::new("missing");

        let chapter = store
            .add_chapter(
                &space,
                &missing,
                NewChapter {
                    title: "t".to_string(),
                    idea: String::new(),
                },
            )
            .await;
        assert!(matches!(chapter, Err(RepositoryError::NotFound(_))));

        let doc_id = store.add_document(&space, new_document("x")).await.unwrap();
        let update = store
            .update_paragraph_text(&space, &doc_id, &ParagraphId::new("nope"), "t")
            .await;
        assert!(matches!(update, Err(RepositoryError::NotFound(_))));
    }
}
