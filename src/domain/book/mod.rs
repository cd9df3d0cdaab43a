//! Book Context - 书籍限界上下文
//!
//! 职责:
//! - 用户参数归一化 (BookSpec)
//! - 文档 / 章节 / 段落实体
//! - 标题标记、占位文本等值对象

mod entities;
mod errors;
mod spec;
mod value_objects;

pub use entities::{
    Chapter, Document, NewChapter, NewDocument, NewParagraph, Paragraph, ParagraphPosition,
    ParagraphUpdate,
};
pub use errors::BookError;
pub use spec::{
    BookSpec, NormalizedParameters, DIRECTIVE_KEY, IDEAS_BY_CHAPTER_KEY, IDEAS_PER_CHAPTER_KEY,
    PERSONALITY_KEY, TITLE_KEY,
};
pub use value_objects::{
    book_title_from_template, expansion_error_text, template_title, ChapterId, DocumentId,
    ParagraphId, SpaceId, BOOK_TITLE_PREFIX, EXPANSION_ERROR_PREFIX,
    FAILED_CHAPTER_TEMPLATE_TEXT, PLACEHOLDER_TEXT, TEMPLATE_TITLE_PREFIX,
};
