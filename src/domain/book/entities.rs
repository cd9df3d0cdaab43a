//! Book Context - Entities
//!
//! 模板文档与成书文档共享同一结构：文档 -> 章节 -> 段落

use serde::{Deserialize, Serialize};

use super::{ChapterId, DocumentId, ParagraphId};

/// 段落
///
/// 不变量:
/// - id 从创建起不变，只有 text 会被改写
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: ParagraphId,
    pub text: String,
    /// 成书中记录原始段落构思
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// 章节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub title: String,
    pub idea: String,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

/// 文档（模板或成书）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl Document {
    pub fn paragraph_count(&self) -> usize {
        self.chapters.iter().map(|c| c.paragraphs.len()).sum()
    }

    pub fn find_paragraph(&self, id: &ParagraphId) -> Option<&Paragraph> {
        self.chapters
            .iter()
            .flat_map(|c| c.paragraphs.iter())
            .find(|p| &p.id == id)
    }
}

/// 新建文档
#[derive(Debug, Clone, Serialize)]
pub struct NewDocument {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// 新建章节
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChapter {
    pub title: String,
    #[serde(default)]
    pub idea: String,
}

/// 新建段落
#[derive(Debug, Clone, Serialize)]
pub struct NewParagraph {
    pub text: String,
}

impl NewParagraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// 段落整体更新（text + id）
#[derive(Debug, Clone, Serialize)]
pub struct ParagraphUpdate {
    pub id: ParagraphId,
    pub text: String,
}

/// 段落在章节中的位置
///
/// 决定润色时可用的上下文窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphPosition {
    /// 章节唯一段落
    Sole,
    First,
    Last,
    Middle,
}

impl ParagraphPosition {
    pub fn classify(index: usize, len: usize) -> Self {
        if len == 1 {
            ParagraphPosition::Sole
        } else if index == 0 {
            ParagraphPosition::First
        } else if index + 1 == len {
            ParagraphPosition::Last
        } else {
            ParagraphPosition::Middle
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParagraphPosition::Sole => "sole",
            ParagraphPosition::First => "first",
            ParagraphPosition::Last => "last",
            ParagraphPosition::Middle => "middle",
        }
    }

    pub fn has_previous(&self) -> bool {
        matches!(self, ParagraphPosition::Last | ParagraphPosition::Middle)
    }

    pub fn has_next(&self) -> bool {
        matches!(self, ParagraphPosition::Middle)
    }
}
