//! Book Context - Value Objects

use serde::{Deserialize, Serialize};

/// 模板文档标题前缀
pub const TEMPLATE_TITLE_PREFIX: &str = "template_";

/// 成书文档标题前缀
pub const BOOK_TITLE_PREFIX: &str = "book_";

/// 占位段落文本（生成前可见）
pub const PLACEHOLDER_TEXT: &str = "Preparing for Generation...";

/// 章节模板生成彻底失败时写入的段落
pub const FAILED_CHAPTER_TEMPLATE_TEXT: &str = "Failed to generate chapter template";

/// 段落扩写失败标记前缀
pub const EXPANSION_ERROR_PREFIX: &str = "Error in expanding paragraph:";

/// 工作空间标识（由宿主分配）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceId(String);

impl SpaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 文档唯一标识
///
/// 由持久化存储分配，对本 crate 不透明
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 章节唯一标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChapterId(String);

impl ChapterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 段落唯一标识
///
/// 从占位段落创建到最终润色保持不变
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParagraphId(String);

impl ParagraphId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParagraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 生成模板文档标题
pub fn template_title(title: &str) -> String {
    format!("{}{}", TEMPLATE_TITLE_PREFIX, title)
}

/// 模板标题 -> 成书标题（只替换第一处标记）
pub fn book_title_from_template(template_title: &str) -> String {
    template_title.replacen(TEMPLATE_TITLE_PREFIX, BOOK_TITLE_PREFIX, 1)
}

/// 构造扩写失败标记文本
pub fn expansion_error_text(message: &str) -> String {
    format!("{}{}", EXPANSION_ERROR_PREFIX, message)
}
