//! Text Sanitizer Port - 文本转义抽象
//!
//! 上游会对自由文本做转义（如 HTML 实体），嵌入提示词前需要还原

/// Text Sanitizer Port
pub trait TextSanitizerPort: Send + Sync {
    /// 转义
    fn sanitize(&self, text: &str) -> String;

    /// 还原转义
    fn unsanitize(&self, text: &str) -> String;
}
