//! Sanitizer Adapter - 文本转义实现

mod html_sanitizer;

pub use html_sanitizer::HtmlEntitySanitizer;
