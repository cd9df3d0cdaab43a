//! HTML 实体转义
//!
//! 转义使用 `encode_safe`；还原支持命名实体和数字实体，只还原一层

use crate::application::ports::TextSanitizerPort;

/// HTML 实体转义器
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlEntitySanitizer;

impl TextSanitizerPort for HtmlEntitySanitizer {
    fn sanitize(&self, text: &str) -> String {
        html_escape::encode_safe(text).into_owned()
    }

    fn unsanitize(&self, text: &str) -> String {
        html_escape::decode_html_entities(text).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_escapes_markup() {
        let s = HtmlEntitySanitizer;
        let escaped = s.sanitize(r#"<b>"Tom" & 'Jerry'</b>"#);
        assert!(escaped.starts_with("&lt;b&gt;"));
        assert!(escaped.contains("&amp;"));
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('>'));
        assert!(!escaped.contains('"'));
        assert!(!escaped.contains('\''));
        assert_eq!(s.unsanitize(&escaped), r#"<b>"Tom" & 'Jerry'</b>"#);
    }

    #[test]
    fn test_unsanitize_restores_text() {
        let s = HtmlEntitySanitizer;
        assert_eq!(s.unsanitize("{&quot;title&quot;:&quot;Orbit&quot;}"), r#"{"title":"Orbit"}"#);
        assert_eq!(s.unsanitize("it&#x27;s"), "it's");
        assert_eq!(s.unsanitize("it&#39;s"), "it's");
        // 只还原一层
        assert_eq!(s.unsanitize("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_unsanitize_numeric_and_named_entities() {
        let s = HtmlEntitySanitizer;
        assert_eq!(
            s.unsanitize("Tom &#38; Jerry &#60;b&#62; caf&eacute;&nbsp;!"),
            "Tom & Jerry <b> caf\u{e9}\u{a0}!"
        );
    }

    #[test]
    fn test_plain_text_untouched() {
        let s = HtmlEntitySanitizer;
        assert_eq!(s.unsanitize("plain"), "plain");
        assert_eq!(s.sanitize("plain"), "plain");
    }
}
