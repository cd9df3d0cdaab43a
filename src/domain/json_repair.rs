//! JSON 修复阶段
//!
//! 模型输出"应该是"JSON，但常带代码块标记、换行和多余空白。
//! 这里定义修复循环中固定顺序的各个阶段，以及纯语法阶段的实现。
//! 模型辅助阶段需要调用生成服务，在应用层实现。

/// 带语言标记的代码块起始
const JSON_FENCE: &str = "```json";
/// 代码块标记
const FENCE: &str = "```";

/// 修复阶段（按执行顺序声明）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPhase {
    /// 去掉开头的代码块标记及匹配的结尾标记
    StripLeadingFence,
    /// 只保留第一个代码块内部的内容
    ExtractFencedBlock,
    /// 删除所有换行符
    RemoveNewlines,
    /// 去掉首尾空白
    TrimWhitespace,
    /// 请生成服务根据解析错误修正
    ModelAssisted,
}

impl RepairPhase {
    /// 每轮迭代的固定阶段顺序
    pub const ORDER: [RepairPhase; 5] = [
        RepairPhase::StripLeadingFence,
        RepairPhase::ExtractFencedBlock,
        RepairPhase::RemoveNewlines,
        RepairPhase::TrimWhitespace,
        RepairPhase::ModelAssisted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepairPhase::StripLeadingFence => "strip_leading_fence",
            RepairPhase::ExtractFencedBlock => "extract_fenced_block",
            RepairPhase::RemoveNewlines => "remove_newlines",
            RepairPhase::TrimWhitespace => "trim_whitespace",
            RepairPhase::ModelAssisted => "model_assisted",
        }
    }

    pub fn is_syntactic(&self) -> bool {
        !matches!(self, RepairPhase::ModelAssisted)
    }

    /// 执行纯语法阶段；模型辅助阶段原样返回
    pub fn apply_syntactic(&self, text: &str) -> String {
        match self {
            RepairPhase::StripLeadingFence => strip_leading_fence(text),
            RepairPhase::ExtractFencedBlock => extract_fenced_block(text),
            RepairPhase::RemoveNewlines => remove_newlines(text),
            RepairPhase::TrimWhitespace => text.trim().to_string(),
            RepairPhase::ModelAssisted => text.to_string(),
        }
    }
}

/// 尝试解析，返回解析器错误信息
pub fn check_json(text: &str) -> Result<(), serde_json::Error> {
    serde_json::from_str::<serde_json::Value>(text).map(|_| ())
}

fn strip_leading_fence(text: &str) -> String {
    let rest = if let Some(rest) = text.strip_prefix(JSON_FENCE) {
        rest
    } else if let Some(rest) = text.strip_prefix(FENCE) {
        rest
    } else {
        return text.to_string();
    };
    rest.strip_suffix(FENCE).unwrap_or(rest).to_string()
}

fn extract_fenced_block(text: &str) -> String {
    let start = if let Some(pos) = text.find(JSON_FENCE) {
        pos + JSON_FENCE.len()
    } else if let Some(pos) = text.find(FENCE) {
        pos + FENCE.len()
    } else {
        return text.to_string();
    };
    let inner = &text[start..];
    match inner.find(FENCE) {
        Some(end) => inner[..end].to_string(),
        None => inner.to_string(),
    }
}

fn remove_newlines(text: &str) -> String {
    text.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_is_fixed() {
        assert_eq!(RepairPhase::ORDER[0], RepairPhase::StripLeadingFence);
        assert_eq!(RepairPhase::ORDER[4], RepairPhase::ModelAssisted);
        assert!(RepairPhase::ORDER[..4].iter().all(|p| p.is_syntactic()));
    }

    #[test]
    fn test_strip_leading_fence() {
        assert_eq!(strip_leading_fence("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_leading_fence("```{\"a\":1}```"), "{\"a\":1}");
        // 没有开头标记时不动
        assert_eq!(strip_leading_fence("x```json{}```"), "x```json{}```");
        // 只有开头标记
        assert_eq!(strip_leading_fence("```json{}"), "{}");
    }

    #[test]
    fn test_extract_fenced_block() {
        let text = "Here you go:\n```json\n{\"text\":\"hi\"}\n```\nHope it helps";
        assert_eq!(extract_fenced_block(text), "\n{\"text\":\"hi\"}\n");
        assert_eq!(extract_fenced_block("no fences"), "no fences");
        assert_eq!(extract_fenced_block("a ```[1]``` b"), "[1]");
    }

    #[test]
    fn test_remove_newlines() {
        assert_eq!(remove_newlines("{\n\"a\":\r\n1}"), "{\"a\":1}");
    }

    #[test]
    fn test_model_assisted_is_identity_here() {
        assert_eq!(RepairPhase::ModelAssisted.apply_syntactic("{oops"), "{oops");
    }

    #[test]
    fn test_check_json() {
        assert!(check_json("{\"a\": [1, 2]}").is_ok());
        assert!(check_json("{a: 1}").is_err());
    }
}
