//! BookSpec - 用户生成参数
//!
//! 归一化规则（顺序固定）:
//! 1. 删除假值字段（null / false / "" / 0）
//! 2. 以整数开头的字段转为整数（前导整数为 0 的保持原样；标题、个性、指令等自由文本除外）
//! 3. 字符串字段做反向转义
//!
//! 归一化后不可变，由生成任务持有。

use serde_json::{Map, Number, Value};

use super::BookError;

/// 生成指令字段（从参数中剥离，不进入摘要）
pub const DIRECTIVE_KEY: &str = "review-prompt";
/// 个性提示字段
pub const PERSONALITY_KEY: &str = "personality";
pub const TITLE_KEY: &str = "title";
/// 每章段落数（数组，按章节顺序）
pub const IDEAS_BY_CHAPTER_KEY: &str = "chaptersIdeaCountByChapter";
/// 每章段落数（标量，数组缺失时使用）
pub const IDEAS_PER_CHAPTER_KEY: &str = "ideasPerChapter";

/// 不做整数转换的自由文本字段
const FREE_TEXT_KEYS: [&str; 3] = [TITLE_KEY, PERSONALITY_KEY, DIRECTIVE_KEY];

/// 归一化后的书籍参数
#[derive(Debug, Clone, PartialEq)]
pub struct BookSpec {
    fields: Map<String, Value>,
}

/// 归一化结果
#[derive(Debug, Clone)]
pub struct NormalizedParameters {
    pub spec: BookSpec,
    /// 章节列表生成指令
    pub directive: Option<String>,
}

impl BookSpec {
    /// 归一化原始参数并剥离生成指令
    pub fn normalize<F>(
        raw: Map<String, Value>,
        unsanitize: F,
    ) -> Result<NormalizedParameters, BookError>
    where
        F: Fn(&str) -> String,
    {
        let mut fields: Map<String, Value> = raw
            .into_iter()
            .filter(|(_, value)| !is_falsy(value))
            .map(|(key, value)| {
                if FREE_TEXT_KEYS.contains(&key.as_str()) {
                    (key, value)
                } else {
                    (key, coerce_integer(value))
                }
            })
            .map(|(key, value)| match value {
                Value::String(s) => (key, Value::String(unsanitize(&s))),
                other => (key, other),
            })
            .collect();

        let directive = match fields.remove(DIRECTIVE_KEY) {
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
            None => None,
        };

        let spec = BookSpec { fields };
        if spec.title().is_none() {
            return Err(BookError::MissingTitle);
        }

        Ok(NormalizedParameters { spec, directive })
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get(TITLE_KEY).and_then(Value::as_str)
    }

    pub fn personality(&self) -> Option<&str> {
        self.fields.get(PERSONALITY_KEY).and_then(Value::as_str)
    }

    /// 指定章节需要的段落构思数
    pub fn paragraph_count(&self, chapter_index: usize) -> Option<u32> {
        self.fields
            .get(IDEAS_BY_CHAPTER_KEY)
            .and_then(Value::as_array)
            .and_then(|counts| counts.get(chapter_index))
            .and_then(value_as_count)
            .or_else(|| self.fields.get(IDEAS_PER_CHAPTER_KEY).and_then(value_as_count))
    }

    /// 序列化为文档摘要（JSON）
    pub fn to_abstract(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f == 0.0).unwrap_or(false),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// 宽松整数解析，结果为 0 或无法解析时保持原值
fn coerce_integer(value: Value) -> Value {
    let parsed = match &value {
        Value::String(s) => parse_leading_int(s),
        Value::Number(n) if !n.is_i64() && !n.is_u64() => n.as_f64().map(|f| f.trunc() as i64),
        _ => None,
    };
    match parsed {
        Some(n) if n != 0 => Value::Number(Number::from(n)),
        _ => value,
    }
}

/// 解析字符串开头的整数（允许前导空白和符号）
fn parse_leading_int(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(|n| sign * n)
}

fn value_as_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => parse_leading_int(s).and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
}
