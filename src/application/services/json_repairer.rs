//! JSON Repairer - 结构化文本修复
//!
//! 在固定阶段顺序上循环，直到文本能解析为 JSON 或迭代预算耗尽：
//! 语法阶段见 `domain::RepairPhase`，模型辅助阶段在这里调用生成服务。
//! 每个阶段之后都尝试解析，成功立即返回。

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::application::context::JobContext;
use crate::application::ports::{LlmError, TextGeneratorPort};
use crate::application::services::prompts;
use crate::domain::{check_json, RepairPhase};

/// 修复错误
#[derive(Debug, Error)]
pub enum RepairError {
    /// 迭代预算耗尽
    #[error("JSON repair exhausted after {iterations} iterations: {last_error}")]
    Exhausted { iterations: u32, last_error: String },

    /// 模型辅助阶段调用生成服务失败
    #[error("JSON repair backend failure: {0}")]
    Backend(#[from] LlmError),

    /// 合法 JSON 但结构不符合预期
    #[error("Unexpected JSON shape: {0}")]
    Shape(String),
}

/// `{text}` 段落正文
#[derive(Debug, Clone, Deserialize)]
pub struct ParagraphText {
    pub text: String,
}

/// 单次修复的参数
#[derive(Debug, Clone, Default)]
pub struct RepairOptions {
    pub max_iterations: u32,
    pub schema: Option<String>,
    pub example: Option<String>,
}

impl RepairOptions {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// 只有同时提供 schema 时才会出现在提示词中
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

/// JSON 修复器
pub struct JsonRepairer {
    generator: Arc<dyn TextGeneratorPort>,
}

impl JsonRepairer {
    pub fn new(generator: Arc<dyn TextGeneratorPort>) -> Self {
        Self { generator }
    }

    /// 返回可解析的 JSON 文本
    pub async fn ensure_valid_json(
        &self,
        ctx: &JobContext,
        input: &str,
        options: &RepairOptions,
    ) -> Result<String, RepairError> {
        let mut text = input.to_string();
        let mut last_error = match check_json(&text) {
            Ok(()) => return Ok(text),
            Err(e) => e.to_string(),
        };

        for iteration in 1..=options.max_iterations {
            for phase in RepairPhase::ORDER {
                text = if phase.is_syntactic() {
                    phase.apply_syntactic(&text)
                } else {
                    let prompt = prompts::json_correction_prompt(
                        &text,
                        &last_error,
                        options.schema.as_deref(),
                        options.example.as_deref(),
                    );
                    self.generator
                        .generate_text(ctx.space_id(), &prompt, ctx.personality())
                        .await?
                        .message
                };

                match check_json(&text) {
                    Ok(()) => {
                        tracing::debug!(
                            job_id = %ctx.job_id(),
                            iteration,
                            phase = phase.as_str(),
                            "JSON repaired"
                        );
                        return Ok(text);
                    }
                    Err(e) => last_error = e.to_string(),
                }
            }

            tracing::debug!(
                job_id = %ctx.job_id(),
                iteration,
                max_iterations = options.max_iterations,
                error = %last_error,
                "JSON repair iteration failed"
            );
        }

        Err(RepairError::Exhausted {
            iterations: options.max_iterations,
            last_error,
        })
    }

    /// 修复后解码为指定类型
    pub async fn repair_into<T: DeserializeOwned>(
        &self,
        ctx: &JobContext,
        input: &str,
        options: &RepairOptions,
    ) -> Result<T, RepairError> {
        let json = self.ensure_valid_json(ctx, input, options).await?;
        serde_json::from_str(&json).map_err(|e| RepairError::Shape(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::prompts::PARAGRAPH_TEXT_SCHEMA;
    use crate::application::services::test_support::test_context;
    use crate::infrastructure::adapters::FakeLlmClient;

    fn repairer(client: &Arc<FakeLlmClient>) -> JsonRepairer {
        JsonRepairer::new(client.clone())
    }

    #[tokio::test]
    async fn test_valid_input_is_returned_unchanged() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::fixed("unused"));
        let input = r#"  {"text": "hello"}  "#;

        let output = repairer(&client)
            .ensure_valid_json(&ctx, input, &RepairOptions::new(1))
            .await
            .unwrap();

        assert_eq!(output, input);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fenced_input_converges_without_backend() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::fixed("unused"));
        let input = "  ```json\n{\n  \"text\": \"hello\"\n}\n```\n  ";

        let output = repairer(&client)
            .ensure_valid_json(&ctx, input, &RepairOptions::new(1))
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["text"], "hello");
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_after_budget() {
        let (ctx, _) = test_context();
        // 后端原样回显同样的坏文本
        let client = Arc::new(FakeLlmClient::fixed("{not json"));

        let err = repairer(&client)
            .ensure_valid_json(&ctx, "{not json", &RepairOptions::new(3))
            .await
            .unwrap_err();

        match err {
            RepairError::Exhausted { iterations, last_error } => {
                assert_eq!(iterations, 3);
                assert!(!last_error.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_model_phase_fixes_text() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::fixed(r#"{"text":"fixed"}"#));

        let output = repairer(&client)
            .ensure_valid_json(&ctx, "text: fixed", &RepairOptions::new(2))
            .await
            .unwrap();

        assert_eq!(output, r#"{"text":"fixed"}"#);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_is_not_exhaustion() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::new(|_| Err(LlmError::Timeout)));

        let err = repairer(&client)
            .ensure_valid_json(&ctx, "{broken", &RepairOptions::new(5))
            .await
            .unwrap_err();

        assert!(matches!(err, RepairError::Backend(LlmError::Timeout)));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_schema_and_example_reach_the_prompt() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::fixed(r#"{"text":"ok"}"#));
        let options = RepairOptions::new(1)
            .with_schema(PARAGRAPH_TEXT_SCHEMA)
            .with_example(r#"{"text":"sample"}"#);

        repairer(&client)
            .ensure_valid_json(&ctx, "{broken", &options)
            .await
            .unwrap();

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("{broken"));
        assert!(prompts[0].contains("JSON Schema Template"));
        assert!(prompts[0].contains(r#"{"text":"sample"}"#));
    }

    #[tokio::test]
    async fn test_model_phase_uses_job_personality() {
        let (ctx, events) = test_context();
        let ctx = JobContext::new(
            ctx.space_id().clone(),
            Some("Calm narrator".to_string()),
            events,
        );
        let client = Arc::new(FakeLlmClient::fixed(r#"{"text":"ok"}"#));

        repairer(&client)
            .ensure_valid_json(&ctx, "{broken", &RepairOptions::new(1))
            .await
            .unwrap();

        assert_eq!(client.personalities(), vec![Some("Calm narrator".to_string())]);
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_reported() {
        let (ctx, _) = test_context();
        let client = Arc::new(FakeLlmClient::fixed("unused"));

        let err = repairer(&client)
            .repair_into::<ParagraphText>(&ctx, r#"{"other": 1}"#, &RepairOptions::new(1))
            .await
            .unwrap_err();

        assert!(matches!(err, RepairError::Shape(_)));
    }
}
