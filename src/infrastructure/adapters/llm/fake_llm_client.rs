//! Fake LLM Client - 用于测试的文本生成客户端
//!
//! 不调用任何服务，按 responder 闭包返回结果，并记录收到的提示词

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::application::ports::{GeneratedText, LlmError, TextGeneratorPort};
use crate::domain::book::SpaceId;

type Responder = dyn Fn(&str) -> Result<String, LlmError> + Send + Sync;

/// Fake LLM Client
pub struct FakeLlmClient {
    responder: Arc<Responder>,
    prompts: Mutex<Vec<String>>,
    personalities: Mutex<Vec<Option<String>>>,
    /// 模拟生成延迟
    latency: Option<Duration>,
}

impl FakeLlmClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            prompts: Mutex::new(Vec::new()),
            personalities: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// 始终返回同一段文本
    pub fn fixed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_| Ok(message.clone()))
    }

    /// 按提示词中要求的输出格式返回合法 JSON
    ///
    /// 章节列表返回一章；段落构思按提示词中的 "exactly N" 返回 N 条（默认 2）；
    /// 其余返回 `{text}`
    pub fn canned() -> Self {
        Self::new(|prompt| {
            let message = if prompt.contains("\"chapters\":") {
                r#"{"chapters":[{"title":"Chapter One","idea":"The beginning"}]}"#.to_string()
            } else if prompt.contains("\"paragraphs\":") {
                let count = requested_count(prompt).unwrap_or(2);
                let ideas: Vec<_> = (1..=count)
                    .map(|i| serde_json::json!({ "idea": format!("Idea {}", i) }))
                    .collect();
                serde_json::json!({ "paragraphs": ideas }).to_string()
            } else {
                r#"{"text":"Generated paragraph text."}"#.to_string()
            };
            Ok(message)
        })
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 已收到的提示词（按调用顺序）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 每次调用收到的个性提示（与 prompts 一一对应）
    pub fn personalities(&self) -> Vec<Option<String>> {
        self.personalities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// 解析 "Generate **exactly** N paragraphs"
fn requested_count(prompt: &str) -> Option<usize> {
    let rest = prompt.split("**exactly** ").nth(1)?;
    rest.split_whitespace().next()?.parse().ok()
}

#[async_trait]
impl TextGeneratorPort for FakeLlmClient {
    async fn generate_text(
        &self,
        space_id: &SpaceId,
        prompt: &str,
        personality: Option<&str>,
    ) -> Result<GeneratedText, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        self.personalities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(personality.map(str::to_string));

        tracing::debug!(space_id = %space_id, prompt_len = prompt.len(), "FakeLlmClient: responding");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        (self.responder)(prompt).map(GeneratedText::new)
    }
}
