//! HTTP LLM Client - 调用外部文本生成服务
//!
//! 实现 TextGeneratorPort trait，兼容 Ollama 风格的生成接口
//!
//! 外部 API:
//! POST http://localhost:11434/api/generate
//! Request: {"model": "...", "prompt": "...", "system": "...", "stream": false}  (JSON)
//! Response: {"response": "...", ...}  (JSON)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{GeneratedText, LlmError, TextGeneratorPort};
use crate::domain::book::SpaceId;

/// 生成请求体
#[derive(Debug, Serialize)]
struct GenerateHttpRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
}

/// 生成响应体（只取用到的字段）
#[derive(Debug, Deserialize)]
struct GenerateHttpResponse {
    response: String,
}

/// HTTP LLM 客户端配置
#[derive(Debug, Clone)]
pub struct HttpLlmClientConfig {
    /// 生成服务基础 URL
    pub base_url: String,
    /// 模型名
    pub model: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpLlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 300,
        }
    }
}

impl HttpLlmClientConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP LLM 客户端
pub struct HttpLlmClient {
    client: Client,
    config: HttpLlmClientConfig,
}

impl HttpLlmClient {
    pub fn new(config: HttpLlmClientConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }

    fn health_url(&self) -> String {
        format!("{}/api/tags", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TextGeneratorPort for HttpLlmClient {
    async fn generate_text(
        &self,
        space_id: &SpaceId,
        prompt: &str,
        personality: Option<&str>,
    ) -> Result<GeneratedText, LlmError> {
        let request = GenerateHttpRequest {
            model: &self.config.model,
            prompt,
            system: personality,
            stream: false,
        };

        tracing::debug!(
            url = %self.generate_url(),
            space_id = %space_id,
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Sending generate request"
        );

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else if e.is_connect() {
                    LlmError::NetworkError(format!("Cannot connect to LLM service: {}", e))
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: GenerateHttpResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to decode response: {}", e)))?;

        tracing::debug!(
            space_id = %space_id,
            response_len = body.response.len(),
            "Generate request completed"
        );

        Ok(GeneratedText::new(body.response))
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HttpLlmClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn test_config_builder() {
        let config =
            HttpLlmClientConfig::new("http://example.com:8080/", "mistral").with_timeout(60);
        assert_eq!(config.model, "mistral");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let client =
            HttpLlmClient::new(HttpLlmClientConfig::new("http://example.com:8080/", "m")).unwrap();
        assert_eq!(client.generate_url(), "http://example.com:8080/api/generate");
        assert_eq!(client.health_url(), "http://example.com:8080/api/tags");
    }

    #[tokio::test]
    async fn test_health_check_fails_when_backend_unreachable() {
        // 绑定后立即释放，得到一个无人监听的端口
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = format!("http://127.0.0.1:{}", port);
        let client = HttpLlmClient::new(HttpLlmClientConfig::new(&url, "m")).unwrap();

        assert!(!client.health_check().await);
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateHttpRequest {
            model: "m",
            prompt: "p",
            system: None,
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, serde_json::json!({"model": "m", "prompt": "p", "stream": false}));
    }
}
