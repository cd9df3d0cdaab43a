//! Text Generator Port - 文本生成服务抽象
//!
//! 定义大模型单次补全的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::book::SpaceId;

/// 生成服务错误（瞬时失败，由 RetryPolicy 处理）
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 生成结果
///
/// message 是任意自由文本，不保证是合法 JSON
#[derive(Debug, Clone)]
pub struct GeneratedText {
    pub message: String,
}

impl GeneratedText {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Text Generator Port
#[async_trait]
pub trait TextGeneratorPort: Send + Sync {
    /// 单次文本补全
    ///
    /// `personality` 为可选的人设提示，由后端决定如何使用
    async fn generate_text(
        &self,
        space_id: &SpaceId,
        prompt: &str,
        personality: Option<&str>,
    ) -> Result<GeneratedText, LlmError>;

    /// 检查生成服务是否可用
    async fn health_check(&self) -> bool {
        true
    }
}
