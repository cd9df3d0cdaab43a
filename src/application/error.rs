//! 应用层错误定义
//!
//! 统一的任务/命令错误类型

use thiserror::Error;

use crate::application::ports::{LlmError, RepositoryError};
use crate::application::services::RepairError;
use crate::domain::book::BookError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 文档骨架创建失败（整个任务终止）
    #[error("Skeleton creation failed: {0}")]
    SkeletonCreation(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 结构化文本修复失败
    #[error(transparent)]
    Repair(#[from] RepairError),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建骨架创建错误
    pub fn skeleton(message: impl Into<String>) -> Self {
        Self::SkeletonCreation(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    /// 是否为修复预算耗尽
    pub fn is_repair_exhausted(&self) -> bool {
        matches!(self, Self::Repair(RepairError::Exhausted { .. }))
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::not_found("Entity", id),
            other => Self::RepositoryError(other.to_string()),
        }
    }
}

impl From<LlmError> for ApplicationError {
    fn from(err: LlmError) -> Self {
        Self::ExternalServiceError(err.to_string())
    }
}

impl From<BookError> for ApplicationError {
    fn from(err: BookError) -> Self {
        Self::ValidationError(err.to_string())
    }
}
