//! Book Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("书籍参数缺少标题")]
    MissingTitle,

    #[error("无效的书籍参数: {0}")]
    InvalidParameters(String),
}
