//! Book Commands - 模板生成 / 成书生成

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::application::error::ApplicationError;
use crate::domain::book::{DocumentId, SpaceId, PERSONALITY_KEY};

/// 模板文档 id 字段
pub const DOCUMENT_ID_KEY: &str = "documentId";

/// 生成书籍模板命令
#[derive(Debug, Clone)]
pub struct GenerateTemplate {
    pub job_id: Uuid,
    pub space_id: SpaceId,
    /// 原始用户参数（未归一化）
    pub parameters: Map<String, Value>,
}

impl GenerateTemplate {
    pub fn new(space_id: SpaceId, parameters: Map<String, Value>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            space_id,
            parameters,
        }
    }
}

/// 按模板生成成书命令
#[derive(Debug, Clone)]
pub struct GenerateBook {
    pub job_id: Uuid,
    pub space_id: SpaceId,
    pub template_id: DocumentId,
    pub personality: Option<String>,
}

impl GenerateBook {
    pub fn new(space_id: SpaceId, template_id: DocumentId, personality: Option<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            space_id,
            template_id,
            personality,
        }
    }

    /// 从任务参数中读取 `documentId` 与 `personality`
    pub fn from_parameters(
        space_id: SpaceId,
        parameters: &Map<String, Value>,
    ) -> Result<Self, ApplicationError> {
        let template_id = parameters
            .get(DOCUMENT_ID_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApplicationError::validation("documentId is required"))?;
        let personality = parameters
            .get(PERSONALITY_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self::new(space_id, DocumentId::new(template_id), personality))
    }
}
