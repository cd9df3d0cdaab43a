//! Domain Layer - 领域层
//!
//! - Book Context: 书籍参数、文档结构
//! - JSON 修复阶段（纯函数部分）

pub mod book;

mod json_repair;

pub use json_repair::{check_json, RepairPhase};
