//! SQLite Persistence - SQLite 数据库持久化实现

mod database;
mod document_repo;

pub use database::*;
pub use document_repo::*;
