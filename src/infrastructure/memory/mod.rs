//! Memory Layer - In-Memory State Management
//!
//! 内存文档存储，用于 `store.backend = "memory"` 和测试

mod document_store;

pub use document_store::InMemoryDocumentStore;
