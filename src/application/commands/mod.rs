//! 应用层 - 命令
//!
//! 两个生成任务的入口命令

mod book_commands;

pub mod handlers;

pub use book_commands::*;
