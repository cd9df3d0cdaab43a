//! Command Handlers 实现

mod book_handlers;
mod template_handlers;

pub use book_handlers::*;
pub use template_handlers::*;
