//! Interactive chat module
//!
//! Provides a line-editor chat interface over a session controller.

mod repl;

pub use repl::{ChatRepl, CommandResult};
