//! Prompt construction.
//!
//! - [`template::ChatTemplate`]: role prefixes and system prompt used to
//!   render a turn (optionally with prior turns) into an engine prompt

pub mod template;

pub use template::ChatTemplate;
