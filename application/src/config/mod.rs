//! Application-level configuration.
//!
//! - [`SessionParams`]: per-turn limits, fallback texts and prompt template

pub mod session_params;

pub use session_params::{FallbackMessages, SessionParams};
