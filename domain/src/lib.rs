//! Domain layer for pocket-chat
//!
//! This crate contains the core entities and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Turn
//!
//! One question/answer exchange. A turn is finalized by exactly one
//! [`TurnOutcome`]: the termination marker, the length cap, the timeout,
//! an engine error, an empty stream, or a forced abort.
//!
//! ## Session state
//!
//! [`SessionState`] is the observable side of a session controller:
//! `Idle → Generating → Completed(outcome) → Idle`.
//!
//! ## Conversation log
//!
//! [`ConversationLog`] belongs to the caller. The controller never reads it
//! unless the caller explicitly passes it in for multi-turn context.

pub mod context;
pub mod core;
pub mod prompt;
pub mod session;

// Re-export commonly used types
pub use context::token_estimate::{CacheStatus, TokenEstimate};
pub use core::{error::DomainError, question::Question};
pub use prompt::ChatTemplate;
pub use session::{
    log::ConversationLog,
    state::{SessionPhase, SessionState},
    stream::StreamEvent,
    turn::{Turn, TurnOutcome},
};
