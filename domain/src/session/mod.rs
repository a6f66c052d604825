//! Chat session domain.
//!
//! - [`turn::Turn`]: one finalized question/answer exchange
//! - [`turn::TurnOutcome`]: which path finalized a turn
//! - [`state::SessionState`]: observable per-turn controller state
//! - [`log::ConversationLog`]: caller-owned, append-only turn history
//! - [`stream::StreamEvent`]: one event from a streaming engine

pub mod log;
pub mod state;
pub mod stream;
pub mod turn;
