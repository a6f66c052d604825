//! Conversation log: the caller's record of finished turns.

use super::turn::Turn;
use crate::context::token_estimate::TokenEstimate;
use serde::{Deserialize, Serialize};

/// Append-only, insertion-ordered sequence of turns.
///
/// Owned by the UI layer, never by the session controller. Entries cannot be
/// modified once appended; the only bulk operation is [`clear`](Self::clear),
/// used when the user resets the whole conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The most recent `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Rough token footprint of every logged turn, template overhead included.
    pub fn estimated_tokens(&self) -> usize {
        self.turns
            .iter()
            .map(|t| TokenEstimate::for_turn(t.question(), t.answer()))
            .sum()
    }
}

impl<'a> IntoIterator for &'a ConversationLog {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
