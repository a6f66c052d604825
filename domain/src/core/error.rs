//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}
