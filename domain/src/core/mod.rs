//! Core domain concepts shared across all subdomains.
//!
//! - [`question::Question`]: a validated, non-empty question for one turn
//! - [`error::DomainError`]: domain-level errors
//! - [`string`]: UTF-8 safe truncation helpers

pub mod error;
pub mod question;
pub mod string;
