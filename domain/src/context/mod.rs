//! Context window accounting.
//!
//! The engine does not expose its real token counts, so usage is estimated
//! from character counts. See [`token_estimate::TokenEstimate`].

pub mod token_estimate;
