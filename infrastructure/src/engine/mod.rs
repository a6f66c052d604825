//! Inference engine adapters.
//!
//! [`ProcessEngine`] implements the
//! [`InferenceEngine`](pocket_application::InferenceEngine) port by running a
//! local inference command per turn.

mod process;

pub use process::{MODEL_PLACEHOLDER, PROMPT_PLACEHOLDER, ProcessEngine, ProcessEngineError};
