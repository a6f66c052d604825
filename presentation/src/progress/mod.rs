//! Turn progress reporting

pub mod reporter;
