//! Turning raw engine output into the user-facing answer.

use crate::config::FallbackMessages;
use pocket_domain::TurnOutcome;

/// Remove every marker occurrence and surrounding whitespace.
pub(crate) fn strip_marker(raw: &str, marker: &str) -> String {
    if marker.is_empty() {
        return raw.trim().to_string();
    }
    raw.replace(marker, "").trim().to_string()
}

/// Length in bytes of the longest suffix of `text` that could still grow
/// into `marker`.
pub(crate) fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .filter(|&k| marker.is_char_boundary(k))
        .find(|&k| text.ends_with(&marker[..k]))
        .unwrap_or(0)
}

/// Final text for a turn given its outcome and marker-stripped output.
pub(crate) fn answer_text(
    cleaned: String,
    outcome: TurnOutcome,
    fallbacks: &FallbackMessages,
) -> String {
    match outcome {
        TurnOutcome::EngineError => fallbacks.engine_error.clone(),
        TurnOutcome::Unavailable => fallbacks.unavailable.clone(),
        TurnOutcome::TimedOut if cleaned.is_empty() => fallbacks.timeout.clone(),
        _ if cleaned.is_empty() => fallbacks.empty.clone(),
        _ => cleaned,
    }
}
