//! Console output formatter for chat turns

use colored::Colorize;
use pocket_domain::{CacheStatus, ConversationLog, SessionState, Turn, TurnOutcome};

/// Formats turns and session status for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Answer text, with a short note when the turn was cut off.
    pub fn format_answer(turn: &Turn) -> String {
        match Self::outcome_note(turn.outcome()) {
            Some(note) if turn.outcome().is_cut_short() => {
                format!("{}\n{}", turn.answer(), note.dimmed())
            }
            _ => turn.answer().to_string(),
        }
    }

    /// Question, answer, and how the turn ended.
    pub fn format_full(turn: &Turn) -> String {
        let mut output = String::new();
        output.push_str(&format!("{} {}\n\n", "Q:".bold(), turn.question()));
        output.push_str(turn.answer());
        output.push_str("\n\n");
        output.push_str(&format!(
            "{} {}  {}\n",
            "Ended:".dimmed(),
            Self::colored_outcome(turn.outcome()),
            turn.started_at()
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
                .dimmed()
        ));
        output
    }

    /// Format as JSON
    pub fn format_json(turn: &Turn) -> String {
        serde_json::to_string_pretty(turn).unwrap_or_else(|_| "{}".to_string())
    }

    /// Numbered transcript of the caller's log.
    pub fn format_history(log: &ConversationLog) -> String {
        if log.is_empty() {
            return format!("{}\n", "No turns yet.".dimmed());
        }

        let mut output = String::new();
        output.push_str(&Self::section_header("History"));
        for (i, turn) in log.into_iter().enumerate() {
            output.push_str(&format!(
                "\n{} {}\n{} {}\n",
                format!("[{}] Q:", i + 1).cyan().bold(),
                turn.question(),
                "    A:".green().bold(),
                turn.answer()
            ));
            if !turn.outcome().is_natural() {
                output.push_str(&format!(
                    "    {}\n",
                    format!("({})", turn.outcome()).dimmed()
                ));
            }
        }
        output
    }

    /// Controller state, context estimate and log size.
    pub fn format_status(
        state: &SessionState,
        cache: &CacheStatus,
        logged_turns: usize,
        engine_available: bool,
    ) -> String {
        let mut output = String::new();
        output.push_str(&Self::section_header("Status"));

        let engine = if engine_available {
            "ready".green()
        } else {
            "unavailable".red()
        };
        output.push_str(&format!("{} {}\n", "Engine:".bold(), engine));
        output.push_str(&format!("{} {}\n", "Phase:".bold(), state.phase()));
        if let Some(outcome) = state.last_outcome() {
            output.push_str(&format!(
                "{} {}\n",
                "Last turn:".bold(),
                Self::colored_outcome(outcome)
            ));
        }
        output.push_str(&format!("{} {}\n", "Logged turns:".bold(), logged_turns));

        let cache_line = cache.to_string();
        let cache_line = if cache.is_over_budget() {
            cache_line.yellow()
        } else {
            cache_line.normal()
        };
        output.push_str(&format!(
            "{} {} ({:.0}%)\n",
            "Cache:".bold(),
            cache_line,
            cache.usage_ratio() * 100.0
        ));
        output
    }

    fn outcome_note(outcome: TurnOutcome) -> Option<&'static str> {
        match outcome {
            TurnOutcome::LengthCapped => Some("[stopped: length limit reached]"),
            TurnOutcome::TimedOut => Some("[stopped: time limit reached]"),
            TurnOutcome::Superseded => Some("[stopped]"),
            _ => None,
        }
    }

    fn colored_outcome(outcome: TurnOutcome) -> colored::ColoredString {
        let text = outcome.as_str();
        match outcome {
            TurnOutcome::MarkerTerminated => text.green(),
            TurnOutcome::LengthCapped | TurnOutcome::TimedOut | TurnOutcome::Superseded => {
                text.yellow()
            }
            TurnOutcome::EngineError | TurnOutcome::EmptyFallback | TurnOutcome::Unavailable => {
                text.red()
            }
        }
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }
}
