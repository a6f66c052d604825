//! Progress reporting while a turn is generating

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pocket_application::ports::progress::TurnProgressNotifier;
use pocket_domain::Turn;
use pocket_domain::core::string::{char_len, truncate};
use std::sync::Mutex;
use std::time::Duration;

/// Spinner with a running character count
pub struct TurnProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
    chars: Mutex<usize>,
}

impl TurnProgressReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            chars: Mutex::new(0),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for TurnProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnProgressNotifier for TurnProgressReporter {
    fn on_turn_start(&self, question: &str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(Self::spinner_style());
        pb.set_prefix("Generating");
        pb.set_message(truncate(question, 40).dimmed().to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut chars) = self.chars.lock() {
            *chars = 0;
        }
        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(pb);
        }
    }

    fn on_delta(&self, delta: &str) {
        let Ok(mut chars) = self.chars.lock() else {
            return;
        };
        *chars += char_len(delta);
        if let Ok(bar) = self.bar.lock()
            && let Some(pb) = bar.as_ref()
        {
            pb.set_message(format!("{} chars", *chars));
        }
    }

    fn on_turn_complete(&self, _turn: &Turn) {
        if let Ok(mut bar) = self.bar.lock()
            && let Some(pb) = bar.take()
        {
            pb.finish_and_clear();
        }
    }
}

/// Line-based progress for when stderr is not a terminal
pub struct SimpleProgress;

impl TurnProgressNotifier for SimpleProgress {
    fn on_turn_start(&self, _question: &str) {
        eprintln!("{} {}", "->".cyan(), "Generating".bold());
    }

    fn on_turn_complete(&self, turn: &Turn) {
        let mark = if turn.outcome().is_natural() {
            "v".green()
        } else {
            "x".yellow()
        };
        eprintln!(
            "  {} {} ({} chars)",
            mark,
            turn.outcome(),
            char_len(turn.answer())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pocket_domain::TurnOutcome;

    #[test]
    fn test_reporter_counts_characters_and_clears() {
        let reporter = TurnProgressReporter::new();
        reporter.on_turn_start("hello");
        reporter.on_delta("Hi");
        reporter.on_delta(" 그래요");
        assert_eq!(*reporter.chars.lock().unwrap(), 6);

        let turn = Turn::new("hello", "Hi 그래요", Utc::now(), TurnOutcome::MarkerTerminated);
        reporter.on_turn_complete(&turn);
        assert!(reporter.bar.lock().unwrap().is_none());

        // a new turn starts counting from zero
        reporter.on_turn_start("again");
        assert_eq!(*reporter.chars.lock().unwrap(), 0);
        reporter.on_turn_complete(&turn);
    }

    #[test]
    fn test_simple_progress_reports_every_outcome() {
        colored::control::set_override(false);
        let progress = SimpleProgress;
        progress.on_turn_start("hello");
        progress.on_delta("ignored");
        for outcome in [TurnOutcome::MarkerTerminated, TurnOutcome::TimedOut] {
            progress.on_turn_complete(&Turn::new("hello", "Hi", Utc::now(), outcome));
        }
    }
}
