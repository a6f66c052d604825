//! REPL (Read-Eval-Print Loop) for interactive chat

use crate::ConsoleFormatter;
use crate::ReplConfig;
use crate::progress::reporter::TurnProgressReporter;
use colored::Colorize;
use pocket_application::{NoProgress, SessionController, TurnProgressNotifier, TurnRequest};
use pocket_domain::{ConversationLog, Turn};
use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use std::io;
use tracing::{debug, warn};

const HISTORY_CAPACITY: usize = 1000;

/// What the REPL should do after a slash command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    Exit,
}

/// Interactive chat REPL
///
/// Owns the conversation log; the controller only sees it when
/// `history_turns` asks for context.
pub struct ChatRepl {
    controller: SessionController,
    log: ConversationLog,
    config: ReplConfig,
}

impl ChatRepl {
    /// Create a new ChatRepl
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            log: ConversationLog::new(),
            config: ReplConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReplConfig) -> Self {
        self.config = config;
        self
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Run the interactive REPL
    pub async fn run(&mut self) -> io::Result<()> {
        let mut editor = self.line_editor();
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(">>".to_string()),
            DefaultPromptSegment::Empty,
        );

        self.print_welcome();

        loop {
            match editor.read_line(&prompt)? {
                Signal::Success(line) => {
                    let line = line.trim();

                    // Skip empty lines
                    if line.is_empty() {
                        continue;
                    }

                    // Handle commands
                    if line.starts_with('/') {
                        if self.handle_command(line).await == CommandResult::Exit {
                            break;
                        }
                        continue;
                    }

                    self.process_question(line).await;
                }
                Signal::CtrlC => {
                    println!("^C");
                    continue;
                }
                Signal::CtrlD => {
                    println!("Bye!");
                    break;
                }
                #[allow(unreachable_patterns)]
                other => debug!("Ignoring editor signal: {:?}", other),
            }
        }

        Ok(())
    }

    fn line_editor(&self) -> Reedline {
        let editor = Reedline::create();
        let Some(path) = self.config.history_path() else {
            return editor;
        };
        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Could not create history directory {}: {}", parent.display(), e);
            return editor;
        }
        match FileBackedHistory::with_file(HISTORY_CAPACITY, path) {
            Ok(history) => editor.with_history(Box::new(history)),
            Err(e) => {
                warn!("Line history disabled: {}", e);
                editor
            }
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("╭─────────────────────────────────────────────╮");
        println!("│            pocket-chat - Chat Mode          │");
        println!("╰─────────────────────────────────────────────╯");
        println!();
        let params = self.controller.params();
        println!(
            "Limits: {} chars, {}s per answer{}",
            params.max_response_chars,
            params.timeout.as_secs_f32(),
            if params.history_turns > 0 {
                format!(", {} turns of context", params.history_turns)
            } else {
                String::new()
            }
        );
        if !self.controller.is_available() {
            println!("{}", "The language model is not available.".red());
        }
        println!();
        Self::print_help();
    }

    fn print_help() {
        println!("Commands:");
        println!("  /help, /h, /?     - Show this help");
        println!("  /history          - Show this conversation");
        println!("  /status           - Show session and cache status");
        println!("  /stop             - Stop the current answer");
        println!("  /reset            - Reset the engine, keep the conversation");
        println!("  /clear            - Reset everything and clear the conversation");
        println!("  /quit, /exit, /q  - Exit chat");
        println!("Ctrl-C while an answer is generating stops it.");
        println!();
    }

    /// Handle slash commands
    pub async fn handle_command(&mut self, cmd: &str) -> CommandResult {
        match cmd {
            "/quit" | "/exit" | "/q" => {
                println!("Bye!");
                return CommandResult::Exit;
            }
            "/help" | "/h" | "/?" => {
                println!();
                Self::print_help();
            }
            "/history" => {
                println!("{}", ConsoleFormatter::format_history(&self.log));
            }
            "/status" => {
                let status = self.controller.cache_status(&self.log);
                println!(
                    "{}",
                    ConsoleFormatter::format_status(
                        &self.controller.current_state(),
                        &status,
                        self.log.len(),
                        self.controller.is_available(),
                    )
                );
            }
            "/stop" => {
                // Turns run to completion before the prompt returns.
                self.controller.stop();
                println!("{}", "Nothing is generating.".dimmed());
            }
            "/reset" => {
                self.controller.full_reset().await;
                println!("{}", "Engine reset. Conversation kept.".green());
            }
            "/clear" => {
                self.controller.full_reset().await;
                self.log.clear();
                println!("{}", "Session reset and conversation cleared.".green());
            }
            _ => {
                println!("Unknown command: {}", cmd);
                println!("Type /help for available commands");
            }
        }
        CommandResult::Continue
    }

    async fn process_question(&mut self, question: &str) {
        println!();

        let turn = if self.config.show_progress {
            self.submit_interruptible(question, &TurnProgressReporter::new())
                .await
        } else {
            self.submit_interruptible(question, &NoProgress).await
        };

        if let Some(turn) = turn {
            println!("{}", ConsoleFormatter::format_answer(&turn));
            self.log.append(turn);
        }
        println!();
    }

    /// Submit one turn; Ctrl-C during generation stops it.
    async fn submit_interruptible(
        &self,
        question: &str,
        progress: &dyn TurnProgressNotifier,
    ) -> Option<Turn> {
        let request = TurnRequest::new(question).with_history(&self.log);
        let submit = self.controller.submit(request, progress);
        tokio::pin!(submit);

        tokio::select! {
            turn = &mut submit => turn,
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => {
                        debug!("Ctrl-C during generation");
                        self.controller.stop();
                    }
                    Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
                }
                submit.await
            }
        }
    }
}
