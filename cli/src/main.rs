//! CLI entrypoint for pocket-chat
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use pocket_application::{
    EngineError, InferenceEngine, NoProgress, SessionController, TurnProgressNotifier,
    TurnRequest,
};
use pocket_infrastructure::{ConfigLoader, FileConfig, JsonlConversationLogger, ProcessEngine};
use pocket_presentation::{
    ChatRepl, Cli, ConsoleFormatter, OutputFormat, ReplConfig, SimpleProgress,
    TurnProgressReporter,
};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&cli)?;

    info!("Starting pocket-chat");

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    // === Configuration ===
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    apply_cli_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    let params = config.session.to_session_params();
    params.validate().context("Invalid session parameters")?;

    // === Dependency Injection ===
    // The controller stays usable even when the engine cannot start; it
    // then answers every turn with the "unavailable" text.
    let engine = ProcessEngine::new(
        &config.engine.command,
        config.engine.args.clone(),
        config.engine.to_engine_config(),
    )
    .map(|engine| Arc::new(engine) as Arc<dyn InferenceEngine>)
    .map_err(EngineError::from);

    let mut controller = SessionController::from_engine(engine, params);

    let conversation_log = cli
        .conversation_log
        .clone()
        .or_else(|| config.log.conversation_log_path());
    if let Some(path) = conversation_log {
        match JsonlConversationLogger::new(&path) {
            Ok(logger) => {
                info!("Conversation transcript: {}", path.display());
                controller = controller.with_conversation_logger(Arc::new(logger));
            }
            Err(e) => warn!(
                "Continuing without a conversation transcript ({}): {}",
                path.display(),
                e
            ),
        }
    }

    // Chat mode
    if cli.chat {
        let repl_config = ReplConfig {
            show_progress: config.repl.show_progress && !cli.quiet,
            history_file: config.repl.history_path(),
        };
        let mut repl = ChatRepl::new(controller).with_config(repl_config);
        repl.run().await?;
        return Ok(());
    }

    // Single question mode - question is required
    let question = match cli.question {
        Some(q) => q,
        None => bail!("Question is required. Use --chat for interactive mode."),
    };

    // A spinner is useless when stderr is captured; print plain lines instead
    let progress: Box<dyn TurnProgressNotifier> = if cli.quiet {
        Box::new(NoProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(TurnProgressReporter::new())
    } else {
        Box::new(SimpleProgress)
    };

    let Some(turn) = controller
        .submit(TurnRequest::new(&question), progress.as_ref())
        .await
    else {
        bail!("Question is empty.");
    };

    let output = match cli.output {
        OutputFormat::Text => ConsoleFormatter::format_answer(&turn),
        OutputFormat::Full => ConsoleFormatter::format_full(&turn),
        OutputFormat::Json => ConsoleFormatter::format_json(&turn),
    };
    println!("{}", output);

    Ok(())
}

/// Install the tracing subscriber. Verbosity picks the level unless
/// `RUST_LOG` is set; `--log-file` redirects diagnostics away from stderr.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let Some(path) = &cli.log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

/// CLI flags take precedence over every configuration source.
fn apply_cli_overrides(config: &mut FileConfig, cli: &Cli) {
    if let Some(command) = &cli.engine_command {
        config.engine.command = command.clone();
    }
    if !cli.engine_args.is_empty() {
        config.engine.args = cli.engine_args.clone();
    }
    if let Some(model) = &cli.model {
        config.engine.model_path = Some(model.display().to_string());
    }
    if let Some(timeout) = cli.timeout {
        config.session.timeout_seconds = timeout;
    }
    if let Some(max_chars) = cli.max_chars {
        config.session.max_response_chars = max_chars;
    }
    if let Some(turns) = cli.history_turns {
        config.session.history_turns = turns;
    }
}
