//! External-process inference engine.
//!
//! [`ProcessEngine`] runs a local inference command once per turn. The prompt
//! goes to the child's stdin (or into its arguments via `{prompt}`), and
//! every chunk the child writes to stdout becomes a [`StreamEvent::Delta`].
//!
//! ```toml
//! [engine]
//! command = "llama-cli"
//! args = ["-m", "{model}", "--no-display-prompt", "-p", "{prompt}"]
//! model_path = "~/models/gemma-2b-it.gguf"
//! ```
//!
//! A fresh process per turn starts with an empty KV cache, so `reset_cache`
//! only has to make sure no earlier child is still running.
//!
//! Engines such as `llama-cli` log heavily to stderr while loading. Stderr is
//! drained for the whole life of the child, keeping only a short tail for
//! the error message of a failed run.

use async_trait::async_trait;
use pocket_application::ports::inference_engine::{
    EngineConfig, EngineError, InferenceEngine, StreamHandle,
};
use pocket_domain::StreamEvent;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Argument placeholder replaced by the rendered prompt.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";
/// Argument placeholder replaced by the model path.
pub const MODEL_PLACEHOLDER: &str = "{model}";

const READ_BUF_SIZE: usize = 1024;
const STREAM_CAPACITY: usize = 64;
/// Bytes of stderr kept for error reporting.
const STDERR_TAIL_BYTES: usize = 4096;

/// Errors raised while setting up a [`ProcessEngine`].
#[derive(Error, Debug)]
pub enum ProcessEngineError {
    #[error("Engine command not found: {0}")]
    CommandNotFound(String),

    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Engine command is empty")]
    EmptyCommand,
}

impl From<ProcessEngineError> for EngineError {
    fn from(e: ProcessEngineError) -> Self {
        EngineError::Unavailable(e.to_string())
    }
}

/// Inference engine backed by a child process per generation.
pub struct ProcessEngine {
    program: PathBuf,
    args: Vec<String>,
    config: EngineConfig,
    /// Stop signal of the newest child, if any.
    running: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for ProcessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEngine")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("config", &self.config)
            .finish()
    }
}

impl ProcessEngine {
    /// Resolve `command` on `PATH` and check the configured model file.
    pub fn new(
        command: &str,
        args: Vec<String>,
        config: EngineConfig,
    ) -> Result<Self, ProcessEngineError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(ProcessEngineError::EmptyCommand);
        }
        let program = which::which(command)
            .map_err(|_| ProcessEngineError::CommandNotFound(command.to_string()))?;

        if let Some(model) = &config.model_path
            && !model.is_file()
        {
            return Err(ProcessEngineError::ModelNotFound(model.clone()));
        }

        info!("Inference engine: {}", program.display());
        Ok(Self {
            program,
            args,
            config,
            running: Mutex::new(None),
        })
    }

    /// Whether the prompt is passed as an argument instead of on stdin.
    pub fn prompt_in_args(&self) -> bool {
        self.args.iter().any(|a| a.contains(PROMPT_PLACEHOLDER))
    }

    fn render_args(&self, prompt: &str) -> Vec<String> {
        let model = self
            .config
            .model_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.args
            .iter()
            .map(|a| {
                a.replace(MODEL_PLACEHOLDER, &model)
                    .replace(PROMPT_PLACEHOLDER, prompt)
            })
            .collect()
    }

    /// Install a token for a new child, cancelling any previous one.
    fn replace_running(&self, token: Option<CancellationToken>) {
        let previous = std::mem::replace(
            &mut *self.running.lock().unwrap_or_else(PoisonError::into_inner),
            token,
        );
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

#[async_trait]
impl InferenceEngine for ProcessEngine {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn start(&self, prompt: &str) -> Result<StreamHandle, EngineError> {
        let prompt_in_args = self.prompt_in_args();

        let mut cmd = Command::new(&self.program);
        cmd.args(self.render_args(prompt))
            .stdin(if prompt_in_args {
                Stdio::null()
            } else {
                Stdio::piped()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Linux: request kernel to send SIGTERM to child when parent dies.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::StartFailed(format!("{}: {}", self.program.display(), e)))?;
        debug!("Spawned engine process (pid {:?})", child.id());

        if !prompt_in_args && let Some(mut stdin) = child.stdin.take() {
            let prompt = prompt.to_string();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    debug!("Engine closed stdin early: {}", e);
                }
                // stdin dropped here: EOF for the child
            });
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::StartFailed("Failed to capture stdout".to_string()))?;
        let stderr = child.stderr.take().map(|stderr| tokio::spawn(stderr_tail(stderr)));

        let (tx, handle) = StreamHandle::channel(STREAM_CAPACITY);
        let token = handle.cancellation_token();
        self.replace_running(Some(token.clone()));

        tokio::spawn(pump_output(child, stdout, stderr, tx, token));
        Ok(handle)
    }

    fn stop(&self) {
        if let Some(token) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            debug!("Stopping engine process");
            token.cancel();
        }
    }

    async fn reset_cache(&self) {
        self.replace_running(None);
    }
}

/// Forward the child's stdout as stream events until EOF or cancellation.
async fn pump_output(
    mut child: Child,
    mut stdout: impl AsyncRead + Unpin,
    stderr: Option<JoinHandle<String>>,
    tx: mpsc::Sender<StreamEvent>,
    token: CancellationToken,
) {
    let mut buf = vec![0u8; READ_BUF_SIZE];
    let mut pending = Vec::new();
    let mut produced = false;

    loop {
        let read = tokio::select! {
            _ = token.cancelled() => {
                if let Err(e) = child.kill().await {
                    debug!("Engine process already gone: {}", e);
                }
                return;
            }
            read = stdout.read(&mut buf) => read,
        };

        match read {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let text = take_utf8(&mut pending);
                if text.is_empty() {
                    continue;
                }
                produced = true;
                trace!("Engine delta: {} bytes", text.len());
                if tx.send(StreamEvent::Delta(text)).await.is_err() {
                    // Consumer is gone; nobody needs the rest.
                    let _ = child.kill().await;
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                let _ = child.kill().await;
                return;
            }
        }
    }

    if !pending.is_empty() {
        produced = true;
        let tail = String::from_utf8_lossy(&pending).into_owned();
        let _ = tx.send(StreamEvent::Delta(tail)).await;
    }

    let status = tokio::select! {
        _ = token.cancelled() => {
            let _ = child.kill().await;
            return;
        }
        status = child.wait() => status,
    };

    let event = match status {
        Ok(status) if !status.success() && !produced => {
            let stderr = match stderr {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            warn!("Engine process failed ({}): {}", status, stderr);
            StreamEvent::Error(if stderr.is_empty() {
                format!("engine exited with {}", status)
            } else {
                stderr
            })
        }
        Ok(_) => StreamEvent::EndOfStream,
        Err(e) => StreamEvent::Error(e.to_string()),
    };
    let _ = tx.send(event).await;
}

/// Read stderr to EOF, keeping the last [`STDERR_TAIL_BYTES`].
async fn stderr_tail(mut stderr: impl AsyncRead + Unpin) -> String {
    let mut buf = vec![0u8; READ_BUF_SIZE];
    let mut tail = Vec::new();
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                }
            }
            Err(e) => {
                debug!("Stopped reading engine stderr: {}", e);
                break;
            }
        }
    }
    String::from_utf8_lossy(&tail).trim().to_string()
}

/// Drain the longest valid UTF-8 prefix of `pending`.
///
/// An incomplete multi-byte sequence at the end stays in `pending` for the
/// next read; invalid bytes are replaced.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(s) => {
            let text = s.to_string();
            pending.clear();
            text
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let rest = pending.split_off(valid);
            let text = String::from_utf8_lossy(pending).into_owned();
            *pending = rest;
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}
