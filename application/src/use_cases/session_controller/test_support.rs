//! Scripted inference engine for controller tests.

use crate::ports::inference_engine::{EngineConfig, EngineError, InferenceEngine, StreamHandle};
use async_trait::async_trait;
use pocket_domain::StreamEvent;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One step of a scripted generation
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Delta(String),
    Wait(Duration),
    End,
    Error(String),
    /// Never finish on its own; only a stop ends it.
    Hang,
    /// `start` itself fails.
    FailStart,
}

pub(crate) fn delta(text: &str) -> Step {
    Step::Delta(text.to_string())
}

/// Mock engine that replays one script per `start` call.
pub(crate) struct ScriptedEngine {
    config: EngineConfig,
    scripts: Mutex<VecDeque<Vec<Step>>>,
    prompts: Mutex<Vec<String>>,
    /// Stop signal of every generation, in start order.
    generations: Mutex<Vec<CancellationToken>>,
    ignore_stop: bool,
    resets: AtomicUsize,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            scripts: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            generations: Mutex::new(Vec::new()),
            ignore_stop: false,
            resets: AtomicUsize::new(0),
        }
    }

    /// Queue the script for the next `start` call.
    pub(crate) fn with_script(self, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().push_back(steps);
        self
    }

    /// Keep streaming after `stop` (models a slow abort).
    pub(crate) fn ignoring_stop(mut self) -> Self {
        self.ignore_stop = true;
        self
    }

    pub(crate) fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of generations that were asked to halt.
    pub(crate) fn stops(&self) -> usize {
        self.halted().iter().filter(|&&halted| halted).count()
    }

    /// Per generation, whether it was asked to halt.
    pub(crate) fn halted(&self) -> Vec<bool> {
        self.generations
            .lock()
            .unwrap()
            .iter()
            .map(CancellationToken::is_cancelled)
            .collect()
    }

    pub(crate) fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn start(&self, prompt: &str) -> Result<StreamHandle, EngineError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Step::End]);

        if matches!(script.first(), Some(Step::FailStart)) {
            return Err(EngineError::StartFailed("scripted failure".to_string()));
        }

        let (tx, handle) = StreamHandle::channel(16);
        let token = handle.cancellation_token();
        self.generations.lock().unwrap().push(token.clone());
        let ignore_stop = self.ignore_stop;
        let halt_on = self
            .config
            .stop_on_marker
            .then(|| self.config.stop_marker.clone())
            .filter(|marker| !marker.is_empty());

        tokio::spawn(async move {
            for step in script {
                if token.is_cancelled() && !ignore_stop {
                    return;
                }
                match step {
                    Step::Delta(text) => {
                        let hit_marker = halt_on.as_ref().is_some_and(|m| text.contains(m.as_str()));
                        if tx.send(StreamEvent::Delta(text)).await.is_err() || hit_marker {
                            return;
                        }
                    }
                    Step::Wait(duration) => {
                        if ignore_stop {
                            tokio::time::sleep(duration).await;
                        } else {
                            tokio::select! {
                                _ = tokio::time::sleep(duration) => {}
                                _ = token.cancelled() => return,
                            }
                        }
                    }
                    Step::End => {
                        let _ = tx.send(StreamEvent::EndOfStream).await;
                        return;
                    }
                    Step::Error(message) => {
                        let _ = tx.send(StreamEvent::Error(message)).await;
                        return;
                    }
                    Step::Hang => {
                        token.cancelled().await;
                        return;
                    }
                    Step::FailStart => {}
                }
            }
        });

        Ok(handle)
    }

    fn stop(&self) {
        if let Some(current) = self.generations.lock().unwrap().last() {
            current.cancel();
        }
    }

    async fn reset_cache(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}
