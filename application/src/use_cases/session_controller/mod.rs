//! Session controller use case.
//!
//! Drives one question/answer cycle at a time against a stateful,
//! non-reentrant [`InferenceEngine`], enforcing the bounds the engine does
//! not enforce itself:
//!
//! - a wall-clock limit ([`SessionParams::timeout`])
//! - a response length limit ([`SessionParams::max_response_chars`])
//! - termination-marker detection and stripping
//! - clean engine state before and after every turn
//!
//! # Finalization race
//!
//! A turn can end by the marker, the length cap, end-of-stream, an engine
//! error, the timer, or a forced abort (newer submit, [`stop`], or
//! [`full_reset`]). All of them race to claim the turn's completion gate;
//! only the first claim finalizes, and anything the engine sends afterwards
//! is dropped.
//!
//! # Engine contract
//!
//! The engine keeps no cross-turn history. The controller calls
//! [`InferenceEngine::reset_cache`] before and after each turn, and only
//! feeds prior turns back when the caller passes a [`ConversationLog`] and
//! [`SessionParams::history_turns`] is non-zero.
//!
//! [`stop`]: SessionController::stop
//! [`full_reset`]: SessionController::full_reset

mod answer;
mod gate;
#[cfg(test)]
mod test_support;
mod timeout;

use crate::config::SessionParams;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::inference_engine::{EngineError, InferenceEngine};
use crate::ports::progress::{NoProgress, TurnProgressNotifier};
use answer::{answer_text, partial_marker_len, strip_marker};
use chrono::Utc;
use gate::CompletionGate;
use pocket_domain::core::string::{char_len, take_chars, truncate};
use pocket_domain::{
    CacheStatus, ConversationLog, Question, SessionState, StreamEvent, Turn, TurnOutcome,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use timeout::TimeoutGuard;
use tracing::{debug, error, info, trace, warn};

/// Input for [`SessionController::submit`].
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    input: &'a str,
    history: Option<&'a ConversationLog>,
}

impl<'a> TurnRequest<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            history: None,
        }
    }

    /// Offer the caller's log as context. Only the last
    /// [`SessionParams::history_turns`] entries are rendered.
    pub fn with_history(mut self, log: &'a ConversationLog) -> Self {
        self.history = Some(log);
        self
    }
}

/// Controller owning one inference engine and its per-turn state.
///
/// An engine that failed to initialize leaves the controller inert: every
/// turn is answered with [`FallbackMessages::unavailable`](crate::config::FallbackMessages).
pub struct SessionController {
    engine: Option<Arc<dyn InferenceEngine>>,
    params: SessionParams,
    state: Mutex<SessionState>,
    /// Completion gate of the newest submitted turn.
    in_flight: Mutex<Option<Arc<CompletionGate>>>,
    /// Held for the whole engine-facing part of a turn.
    engine_lock: tokio::sync::Mutex<()>,
    conversation_logger: Arc<dyn ConversationLogger>,
}

impl SessionController {
    pub fn new(engine: Arc<dyn InferenceEngine>, params: SessionParams) -> Self {
        info!(
            "Session controller ready (timeout {:?}, max {} chars, history {} turns)",
            params.timeout, params.max_response_chars, params.history_turns
        );
        Self::build(Some(engine), params)
    }

    /// Inert controller for an engine that could not be created.
    pub fn unavailable(reason: impl fmt::Display, params: SessionParams) -> Self {
        error!("Inference engine unavailable: {}", reason);
        Self::build(None, params)
    }

    /// Build from the result of engine construction without failing.
    pub fn from_engine(
        engine: Result<Arc<dyn InferenceEngine>, EngineError>,
        params: SessionParams,
    ) -> Self {
        match engine {
            Ok(engine) => Self::new(engine, params),
            Err(e) => Self::unavailable(e, params),
        }
    }

    fn build(engine: Option<Arc<dyn InferenceEngine>>, params: SessionParams) -> Self {
        Self {
            engine,
            params,
            state: Mutex::new(SessionState::default()),
            in_flight: Mutex::new(None),
            engine_lock: tokio::sync::Mutex::new(()),
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Observational snapshot of the per-turn state.
    pub fn current_state(&self) -> SessionState {
        self.lock_state().clone()
    }

    /// Estimated context usage for the caller's log plus the in-flight turn.
    pub fn cache_status(&self, log: &ConversationLog) -> CacheStatus {
        let context_size = self
            .engine
            .as_ref()
            .map(|e| e.config().context_size)
            .unwrap_or(0);
        let state = self.lock_state();
        CacheStatus::estimate(
            context_size,
            log.estimated_tokens(),
            state.current_question(),
            state.accumulated_output(),
        )
    }

    // ==================== Turns ====================

    /// Answer `input` on its own. Empty input returns an empty string.
    pub async fn submit_turn(&self, input: &str) -> String {
        self.submit(TurnRequest::new(input), &NoProgress)
            .await
            .map(Turn::into_answer)
            .unwrap_or_default()
    }

    /// Answer `input` with recent turns from `log` as context.
    pub async fn submit_turn_with_history(&self, input: &str, log: &ConversationLog) -> String {
        self.submit(TurnRequest::new(input).with_history(log), &NoProgress)
            .await
            .map(Turn::into_answer)
            .unwrap_or_default()
    }

    /// Run one turn and return it with its outcome.
    ///
    /// Returns `None` for empty input. Every failure is absorbed into the
    /// returned turn's answer text and [`TurnOutcome`].
    pub async fn submit(
        &self,
        request: TurnRequest<'_>,
        progress: &dyn TurnProgressNotifier,
    ) -> Option<Turn> {
        let Some(question) = Question::try_new(request.input) else {
            debug!("Ignoring empty input");
            return None;
        };

        let Some(engine) = self.engine.clone() else {
            return Some(self.answer_unavailable(question, progress));
        };

        let gate = Arc::new(CompletionGate::new());
        self.claim_in_flight(&gate);

        // A superseded turn keeps this lock until it has fully wound down.
        let _engine_guard = self.engine_lock.lock().await;

        let started_at = Utc::now();
        let started = Instant::now();
        info!("Starting turn: {}", truncate(question.content(), 60));

        if let Err(e) = self.with_state(|s| {
            s.clear();
            s.begin_turn(question.content())
        }) {
            warn!("Session state out of sync: {}", e);
        }
        progress.on_turn_start(question.content());

        let raw = if gate.is_finalized() {
            debug!("Turn superseded before generation started");
            String::new()
        } else {
            engine.reset_cache().await;
            let history: &[Turn] = match request.history {
                Some(log) if self.params.history_turns > 0 => {
                    log.recent(self.params.history_turns)
                }
                _ => &[],
            };
            let prompt = self.params.template.render(question.content(), history);
            self.conversation_logger.log(ConversationEvent::new(
                "turn_started",
                serde_json::json!({
                    "question": question.content(),
                    "history_turns": history.len(),
                    "prompt_chars": char_len(&prompt),
                }),
            ));
            self.generate(&engine, &gate, &prompt, progress).await
        };

        let outcome = gate.outcome().unwrap_or(TurnOutcome::EmptyFallback);
        let marker = engine.config().stop_marker.as_str();
        let answer = answer_text(strip_marker(&raw, marker), outcome, &self.params.fallbacks);

        self.release_in_flight(&gate);
        engine.reset_cache().await;

        if let Err(e) = self.with_state(|s| s.complete(&answer, outcome)) {
            warn!("Session state out of sync: {}", e);
        }

        let elapsed = started.elapsed();
        info!(
            "Turn finished: {} in {:?} ({} chars)",
            outcome,
            elapsed,
            char_len(&answer)
        );
        self.conversation_logger.log(ConversationEvent::new(
            "turn_completed",
            serde_json::json!({
                "question": question.content(),
                "answer": answer,
                "outcome": outcome,
                "raw_chars": char_len(&raw),
                "elapsed_ms": elapsed.as_millis() as u64,
            }),
        ));

        let turn = Turn::new(question.into_content(), answer, started_at, outcome);
        progress.on_turn_complete(&turn);
        Some(turn)
    }

    /// Stream one generation until some path claims the gate.
    ///
    /// Returns the accumulated raw output (marker and text after it already
    /// cut, length already capped). Only this task halts the generation, and
    /// only through its own [`StreamHandle`](crate::ports::inference_engine::StreamHandle),
    /// so a late abort can never reach the next turn's generation.
    async fn generate(
        &self,
        engine: &Arc<dyn InferenceEngine>,
        gate: &Arc<CompletionGate>,
        prompt: &str,
        progress: &dyn TurnProgressNotifier,
    ) -> String {
        let _timer = TimeoutGuard::spawn(Arc::clone(gate), self.params.timeout);

        let started = tokio::select! {
            biased;
            _ = gate.finalized() => None,
            result = engine.start(prompt) => Some(result),
        };
        let mut stream = match started {
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                warn!("Engine failed to start generation: {}", e);
                gate.try_finalize(TurnOutcome::EngineError);
                return String::new();
            }
            None => {
                // No handle yet; the engine lock keeps this from reaching
                // anyone else's generation.
                engine.stop();
                return String::new();
            }
        };

        let config = engine.config();
        let marker = config.stop_marker.as_str();
        let mut accumulated = String::new();
        // Bytes of `accumulated` already passed to progress and state.
        let mut shown = 0;
        let mut stream_ended = false;
        let mut halts_itself = false;

        loop {
            let event = tokio::select! {
                biased;
                _ = gate.finalized() => break,
                event = stream.recv() => event,
            };
            if gate.is_finalized() {
                trace!("Discarding stream event after turn was finalized");
                break;
            }

            match event {
                StreamEvent::Delta(delta) => {
                    accumulated.push_str(&delta);
                    let limit = self.check_limits(&mut accumulated, marker);
                    let visible = match limit {
                        Some(_) => accumulated.len(),
                        None => accumulated.len() - partial_marker_len(&accumulated, marker),
                    };
                    self.show(progress, &accumulated, &mut shown, visible);
                    if let Some(outcome) = limit {
                        debug!("Turn limit reached: {}", outcome);
                        halts_itself = config.stop_on_marker && outcome != TurnOutcome::LengthCapped;
                        gate.try_finalize(outcome);
                        break;
                    }
                }
                StreamEvent::EndOfStream => {
                    stream_ended = true;
                    self.show(progress, &accumulated, &mut shown, accumulated.len());
                    let outcome = if strip_marker(&accumulated, marker).is_empty() {
                        TurnOutcome::EmptyFallback
                    } else {
                        TurnOutcome::MarkerTerminated
                    };
                    gate.try_finalize(outcome);
                    break;
                }
                StreamEvent::Error(message) => {
                    stream_ended = true;
                    warn!("Engine reported an error mid-stream: {}", message);
                    gate.try_finalize(TurnOutcome::EngineError);
                    break;
                }
            }
        }

        if !stream_ended && !halts_itself {
            debug!("Halting generation");
            stream.cancel();
        }
        accumulated
    }

    /// Pass `accumulated[*shown..visible]` to progress and record it.
    fn show(
        &self,
        progress: &dyn TurnProgressNotifier,
        accumulated: &str,
        shown: &mut usize,
        visible: usize,
    ) {
        if visible <= *shown {
            return;
        }
        progress.on_delta(&accumulated[*shown..visible]);
        *shown = visible;
        self.with_state(|s| s.record_output(&accumulated[..visible]));
    }

    /// Apply the marker and length rules to freshly extended output.
    ///
    /// Cuts `accumulated` in place and returns the outcome if the turn
    /// must end now.
    fn check_limits(&self, accumulated: &mut String, marker: &str) -> Option<TurnOutcome> {
        let max = self.params.max_response_chars;

        if !marker.is_empty()
            && let Some(pos) = accumulated.find(marker)
        {
            accumulated.truncate(pos);
            if char_len(accumulated) > max {
                cap_chars(accumulated, max);
                return Some(TurnOutcome::LengthCapped);
            }
            if accumulated.trim().is_empty() {
                return Some(TurnOutcome::EmptyFallback);
            }
            return Some(TurnOutcome::MarkerTerminated);
        }

        if char_len(accumulated) > max {
            cap_chars(accumulated, max);
            return Some(TurnOutcome::LengthCapped);
        }
        None
    }

    fn answer_unavailable(&self, question: Question, progress: &dyn TurnProgressNotifier) -> Turn {
        warn!("Engine unavailable; answering with fallback text");
        let answer = self.params.fallbacks.unavailable.clone();
        let outcome = TurnOutcome::Unavailable;

        progress.on_turn_start(question.content());
        if let Err(e) = self.with_state(|s| {
            s.clear();
            s.begin_turn(question.content())?;
            s.complete(&answer, outcome)
        }) {
            warn!("Session state out of sync: {}", e);
        }

        let turn = Turn::new(question.into_content(), answer, Utc::now(), outcome);
        progress.on_turn_complete(&turn);
        turn
    }

    // ==================== Stop / Reset ====================

    /// Best-effort abort of the in-flight turn. No-op when idle.
    ///
    /// The aborted call still returns, with outcome [`TurnOutcome::Superseded`]
    /// and whatever text had arrived.
    pub fn stop(&self) {
        if self.abort_in_flight() {
            info!("Generation stopped by request");
        }
    }

    /// Abort any in-flight turn, release the engine's cached state, and
    /// return to a freshly constructed equivalent. Safe to call when idle.
    pub async fn full_reset(&self) {
        info!("Resetting session");
        self.abort_in_flight();

        let _engine_guard = self.engine_lock.lock().await;
        if let Some(engine) = &self.engine {
            engine.reset_cache().await;
        }
        self.with_state(SessionState::reset);

        self.conversation_logger.log(ConversationEvent::new(
            "session_reset",
            serde_json::json!({ "engine_available": self.engine.is_some() }),
        ));
        info!("Session reset complete");
    }

    /// Swap in a new engine. The old one is fully reset first; `&mut self`
    /// rules out a turn running during the swap.
    pub async fn replace_engine(&mut self, engine: Arc<dyn InferenceEngine>) {
        self.full_reset().await;
        self.engine = Some(engine);
        info!("Inference engine replaced");
    }

    // ==================== In-flight bookkeeping ====================

    /// Register `gate` as the newest turn, force-finalizing the previous one.
    ///
    /// The previous turn's own task halts its generation once it sees the
    /// claim, before it gives up the engine lock.
    fn claim_in_flight(&self, gate: &Arc<CompletionGate>) {
        let previous = self.lock_in_flight().replace(Arc::clone(gate));
        if let Some(previous) = previous
            && previous.try_finalize(TurnOutcome::Superseded)
        {
            warn!("Previous turn still in flight; aborting it");
        }
    }

    fn abort_in_flight(&self) -> bool {
        let gate = self.lock_in_flight().clone();
        gate.is_some_and(|gate| gate.try_finalize(TurnOutcome::Superseded))
    }

    fn release_in_flight(&self, gate: &Arc<CompletionGate>) {
        let mut slot = self.lock_in_flight();
        if slot.as_ref().is_some_and(|g| Arc::ptr_eq(g, gate)) {
            *slot = None;
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<Arc<CompletionGate>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.lock_state())
    }
}

fn cap_chars(text: &mut String, max_chars: usize) {
    let end = take_chars(text, max_chars).len();
    text.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::test_support::{ScriptedEngine, Step, delta};
    use super::*;
    use crate::config::FallbackMessages;
    use crate::ports::inference_engine::EngineConfig;
    use pocket_domain::SessionPhase;
    use std::time::Duration;

    const MARKER: &str = "<end_of_turn>";

    fn controller(engine: &Arc<ScriptedEngine>) -> SessionController {
        SessionController::new(engine.clone(), SessionParams::default())
    }

    /// Records every progress callback for assertions
    #[derive(Default)]
    struct RecordingProgress {
        started: Mutex<Vec<String>>,
        deltas: Mutex<Vec<String>>,
        completed: Mutex<Vec<TurnOutcome>>,
    }

    impl TurnProgressNotifier for RecordingProgress {
        fn on_turn_start(&self, question: &str) {
            self.started.lock().unwrap().push(question.to_string());
        }

        fn on_delta(&self, delta: &str) {
            self.deltas.lock().unwrap().push(delta.to_string());
        }

        fn on_turn_complete(&self, turn: &Turn) {
            self.completed.lock().unwrap().push(turn.outcome());
        }
    }

    /// Captures conversation events by type
    #[derive(Default)]
    struct CapturingLogger {
        events: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl ConversationLogger for CapturingLogger {
        fn log(&self, event: ConversationEvent) {
            self.events
                .lock()
                .unwrap()
                .push((event.event_type.to_string(), event.payload));
        }
    }

    async fn wait_until_generating(controller: &SessionController) {
        while !controller.current_state().is_generating() {
            tokio::task::yield_now().await;
        }
    }

    async fn wait_for_output(controller: &SessionController, text: &str) {
        while controller.current_state().accumulated_output() != text {
            tokio::task::yield_now().await;
        }
    }

    // ==================== Termination paths ====================

    #[tokio::test]
    async fn test_marker_terminated_scenario() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![
            delta("Hi"),
            delta(" there"),
            delta(MARKER),
            Step::End,
        ]));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("hello"), &NoProgress)
            .await
            .unwrap();

        assert_eq!(turn.answer(), "Hi there");
        assert_eq!(turn.outcome(), TurnOutcome::MarkerTerminated);
        assert_eq!(turn.question(), "hello");
    }

    #[tokio::test]
    async fn test_text_after_marker_is_dropped() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_script(vec![delta("Answer<end_of_turn>User: more"), Step::Hang]),
        );
        let controller = controller(&engine);

        assert_eq!(controller.submit_turn("q").await, "Answer");
    }

    #[tokio::test]
    async fn test_marker_split_across_deltas() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![
            delta("Done <end_"),
            delta("of_turn>"),
            Step::Hang,
        ]));
        let controller = controller(&engine);

        assert_eq!(controller.submit_turn("q").await, "Done");
    }

    #[tokio::test]
    async fn test_length_cap_aborts_generation() {
        let chunk = "a".repeat(10);
        let mut script: Vec<Step> = (0..25).map(|_| delta(&chunk)).collect();
        script.push(Step::End);
        let engine = Arc::new(ScriptedEngine::new().with_script(script));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("hello"), &NoProgress)
            .await
            .unwrap();

        assert_eq!(turn.outcome(), TurnOutcome::LengthCapped);
        assert!(char_len(turn.answer()) <= 200);
        assert_eq!(turn.answer(), "a".repeat(200));
        assert!(engine.stops() >= 1);
    }

    #[tokio::test]
    async fn test_length_cap_counts_characters() {
        let engine = Arc::new(
            ScriptedEngine::new().with_script(vec![delta(&"가".repeat(150)), delta(&"나".repeat(100))]),
        );
        let controller = controller(&engine);

        let answer = controller.submit_turn("q").await;
        assert_eq!(char_len(&answer), 200);
        assert!(answer.ends_with('나'));
    }

    #[tokio::test]
    async fn test_marker_beyond_cap_is_length_capped() {
        let text = format!("{}{}", "b".repeat(230), MARKER);
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![delta(&text)]));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("q"), &NoProgress)
            .await
            .unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::LengthCapped);
        assert_eq!(turn.answer().len(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_engine_times_out_with_fallback() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![Step::Hang]));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("hello"), &NoProgress)
            .await
            .unwrap();

        assert_eq!(turn.outcome(), TurnOutcome::TimedOut);
        assert_eq!(turn.answer(), FallbackMessages::default().timeout);
        assert!(turn.answer().starts_with("Unable to generate"));
        assert!(controller.current_state().is_completed());
        assert_eq!(engine.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_partial_output() {
        let engine =
            Arc::new(ScriptedEngine::new().with_script(vec![delta("partial answer"), Step::Hang]));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("hello"), &NoProgress)
            .await
            .unwrap();

        assert_eq!(turn.outcome(), TurnOutcome::TimedOut);
        assert_eq!(turn.answer(), "partial answer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_delta_after_timeout_is_discarded() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .ignoring_stop()
                .with_script(vec![
                    delta("early"),
                    Step::Wait(Duration::from_secs(10)),
                    delta(" late"),
                    Step::End,
                ]),
        );
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("hello"), &NoProgress)
            .await
            .unwrap();

        assert_eq!(turn.outcome(), TurnOutcome::TimedOut);
        assert_eq!(turn.answer(), "early");

        // Let the engine push its late delta into the dropped stream
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(controller.current_state().accumulated_output(), "early");
    }

    #[tokio::test(start_paused = true)]
    async fn test_marker_before_timeout_wins() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![
            Step::Wait(Duration::from_secs(4)),
            delta("in time"),
            delta(MARKER),
            Step::Hang,
        ]));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("q"), &NoProgress)
            .await
            .unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::MarkerTerminated);
        assert_eq!(turn.answer(), "in time");
    }

    #[tokio::test]
    async fn test_end_of_stream_without_marker() {
        let engine = Arc::new(
            ScriptedEngine::new().with_script(vec![delta("Hello"), delta(" world "), Step::End]),
        );
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("q"), &NoProgress)
            .await
            .unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::MarkerTerminated);
        assert_eq!(turn.answer(), "Hello world");
        assert_eq!(engine.stops(), 0);
    }

    #[tokio::test]
    async fn test_empty_stream_uses_fallback() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![Step::End]));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("q"), &NoProgress)
            .await
            .unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::EmptyFallback);
        assert_eq!(turn.answer(), FallbackMessages::default().empty);
    }

    #[tokio::test]
    async fn test_marker_only_output_uses_fallback() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![delta("  <end_of_turn>")]));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("q"), &NoProgress)
            .await
            .unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::EmptyFallback);
    }

    #[tokio::test]
    async fn test_mid_stream_error_uses_fallback() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![
            delta("partial"),
            Step::Error("decode failed".to_string()),
        ]));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("q"), &NoProgress)
            .await
            .unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::EngineError);
        assert_eq!(turn.answer(), FallbackMessages::default().engine_error);
        assert!(controller.current_state().is_completed());
    }

    #[tokio::test]
    async fn test_start_failure_uses_fallback() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![Step::FailStart]));
        let controller = controller(&engine);

        let turn = controller
            .submit(TurnRequest::new("q"), &NoProgress)
            .await
            .unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::EngineError);
        assert_eq!(engine.resets(), 2);
    }

    #[tokio::test]
    async fn test_engine_that_ignores_marker_is_stopped() {
        let config = EngineConfig {
            stop_on_marker: false,
            ..EngineConfig::default()
        };
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_config(config)
                .with_script(vec![delta("ok<end_of_turn>"), Step::Hang]),
        );
        let controller = controller(&engine);

        assert_eq!(controller.submit_turn("q").await, "ok");
        assert_eq!(engine.stops(), 1);
    }

    #[tokio::test]
    async fn test_engine_that_halts_on_marker_is_not_stopped() {
        let engine = Arc::new(
            ScriptedEngine::new().with_script(vec![delta("ok<end_of_turn>"), Step::Hang]),
        );
        let controller = controller(&engine);

        assert_eq!(controller.submit_turn("q").await, "ok");
        assert_eq!(engine.stops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_marker_is_held_back() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![
            delta("Done <end_"),
            Step::Wait(Duration::from_secs(2)),
            delta("of_turn>"),
        ]));
        let controller = Arc::new(controller(&engine));
        let progress = Arc::new(RecordingProgress::default());

        let running = {
            let controller = Arc::clone(&controller);
            let progress = Arc::clone(&progress);
            tokio::spawn(async move {
                controller
                    .submit(TurnRequest::new("q"), progress.as_ref())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(controller.current_state().accumulated_output(), "Done ");

        let turn = running.await.unwrap().unwrap();
        assert_eq!(turn.answer(), "Done");
        assert_eq!(*progress.deltas.lock().unwrap(), vec!["Done "]);
    }

    #[tokio::test]
    async fn test_held_back_text_is_released_when_marker_does_not_follow() {
        let engine = Arc::new(
            ScriptedEngine::new().with_script(vec![delta("a <"), delta("b"), delta(" <"), Step::End]),
        );
        let controller = controller(&engine);
        let progress = RecordingProgress::default();

        let turn = controller
            .submit(TurnRequest::new("q"), &progress)
            .await
            .unwrap();

        assert_eq!(turn.answer(), "a <b <");
        assert_eq!(*progress.deltas.lock().unwrap(), vec!["a ", "<b", " ", "<"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_halts_only_its_own_generation() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_script(vec![Step::Hang])
                .with_script(vec![delta("two"), Step::Wait(Duration::from_secs(1)), Step::End]),
        );
        let controller = controller(&engine);

        let first = controller.submit(TurnRequest::new("one"), &NoProgress).await.unwrap();
        let second = controller.submit(TurnRequest::new("two"), &NoProgress).await.unwrap();

        assert_eq!(first.outcome(), TurnOutcome::TimedOut);
        assert_eq!(second.outcome(), TurnOutcome::MarkerTerminated);
        assert_eq!(engine.halted(), vec![true, false]);
    }

    // ==================== Input / availability ====================

    #[tokio::test]
    async fn test_empty_input_is_noop() {
        let engine = Arc::new(ScriptedEngine::new());
        let controller = controller(&engine);

        assert_eq!(controller.submit_turn("").await, "");
        assert!(
            controller
                .submit(TurnRequest::new("   "), &NoProgress)
                .await
                .is_none()
        );
        assert!(engine.prompts().is_empty());
        assert_eq!(engine.resets(), 0);
        assert_eq!(controller.current_state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_unavailable_engine_answers_fixed_text() {
        let controller = SessionController::from_engine(
            Err(EngineError::Unavailable("model file missing".to_string())),
            SessionParams::default(),
        );
        assert!(!controller.is_available());

        let turn = controller
            .submit(TurnRequest::new("hello"), &NoProgress)
            .await
            .unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::Unavailable);
        assert_eq!(turn.answer(), FallbackMessages::default().unavailable);

        let state = controller.current_state();
        assert!(state.is_completed());
        assert_eq!(state.last_outcome(), Some(TurnOutcome::Unavailable));

        // still inert after a reset
        controller.full_reset().await;
        assert_eq!(
            controller.submit_turn("again").await,
            FallbackMessages::default().unavailable
        );
    }

    // ==================== Engine state hygiene ====================

    #[tokio::test]
    async fn test_cache_cleared_before_and_after_each_turn() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_script(vec![delta("one"), Step::End])
                .with_script(vec![delta("two"), Step::End]),
        );
        let controller = controller(&engine);

        controller.submit_turn("first").await;
        assert_eq!(engine.resets(), 2);
        controller.submit_turn("second").await;
        assert_eq!(engine.resets(), 4);
    }

    #[tokio::test]
    async fn test_turns_are_independent_by_default() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_script(vec![delta("A1"), Step::End])
                .with_script(vec![delta("A2"), Step::End]),
        );
        let controller = controller(&engine);

        let mut log = ConversationLog::new();
        let turn = controller
            .submit(TurnRequest::new("first question"), &NoProgress)
            .await
            .unwrap();
        log.append(turn);
        controller
            .submit(TurnRequest::new("second question").with_history(&log), &NoProgress)
            .await;

        let prompts = engine.prompts();
        assert!(!prompts[1].contains("first question"));
        assert!(prompts[1].contains("second question"));
    }

    #[tokio::test]
    async fn test_history_turns_feed_recent_context() {
        let engine = Arc::new(ScriptedEngine::new());
        let controller = SessionController::new(
            engine.clone(),
            SessionParams::default().with_history_turns(1),
        );

        let mut log = ConversationLog::new();
        log.append(Turn::new("old q", "old a", Utc::now(), TurnOutcome::MarkerTerminated));
        log.append(Turn::new("recent q", "recent a", Utc::now(), TurnOutcome::MarkerTerminated));

        controller.submit_turn_with_history("now", &log).await;
        controller.submit_turn("alone").await;

        let prompts = engine.prompts();
        assert!(prompts[0].contains("User: recent q\nAssistant: recent a\n"));
        assert!(!prompts[0].contains("old q"));
        assert!(prompts[0].ends_with("User: now\nAssistant: "));
        assert!(!prompts[1].contains("recent q"));
    }

    // ==================== Forced abort ====================

    #[tokio::test]
    async fn test_new_submit_supersedes_in_flight_turn() {
        let engine = Arc::new(
            ScriptedEngine::new()
                .with_script(vec![delta("partial one"), Step::Hang])
                .with_script(vec![delta("answer two"), Step::End]),
        );
        let controller = Arc::new(controller(&engine));

        let first = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                controller
                    .submit(TurnRequest::new("first"), &NoProgress)
                    .await
            })
        };
        wait_for_output(&controller, "partial one").await;

        let second = controller
            .submit(TurnRequest::new("second"), &NoProgress)
            .await
            .unwrap();
        let first = first.await.unwrap().unwrap();

        assert_eq!(first.outcome(), TurnOutcome::Superseded);
        assert_eq!(first.answer(), "partial one");
        assert_eq!(second.outcome(), TurnOutcome::MarkerTerminated);
        assert_eq!(second.answer(), "answer two");
        assert_eq!(engine.halted(), vec![true, false]);

        // first turn fully finished (reset after) before the second started
        assert_eq!(engine.resets(), 4);
        assert_eq!(engine.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_stop_finalizes_in_flight_turn() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![Step::Hang]));
        let controller = Arc::new(controller(&engine));

        let running = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                controller
                    .submit(TurnRequest::new("q"), &NoProgress)
                    .await
            })
        };
        wait_until_generating(&controller).await;
        controller.stop();

        let turn = running.await.unwrap().unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::Superseded);
        assert_eq!(turn.answer(), FallbackMessages::default().empty);
        assert!(controller.current_state().is_completed());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let engine = Arc::new(ScriptedEngine::new());
        let controller = controller(&engine);
        controller.stop();
        assert_eq!(engine.stops(), 0);
    }

    // ==================== Full reset ====================

    #[tokio::test]
    async fn test_full_reset_matches_fresh_controller() {
        let script = vec![delta("same"), delta(MARKER)];
        let used = Arc::new(
            ScriptedEngine::new()
                .with_script(vec![delta("before reset"), Step::End])
                .with_script(script.clone()),
        );
        let fresh = Arc::new(ScriptedEngine::new().with_script(script));

        let used_controller = controller(&used);
        used_controller.submit_turn("warm up").await;
        used_controller.full_reset().await;
        assert_eq!(used_controller.current_state(), SessionState::default());

        let fresh_controller = controller(&fresh);
        let after_reset = used_controller.submit_turn("hello").await;
        let from_fresh = fresh_controller.submit_turn("hello").await;

        assert_eq!(after_reset, from_fresh);
        assert_eq!(used.prompts()[1], fresh.prompts()[0]);
        assert_eq!(
            used_controller.current_state(),
            fresh_controller.current_state()
        );
    }

    #[tokio::test]
    async fn test_full_reset_when_idle_is_safe() {
        let engine = Arc::new(ScriptedEngine::new());
        let controller = controller(&engine);

        controller.full_reset().await;
        controller.full_reset().await;

        assert_eq!(engine.resets(), 2);
        assert_eq!(engine.stops(), 0);
        assert_eq!(controller.current_state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_full_reset_aborts_in_flight_turn() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![delta("x"), Step::Hang]));
        let controller = Arc::new(controller(&engine));

        let running = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                controller
                    .submit(TurnRequest::new("q"), &NoProgress)
                    .await
            })
        };
        wait_until_generating(&controller).await;
        controller.full_reset().await;

        let turn = running.await.unwrap().unwrap();
        assert_eq!(turn.outcome(), TurnOutcome::Superseded);
        assert_eq!(controller.current_state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_replace_engine_resets_old_engine() {
        let old = Arc::new(ScriptedEngine::new());
        let new = Arc::new(ScriptedEngine::new().with_script(vec![delta("from new"), Step::End]));
        let mut controller = controller(&old);

        controller.replace_engine(new.clone()).await;
        assert_eq!(old.resets(), 1);

        assert_eq!(controller.submit_turn("q").await, "from new");
        assert!(old.prompts().is_empty());
        assert_eq!(new.prompts().len(), 1);
    }

    // ==================== Observation ====================

    #[tokio::test]
    async fn test_state_after_turn() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![delta("done"), Step::End]));
        let controller = controller(&engine);

        controller.submit_turn("q").await;
        let state = controller.current_state();
        assert_eq!(
            state.phase(),
            SessionPhase::Completed(TurnOutcome::MarkerTerminated)
        );
        assert!(!state.is_generating());
        assert_eq!(state.accumulated_output(), "done");
    }

    #[tokio::test]
    async fn test_progress_sees_visible_text_only() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![
            delta("Hi"),
            delta(" there<end_of_turn>"),
        ]));
        let controller = controller(&engine);
        let progress = RecordingProgress::default();

        controller
            .submit(TurnRequest::new("hello"), &progress)
            .await;

        assert_eq!(*progress.started.lock().unwrap(), vec!["hello"]);
        assert_eq!(*progress.deltas.lock().unwrap(), vec!["Hi", " there"]);
        assert_eq!(
            *progress.completed.lock().unwrap(),
            vec![TurnOutcome::MarkerTerminated]
        );
    }

    #[tokio::test]
    async fn test_conversation_logger_records_turn_events() {
        let engine = Arc::new(ScriptedEngine::new().with_script(vec![delta("ok"), Step::End]));
        let logger = Arc::new(CapturingLogger::default());
        let controller = controller(&engine).with_conversation_logger(logger.clone());

        controller.submit_turn("hello").await;
        controller.full_reset().await;

        let events = logger.events.lock().unwrap();
        let types: Vec<_> = events.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(types, vec!["turn_started", "turn_completed", "session_reset"]);
        assert_eq!(events[1].1["answer"], "ok");
        assert_eq!(events[1].1["outcome"], "marker_terminated");
    }

    #[tokio::test]
    async fn test_cache_status_uses_engine_context_size() {
        let engine = Arc::new(ScriptedEngine::new());
        let controller = controller(&engine);

        let mut log = ConversationLog::new();
        log.append(Turn::new("0123456789", "abcde", Utc::now(), TurnOutcome::MarkerTerminated));

        let status = controller.cache_status(&log);
        assert_eq!(status.context_size, 512);
        assert_eq!(status.estimated_tokens, 50 + 26);
    }
}
