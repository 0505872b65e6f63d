//! Conversation state machine
//!
//! One invocation per webhook callback: resolve the session, apply a
//! single state transition under the session lock, and return a decision
//! the adapter can always render. The engine never awaits external input
//! and never lets an internal fault escape as anything other than a
//! graceful `error` hangup.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use please_hold_config::EngineSettings;
use please_hold_core::{CallOutcome, CallSession, CallbackInput, EngineDecision};
use please_hold_store::SessionStore;

use crate::phrases::PhraseBank;
use crate::rng::{RandomSource, ThreadRngSource};
use crate::EngineError;

/// Spoken when the engine itself fails; independent of the phrase bank
/// so the fault path cannot fail a second time.
const FALLBACK_GOODBYE: &str = "I'm sorry, something's come up and I have to go. Goodbye.";

/// Recorded as the terminal line when the remote party hangs up first.
const HANGUP_FAREWELL: &str = "Goodbye.";

/// The per-call decision engine
///
/// Owns a handle to the session store; all session mutation in the
/// system goes through here.
pub struct ConversationEngine {
    store: Arc<SessionStore>,
    phrases: PhraseBank,
    rng: Arc<dyn RandomSource>,
    settings: EngineSettings,
}

impl ConversationEngine {
    /// Create an engine with the built-in phrase bank and live RNG
    pub fn new(store: Arc<SessionStore>, settings: EngineSettings) -> Self {
        Self::with_sources(
            store,
            settings,
            PhraseBank::default(),
            Arc::new(ThreadRngSource),
        )
    }

    /// Create an engine with explicit phrase pools and randomness
    pub fn with_sources(
        store: Arc<SessionStore>,
        settings: EngineSettings,
        phrases: PhraseBank,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            store,
            phrases,
            rng,
            settings,
        }
    }

    /// Handle one inbound callback
    ///
    /// Total: whatever happens internally, the caller hears a coherent
    /// line. Faults terminate the session with outcome `error` rather
    /// than leaving it ambiguous.
    pub fn handle_callback(&self, input: &CallbackInput) -> EngineDecision {
        match self.try_handle(input) {
            Ok(decision) => decision,
            Err(err) => {
                tracing::error!(
                    session_id = %input.session_id,
                    "Callback handling failed: {}",
                    err
                );
                self.fail_safe(&input.session_id)
            }
        }
    }

    /// Handle a transport-level "call ended" notification
    ///
    /// Classifies a still-live session as `caller_hangup`. Unknown
    /// sessions are a no-op: there is nothing left to terminate, and a
    /// redelivered status event must not mint a phantom record.
    pub fn handle_hangup(&self, session_id: &str) -> Option<EngineDecision> {
        let handle = match self.store.get(session_id) {
            Some(handle) => handle,
            None => {
                tracing::warn!("Hangup event for unknown session: {}", session_id);
                return None;
            }
        };

        let now = Utc::now();
        Some(handle.update(|session| {
            if session.is_terminal() {
                return Self::replay(session);
            }
            session.mark_terminated(CallOutcome::CallerHangup, HANGUP_FAREWELL, now);
            tracing::info!(
                session_id = %session.session_id,
                turns = session.turn_count,
                "Caller hung up"
            );
            EngineDecision::hang_up(HANGUP_FAREWELL, CallOutcome::CallerHangup)
        }))
    }

    fn try_handle(&self, input: &CallbackInput) -> Result<EngineDecision, EngineError> {
        if input.session_id.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "missing session identifier".to_string(),
            ));
        }

        let handle = self
            .store
            .get_or_create(&input.session_id, input.caller_id.as_deref());
        let now = Utc::now();
        handle.update(|session| self.advance(session, input, now))
    }

    /// Apply one state transition; runs entirely inside the session lock
    fn advance(
        &self,
        session: &mut CallSession,
        input: &CallbackInput,
        now: DateTime<Utc>,
    ) -> Result<EngineDecision, EngineError> {
        // Duplicate delivery after termination replays the same decision.
        if session.is_terminal() {
            tracing::debug!(
                session_id = %session.session_id,
                outcome = session.outcome.as_str(),
                "Replaying terminal decision"
            );
            return Ok(Self::replay(session));
        }

        match input.speech() {
            None => self.on_silence(session, now),
            Some(speech) => self.on_speech(session, speech, input.speech_confidence, now),
        }
    }

    fn on_silence(
        &self,
        session: &mut CallSession,
        now: DateTime<Utc>,
    ) -> Result<EngineDecision, EngineError> {
        session.consecutive_silence_count += 1;

        if session.consecutive_silence_count >= self.settings.silence_cycle_limit {
            let line = self.phrases.silence_goodbye(session.turn_count).to_string();
            session.mark_terminated(CallOutcome::SilenceTimeout, &line, now);
            tracing::info!(
                session_id = %session.session_id,
                turns = session.turn_count,
                "Call ended after repeated silence"
            );
            return Ok(EngineDecision::hang_up(line, CallOutcome::SilenceTimeout));
        }

        // First quiet cycle: nudge the caller. A brand-new call gets the
        // confused greeting, an established one the are-you-there prompt.
        let pool = if session.turn_count == 0 {
            &self.phrases.greetings
        } else {
            &self.phrases.reengagements
        };
        let line = self.pick(pool, "re-engagement")?;
        Ok(EngineDecision::speak(line))
    }

    fn on_speech(
        &self,
        session: &mut CallSession,
        speech: &str,
        confidence: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<EngineDecision, EngineError> {
        session.consecutive_silence_count = 0;
        session.turn_count += 1;

        // Utterance content is never logged; only its size.
        tracing::debug!(
            session_id = %session.session_id,
            turn = session.turn_count,
            phase = ?session.phase(self.settings.max_turns),
            chars = speech.len(),
            confidence = ?confidence,
            "Recognized speech"
        );

        if session.turn_count >= self.settings.max_turns {
            let line = self.pick(&self.phrases.wrapups, "wrap-up")?;
            session.mark_terminated(CallOutcome::MaxTurns, &line, now);
            tracing::info!(
                session_id = %session.session_id,
                turns = session.turn_count,
                "Turn ceiling reached, wrapping up"
            );
            return Ok(EngineDecision::hang_up(line, CallOutcome::MaxTurns));
        }

        let line = self.pick_stall(session)?;
        Ok(EngineDecision::speak(line))
    }

    /// Uniform draw from a pool
    fn pick(&self, pool: &[String], name: &'static str) -> Result<String, EngineError> {
        if pool.is_empty() {
            return Err(EngineError::EmptyPhrasePool(name));
        }
        Ok(pool[self.rng.next_index(pool.len())].clone())
    }

    /// Draw a stall phrase, avoiding repeats
    ///
    /// Prefers indices this session has not used; once the pool is
    /// exhausted repeats are allowed again, but never the immediately
    /// preceding phrase while an alternative exists.
    fn pick_stall(&self, session: &mut CallSession) -> Result<String, EngineError> {
        let pool = &self.phrases.stalls;
        if pool.is_empty() {
            return Err(EngineError::EmptyPhrasePool("stall"));
        }

        let mut candidates: Vec<usize> = (0..pool.len())
            .filter(|i| !session.used_phrase_indices.contains(i))
            .collect();
        if candidates.is_empty() {
            session.used_phrase_indices.clear();
            candidates = (0..pool.len()).collect();
        }
        if candidates.len() > 1 {
            if let Some(last) = session.last_phrase_index {
                candidates.retain(|&i| i != last);
            }
        }

        let idx = candidates[self.rng.next_index(candidates.len())];
        session.used_phrase_indices.insert(idx);
        session.last_phrase_index = Some(idx);
        Ok(pool[idx].clone())
    }

    /// Terminal decision replayed for duplicate callbacks
    fn replay(session: &CallSession) -> EngineDecision {
        let line = session
            .final_prompt
            .clone()
            .unwrap_or_else(|| FALLBACK_GOODBYE.to_string());
        EngineDecision::hang_up(line, session.outcome)
    }

    /// Fault path: force the session into `error` and say goodbye
    fn fail_safe(&self, session_id: &str) -> EngineDecision {
        let now = Utc::now();
        let result = self.store.update(session_id, |session| {
            session.mark_terminated(CallOutcome::Error, FALLBACK_GOODBYE, now);
        });
        if let Err(err) = result {
            tracing::warn!("Could not record error outcome for {}: {}", session_id, err);
        }
        EngineDecision::hang_up(FALLBACK_GOODBYE, CallOutcome::Error)
    }
}
