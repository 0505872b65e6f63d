//! Call session record and outcome taxonomy

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller id recorded when the caller withholds their number
pub const UNKNOWN_CALLER: &str = "unknown";

/// Terminal classification of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Default)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// Call is still being handled
    #[default]
    InProgress,
    /// Remote party hung up before we ended the call
    CallerHangup,
    /// Configured turn ceiling reached
    MaxTurns,
    /// Two consecutive gather cycles produced no speech
    SilenceTimeout,
    /// Internal fault forced a graceful goodbye
    Error,
}

impl CallOutcome {
    /// Stable snake_case key, as used in the stats histogram
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::InProgress => "in_progress",
            CallOutcome::CallerHangup => "caller_hangup",
            CallOutcome::MaxTurns => "max_turns",
            CallOutcome::SilenceTimeout => "silence_timeout",
            CallOutcome::Error => "error",
        }
    }

    /// Get outcome display name
    pub fn display_name(&self) -> &'static str {
        match self {
            CallOutcome::InProgress => "In Progress",
            CallOutcome::CallerHangup => "Caller Gave Up",
            CallOutcome::MaxTurns => "Max Turns",
            CallOutcome::SilenceTimeout => "Silence",
            CallOutcome::Error => "Error",
        }
    }

    /// True once the call has been classified
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallOutcome::InProgress)
    }
}

/// Phase of the conversation, derived from session state
///
/// Never stored: computed from turn count, outcome, and the configured
/// turn ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// No turns completed yet
    Greeting,
    /// Mid-conversation
    Engaged,
    /// The next recognized-speech turn reaches the ceiling
    Closing,
    /// Outcome recorded, call ended
    Terminated,
}

/// One phone call from first contact to termination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    /// Opaque identifier supplied by the telephony platform
    pub session_id: String,
    /// Caller-presented phone number, or "unknown"
    pub caller_id: String,
    /// Set at first contact
    pub start_time: DateTime<Utc>,
    /// Set at termination
    pub end_time: Option<DateTime<Utc>>,
    /// Completed caller-utterance/agent-response exchanges
    pub turn_count: u32,
    /// Gather cycles in a row that produced no speech
    pub consecutive_silence_count: u32,
    /// Write-once terminal classification
    pub outcome: CallOutcome,
    /// Stall phrases already spoken in this session
    pub used_phrase_indices: HashSet<usize>,
    /// Most recent stall phrase, to avoid immediate repeats
    pub last_phrase_index: Option<usize>,
    /// Closing line spoken at termination, replayed on duplicate callbacks
    pub final_prompt: Option<String>,
}

impl CallSession {
    /// Create a fresh session at first contact
    pub fn new(session_id: impl Into<String>, caller_id: Option<&str>) -> Self {
        Self {
            session_id: session_id.into(),
            caller_id: caller_id
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(UNKNOWN_CALLER)
                .to_string(),
            start_time: Utc::now(),
            end_time: None,
            turn_count: 0,
            consecutive_silence_count: 0,
            outcome: CallOutcome::InProgress,
            used_phrase_indices: HashSet::new(),
            last_phrase_index: None,
            final_prompt: None,
        }
    }

    /// True once the outcome is terminal
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }

    /// Wall-clock duration of a completed call
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds().max(0))
    }

    /// Elapsed time so far for a call that is still live
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_milliseconds().max(0)
    }

    /// Derive the conversation phase for a given turn ceiling
    pub fn phase(&self, max_turns: u32) -> CallPhase {
        if self.is_terminal() {
            CallPhase::Terminated
        } else if self.turn_count == 0 {
            CallPhase::Greeting
        } else if self.turn_count + 1 >= max_turns {
            CallPhase::Closing
        } else {
            CallPhase::Engaged
        }
    }

    /// Record the terminal outcome and closing line
    ///
    /// The outcome transitions exactly once; a second call is a no-op and
    /// returns false, leaving the original classification untouched.
    pub fn mark_terminated(
        &mut self,
        outcome: CallOutcome,
        final_prompt: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_terminal() || !outcome.is_terminal() {
            return false;
        }
        self.outcome = outcome;
        self.end_time = Some(now);
        self.final_prompt = Some(final_prompt.into());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_session_defaults() {
        let session = CallSession::new("CA123", Some("+15550100"));
        assert_eq!(session.session_id, "CA123");
        assert_eq!(session.caller_id, "+15550100");
        assert_eq!(session.turn_count, 0);
        assert_eq!(session.outcome, CallOutcome::InProgress);
        assert!(session.end_time.is_none());
        assert!(!session.is_terminal());
    }

    #[test]
    fn test_withheld_caller_id() {
        let session = CallSession::new("CA123", None);
        assert_eq!(session.caller_id, UNKNOWN_CALLER);

        let session = CallSession::new("CA124", Some("  "));
        assert_eq!(session.caller_id, UNKNOWN_CALLER);
    }

    #[test]
    fn test_outcome_transitions_once() {
        let mut session = CallSession::new("CA123", None);
        let now = Utc::now();

        assert!(session.mark_terminated(CallOutcome::SilenceTimeout, "Goodbye.", now));
        assert_eq!(session.outcome, CallOutcome::SilenceTimeout);
        assert_eq!(session.end_time, Some(now));

        // Second terminal write is a no-op
        let later = now + Duration::seconds(5);
        assert!(!session.mark_terminated(CallOutcome::CallerHangup, "Bye.", later));
        assert_eq!(session.outcome, CallOutcome::SilenceTimeout);
        assert_eq!(session.end_time, Some(now));
        assert_eq!(session.final_prompt.as_deref(), Some("Goodbye."));
    }

    #[test]
    fn test_cannot_terminate_with_in_progress() {
        let mut session = CallSession::new("CA123", None);
        assert!(!session.mark_terminated(CallOutcome::InProgress, "x", Utc::now()));
        assert!(!session.is_terminal());
        assert!(session.end_time.is_none());
    }

    #[test]
    fn test_duration_for_closed_call() {
        let mut session = CallSession::new("CA123", None);
        let end = session.start_time + Duration::milliseconds(30_000);
        session.mark_terminated(CallOutcome::CallerHangup, "Bye.", end);
        assert_eq!(session.duration_ms(), Some(30_000));
    }

    #[test]
    fn test_duration_absent_while_live() {
        let session = CallSession::new("CA123", None);
        assert_eq!(session.duration_ms(), None);
        let now = session.start_time + Duration::milliseconds(1_500);
        assert_eq!(session.elapsed_ms(now), 1_500);
    }

    #[test]
    fn test_phase_derivation() {
        let mut session = CallSession::new("CA123", None);
        assert_eq!(session.phase(3), CallPhase::Greeting);

        session.turn_count = 1;
        assert_eq!(session.phase(3), CallPhase::Engaged);

        session.turn_count = 2;
        assert_eq!(session.phase(3), CallPhase::Closing);

        session.mark_terminated(CallOutcome::MaxTurns, "Bye.", Utc::now());
        assert_eq!(session.phase(3), CallPhase::Terminated);
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&CallOutcome::CallerHangup).unwrap();
        assert_eq!(json, "\"caller_hangup\"");
        let json = serde_json::to_string(&CallOutcome::SilenceTimeout).unwrap();
        assert_eq!(json, "\"silence_timeout\"");
    }
}
