//! Engine input/output contracts
//!
//! The webhook adapter translates platform callbacks into
//! [`CallbackInput`] and renders [`EngineDecision`] back into the
//! transport's response markup. Nothing in these types is
//! transport-specific.

use serde::{Deserialize, Serialize};

use crate::session::CallOutcome;

/// One inbound callback, normalized by the webhook adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackInput {
    /// Platform session identifier
    pub session_id: String,
    /// Caller-presented number, absent when withheld
    #[serde(default)]
    pub caller_id: Option<String>,
    /// Recognized speech, absent when the gather cycle timed out
    #[serde(default)]
    pub recognized_speech: Option<String>,
    /// Recognizer confidence for the utterance, when reported
    #[serde(default)]
    pub speech_confidence: Option<f64>,
    /// True for the very first callback of a call
    #[serde(default)]
    pub is_initial_contact: bool,
}

impl CallbackInput {
    /// Recognized speech with whitespace-only results treated as silence
    pub fn speech(&self) -> Option<&str> {
        self.recognized_speech
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// What to speak next and whether the call continues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineDecision {
    /// Non-empty plain text safe for speech synthesis
    pub prompt_text: String,
    /// False exactly when the outcome is terminal
    pub continue_call: bool,
    /// Session outcome as of this callback
    pub outcome: CallOutcome,
}

impl EngineDecision {
    /// Decision that keeps the call going
    pub fn speak(prompt_text: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            continue_call: true,
            outcome: CallOutcome::InProgress,
        }
    }

    /// Decision that speaks a closing line and ends the call
    pub fn hang_up(prompt_text: impl Into<String>, outcome: CallOutcome) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            continue_call: false,
            outcome,
        }
    }
}
