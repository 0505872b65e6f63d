//! Conversation engine for please-hold
//!
//! The per-call state machine: given a session and one callback's input,
//! decide what to say next, whether the call ends, and how it is
//! classified. Synchronous by design -- speech recognition and synthesis
//! happen on the telephony platform before and after the engine runs.

pub mod engine;
pub mod phrases;
pub mod rng;

pub use engine::ConversationEngine;
pub use phrases::PhraseBank;
pub use rng::{RandomSource, ThreadRngSource};

use thiserror::Error;

/// Engine errors
///
/// None of these escape to the webhook adapter: every callback still
/// receives a valid decision, with internal faults surfaced as the
/// `error` outcome.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid callback payload: {0}")]
    InvalidInput(String),

    #[error("Phrase pool is empty: {0}")]
    EmptyPhrasePool(&'static str),

    #[error("Internal fault: {0}")]
    Internal(String),
}

impl From<please_hold_store::StoreError> for EngineError {
    fn from(err: please_hold_store::StoreError) -> Self {
        match err {
            please_hold_store::StoreError::NotFound(id) => EngineError::NotFound(id),
        }
    }
}
