//! Phrase bank
//!
//! Static pools of stalling utterances and closing lines. Pure data: the
//! engine decides when to draw from which pool. A generative model could
//! replace these behind the same selection interface without touching
//! the state machine.

/// Opening lines for a brand-new call
const GREETINGS: &[&str] = &[
    "Hello? Sorry, who is this?",
    "Hello? Are you there?",
];

/// Stall tactic responses - vary these to keep conversation natural
const STALL_RESPONSES: &[&str] = &[
    "Oh, I see. Hmm, let me think about that for a moment. Could you say that again?",
    "Right, right. I think I follow. Just give me a second here.",
    "Interesting. I'm not quite sure I understand. What did you mean by that?",
    "Hold on, I'm looking for something. What were you saying?",
    "I'm sorry, my mind wandered for a moment. Could you repeat that?",
    "Hmm, that's a good question. Let me think about it.",
    "I see, I see. And what was the other thing you mentioned?",
    "Oh my. That sounds complicated. Can you explain it again?",
    "Right. I think I need to check on something. Go on.",
    "Mm-hmm. I'm listening. Please continue.",
];

/// Prompts for a gather cycle that produced no speech
const REENGAGEMENTS: &[&str] = &[
    "Hello? Are you still there?",
    "I can barely hear you.",
];

/// Sign-offs for a call that hit the turn ceiling
const WRAPUPS: &[&str] = &[
    "Oh, would you look at the time. I really must run. Goodbye now.",
    "Anyway, someone's at the door. I have to go. Take care. Goodbye.",
];

/// Exit line when nobody ever spoke
const NO_CONTACT_GOODBYE: &str = "I'm sorry, I can't hear anyone. Goodbye.";

/// Exit line when the caller went quiet mid-conversation
const IDLE_GOODBYE: &str = "Well, it was nice talking to you. Take care now. Goodbye.";

/// Pools of pre-authored utterances
#[derive(Debug, Clone)]
pub struct PhraseBank {
    /// Opening lines for the first gather cycle
    pub greetings: Vec<String>,
    /// Mid-conversation stalling responses
    pub stalls: Vec<String>,
    /// Re-engagement prompts after a silent cycle
    pub reengagements: Vec<String>,
    /// Sign-offs when the turn ceiling is reached
    pub wrapups: Vec<String>,
    /// Goodbye when no speech was ever recognized
    pub no_contact_goodbye: String,
    /// Goodbye when the caller went quiet after talking
    pub idle_goodbye: String,
}

impl Default for PhraseBank {
    fn default() -> Self {
        let to_owned = |pool: &[&str]| pool.iter().map(|s| (*s).to_string()).collect();
        Self {
            greetings: to_owned(GREETINGS),
            stalls: to_owned(STALL_RESPONSES),
            reengagements: to_owned(REENGAGEMENTS),
            wrapups: to_owned(WRAPUPS),
            no_contact_goodbye: NO_CONTACT_GOODBYE.to_string(),
            idle_goodbye: IDLE_GOODBYE.to_string(),
        }
    }
}

impl PhraseBank {
    /// Closing line for a silence exit
    ///
    /// Callers who never said anything get the "can't hear anyone" line;
    /// callers who talked first get the warmer sign-off.
    pub fn silence_goodbye(&self, turn_count: u32) -> &str {
        if turn_count == 0 {
            &self.no_contact_goodbye
        } else {
            &self.idle_goodbye
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pools_are_populated() {
        let bank = PhraseBank::default();
        assert!(!bank.greetings.is_empty());
        assert!(bank.stalls.len() >= 10);
        assert!(!bank.reengagements.is_empty());
        assert!(!bank.wrapups.is_empty());
    }

    #[test]
    fn test_silence_goodbye_depends_on_turns() {
        let bank = PhraseBank::default();
        assert_eq!(bank.silence_goodbye(0), NO_CONTACT_GOODBYE);
        assert_eq!(bank.silence_goodbye(3), IDLE_GOODBYE);
    }

    #[test]
    fn test_phrases_are_speakable_plain_text() {
        let bank = PhraseBank::default();
        for phrase in bank.greetings.iter().chain(&bank.stalls).chain(&bank.reengagements) {
            assert!(!phrase.trim().is_empty());
            assert!(!phrase.contains('<'));
        }
    }
}
