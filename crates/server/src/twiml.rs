//! TwiML rendering
//!
//! Serializes engine decisions into the voice-response documents Twilio
//! expects: either "speak this, then gather more speech" or "speak
//! this, then hang up". The trailing `<Redirect>` after a gather makes
//! a silent cycle produce a callback with no `SpeechResult`, which the
//! engine interprets as silence.

/// Spoken when a callback cannot even be attributed to a call
pub const INVALID_REQUEST_GOODBYE: &str =
    "I'm sorry, something seems to be wrong with the line. Goodbye.";

/// Speak a prompt, then gather speech with a bounded timeout
pub fn gather_speech(
    prompt: &str,
    voice: &str,
    action: &str,
    timeout_seconds: u32,
    max_speech_seconds: u32,
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Gather input="speech" timeout="{timeout}" speechTimeout="auto" maxSpeechTime="{max_speech}" action="{action}" method="POST">
        <Say voice="{voice}">{prompt}</Say>
    </Gather>
    <Redirect method="POST">{action}</Redirect>
</Response>"#,
        timeout = timeout_seconds,
        max_speech = max_speech_seconds,
        action = escape_text(action),
        voice = escape_text(voice),
        prompt = escape_text(prompt),
    )
}

/// Speak a closing line, then terminate the call
pub fn say_hangup(prompt: &str, voice: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Say voice="{voice}">{prompt}</Say>
    <Hangup/>
</Response>"#,
        voice = escape_text(voice),
        prompt = escape_text(prompt),
    )
}

/// Escape the XML-reserved characters
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
