//! HTTP Endpoints
//!
//! Twilio voice webhooks plus the dashboard stats API.

use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use please_hold_core::CallbackInput;

use crate::metrics;
use crate::state::AppState;
use crate::twiml;

/// Call statuses Twilio reports once a call is over
const TERMINAL_CALL_STATUSES: &[&str] =
    &["completed", "busy", "no-answer", "failed", "canceled"];

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_enabled = state.config.server.cors_enabled;

    let router = Router::new()
        // Twilio voice webhooks
        .route("/twilio/answer", post(twilio_answer))
        .route("/twilio/gather", post(twilio_gather))
        .route("/twilio/status", post(twilio_status))
        // Dashboard API
        .route("/api/stats", get(get_stats))
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus scrape target
        .route("/metrics", get(metrics::metrics_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Fields Twilio posts on voice webhooks
///
/// Everything is optional: a malformed or truncated payload must still
/// produce a spoken response, never a 4xx the platform turns into dead
/// air.
#[derive(Debug, Deserialize)]
pub struct TwilioVoiceForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
    #[serde(rename = "Confidence")]
    pub confidence: Option<f64>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
}

/// Initial contact: a new call just connected
async fn twilio_answer(
    State(state): State<AppState>,
    Form(form): Form<TwilioVoiceForm>,
) -> Response {
    voice_callback(&state, form, true)
}

/// Gather result: recognized speech, or silence after the timeout
async fn twilio_gather(
    State(state): State<AppState>,
    Form(form): Form<TwilioVoiceForm>,
) -> Response {
    voice_callback(&state, form, false)
}

/// Shared speech-callback path for answer and gather
fn voice_callback(state: &AppState, form: TwilioVoiceForm, is_initial_contact: bool) -> Response {
    let call_sid = match form.call_sid.as_deref().map(str::trim) {
        Some(sid) if !sid.is_empty() => sid.to_string(),
        _ => {
            tracing::warn!("Voice callback without CallSid");
            return twiml_response(twiml::say_hangup(
                twiml::INVALID_REQUEST_GOODBYE,
                &state.config.server.voice,
            ));
        }
    };

    let prior = state.store.get(&call_sid);
    let was_known = prior.is_some();
    let was_terminal = prior
        .map(|h| h.read(|s| s.is_terminal()))
        .unwrap_or(false);

    let input = CallbackInput {
        session_id: call_sid,
        caller_id: form.from,
        recognized_speech: form.speech_result,
        speech_confidence: form.confidence,
        is_initial_contact,
    };
    let decision = state.engine.handle_callback(&input);

    if !was_known {
        metrics::record_call_started();
    }
    if !was_terminal && !decision.continue_call {
        metrics::record_call_ended(decision.outcome);
    }
    metrics::record_active_calls(state.store.active_count());

    let server = &state.config.server;
    let body = if decision.continue_call {
        let action = format!("{}/twilio/gather", server.public_base_url);
        twiml::gather_speech(
            &decision.prompt_text,
            &server.voice,
            &action,
            server.gather_timeout_seconds,
            server.max_speech_seconds,
        )
    } else {
        twiml::say_hangup(&decision.prompt_text, &server.voice)
    };
    twiml_response(body)
}

/// Call status events; terminal statuses mean the remote party is gone
async fn twilio_status(
    State(state): State<AppState>,
    Form(form): Form<TwilioVoiceForm>,
) -> StatusCode {
    let Some(call_sid) = form.call_sid.as_deref().map(str::trim).filter(|s| !s.is_empty())
    else {
        tracing::warn!("Status callback without CallSid");
        return StatusCode::NO_CONTENT;
    };

    let status = form.call_status.as_deref().unwrap_or_default();
    if TERMINAL_CALL_STATUSES.contains(&status) {
        let was_terminal = state
            .store
            .get(call_sid)
            .map(|h| h.read(|s| s.is_terminal()))
            .unwrap_or(true);

        if let Some(decision) = state.engine.handle_hangup(call_sid) {
            if !was_terminal {
                metrics::record_call_ended(decision.outcome);
            }
        }
        metrics::record_active_calls(state.store.active_count());
    } else {
        tracing::debug!(call_sid = %call_sid, status = %status, "Non-terminal call status");
    }

    StatusCode::NO_CONTENT
}

/// Dashboard stats snapshot
async fn get_stats(State(state): State<AppState>) -> Json<please_hold_stats::CallStats> {
    Json(state.stats.collect())
}

/// Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "sessions": state.store.count(),
        "activeCalls": state.store.active_count(),
    }))
}

/// Wrap a TwiML document in the response Twilio expects
fn twiml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        body,
    )
        .into_response()
}
