//! please-hold webhook server
//!
//! The adapter between the telephony platform and the conversation
//! engine: receives Twilio voice webhooks, invokes the engine, and
//! renders its decisions as TwiML. Also serves the dashboard stats
//! endpoint and Prometheus metrics.

pub mod http;
pub mod metrics;
pub mod state;
pub mod twiml;

pub use http::create_router;
pub use metrics::init_metrics;
pub use state::AppState;
