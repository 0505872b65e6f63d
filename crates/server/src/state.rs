//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use please_hold_config::Settings;
use please_hold_engine::ConversationEngine;
use please_hold_stats::StatsAggregator;
use please_hold_store::SessionStore;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<Settings>,
    /// Call session store
    pub store: Arc<SessionStore>,
    /// Conversation engine
    pub engine: Arc<ConversationEngine>,
    /// Stats aggregator
    pub stats: Arc<StatsAggregator>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Settings) -> Self {
        let store = Arc::new(SessionStore::new());
        let engine = Arc::new(ConversationEngine::new(
            Arc::clone(&store),
            config.engine.clone(),
        ));
        let stats = Arc::new(StatsAggregator::new(
            Arc::clone(&store),
            config.stats.clone(),
        ));
        Self {
            config: Arc::new(config),
            store,
            engine,
            stats,
        }
    }
}
