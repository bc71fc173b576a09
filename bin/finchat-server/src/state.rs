//! Shared application state injected into every Axum handler.

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::entities::AnyStore;
use crate::llm::CompletionProvider;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Chat and finance persistence.
    pub store: Arc<AnyStore>,
    /// Generates assistant replies.
    pub completion: Arc<dyn CompletionProvider>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
