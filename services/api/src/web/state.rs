//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use insight_core::ports::{DatabaseService, MessagingService, SummarizationService};
use insight_core::{PendingRegistry, PreferenceService, SummaryQueue};
use std::sync::Arc;
use uuid::Uuid;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub summary_queue: Arc<SummaryQueue>,
    pub preferences: Arc<PreferenceService>,
}

impl AppState {
    /// Wires the core services on top of the given adapters.
    ///
    /// The pending-request registry is created here and owned by the one
    /// `SummaryQueue` every handler shares.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        summarizer: Arc<dyn SummarizationService>,
        messenger: Arc<dyn MessagingService>,
    ) -> Self {
        let pending = match config
            .pending_ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
        {
            Some(ttl) => PendingRegistry::with_ttl(ttl),
            None => PendingRegistry::new(),
        };
        let summary_queue = Arc::new(SummaryQueue::new(
            pending,
            db.clone(),
            summarizer,
            messenger,
        ));
        let preferences = Arc::new(PreferenceService::new(db.clone(), summary_queue.clone()));

        Self {
            db,
            config,
            summary_queue,
            preferences,
        }
    }
}

/// The user resolved from the session cookie by `require_auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);
