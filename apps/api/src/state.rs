use std::sync::Arc;

use crate::events::EventBus;
use crate::session::manager::SessionManager;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    /// Read side of the bus for the events endpoint.
    pub events: Arc<EventBus>,
}
