use std::sync::Arc;

use crate::config::AuthConfig;
use crate::realtime::{ConnectionRegistry, SessionProtocolHandler};
use crate::session::SessionManager;
use crate::store::AttendanceStore;

/// Shared services handed to every route
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthConfig>,
    pub store: Arc<dyn AttendanceStore>,
    pub sessions: Arc<SessionManager>,
    pub live: Arc<SessionProtocolHandler>,
}

impl AppState {
    pub fn new(auth: AuthConfig, store: Arc<dyn AttendanceStore>) -> Self {
        let sessions = SessionManager::new();
        let live = Arc::new(SessionProtocolHandler::new(
            sessions.clone(),
            store.clone(),
            ConnectionRegistry::new(),
        ));

        Self {
            auth: Arc::new(auth),
            store,
            sessions,
            live,
        }
    }
}
