// Application state for HTTP handlers
use crate::application::session_manager::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
}
