//! Shared application state.

use std::time::Instant;

use dashmap::DashMap;

use crate::config::BridgeConfig;
use crate::core::session::SessionState;

/// Bookkeeping entry for one live session.
///
/// The registry exists for observability only; no component interacts with
/// another session through it.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Lifecycle state
    pub state: SessionState,
    /// When the media stream handshake completed
    pub started_at: Instant,
}

/// Application state shared across handlers.
pub struct AppState {
    /// Server configuration
    pub config: BridgeConfig,
    /// HTTP client for telephony REST dial-out
    pub http: reqwest::Client,
    /// Live sessions keyed by stream id; inserted at handshake, removed at
    /// teardown
    pub sessions: DashMap<String, SessionEntry>,
}

impl AppState {
    /// Create application state from configuration.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            sessions: DashMap::new(),
        }
    }

    /// Record a session entering a lifecycle state.
    pub fn set_session_state(&self, stream_id: &str, state: SessionState) {
        if let Some(mut entry) = self.sessions.get_mut(stream_id) {
            entry.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_insert_and_remove() {
        let state = AppState::new(BridgeConfig::default());

        state.sessions.insert(
            "MZ1".to_string(),
            SessionEntry {
                state: SessionState::Connecting,
                started_at: Instant::now(),
            },
        );
        assert_eq!(state.sessions.len(), 1);

        state.set_session_state("MZ1", SessionState::Active);
        assert_eq!(
            state.sessions.get("MZ1").unwrap().state,
            SessionState::Active
        );

        state.sessions.remove("MZ1");
        assert!(state.sessions.is_empty());
    }
}
