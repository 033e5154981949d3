//! Player session tracking across reconnects.
//!
//! A session is keyed by the durable `user_id`, not the socket: a player
//! who drops and reconnects keeps the same session with a fresh socket id.
//! Session persistence is best-effort. A failing session store degrades
//! gracefully: lookups fall back to the in-memory map and writes are
//! logged and dropped, so gameplay never stalls on the store.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::store::SessionStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSession {
    pub user_id: String,
    /// Identity-provider session id presented at authentication
    pub user_session_id: String,
    pub name: String,
    pub email: String,
    /// Socket currently attached to this session, if connected
    pub current_socket_id: Option<Uuid>,
    pub client_ip: String,
    /// Unix seconds of the last activity on this session
    pub last_seen: u64,
    pub is_active: bool,
}

impl PlayerSession {
    pub fn new(user_id: &str, user_session_id: &str, name: &str, email: &str, client_ip: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            user_session_id: user_session_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            current_socket_id: None,
            client_ip: client_ip.to_string(),
            last_seen: now_secs(),
            is_active: true,
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// In-memory session registry backed by a best-effort store.
pub struct SessionManager {
    sessions: DashMap<String, PlayerSession>,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions: DashMap::new(),
            store,
        }
    }

    /// Fetch or create the session for a user, refreshing its identity
    /// fields and activity timestamp. Never fails: store errors are
    /// logged and the in-memory session is used as-is.
    pub fn get_player_session(
        &self,
        user_id: &str,
        user_session_id: &str,
        name: &str,
        email: &str,
        client_ip: &str,
    ) -> PlayerSession {
        let mut session = match self.sessions.get(user_id) {
            Some(existing) => existing.clone(),
            None => match self.store.find_by_user_id(user_id) {
                Ok(Some(stored)) => stored,
                Ok(None) => PlayerSession::new(user_id, user_session_id, name, email, client_ip),
                Err(e) => {
                    warn!(user_id, error = %e, "session lookup failed, creating fresh session");
                    PlayerSession::new(user_id, user_session_id, name, email, client_ip)
                }
            },
        };

        session.user_session_id = user_session_id.to_string();
        session.name = name.to_string();
        session.email = email.to_string();
        session.client_ip = client_ip.to_string();
        session.last_seen = now_secs();
        session.is_active = true;

        self.persist(&session);
        self.sessions.insert(user_id.to_string(), session.clone());
        session
    }

    /// Attach a socket to a user's session, materializing the session if
    /// this user has not authenticated through this process before.
    pub fn update_player_socket(&self, user_id: &str, socket_id: Uuid) {
        let mut entry = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| PlayerSession::new(user_id, "", "", "", "unknown"));
        entry.current_socket_id = Some(socket_id);
        entry.last_seen = now_secs();
        entry.is_active = true;
        let session = entry.clone();
        drop(entry);
        self.persist(&session);
    }

    /// The socket currently attached to a user, for targeted sends.
    pub fn socket_for(&self, user_id: &str) -> Option<Uuid> {
        self.sessions
            .get(user_id)
            .and_then(|s| s.current_socket_id)
    }

    /// Mark a session inactive on disconnect. Only clears the socket if
    /// the disconnecting socket is still the attached one, so a quick
    /// reconnect is not clobbered by the old connection's teardown.
    pub fn mark_inactive(&self, user_id: &str, socket_id: Uuid) {
        let session = match self.sessions.get_mut(user_id) {
            Some(mut entry) => {
                if entry.current_socket_id != Some(socket_id) {
                    return;
                }
                entry.current_socket_id = None;
                entry.is_active = false;
                entry.last_seen = now_secs();
                entry.clone()
            }
            None => return,
        };
        self.persist(&session);
    }

    pub fn active_sessions(&self) -> Vec<PlayerSession> {
        self.sessions
            .iter()
            .filter(|s| s.is_active)
            .map(|s| s.clone())
            .collect()
    }

    fn persist(&self, session: &PlayerSession) {
        if let Err(e) = self.store.upsert(session) {
            warn!(user_id = %session.user_id, error = %e, "failed to persist session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};

    struct FailingStore;

    impl SessionStore for FailingStore {
        fn find_by_user_id(&self, _user_id: &str) -> Result<Option<PlayerSession>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn upsert(&self, _session: &PlayerSession) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn find_active(&self) -> Result<Vec<PlayerSession>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_session_is_created_and_reused() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        let first = manager.get_player_session("u1", "s1", "Ana", "ana@example.com", "10.0.0.1");
        assert!(first.is_active);
        assert_eq!(first.client_ip, "10.0.0.1");

        // Same user from a new address refreshes the same session
        let second = manager.get_player_session("u1", "s2", "Ana", "ana@example.com", "10.0.0.2");
        assert_eq!(second.user_id, "u1");
        assert_eq!(second.user_session_id, "s2");
        assert_eq!(second.client_ip, "10.0.0.2");
        assert_eq!(manager.active_sessions().len(), 1);
    }

    #[test]
    fn test_socket_attach_and_detach() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        manager.get_player_session("u1", "s1", "Ana", "", "unknown");

        let socket = Uuid::new_v4();
        manager.update_player_socket("u1", socket);
        assert_eq!(manager.socket_for("u1"), Some(socket));

        manager.mark_inactive("u1", socket);
        assert_eq!(manager.socket_for("u1"), None);
        assert!(manager.active_sessions().is_empty());
    }

    #[test]
    fn test_stale_disconnect_does_not_clobber_reconnect() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        let old_socket = Uuid::new_v4();
        let new_socket = Uuid::new_v4();

        manager.update_player_socket("u1", old_socket);
        manager.update_player_socket("u1", new_socket);
        // Teardown of the old connection arrives after the reconnect
        manager.mark_inactive("u1", old_socket);

        assert_eq!(manager.socket_for("u1"), Some(new_socket));
        assert_eq!(manager.active_sessions().len(), 1);
    }

    #[test]
    fn test_failing_store_degrades_gracefully() {
        let manager = SessionManager::new(Arc::new(FailingStore));
        let session = manager.get_player_session("u1", "s1", "Ana", "", "unknown");
        assert!(session.is_active);

        let socket = Uuid::new_v4();
        manager.update_player_socket("u1", socket);
        assert_eq!(manager.socket_for("u1"), Some(socket));

        manager.mark_inactive("u1", socket);
        assert!(manager.active_sessions().is_empty());
    }

    #[test]
    fn test_socket_attach_materializes_unknown_session() {
        let manager = SessionManager::new(Arc::new(MemoryStore::new()));
        let socket = Uuid::new_v4();
        manager.update_player_socket("ghost", socket);
        assert_eq!(manager.socket_for("ghost"), Some(socket));
    }
}
