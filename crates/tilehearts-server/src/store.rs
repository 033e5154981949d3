//! Room and session store contracts.
//!
//! The engine prefers availability over consistency when the store is
//! unreachable: every write site logs and swallows `StoreError`, and the
//! in-memory state stays authoritative until the next successful write.
//! Room documents read back from a store are JSON and must pass the shape
//! checks in `tilehearts_core::validate` before deserialization.

use crate::session::PlayerSession;
use dashmap::DashMap;
use thiserror::Error;
use tilehearts_core::Room;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Durable persistence for room documents.
pub trait RoomStore: Send + Sync {
    fn find_by_code(&self, code: &str) -> Result<Option<serde_json::Value>, StoreError>;
    fn upsert(&self, room: &Room) -> Result<(), StoreError>;
    fn delete(&self, code: &str) -> Result<(), StoreError>;
}

/// Durable persistence for player sessions.
pub trait SessionStore: Send + Sync {
    fn find_by_user_id(&self, user_id: &str) -> Result<Option<PlayerSession>, StoreError>;
    fn upsert(&self, session: &PlayerSession) -> Result<(), StoreError>;
    fn find_active(&self) -> Result<Vec<PlayerSession>, StoreError>;
}

/// In-process store backing both contracts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: DashMap<String, serde_json::Value>,
    sessions: DashMap<String, PlayerSession>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for MemoryStore {
    fn find_by_code(&self, code: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.rooms.get(code).map(|doc| doc.clone()))
    }

    fn upsert(&self, room: &Room) -> Result<(), StoreError> {
        let doc = serde_json::to_value(room)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.rooms.insert(room.code.clone(), doc);
        Ok(())
    }

    fn delete(&self, code: &str) -> Result<(), StoreError> {
        self.rooms.remove(code);
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    fn find_by_user_id(&self, user_id: &str) -> Result<Option<PlayerSession>, StoreError> {
        Ok(self.sessions.get(user_id).map(|s| s.clone()))
    }

    fn upsert(&self, session: &PlayerSession) -> Result<(), StoreError> {
        self.sessions
            .insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    fn find_active(&self) -> Result<Vec<PlayerSession>, StoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.is_active)
            .map(|s| s.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tilehearts_core::validate_room_document;

    #[test]
    fn test_room_roundtrip_passes_document_validation() {
        let store = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut room = Room::new("ABC123".to_string(), &mut rng);
        room.add_player("u1", "Ana", "", 0).unwrap();

        RoomStore::upsert(&store, &room).unwrap();
        let doc = store.find_by_code("ABC123").unwrap().unwrap();
        assert!(validate_room_document(&doc).valid);

        let loaded: Room = serde_json::from_value(doc).unwrap();
        assert_eq!(loaded.code, "ABC123");
        assert_eq!(loaded.player_count(), 1);

        store.delete("ABC123").unwrap();
        assert!(store.find_by_code("ABC123").unwrap().is_none());
    }

    #[test]
    fn test_session_store_tracks_active() {
        let store = MemoryStore::new();
        let mut session = PlayerSession::new("u1", "sess-1", "Ana", "ana@example.com", "unknown");
        SessionStore::upsert(&store, &session).unwrap();
        assert_eq!(store.find_active().unwrap().len(), 1);

        session.is_active = false;
        SessionStore::upsert(&store, &session).unwrap();
        assert!(store.find_active().unwrap().is_empty());
        assert!(store.find_by_user_id("u1").unwrap().is_some());
        assert!(store.find_by_user_id("u2").unwrap().is_none());
    }
}
