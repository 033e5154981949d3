//! Per-room turn locks.
//!
//! A turn lock serializes mutating actions against one room within this
//! process. Entries self-expire after 30 seconds so a holder that crashed
//! or disconnected mid-action cannot wedge the room; expiry is the sole
//! timeout mechanism. There is no cross-process guarantee: a room's
//! authoritative state lives in one process at a time.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Age beyond which a lock entry is stale. The comparison is strict:
/// a lock aged exactly 30s is still live.
pub const TURN_LOCK_EXPIRY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TurnLock {
    /// Socket id of the holder
    pub holder: String,
    pub acquired: Instant,
}

impl TurnLock {
    fn new(holder: &str) -> Self {
        Self {
            holder: holder.to_string(),
            acquired: Instant::now(),
        }
    }

    fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    fn is_stale_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.acquired) > TURN_LOCK_EXPIRY
    }
}

/// Process-local mutual-exclusion gate, keyed by room code.
#[derive(Debug, Default)]
pub struct TurnLockManager {
    locks: DashMap<String, TurnLock>,
}

impl TurnLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock for a room. Succeeds when no live entry
    /// exists, when the existing entry is stale (silently replaced), or
    /// when the caller already holds it (idempotent reacquire, refreshing
    /// the timestamp). Fails without mutating anything when a live entry
    /// from a different holder exists.
    pub fn acquire(&self, room_code: &str, holder: &str) -> bool {
        match self.locks.entry(room_code.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(TurnLock::new(holder));
                true
            }
            Entry::Occupied(mut entry) => {
                let lock = entry.get();
                if lock.holder == holder || lock.is_stale() {
                    entry.insert(TurnLock::new(holder));
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Release the lock, but only if `holder` still owns it. A mismatched
    /// release is a silent no-op.
    pub fn release(&self, room_code: &str, holder: &str) {
        self.locks
            .remove_if(room_code, |_, lock| lock.holder == holder);
    }

    #[cfg(test)]
    fn insert_aged(&self, room_code: &str, holder: &str, age: Duration) {
        self.locks.insert(
            room_code.to_string(),
            TurnLock {
                holder: holder.to_string(),
                acquired: Instant::now().checked_sub(age).unwrap(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_excludes_other_holders() {
        let locks = TurnLockManager::new();
        assert!(locks.acquire("ROOM01", "sock-a"));
        assert!(!locks.acquire("ROOM01", "sock-b"));

        locks.release("ROOM01", "sock-a");
        assert!(locks.acquire("ROOM01", "sock-b"));
    }

    #[test]
    fn test_reacquire_by_same_holder_is_idempotent() {
        let locks = TurnLockManager::new();
        assert!(locks.acquire("ROOM01", "sock-a"));
        assert!(locks.acquire("ROOM01", "sock-a"));
        assert!(!locks.acquire("ROOM01", "sock-b"));
    }

    #[test]
    fn test_different_rooms_are_independent() {
        let locks = TurnLockManager::new();
        assert!(locks.acquire("ROOM01", "sock-a"));
        assert!(locks.acquire("ROOM02", "sock-a"));
        assert!(locks.acquire("ROOM03", "sock-b"));
    }

    #[test]
    fn test_staleness_boundary_is_strict() {
        let lock = TurnLock::new("sock-a");
        let boundary = lock.acquired + TURN_LOCK_EXPIRY;
        // At exactly the expiry age the lock is still held
        assert!(!lock.is_stale_at(boundary));
        assert!(lock.is_stale_at(boundary + Duration::from_nanos(1)));
        assert!(!lock.is_stale_at(lock.acquired));
    }

    #[test]
    fn test_stale_lock_is_silently_replaced() {
        let locks = TurnLockManager::new();
        locks.insert_aged(
            "ROOM01",
            "sock-a",
            TURN_LOCK_EXPIRY + Duration::from_millis(1),
        );
        assert!(locks.acquire("ROOM01", "sock-b"));
        // The replacement is now live and owned by sock-b
        assert!(!locks.acquire("ROOM01", "sock-a"));
    }

    #[test]
    fn test_mismatched_release_is_a_no_op() {
        let locks = TurnLockManager::new();
        assert!(locks.acquire("ROOM01", "sock-a"));
        locks.release("ROOM01", "sock-b");
        assert!(!locks.acquire("ROOM01", "sock-b"));
        locks.release("ROOM01", "sock-a");
        assert!(locks.acquire("ROOM01", "sock-b"));
    }

    #[test]
    fn test_release_of_unknown_room_is_a_no_op() {
        let locks = TurnLockManager::new();
        locks.release("NOROOM", "sock-a");
        assert!(locks.acquire("NOROOM", "sock-a"));
    }
}
