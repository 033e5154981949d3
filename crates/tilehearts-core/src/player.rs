//! Player state and per-turn action counters.

use serde::{Deserialize, Serialize};

/// Maximum heart placements per turn
pub const MAX_HEARTS_PER_TURN: u32 = 2;

/// Maximum magic card uses per turn
pub const MAX_MAGIC_PER_TURN: u32 = 1;

/// A player inside a room. The durable key is `user_id`; transient
/// connection ids are tracked in session state, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub is_ready: bool,
    pub score: i32,
    /// Unix timestamp (ms) of when the player joined the room
    pub joined_at: u64,
}

impl Player {
    pub fn new(user_id: String, name: String, email: String, joined_at: u64) -> Self {
        Self {
            user_id,
            name,
            email,
            is_ready: false,
            score: 0,
            joined_at,
        }
    }
}

/// Per-turn action budget. Reset on every turn transition.
///
/// A turn is bounded to at most 1 heart-deck draw, 1 magic-deck draw,
/// 2 heart placements, and 1 magic-card use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounters {
    pub drawn_heart: bool,
    pub drawn_magic: bool,
    pub hearts_placed: u32,
    pub magic_cards_used: u32,
}

impl ActionCounters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_defaults() {
        let player = Player::new("u1".into(), "Ana".into(), "ana@example.com".into(), 1000);
        assert_eq!(player.score, 0);
        assert!(!player.is_ready);
        assert_eq!(player.joined_at, 1000);
    }

    #[test]
    fn test_counters_reset() {
        let mut counters = ActionCounters {
            drawn_heart: true,
            drawn_magic: true,
            hearts_placed: 2,
            magic_cards_used: 1,
        };
        counters.reset();
        assert_eq!(counters, ActionCounters::default());
    }
}
