//! Shield protection state machine.
//!
//! At most one shield is active per room at a time. That invariant is
//! structural: the room carries a single `ShieldState` slot with an owner
//! field rather than a per-player map. Activation while another player's
//! shield is active is always rejected, regardless of whose turn it is.

use serde::{Deserialize, Serialize};

/// Turns a fresh (or reinforced) shield protects for
pub const SHIELD_DURATION_TURNS: u32 = 3;

/// The room's shield slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ShieldState {
    #[default]
    Inactive,
    Active {
        /// Durable user id of the protected player
        owner: String,
        remaining_turns: u32,
        /// Turn count at activation time
        activated_turn: u32,
    },
}

/// Result of a successful activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShieldOutcome {
    /// True when the owner topped up an already-active shield
    pub reinforced: bool,
    pub remaining_turns: u32,
}

impl ShieldState {
    pub fn is_active(&self) -> bool {
        matches!(self, ShieldState::Active { remaining_turns, .. } if *remaining_turns > 0)
    }

    pub fn active_owner(&self) -> Option<&str> {
        match self {
            ShieldState::Active {
                owner,
                remaining_turns,
                ..
            } if *remaining_turns > 0 => Some(owner),
            _ => None,
        }
    }

    pub fn remaining_turns(&self) -> u32 {
        match self {
            ShieldState::Active {
                remaining_turns, ..
            } => *remaining_turns,
            ShieldState::Inactive => 0,
        }
    }

    /// Whether the given player is currently protected.
    pub fn protects_player(&self, user_id: &str) -> bool {
        self.active_owner() == Some(user_id)
    }

    /// Activate a fresh shield or reinforce one's own active shield.
    ///
    /// Reinforcement tops remaining turns back up to
    /// [`SHIELD_DURATION_TURNS`] regardless of the pre-reinforce remainder.
    /// On conflict (another player's shield is active) the error carries
    /// that shield's remaining-turns count.
    pub fn activate(&mut self, user_id: &str, turn_count: u32) -> Result<ShieldOutcome, u32> {
        match self {
            ShieldState::Active {
                owner,
                remaining_turns,
                ..
            } if *remaining_turns > 0 => {
                if owner != user_id {
                    return Err(*remaining_turns);
                }
                *remaining_turns = SHIELD_DURATION_TURNS;
                Ok(ShieldOutcome {
                    reinforced: true,
                    remaining_turns: SHIELD_DURATION_TURNS,
                })
            }
            _ => {
                *self = ShieldState::Active {
                    owner: user_id.to_string(),
                    remaining_turns: SHIELD_DURATION_TURNS,
                    activated_turn: turn_count,
                };
                Ok(ShieldOutcome {
                    reinforced: false,
                    remaining_turns: SHIELD_DURATION_TURNS,
                })
            }
        }
    }

    /// Expiry step, invoked once per turn transition. Decrements the
    /// remaining turns; a shield that reaches zero is dropped entirely.
    pub fn tick(&mut self) {
        if let ShieldState::Active {
            remaining_turns, ..
        } = self
        {
            *remaining_turns = remaining_turns.saturating_sub(1);
            if *remaining_turns == 0 {
                *self = ShieldState::Inactive;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_activation() {
        let mut shield = ShieldState::default();
        let outcome = shield.activate("p1", 1).unwrap();
        assert!(!outcome.reinforced);
        assert_eq!(outcome.remaining_turns, SHIELD_DURATION_TURNS);
        assert!(shield.protects_player("p1"));
        assert!(!shield.protects_player("p2"));
    }

    #[test]
    fn test_activation_blocked_by_other_owner() {
        let mut shield = ShieldState::default();
        shield.activate("p1", 1).unwrap();
        shield.tick();
        // Error carries the blocking shield's remaining turns
        assert_eq!(shield.activate("p2", 2), Err(SHIELD_DURATION_TURNS - 1));
        assert!(shield.protects_player("p1"));
    }

    #[test]
    fn test_reinforce_tops_up_to_full() {
        let mut shield = ShieldState::default();
        shield.activate("p1", 1).unwrap();
        shield.tick();
        shield.tick();
        assert_eq!(shield.remaining_turns(), 1);

        let outcome = shield.activate("p1", 3).unwrap();
        assert!(outcome.reinforced);
        assert_eq!(shield.remaining_turns(), SHIELD_DURATION_TURNS);
    }

    #[test]
    fn test_tick_expires_to_inactive() {
        let mut shield = ShieldState::default();
        shield.activate("p1", 1).unwrap();
        shield.tick();
        shield.tick();
        assert!(shield.is_active());
        shield.tick();
        assert_eq!(shield, ShieldState::Inactive);
        assert!(!shield.protects_player("p1"));
        // Ticking an inactive shield is a no-op
        shield.tick();
        assert_eq!(shield, ShieldState::Inactive);
    }

    #[test]
    fn test_activation_after_expiry_succeeds_for_other_player() {
        let mut shield = ShieldState::default();
        shield.activate("p1", 1).unwrap();
        for _ in 0..SHIELD_DURATION_TURNS {
            shield.tick();
        }
        let outcome = shield.activate("p2", 4).unwrap();
        assert!(!outcome.reinforced);
        assert!(shield.protects_player("p2"));
    }
}
