//! Cards and draw piles.
//!
//! Cards are a closed tagged union: heart cards carry a color and a face
//! value, magic cards carry one of three kinds (Wind, Recycle, Shield).
//! Draw piles only track a remaining count; the concrete card is generated
//! at draw time.

use crate::board::HeartColor;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Heart draw pile size at game start
pub const HEART_DECK_SIZE: u32 = 16;

/// Magic draw pile size at game start
pub const MAGIC_DECK_SIZE: u32 = 8;

/// Heart cards dealt to each player at game start
pub const STARTING_HEARTS: usize = 3;

/// Magic cards dealt to each player at game start
pub const STARTING_MAGIC: usize = 1;

/// Magic card kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MagicKind {
    /// Remove an opponent's placed heart
    Wind,
    /// Recolor an empty, non-white tile
    Recycle,
    /// Temporary protection against Wind and Recycle
    Shield,
}

impl MagicKind {
    pub const ALL: [MagicKind; 3] = [MagicKind::Wind, MagicKind::Recycle, MagicKind::Shield];

    /// Pick a uniformly random magic kind
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&MagicKind::Shield)
    }
}

/// A card in a player's hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Card {
    Heart {
        id: String,
        color: HeartColor,
        /// Face value (1..=3)
        value: u8,
    },
    Magic {
        id: String,
        kind: MagicKind,
    },
}

impl Card {
    pub fn id(&self) -> &str {
        match self {
            Card::Heart { id, .. } => id,
            Card::Magic { id, .. } => id,
        }
    }

    /// Generate a random heart card (color and value 1..=3)
    pub fn random_heart<R: Rng>(rng: &mut R) -> Self {
        Card::Heart {
            id: format!("heart-{:08x}", rng.gen::<u32>()),
            color: HeartColor::random(rng),
            value: rng.gen_range(1..=3),
        }
    }

    /// Generate a random magic card
    pub fn random_magic<R: Rng>(rng: &mut R) -> Self {
        Card::Magic {
            id: format!("magic-{:08x}", rng.gen::<u32>()),
            kind: MagicKind::random(rng),
        }
    }
}

/// A draw pile. Only the remaining count is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub cards: u32,
}

impl Deck {
    pub fn new(cards: u32) -> Self {
        Self { cards }
    }

    pub fn is_empty(&self) -> bool {
        self.cards == 0
    }

    /// Take one card off the pile. Returns false when the pile is empty.
    pub fn draw(&mut self) -> bool {
        if self.cards == 0 {
            return false;
        }
        self.cards -= 1;
        true
    }
}
