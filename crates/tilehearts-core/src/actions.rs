//! Game actions and the events they produce.

use crate::board::{HeartColor, TileColor};
use crate::cards::Card;
use crate::score::EndReason;
use serde::{Deserialize, Serialize};

/// All actions a player can take during their turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GameAction {
    /// Place a heart card from hand onto an empty tile
    PlaceHeart { tile_id: u8, card_id: String },

    /// Play a magic card; Wind and Recycle require a target tile
    UseMagic {
        card_id: String,
        target_tile: Option<u8>,
    },

    /// Draw one card from the heart deck
    DrawHeart,

    /// Draw one card from the magic deck
    DrawMagic,

    /// End the turn, handing over to the opponent
    EndTurn,
}

/// Which draw pile a card came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeckKind {
    Heart,
    Magic,
}

/// Events that result from applied actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GameEvent {
    /// A heart was placed and scored
    HeartPlaced {
        user_id: String,
        tile_id: u8,
        color: HeartColor,
        value: u8,
        score: i32,
    },

    /// A Wind card removed an opponent's heart
    HeartRemoved {
        user_id: String,
        tile_id: u8,
        removed_from: String,
        value: u8,
        /// Points reversed from the former owner (the recorded award)
        score: i32,
    },

    /// A Recycle card recolored an empty tile
    TileRecycled {
        user_id: String,
        tile_id: u8,
        old_color: TileColor,
        new_color: TileColor,
    },

    /// A Shield was activated or reinforced
    ShieldActivated {
        user_id: String,
        reinforced: bool,
        remaining_turns: u32,
    },

    /// A card was drawn from a deck
    CardDrawn {
        user_id: String,
        deck: DeckKind,
        card: Card,
        cards_remaining: u32,
    },

    /// The turn passed to the opponent
    TurnEnded {
        user_id: String,
        next_player: String,
        turn_count: u32,
    },

    /// The match is over
    GameEnded {
        reason: EndReason,
        winner: Option<String>,
        is_tie: bool,
    },
}
