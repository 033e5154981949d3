//! Scoring rules and game-end evaluation.

use crate::board::{HeartColor, Tile, TileColor};
use crate::game::GameState;
use crate::player::Player;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Points for placing a heart of `color`/`value` on `tile`.
///
/// White tiles pay face value, a color match pays double, any other
/// combination pays nothing.
pub fn calculate_score(color: HeartColor, value: u8, tile: &Tile) -> i32 {
    if tile.color == TileColor::White {
        i32::from(value)
    } else if color.matches(tile.color) {
        i32::from(value) * 2
    } else {
        0
    }
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    AllTilesFilled,
    BothDecksEmpty,
    HeartDeckEmpty,
    MagicDeckEmpty,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            EndReason::AllTilesFilled => "All tiles are filled",
            EndReason::BothDecksEmpty => "Both decks are empty",
            EndReason::HeartDeckEmpty => "Heart deck is empty",
            EndReason::MagicDeckEmpty => "Magic deck is empty",
        };
        f.write_str(msg)
    }
}

/// Evaluate whether the game should end.
///
/// A full board ends the game unconditionally. Deck exhaustion only ends it
/// when `allow_grace_period` is false; mid-turn callers pass true so the
/// active player can finish their turn after emptying a deck.
pub fn check_game_end(game: &GameState, allow_grace_period: bool) -> Option<EndReason> {
    if !game.game_started {
        return None;
    }

    if game.tiles.iter().all(|tile| tile.placed_heart.is_some()) {
        return Some(EndReason::AllTilesFilled);
    }

    if allow_grace_period {
        return None;
    }

    match (game.deck.is_empty(), game.magic_deck.is_empty()) {
        (true, true) => Some(EndReason::BothDecksEmpty),
        (true, false) => Some(EndReason::HeartDeckEmpty),
        (false, true) => Some(EndReason::MagicDeckEmpty),
        (false, false) => None,
    }
}

/// Final standing once a game ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerSummary {
    /// User id of the top scorer (one of them, on a tie)
    pub winner: Option<String>,
    pub top_score: i32,
    /// True iff at least two players share the top score
    pub is_tie: bool,
}

/// Sort players by descending score; the top score wins. Ties are reported,
/// not broken.
pub fn determine_winner(players: &[Player]) -> WinnerSummary {
    let mut ranked: Vec<&Player> = players.iter().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    match ranked.first() {
        None => WinnerSummary {
            winner: None,
            top_score: 0,
            is_tie: false,
        },
        Some(top) => {
            let is_tie = ranked.iter().filter(|p| p.score == top.score).count() >= 2;
            WinnerSummary {
                winner: Some(top.user_id.clone()),
                top_score: top.score,
                is_tie,
            }
        }
    }
}
