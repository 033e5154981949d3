//! Game state container and per-turn bookkeeping.
//!
//! `GameState` owns everything inside one room's match: the board, both
//! draw piles, per-player hands and action counters, the shield slot, and
//! the denormalized current-player snapshot. Turn sequencing lives in
//! [`crate::room::Room`], which pairs this state with the player list.

use crate::board::{standard_tiles, Tile};
use crate::cards::{Card, Deck, HEART_DECK_SIZE, MAGIC_DECK_SIZE};
use crate::player::{ActionCounters, Player};
use crate::score::EndReason;
use crate::shield::ShieldState;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Rule violations. Display strings are stable and user-facing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Game not started")]
    GameNotStarted,

    #[error("Game is over")]
    GameOver,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Invalid tile")]
    InvalidTile,

    #[error("Tile already has a heart")]
    TileOccupied,

    #[error("Card not in hand")]
    CardNotInHand,

    #[error("You can only place 2 hearts per turn")]
    HeartLimitReached,

    #[error("You can only use 1 magic card per turn")]
    MagicLimitReached,

    #[error("You have already drawn a heart card this turn")]
    HeartAlreadyDrawn,

    #[error("You have already drawn a magic card this turn")]
    MagicAlreadyDrawn,

    #[error("Heart deck is empty")]
    HeartDeckEmpty,

    #[error("Magic deck is empty")]
    MagicDeckEmpty,

    #[error("Magic card requires a target tile")]
    MissingTarget,

    #[error("Invalid target for Wind card")]
    InvalidWindTarget,

    #[error("Invalid target for Recycle card")]
    InvalidRecycleTarget,

    #[error("Opponent is protected by Shield")]
    OpponentProtected,

    #[error("Tile is protected by Shield")]
    TileProtected,

    #[error("Cannot activate Shield while opponent has active Shield ({remaining} turns remaining)")]
    ShieldConflict { remaining: u32 },
}

/// The complete in-room game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// The 8 board tiles
    pub tiles: Vec<Tile>,
    pub game_started: bool,
    pub game_ended: bool,
    pub end_reason: Option<EndReason>,
    /// Denormalized snapshot of the player whose turn it is
    pub current_player: Option<Player>,
    /// Heart-card draw pile
    pub deck: Deck,
    /// Magic-card draw pile
    pub magic_deck: Deck,
    /// Hands keyed by durable user id
    pub player_hands: HashMap<String, Vec<Card>>,
    /// The room's single shield slot
    pub shield: ShieldState,
    /// Per-turn action budgets keyed by user id
    pub player_actions: HashMap<String, ActionCounters>,
    /// Turn number (1 on the first turn)
    pub turn_count: u32,
}

impl GameState {
    /// Fresh, not-yet-started state with a randomly colored board.
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        Self {
            tiles: standard_tiles(rng),
            game_started: false,
            game_ended: false,
            end_reason: None,
            current_player: None,
            deck: Deck::new(HEART_DECK_SIZE),
            magic_deck: Deck::new(MAGIC_DECK_SIZE),
            player_hands: HashMap::new(),
            shield: ShieldState::default(),
            player_actions: HashMap::new(),
            turn_count: 0,
        }
    }

    /// The caller's action counters, lazily initialized to a zeroed entry.
    /// An existing entry is never overwritten.
    pub fn actions_entry(&mut self, user_id: &str) -> &mut ActionCounters {
        self.player_actions
            .entry(user_id.to_string())
            .or_default()
    }

    pub fn hand(&self, user_id: &str) -> &[Card] {
        self.player_hands
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn hand_mut(&mut self, user_id: &str) -> &mut Vec<Card> {
        self.player_hands.entry(user_id.to_string()).or_default()
    }

    pub fn find_card(&self, user_id: &str, card_id: &str) -> Option<&Card> {
        self.hand(user_id).iter().find(|c| c.id() == card_id)
    }

    /// Remove a card from a hand by id.
    pub fn remove_card(&mut self, user_id: &str, card_id: &str) -> Result<Card, GameError> {
        let hand = self
            .player_hands
            .get_mut(user_id)
            .ok_or(GameError::CardNotInHand)?;
        let pos = hand
            .iter()
            .position(|c| c.id() == card_id)
            .ok_or(GameError::CardNotInHand)?;
        Ok(hand.remove(pos))
    }

    pub fn tile(&self, tile_id: u8) -> Option<&Tile> {
        self.tiles.get(tile_id as usize)
    }

    pub fn tile_mut(&mut self, tile_id: u8) -> Option<&mut Tile> {
        self.tiles.get_mut(tile_id as usize)
    }

    /// Total cards across all hands (invariant-checked by migration)
    pub fn total_cards_in_hands(&self) -> usize {
        self.player_hands.values().map(Vec::len).sum()
    }

    /// Whether it is `user_id`'s turn in a started game.
    pub fn is_current_player(&self, user_id: &str) -> bool {
        self.game_started
            && self
                .current_player
                .as_ref()
                .is_some_and(|p| p.user_id == user_id)
    }
}
