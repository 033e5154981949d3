//! Room lifecycle, turn engine, and identity migration.
//!
//! A room is one match's complete authoritative state: the two players and
//! the [`GameState`] they share. All mutating operations validate first and
//! leave state untouched on rejection.

use crate::actions::{DeckKind, GameAction, GameEvent};
use crate::board::HeartPlacement;
use crate::cards::{Card, MagicKind, STARTING_HEARTS, STARTING_MAGIC};
use crate::effects::{self, MagicOutcome};
use crate::game::{GameError, GameState};
use crate::player::{Player, MAX_HEARTS_PER_TURN, MAX_MAGIC_PER_TURN};
use crate::score::{check_game_end, determine_winner, EndReason};
use crate::shield::ShieldState;
use crate::validate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rooms hold exactly two players
pub const MAX_PLAYERS: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Player already in room")]
    AlreadyInRoom,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Not enough players")]
    NotEnoughPlayers,

    #[error("All players must be ready")]
    PlayersNotReady,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// One match's complete authoritative state, keyed by a 6-character code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Canonical uppercase room code
    pub code: String,
    pub players: Vec<Player>,
    pub max_players: u8,
    pub game: GameState,
}

impl Room {
    /// Create an empty room. `code` must already be canonicalized
    /// (see [`validate::normalize_room_code`]).
    pub fn new<R: Rng>(code: String, rng: &mut R) -> Self {
        Self {
            code,
            players: Vec::new(),
            max_players: MAX_PLAYERS,
            game: GameState::new(rng),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player(&self, user_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    fn player_mut(&mut self, user_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.user_id == user_id)
    }

    /// The other player in a two-player room.
    pub fn opponent_of(&self, user_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id != user_id)
    }

    pub fn add_player(
        &mut self,
        user_id: &str,
        name: &str,
        email: &str,
        joined_at: u64,
    ) -> Result<(), RoomError> {
        if self.game.game_started {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.player(user_id).is_some() {
            return Err(RoomError::AlreadyInRoom);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }
        self.players.push(Player::new(
            user_id.to_string(),
            name.to_string(),
            email.to_string(),
            joined_at,
        ));
        Ok(())
    }

    /// Remove a player and their per-player state. Returns true when the
    /// room is now empty (and should be destroyed).
    pub fn remove_player(&mut self, user_id: &str) -> Result<bool, RoomError> {
        if self.player(user_id).is_none() {
            return Err(RoomError::PlayerNotInRoom);
        }
        self.players.retain(|p| p.user_id != user_id);
        self.game.player_hands.remove(user_id);
        self.game.player_actions.remove(user_id);

        // A departing current player hands the turn to whoever remains
        if self
            .game
            .current_player
            .as_ref()
            .is_some_and(|p| p.user_id == user_id)
        {
            self.game.current_player = self.players.first().cloned();
        }

        Ok(self.players.is_empty())
    }

    pub fn set_ready(&mut self, user_id: &str, ready: bool) -> Result<(), RoomError> {
        let player = self
            .player_mut(user_id)
            .ok_or(RoomError::PlayerNotInRoom)?;
        player.is_ready = ready;
        Ok(())
    }

    pub fn all_ready(&self) -> bool {
        self.player_count() == MAX_PLAYERS as usize && self.players.iter().all(|p| p.is_ready)
    }

    /// Start the match: deal starting hands off the decks and hand the
    /// first turn to a randomly chosen player.
    pub fn start_game<R: Rng>(&mut self, rng: &mut R) -> Result<(), RoomError> {
        if self.game.game_started {
            return Err(RoomError::GameAlreadyStarted);
        }
        if self.player_count() < MAX_PLAYERS as usize {
            return Err(RoomError::NotEnoughPlayers);
        }
        if !self.players.iter().all(|p| p.is_ready) {
            return Err(RoomError::PlayersNotReady);
        }

        for player in &self.players {
            let mut hand = Vec::with_capacity(STARTING_HEARTS + STARTING_MAGIC);
            for _ in 0..STARTING_HEARTS {
                if self.game.deck.draw() {
                    hand.push(Card::random_heart(rng));
                }
            }
            for _ in 0..STARTING_MAGIC {
                if self.game.magic_deck.draw() {
                    hand.push(Card::random_magic(rng));
                }
            }
            self.game.player_hands.insert(player.user_id.clone(), hand);
            self.game
                .player_actions
                .insert(player.user_id.clone(), Default::default());
        }

        let first = rng.gen_range(0..self.players.len());
        self.game.current_player = Some(self.players[first].clone());
        self.game.game_started = true;
        self.game.turn_count = 1;
        Ok(())
    }

    /// Apply one validated player action, returning the resulting events.
    /// Rejections are side-effect-free.
    pub fn apply_action<R: Rng>(
        &mut self,
        user_id: &str,
        action: GameAction,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.game.game_ended {
            return Err(GameError::GameOver);
        }
        if self.player(user_id).is_none() {
            return Err(GameError::PlayerNotInRoom);
        }
        validate::validate_turn(&self.game, user_id)?;

        match action {
            GameAction::PlaceHeart { tile_id, card_id } => {
                self.place_heart(user_id, tile_id, &card_id)
            }
            GameAction::UseMagic {
                card_id,
                target_tile,
            } => self.use_magic(user_id, &card_id, target_tile, rng),
            GameAction::DrawHeart => self.draw_card(user_id, DeckKind::Heart, rng),
            GameAction::DrawMagic => self.draw_card(user_id, DeckKind::Magic, rng),
            GameAction::EndTurn => self.end_turn(user_id),
        }
    }

    fn place_heart(
        &mut self,
        user_id: &str,
        tile_id: u8,
        card_id: &str,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.game.actions_entry(user_id).hearts_placed >= MAX_HEARTS_PER_TURN {
            return Err(GameError::HeartLimitReached);
        }

        let (color, value) = match self.game.find_card(user_id, card_id) {
            Some(Card::Heart { color, value, .. }) => (*color, *value),
            _ => return Err(GameError::CardNotInHand),
        };

        let tile = self.game.tile(tile_id).ok_or(GameError::InvalidTile)?;
        if tile.placed_heart.is_some() {
            return Err(GameError::TileOccupied);
        }

        let score = crate::score::calculate_score(color, value, tile);
        let original_tile_color = tile.color;

        // All checks passed; mutate
        self.game.remove_card(user_id, card_id)?;
        let tile = self.game.tile_mut(tile_id).ok_or(GameError::InvalidTile)?;
        tile.placed_heart = Some(HeartPlacement {
            value,
            color,
            placed_by: user_id.to_string(),
            score,
            original_tile_color,
        });
        self.game.actions_entry(user_id).hearts_placed += 1;
        self.adjust_score(user_id, score);

        let mut events = vec![GameEvent::HeartPlaced {
            user_id: user_id.to_string(),
            tile_id,
            color,
            value,
            score,
        }];
        // Mid-turn check: a full board ends the game immediately, deck
        // exhaustion waits for the grace period
        self.evaluate_game_end(true, &mut events);
        Ok(events)
    }

    fn use_magic<R: Rng>(
        &mut self,
        user_id: &str,
        card_id: &str,
        target_tile: Option<u8>,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.game.actions_entry(user_id).magic_cards_used >= MAX_MAGIC_PER_TURN {
            return Err(GameError::MagicLimitReached);
        }

        let kind: MagicKind = match self.game.find_card(user_id, card_id) {
            Some(Card::Magic { kind, .. }) => *kind,
            _ => return Err(GameError::CardNotInHand),
        };

        let outcome = effects::execute_magic(&mut self.game, user_id, kind, target_tile, rng)?;

        // The effect resolved; spend the card
        self.game.remove_card(user_id, card_id)?;
        self.game.actions_entry(user_id).magic_cards_used += 1;

        let event = match outcome {
            MagicOutcome::Wind(removal) => {
                // Reverse exactly the recorded award, never a recompute
                self.adjust_score(&removal.heart.placed_by, -removal.heart.score);
                GameEvent::HeartRemoved {
                    user_id: user_id.to_string(),
                    tile_id: removal.tile_id,
                    removed_from: removal.heart.placed_by,
                    value: removal.heart.value,
                    score: removal.heart.score,
                }
            }
            MagicOutcome::Recycle(recycled) => GameEvent::TileRecycled {
                user_id: user_id.to_string(),
                tile_id: recycled.tile_id,
                old_color: recycled.old_color,
                new_color: recycled.new_color,
            },
            MagicOutcome::Shield(shield) => GameEvent::ShieldActivated {
                user_id: user_id.to_string(),
                reinforced: shield.reinforced,
                remaining_turns: shield.remaining_turns,
            },
        };
        Ok(vec![event])
    }

    fn draw_card<R: Rng>(
        &mut self,
        user_id: &str,
        deck: DeckKind,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        let counters = self.game.actions_entry(user_id);
        match deck {
            DeckKind::Heart if counters.drawn_heart => return Err(GameError::HeartAlreadyDrawn),
            DeckKind::Magic if counters.drawn_magic => return Err(GameError::MagicAlreadyDrawn),
            _ => {}
        }

        let card = match deck {
            DeckKind::Heart => {
                if !self.game.deck.draw() {
                    return Err(GameError::HeartDeckEmpty);
                }
                self.game.actions_entry(user_id).drawn_heart = true;
                Card::random_heart(rng)
            }
            DeckKind::Magic => {
                if !self.game.magic_deck.draw() {
                    return Err(GameError::MagicDeckEmpty);
                }
                self.game.actions_entry(user_id).drawn_magic = true;
                Card::random_magic(rng)
            }
        };

        let cards_remaining = match deck {
            DeckKind::Heart => self.game.deck.cards,
            DeckKind::Magic => self.game.magic_deck.cards,
        };
        self.game.hand_mut(user_id).push(card.clone());

        let mut events = vec![GameEvent::CardDrawn {
            user_id: user_id.to_string(),
            deck,
            card,
            cards_remaining,
        }];
        // Grace period: an emptying draw never ends the game mid-turn
        self.evaluate_game_end(true, &mut events);
        Ok(events)
    }

    fn end_turn(&mut self, user_id: &str) -> Result<Vec<GameEvent>, GameError> {
        let next = self
            .opponent_of(user_id)
            .cloned()
            .unwrap_or_else(|| self.players[0].clone());

        for counters in self.game.player_actions.values_mut() {
            counters.reset();
        }
        self.game.shield.tick();
        self.game.turn_count += 1;
        self.game.current_player = Some(next.clone());

        let mut events = vec![GameEvent::TurnEnded {
            user_id: user_id.to_string(),
            next_player: next.user_id,
            turn_count: self.game.turn_count,
        }];
        // Turn-end check runs without grace: empty decks now end the game
        self.evaluate_game_end(false, &mut events);
        Ok(events)
    }

    fn adjust_score(&mut self, user_id: &str, delta: i32) {
        if let Some(player) = self.player_mut(user_id) {
            player.score += delta;
        }
        self.refresh_current_snapshot();
    }

    /// Keep the denormalized current-player snapshot in sync after score
    /// or profile changes.
    fn refresh_current_snapshot(&mut self) {
        if let Some(current) = &self.game.current_player {
            if let Some(player) = self.player(&current.user_id) {
                self.game.current_player = Some(player.clone());
            }
        }
    }

    fn evaluate_game_end(&mut self, allow_grace_period: bool, events: &mut Vec<GameEvent>) {
        if let Some(reason) = check_game_end(&self.game, allow_grace_period) {
            self.finish_game(reason, events);
        }
    }

    fn finish_game(&mut self, reason: EndReason, events: &mut Vec<GameEvent>) {
        self.game.game_ended = true;
        self.game.end_reason = Some(reason);
        let summary = determine_winner(&self.players);
        events.push(GameEvent::GameEnded {
            reason,
            winner: summary.winner,
            is_tie: summary.is_tie,
        });
    }
}

/// Remap every reference to `old_user_id` inside one room to
/// `new_user_id`, for reconnects that authenticate under a new identity.
///
/// The existing player entry keeps its score, readiness, and join time.
/// If `old_user_id` is not among the current players, a fresh player is
/// appended instead. Total cards across all hands are unchanged. Apply
/// under the room's turn lock.
pub fn migrate_player_data(
    mut room: Room,
    old_user_id: &str,
    new_user_id: &str,
    new_name: &str,
    new_email: &str,
) -> Room {
    match room.players.iter_mut().find(|p| p.user_id == old_user_id) {
        Some(player) => {
            player.user_id = new_user_id.to_string();
            player.name = new_name.to_string();
            player.email = new_email.to_string();
        }
        None => {
            room.players.push(Player::new(
                new_user_id.to_string(),
                new_name.to_string(),
                new_email.to_string(),
                0,
            ));
        }
    }

    if let Some(hand) = room.game.player_hands.remove(old_user_id) {
        room.game
            .player_hands
            .entry(new_user_id.to_string())
            .or_default()
            .extend(hand);
    }
    if let Some(counters) = room.game.player_actions.remove(old_user_id) {
        room.game
            .player_actions
            .insert(new_user_id.to_string(), counters);
    }

    if let ShieldState::Active { owner, .. } = &mut room.game.shield {
        if owner == old_user_id {
            *owner = new_user_id.to_string();
        }
    }

    for tile in &mut room.game.tiles {
        if let Some(heart) = &mut tile.placed_heart {
            if heart.placed_by == old_user_id {
                heart.placed_by = new_user_id.to_string();
            }
        }
    }

    if room
        .game
        .current_player
        .as_ref()
        .is_some_and(|p| p.user_id == old_user_id)
    {
        room.game.current_player = room
            .players
            .iter()
            .find(|p| p.user_id == new_user_id)
            .cloned();
    }

    room
}
