//! Tilehearts - server-authoritative engine for a two-player
//! tile-placement card game
//!
//! Players place heart cards of a color and value onto colored tiles to
//! score points, or play one magic card per turn (Wind, Recycle, Shield)
//! to manipulate the board or block the opponent. This crate is the pure,
//! transport-agnostic core: the WebSocket gateway, turn locks, and session
//! tracking live in the server crate.
//!
//! # Modules
//!
//! - [`board`]: Tiles, colors, and heart placements
//! - [`cards`]: The card union and draw piles
//! - [`effects`]: Magic card resolution (Wind, Recycle, Shield)
//! - [`shield`]: The shield protection state machine
//! - [`score`]: Scoring rules and game-end evaluation
//! - [`validate`]: Structural validation applied before any mutation
//! - [`game`]: Per-room game state and action counters
//! - [`room`]: Room lifecycle, the turn engine, and identity migration
//! - [`actions`]: Player actions and the events they produce

pub mod actions;
pub mod board;
pub mod cards;
pub mod effects;
pub mod game;
pub mod player;
pub mod room;
pub mod score;
pub mod shield;
pub mod validate;

// Re-export commonly used types
pub use actions::{DeckKind, GameAction, GameEvent};
pub use board::{HeartColor, HeartPlacement, Tile, TileColor, TILE_COUNT};
pub use cards::{Card, Deck, MagicKind, HEART_DECK_SIZE, MAGIC_DECK_SIZE};
pub use effects::{can_target_tile, execute_magic, MagicOutcome};
pub use game::{GameError, GameState};
pub use player::{ActionCounters, Player, MAX_HEARTS_PER_TURN, MAX_MAGIC_PER_TURN};
pub use room::{migrate_player_data, Room, RoomError, MAX_PLAYERS};
pub use score::{calculate_score, check_game_end, determine_winner, EndReason, WinnerSummary};
pub use shield::{ShieldOutcome, ShieldState, SHIELD_DURATION_TURNS};
pub use validate::{
    normalize_room_code, sanitize_input, sanitize_text, validate_deck_state, validate_player_in_room,
    validate_player_name, validate_room_code, validate_room_document, validate_room_state,
    validate_turn, ValidationResult,
};
