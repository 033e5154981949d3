//! Structural validation.
//!
//! Pure, side-effect-free predicates applied before any mutation. The
//! JSON-valued checks (`validate_room_document`, `validate_deck_state`)
//! guard documents loaded from the room store before they are trusted or
//! deserialized.

use crate::game::{GameError, GameState};
use crate::room::Room;
use serde_json::Value;

/// Room codes are exactly 6 alphanumeric characters, case-insensitive
pub const ROOM_CODE_LEN: usize = 6;

/// Maximum player name length after trimming
pub const MAX_NAME_LEN: usize = 20;

/// Outcome of a structural check, with a stable user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn fail(error: &str) -> Self {
        Self {
            valid: false,
            error: Some(error.to_string()),
        }
    }
}

/// True iff `code` is exactly 6 alphanumeric characters (any case).
pub fn validate_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Canonicalize a room code to uppercase, rejecting malformed input.
pub fn normalize_room_code(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if validate_room_code(trimmed) {
        Some(trimmed.to_ascii_uppercase())
    } else {
        None
    }
}

/// Player names must be non-empty after trimming, at most 20 characters,
/// and free of control characters.
pub fn validate_player_name(name: &str) -> ValidationResult {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return ValidationResult::fail("Name cannot be empty");
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return ValidationResult::fail("Name is too long");
    }
    if trimmed.chars().any(char::is_control) {
        return ValidationResult::fail("Name contains invalid characters");
    }
    ValidationResult::ok()
}

/// Trim a string and strip `<`/`>` characters. Applied to every
/// client-supplied text field before it reaches room state.
pub fn sanitize_text(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect()
}

/// Trim strings and strip `<`/`>` characters, recursing into arrays and
/// objects. Non-string values pass through unchanged.
pub fn sanitize_input(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_text(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_input).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_input(v)))
                .collect(),
        ),
        other => other,
    }
}

/// A room must exist, and a started game must have a current player
/// (and vice versa).
pub fn validate_room_state(room: Option<&Room>) -> ValidationResult {
    let Some(room) = room else {
        return ValidationResult::fail("Room not found");
    };
    let started = room.game.game_started;
    let has_current = room.game.current_player.is_some();
    if started && !has_current {
        return ValidationResult::fail("Started game has no current player");
    }
    if !started && has_current {
        return ValidationResult::fail("Current player set before game start");
    }
    ValidationResult::ok()
}

/// Shape check for a store-loaded room document: `players` must be an array.
pub fn validate_room_document(doc: &Value) -> ValidationResult {
    if !doc.is_object() {
        return ValidationResult::fail("Room not found");
    }
    match doc.get("players") {
        Some(Value::Array(_)) => ValidationResult::ok(),
        _ => ValidationResult::fail("Invalid players state"),
    }
}

/// Shape check for a store-loaded deck document. A missing or non-object
/// deck is "Invalid deck state"; a missing, non-numeric, non-finite, or
/// negative count is "Invalid deck count".
pub fn validate_deck_state(deck: &Value) -> ValidationResult {
    if !deck.is_object() {
        return ValidationResult::fail("Invalid deck state");
    }
    match deck.get("cards").and_then(Value::as_f64) {
        Some(count) if count.is_finite() && count >= 0.0 => ValidationResult::ok(),
        _ => ValidationResult::fail("Invalid deck count"),
    }
}

/// Turn ownership. "Game not started" takes precedence over
/// "Not your turn" when both fail.
pub fn validate_turn(game: &GameState, user_id: &str) -> Result<(), GameError> {
    if !game.game_started {
        return Err(GameError::GameNotStarted);
    }
    if !game.is_current_player(user_id) {
        return Err(GameError::NotYourTurn);
    }
    Ok(())
}

/// Room membership.
pub fn validate_player_in_room(room: Option<&Room>, user_id: &str) -> ValidationResult {
    let Some(room) = room else {
        return ValidationResult::fail("Room not found");
    };
    if room.players.iter().any(|p| p.user_id == user_id) {
        ValidationResult::ok()
    } else {
        ValidationResult::fail("Player not in room")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    #[test]
    fn test_room_code_exactly_six_alphanumeric() {
        assert!(validate_room_code("ABC123"));
        assert!(validate_room_code("abc123"));
        assert!(!validate_room_code("ABC12"));
        assert!(!validate_room_code("ABC1234"));
        assert!(!validate_room_code("ABC 12"));
        assert!(!validate_room_code("ABC-12"));
        assert!(!validate_room_code(""));
    }

    #[test]
    fn test_normalize_room_code_uppercases() {
        assert_eq!(normalize_room_code("abc123").as_deref(), Some("ABC123"));
        assert_eq!(normalize_room_code(" abc123 ").as_deref(), Some("ABC123"));
        assert_eq!(normalize_room_code("nope"), None);
    }

    #[test]
    fn test_player_name_rules() {
        assert!(validate_player_name("Ana").valid);
        assert!(validate_player_name("  Ana  ").valid);
        assert!(!validate_player_name("").valid);
        assert!(!validate_player_name("   ").valid);
        assert!(!validate_player_name("x".repeat(21).as_str()).valid);
        assert!(!validate_player_name("bad\u{0007}name").valid);
    }

    #[test]
    fn test_sanitize_strips_markup_and_trims() {
        assert_eq!(sanitize_text("  <b>hi</b>  "), "bhi/b");
        assert_eq!(
            sanitize_input(json!("  <b>hi</b>  ")),
            json!("bhi/b")
        );
        // Non-strings pass through unchanged
        assert_eq!(sanitize_input(json!(42)), json!(42));
        assert_eq!(sanitize_input(json!(true)), json!(true));
        assert_eq!(
            sanitize_input(json!({"name": " <x> ", "n": 1})),
            json!({"name": "x", "n": 1})
        );
    }

    #[test]
    fn test_room_state_consistency() {
        assert_eq!(
            validate_room_state(None),
            ValidationResult::fail("Room not found")
        );

        let mut rng = StdRng::seed_from_u64(2);
        let mut room = Room::new("ABC123".to_string(), &mut rng);
        assert!(validate_room_state(Some(&room)).valid);

        // Started without a current player is invalid
        room.game.game_started = true;
        assert!(!validate_room_state(Some(&room)).valid);

        // Current player while not started is invalid
        room.game.game_started = false;
        room.game.current_player =
            Some(Player::new("u1".into(), "Ana".into(), String::new(), 0));
        assert!(!validate_room_state(Some(&room)).valid);
    }

    #[test]
    fn test_room_document_players_shape() {
        assert!(validate_room_document(&json!({"players": []})).valid);
        assert_eq!(
            validate_room_document(&json!({"players": "nope"})),
            ValidationResult::fail("Invalid players state")
        );
        assert_eq!(
            validate_room_document(&json!({})),
            ValidationResult::fail("Invalid players state")
        );
    }

    #[test]
    fn test_deck_state_shape() {
        assert!(validate_deck_state(&json!({"cards": 16})).valid);
        assert!(validate_deck_state(&json!({"cards": 0})).valid);
        assert_eq!(
            validate_deck_state(&json!({"cards": -1})),
            ValidationResult::fail("Invalid deck count")
        );
        assert_eq!(
            validate_deck_state(&json!({"cards": "ten"})),
            ValidationResult::fail("Invalid deck count")
        );
        assert_eq!(
            validate_deck_state(&json!({})),
            ValidationResult::fail("Invalid deck count")
        );
        assert_eq!(
            validate_deck_state(&json!(null)),
            ValidationResult::fail("Invalid deck state")
        );
        assert_eq!(
            validate_deck_state(&json!("deck")),
            ValidationResult::fail("Invalid deck state")
        );
    }

    #[test]
    fn test_turn_ownership_precedence() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = crate::game::GameState::new(&mut rng);

        // Not started wins even though it is also not u1's turn
        assert_eq!(validate_turn(&game, "u1"), Err(GameError::GameNotStarted));

        game.game_started = true;
        game.current_player = Some(Player::new("u2".into(), "B".into(), String::new(), 0));
        assert_eq!(validate_turn(&game, "u1"), Err(GameError::NotYourTurn));
        assert_eq!(validate_turn(&game, "u2"), Ok(()));
    }

    #[test]
    fn test_player_membership() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut room = Room::new("ABC123".to_string(), &mut rng);
        room.add_player("u1", "Ana", "ana@example.com", 0).unwrap();

        assert_eq!(
            validate_player_in_room(None, "u1"),
            ValidationResult::fail("Room not found")
        );
        assert!(validate_player_in_room(Some(&room), "u1").valid);
        assert_eq!(
            validate_player_in_room(Some(&room), "u2"),
            ValidationResult::fail("Player not in room")
        );
    }
}
