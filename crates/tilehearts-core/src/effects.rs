//! Magic card effect resolution.
//!
//! The card set is closed: Wind, Recycle, and Shield. Resolution dispatches
//! on [`MagicKind`]; the targeting kinds (Wind, Recycle) also expose
//! [`can_target_tile`]. Basic targeting is always checked before shield
//! protection, so an illegal target reports the targeting error even when a
//! shield is up.
//!
//! Effects mutate board and shield state only. Score adjustments are owned
//! by [`crate::room::Room`], which holds the player list.

use crate::board::{HeartPlacement, TileColor};
use crate::cards::MagicKind;
use crate::game::{GameError, GameState};
use crate::shield::ShieldOutcome;
use rand::Rng;

/// A heart removed from the board by Wind.
#[derive(Debug, Clone, PartialEq)]
pub struct WindRemoval {
    pub tile_id: u8,
    /// The removed placement, including its recorded score and former owner
    pub heart: HeartPlacement,
}

/// A tile recolored by Recycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecycleOutcome {
    pub tile_id: u8,
    pub old_color: TileColor,
    pub new_color: TileColor,
}

/// Result of resolving one magic card.
#[derive(Debug, Clone, PartialEq)]
pub enum MagicOutcome {
    Wind(WindRemoval),
    Recycle(RecycleOutcome),
    Shield(ShieldOutcome),
}

/// Resolve one magic card against the game state.
pub fn execute_magic<R: Rng>(
    game: &mut GameState,
    user_id: &str,
    kind: MagicKind,
    target_tile: Option<u8>,
    rng: &mut R,
) -> Result<MagicOutcome, GameError> {
    match kind {
        MagicKind::Wind => {
            let tile_id = target_tile.ok_or(GameError::MissingTarget)?;
            apply_wind(game, user_id, tile_id).map(MagicOutcome::Wind)
        }
        MagicKind::Recycle => {
            let tile_id = target_tile.ok_or(GameError::MissingTarget)?;
            apply_recycle(game, tile_id, rng).map(MagicOutcome::Recycle)
        }
        MagicKind::Shield => apply_shield(game, user_id).map(MagicOutcome::Shield),
    }
}

/// Basic targeting rules, before any protection check.
pub fn can_target_tile(game: &GameState, user_id: &str, kind: MagicKind, tile_id: u8) -> bool {
    let Some(tile) = game.tile(tile_id) else {
        return false;
    };
    match kind {
        // Wind targets a tile holding an opponent's heart
        MagicKind::Wind => tile
            .placed_heart
            .as_ref()
            .is_some_and(|h| h.placed_by != user_id),
        // Recycle targets an empty, non-white tile
        MagicKind::Recycle => tile.is_empty() && tile.color != TileColor::White,
        // Shield takes no tile target
        MagicKind::Shield => false,
    }
}

/// Wind: remove an opponent's placed heart. The caller reverses the
/// recorded score from the former owner.
pub fn apply_wind(
    game: &mut GameState,
    user_id: &str,
    tile_id: u8,
) -> Result<WindRemoval, GameError> {
    let tile = game.tile(tile_id).ok_or(GameError::InvalidTile)?;
    let heart = tile
        .placed_heart
        .as_ref()
        .ok_or(GameError::InvalidWindTarget)?;
    if heart.placed_by == user_id {
        return Err(GameError::InvalidWindTarget);
    }
    if game.shield.protects_player(&heart.placed_by) {
        return Err(GameError::OpponentProtected);
    }

    let tile = game.tile_mut(tile_id).ok_or(GameError::InvalidTile)?;
    let heart = tile
        .placed_heart
        .take()
        .ok_or(GameError::InvalidWindTarget)?;
    Ok(WindRemoval { tile_id, heart })
}

/// Recycle: recolor an empty, non-white tile from the remaining palette.
/// Any active shield protects the whole board from recoloring.
pub fn apply_recycle<R: Rng>(
    game: &mut GameState,
    tile_id: u8,
    rng: &mut R,
) -> Result<RecycleOutcome, GameError> {
    let tile = game.tile(tile_id).ok_or(GameError::InvalidTile)?;
    if !tile.is_empty() || tile.color == TileColor::White {
        return Err(GameError::InvalidRecycleTarget);
    }
    if game.shield.is_active() {
        return Err(GameError::TileProtected);
    }

    let old_color = tile.color;
    let new_color = old_color.recycled(rng);
    let tile = game.tile_mut(tile_id).ok_or(GameError::InvalidTile)?;
    tile.color = new_color;
    Ok(RecycleOutcome {
        tile_id,
        old_color,
        new_color,
    })
}

/// Shield: activate or reinforce the room's shield slot.
pub fn apply_shield(game: &mut GameState, user_id: &str) -> Result<ShieldOutcome, GameError> {
    let turn_count = game.turn_count;
    game.shield
        .activate(user_id, turn_count)
        .map_err(|remaining| GameError::ShieldConflict { remaining })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::HeartColor;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn game_with_tiles(colors: &[TileColor]) -> GameState {
        let mut rng = StdRng::seed_from_u64(11);
        let mut game = GameState::new(&mut rng);
        for (tile, color) in game.tiles.iter_mut().zip(colors) {
            tile.color = *color;
        }
        game.game_started = true;
        game.turn_count = 1;
        game
    }

    fn place(game: &mut GameState, tile_id: u8, placed_by: &str, score: i32) {
        let tile = game.tile_mut(tile_id).unwrap();
        tile.placed_heart = Some(HeartPlacement {
            value: 2,
            color: HeartColor::Red,
            placed_by: placed_by.to_string(),
            score,
            original_tile_color: tile.color,
        });
    }

    #[test]
    fn test_wind_removes_opponent_heart() {
        let mut game = game_with_tiles(&[TileColor::Red]);
        place(&mut game, 0, "p2", 4);

        let removal = apply_wind(&mut game, "p1", 0).unwrap();
        assert_eq!(removal.heart.placed_by, "p2");
        assert_eq!(removal.heart.score, 4);
        assert!(game.tile(0).unwrap().is_empty());
    }

    #[test]
    fn test_wind_rejects_own_heart_and_empty_tile() {
        let mut game = game_with_tiles(&[TileColor::Red, TileColor::Green]);
        place(&mut game, 0, "p1", 4);

        assert_eq!(
            apply_wind(&mut game, "p1", 0),
            Err(GameError::InvalidWindTarget)
        );
        assert_eq!(
            apply_wind(&mut game, "p1", 1),
            Err(GameError::InvalidWindTarget)
        );
        assert_eq!(apply_wind(&mut game, "p1", 99), Err(GameError::InvalidTile));
    }

    #[test]
    fn test_wind_blocked_by_shield() {
        let mut game = game_with_tiles(&[TileColor::Red]);
        place(&mut game, 0, "p2", 4);
        game.shield.activate("p2", 1).unwrap();

        assert_eq!(
            apply_wind(&mut game, "p1", 0),
            Err(GameError::OpponentProtected)
        );
        // The heart stays on the board
        assert!(game.tile(0).unwrap().placed_heart.is_some());
    }

    #[test]
    fn test_recycle_recolors_within_remaining_palette() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut game = game_with_tiles(&[TileColor::Green]);

        let outcome = apply_recycle(&mut game, 0, &mut rng).unwrap();
        assert_eq!(outcome.old_color, TileColor::Green);
        assert_ne!(outcome.new_color, TileColor::Green);
        assert_eq!(game.tile(0).unwrap().color, outcome.new_color);
        // Identity is preserved
        assert_eq!(game.tile(0).unwrap().id, 0);
    }

    #[test]
    fn test_recycle_rejects_occupied_and_white_tiles() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut game = game_with_tiles(&[TileColor::Red, TileColor::White]);
        place(&mut game, 0, "p2", 4);

        assert_eq!(
            apply_recycle(&mut game, 0, &mut rng),
            Err(GameError::InvalidRecycleTarget)
        );
        assert_eq!(
            apply_recycle(&mut game, 1, &mut rng),
            Err(GameError::InvalidRecycleTarget)
        );
    }

    #[test]
    fn test_recycle_targeting_checked_before_protection() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut game = game_with_tiles(&[TileColor::White, TileColor::Red]);
        game.shield.activate("p2", 1).unwrap();

        // White tile: targeting error wins even with a shield up
        assert_eq!(
            apply_recycle(&mut game, 0, &mut rng),
            Err(GameError::InvalidRecycleTarget)
        );
        // Valid target, but any active shield protects it
        assert_eq!(
            apply_recycle(&mut game, 1, &mut rng),
            Err(GameError::TileProtected)
        );
    }

    #[test]
    fn test_shield_conflict_reports_remaining_turns() {
        let mut game = game_with_tiles(&[TileColor::Red]);
        game.shield.activate("p2", 1).unwrap();
        game.shield.tick();

        assert_eq!(
            apply_shield(&mut game, "p1"),
            Err(GameError::ShieldConflict { remaining: 2 })
        );
        assert_eq!(
            GameError::ShieldConflict { remaining: 2 }.to_string(),
            "Cannot activate Shield while opponent has active Shield (2 turns remaining)"
        );
    }

    #[test]
    fn test_execute_magic_dispatch_and_missing_target() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut game = game_with_tiles(&[TileColor::Red]);

        assert_eq!(
            execute_magic(&mut game, "p1", MagicKind::Wind, None, &mut rng),
            Err(GameError::MissingTarget)
        );

        let outcome = execute_magic(&mut game, "p1", MagicKind::Shield, None, &mut rng).unwrap();
        assert!(matches!(
            outcome,
            MagicOutcome::Shield(o) if !o.reinforced && o.remaining_turns == 3
        ));
    }

    #[test]
    fn test_can_target_tile() {
        let mut game = game_with_tiles(&[TileColor::Red, TileColor::White, TileColor::Green]);
        place(&mut game, 0, "p2", 4);

        assert!(can_target_tile(&game, "p1", MagicKind::Wind, 0));
        assert!(!can_target_tile(&game, "p2", MagicKind::Wind, 0));
        assert!(!can_target_tile(&game, "p1", MagicKind::Wind, 2));

        assert!(can_target_tile(&game, "p1", MagicKind::Recycle, 2));
        assert!(!can_target_tile(&game, "p1", MagicKind::Recycle, 0));
        assert!(!can_target_tile(&game, "p1", MagicKind::Recycle, 1));

        assert!(!can_target_tile(&game, "p1", MagicKind::Shield, 2));
        assert!(!can_target_tile(&game, "p1", MagicKind::Wind, 99));
    }
}
