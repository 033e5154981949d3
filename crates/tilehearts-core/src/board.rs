//! Board tiles and heart placements.
//!
//! The board is a fixed row of 8 colored tiles. Each tile holds at most one
//! placed heart. Tile colors can change after creation (Recycle), which is
//! why placements remember the tile color they were scored against.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of tiles on the board
pub const TILE_COUNT: usize = 8;

/// Tile color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileColor {
    Red,
    Yellow,
    Green,
    White,
}

impl TileColor {
    pub const ALL: [TileColor; 4] = [
        TileColor::Red,
        TileColor::Yellow,
        TileColor::Green,
        TileColor::White,
    ];

    /// Pick a uniformly random tile color
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&TileColor::White)
    }

    /// Pick a replacement color from the remaining palette (never the
    /// current color). Used by the Recycle card.
    pub fn recycled<R: Rng>(self, rng: &mut R) -> Self {
        let remaining: Vec<TileColor> =
            Self::ALL.iter().copied().filter(|c| *c != self).collect();
        *remaining.choose(rng).unwrap_or(&TileColor::White)
    }
}

/// Heart card color (hearts are never white)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartColor {
    Red,
    Yellow,
    Green,
}

impl HeartColor {
    pub const ALL: [HeartColor; 3] = [HeartColor::Red, HeartColor::Yellow, HeartColor::Green];

    /// Pick a uniformly random heart color
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&HeartColor::Red)
    }

    /// Whether this heart color matches a tile color (for double scoring)
    pub fn matches(self, tile: TileColor) -> bool {
        matches!(
            (self, tile),
            (HeartColor::Red, TileColor::Red)
                | (HeartColor::Yellow, TileColor::Yellow)
                | (HeartColor::Green, TileColor::Green)
        )
    }
}

/// A heart resting on a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartPlacement {
    /// Face value (1..=3)
    pub value: u8,
    pub color: HeartColor,
    /// Durable user id of the placer
    pub placed_by: String,
    /// Points awarded at placement time. Removal (Wind) reverses exactly
    /// this amount; it is never recomputed against the current tile color.
    pub score: i32,
    /// Tile color at placement time (Recycle may recolor tiles later)
    pub original_tile_color: TileColor,
}

/// One of the 8 board cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Tile id (0..=7)
    pub id: u8,
    pub color: TileColor,
    pub placed_heart: Option<HeartPlacement>,
}

impl Tile {
    pub fn new(id: u8, color: TileColor) -> Self {
        Self {
            id,
            color,
            placed_heart: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.placed_heart.is_none()
    }
}

/// Create the standard 8-tile board with random colors.
pub fn standard_tiles<R: Rng>(rng: &mut R) -> Vec<Tile> {
    (0..TILE_COUNT as u8)
        .map(|id| Tile::new(id, TileColor::random(rng)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_standard_board_has_eight_tiles() {
        let mut rng = StdRng::seed_from_u64(7);
        let tiles = standard_tiles(&mut rng);
        assert_eq!(tiles.len(), TILE_COUNT);
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.id as usize, i);
            assert!(tile.is_empty());
        }
    }

    #[test]
    fn test_heart_color_matches_tile() {
        assert!(HeartColor::Red.matches(TileColor::Red));
        assert!(HeartColor::Green.matches(TileColor::Green));
        assert!(!HeartColor::Red.matches(TileColor::Green));
        assert!(!HeartColor::Yellow.matches(TileColor::White));
    }

    #[test]
    fn test_recycled_color_never_repeats() {
        let mut rng = StdRng::seed_from_u64(42);
        for color in TileColor::ALL {
            for _ in 0..50 {
                assert_ne!(color.recycled(&mut rng), color);
            }
        }
    }
}
