//! Grid cells, adjacency, and terrain classification.

use serde::{Deserialize, Serialize};

/// A map cell coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

impl CellPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Chebyshev distance - the number of steps a unit moving one cell per
    /// tick (diagonals allowed) needs to reach `other`.
    pub fn distance(&self, other: &Self) -> u32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        dx.max(dy) as u32
    }

    /// One step toward `target`, diagonals allowed. Returns `self` when
    /// already there.
    pub fn step_toward(&self, target: &Self) -> Self {
        Self {
            x: self.x + (target.x - self.x).signum(),
            y: self.y + (target.y - self.y).signum(),
        }
    }

    /// The eight neighbouring cells, unfiltered. Callers clamp to bounds.
    pub fn neighbors(&self) -> [CellPos; 8] {
        [
            self.offset(-1, -1),
            self.offset(0, -1),
            self.offset(1, -1),
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(-1, 1),
            self.offset(0, 1),
            self.offset(1, 1),
        ]
    }
}

/// Terrain classification for a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainType {
    #[default]
    Clear,
    Road,
    Rough,
    Water,
}

impl TerrainType {
    /// Can a ground unit stand on this terrain?
    pub fn passable(&self) -> bool {
        !matches!(self, TerrainType::Water)
    }
}
