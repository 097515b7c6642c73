//! Battle grid, terrain and cell positions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::isqrt_round;

/// Integer cell coordinates. `(0, 0)` is the top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl Position {
    /// Create a position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Orthogonal distance `|dx| + |dy|`.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Diagonal distance `max(|dx|, |dy|)`.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Squared straight-line distance.
    #[must_use]
    pub const fn euclidean_squared(self, other: Self) -> u64 {
        let dx = self.x.abs_diff(other.x) as u64;
        let dy = self.y.abs_diff(other.y) as u64;
        dx * dx + dy * dy
    }

    /// Straight-line distance rounded to the nearest integer.
    #[must_use]
    pub fn euclidean(self, other: Self) -> u32 {
        u32::try_from(isqrt_round(self.euclidean_squared(other))).unwrap_or(u32::MAX)
    }

    /// Apply a signed offset. Returns `None` if either coordinate would go
    /// negative or overflow.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        Some(Self { x, y })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(u32, u32)> for Position {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

/// Terrain types for grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrainType {
    /// Open ground (cost: 1).
    #[default]
    Normal,
    /// Impassable.
    Obstacle,
    /// Rough ground with 2x movement cost.
    Difficult,
    /// Damaging ground (cost: 1). Hurts units that start a turn on it.
    Hazard,
    /// Restorative ground (cost: 1). Heals units that start a turn on it.
    Heal,
}

impl TerrainType {
    /// Movement cost of entering this cell. `None` for impassable terrain.
    #[must_use]
    pub const fn movement_cost(self) -> Option<u32> {
        match self {
            Self::Normal | Self::Hazard | Self::Heal => Some(1),
            Self::Difficult => Some(2),
            Self::Obstacle => None,
        }
    }

    /// Returns true if units may stand on or cross this cell.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        !matches!(self, Self::Obstacle)
    }
}

/// Rectangular battle map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    /// Terrain stored in row-major order.
    cells: Vec<TerrainType>,
}

impl Grid {
    /// Create a grid with every cell set to [`TerrainType::Normal`].
    ///
    /// Zero dimensions are accepted here and rejected when the combat is
    /// initialized, so a malformed setup ends in the `Failed` state instead of
    /// a panic.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let cell_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![TerrainType::Normal; cell_count],
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns true if both dimensions are positive.
    #[must_use]
    pub const fn has_valid_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[inline]
    fn index(&self, pos: Position) -> usize {
        (pos.y as usize) * (self.width as usize) + (pos.x as usize)
    }

    /// Check if a position lies on the grid.
    #[must_use]
    pub const fn in_bounds(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Terrain at a position, `None` if out of bounds.
    #[must_use]
    pub fn terrain(&self, pos: Position) -> Option<TerrainType> {
        if self.in_bounds(pos) {
            Some(self.cells[self.index(pos)])
        } else {
            None
        }
    }

    /// Set terrain at a position. Returns `false` if out of bounds.
    pub fn set_terrain(&mut self, pos: Position, terrain: TerrainType) -> bool {
        if self.in_bounds(pos) {
            let index = self.index(pos);
            self.cells[index] = terrain;
            true
        } else {
            false
        }
    }

    /// Movement cost of entering a cell. `None` when impassable or out of
    /// bounds.
    #[must_use]
    pub fn movement_cost(&self, pos: Position) -> Option<u32> {
        self.terrain(pos).and_then(TerrainType::movement_cost)
    }

    /// Returns true if the cell is in bounds and passable.
    #[must_use]
    pub fn is_passable(&self, pos: Position) -> bool {
        self.terrain(pos).is_some_and(TerrainType::is_passable)
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Position::new(x, y)))
    }
}

impl Default for Grid {
    /// A 10x10 open field.
    fn default() -> Self {
        Self::new(10, 10)
    }
}
