//! Area-of-effect resolution.
//!
//! One function turns any [`AreaShape`] into the set of affected cells. The
//! declared shape on the skill is the only input; nothing is special-cased by
//! skill identity.

use serde::{Deserialize, Serialize};

use crate::grid::{Grid, Position};

/// Area of effect around a skill's primary target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AreaShape {
    /// The target cell only.
    #[default]
    Single,
    /// The target plus up to `radius` cells in each orthogonal direction.
    Cross {
        /// Arm length.
        radius: u32,
    },
    /// Cells within straight-line distance `radius` of the target.
    Circle {
        /// Radius in cells.
        radius: u32,
    },
    /// `length` cells starting at the target, continuing away from the caster.
    Line {
        /// Number of cells.
        length: u32,
    },
    /// A widening wedge starting at the target, pointing away from the caster.
    Cone {
        /// Depth in cells.
        length: u32,
    },
}

/// Dominant axis direction from `from` toward `to`.
///
/// Ties between axes resolve horizontally. Returns `None` when the cells are
/// equal.
fn direction(from: Position, to: Position) -> Option<(i32, i32)> {
    if from == to {
        return None;
    }
    let dx = i64::from(to.x) - i64::from(from.x);
    let dy = i64::from(to.y) - i64::from(from.y);
    if dx.abs() >= dy.abs() {
        Some((dx.signum() as i32, 0))
    } else {
        Some((0, dy.signum() as i32))
    }
}

fn step(pos: Position, (dx, dy): (i32, i32), times: u32) -> Option<Position> {
    let times = i32::try_from(times).ok()?;
    pos.offset(dx.checked_mul(times)?, dy.checked_mul(times)?)
}

fn push_cell(grid: &Grid, cells: &mut Vec<Position>, pos: Option<Position>) {
    if let Some(pos) = pos {
        if grid.in_bounds(pos) && !cells.contains(&pos) {
            cells.push(pos);
        }
    }
}

/// Cells affected by `shape` when cast from `origin` at `target`.
///
/// The target cell always comes first. Cells off the grid are dropped and
/// each cell appears once.
#[must_use]
pub fn affected_cells(
    shape: AreaShape,
    origin: Position,
    target: Position,
    grid: &Grid,
) -> Vec<Position> {
    let mut cells = Vec::new();
    push_cell(grid, &mut cells, Some(target));

    match shape {
        AreaShape::Single => {}
        AreaShape::Cross { radius } => {
            for dir in [(0, -1), (1, 0), (0, 1), (-1, 0)] {
                for k in 1..=radius {
                    push_cell(grid, &mut cells, step(target, dir, k));
                }
            }
        }
        AreaShape::Circle { radius } => {
            let r = i32::try_from(radius).unwrap_or(i32::MAX);
            let r_sq = u64::from(radius) * u64::from(radius);
            for dy in -r..=r {
                for dx in -r..=r {
                    let Some(pos) = target.offset(dx, dy) else {
                        continue;
                    };
                    if target.euclidean_squared(pos) <= r_sq {
                        push_cell(grid, &mut cells, Some(pos));
                    }
                }
            }
        }
        AreaShape::Line { length } => {
            if let Some(dir) = direction(origin, target) {
                for k in 1..length {
                    push_cell(grid, &mut cells, step(target, dir, k));
                }
            }
        }
        AreaShape::Cone { length } => {
            if let Some(dir) = direction(origin, target) {
                let lateral = (dir.1, dir.0);
                for k in 0..length {
                    let Some(center) = step(target, dir, k) else {
                        break;
                    };
                    let spread = i32::try_from(k).unwrap_or(i32::MAX);
                    for side in -spread..=spread {
                        let cell = center.offset(lateral.0 * side, lateral.1 * side);
                        push_cell(grid, &mut cells, cell);
                    }
                }
            }
        }
    }

    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: u32, y: u32) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_single() {
        let grid = Grid::new(10, 10);
        assert_eq!(affected_cells(AreaShape::Single, p(0, 0), p(3, 3), &grid), vec![p(3, 3)]);
    }

    #[test]
    fn test_cross() {
        let grid = Grid::new(10, 10);
        let cells = affected_cells(AreaShape::Cross { radius: 1 }, p(0, 0), p(5, 5), &grid);
        assert_eq!(cells.len(), 5);
        for cell in [p(5, 5), p(5, 4), p(6, 5), p(5, 6), p(4, 5)] {
            assert!(cells.contains(&cell));
        }
    }

    #[test]
    fn test_cross_clipped_at_edge() {
        let grid = Grid::new(10, 10);
        let cells = affected_cells(AreaShape::Cross { radius: 2 }, p(5, 5), p(0, 0), &grid);
        assert_eq!(cells.len(), 5);
        assert!(cells.contains(&p(2, 0)));
        assert!(cells.contains(&p(0, 2)));
    }

    #[test]
    fn test_circle() {
        let grid = Grid::new(10, 10);
        let cells = affected_cells(AreaShape::Circle { radius: 1 }, p(0, 0), p(5, 5), &grid);
        assert_eq!(cells.len(), 5);

        let cells = affected_cells(AreaShape::Circle { radius: 2 }, p(0, 0), p(5, 5), &grid);
        // radius 2 disc: 13 cells (corners at distance sqrt(8) excluded)
        assert_eq!(cells.len(), 13);
        assert!(!cells.contains(&p(7, 7)));
    }

    #[test]
    fn test_line_continues_away_from_caster() {
        let grid = Grid::new(10, 10);
        let cells = affected_cells(AreaShape::Line { length: 3 }, p(1, 4), p(3, 4), &grid);
        assert_eq!(cells, vec![p(3, 4), p(4, 4), p(5, 4)]);
    }

    #[test]
    fn test_cone_widens() {
        let grid = Grid::new(10, 10);
        let cells = affected_cells(AreaShape::Cone { length: 2 }, p(5, 0), p(5, 1), &grid);
        assert_eq!(cells, vec![p(5, 1), p(4, 2), p(5, 2), p(6, 2)]);
    }

    #[test]
    fn test_self_cast_line_is_single_cell() {
        let grid = Grid::new(10, 10);
        let cells = affected_cells(AreaShape::Line { length: 4 }, p(2, 2), p(2, 2), &grid);
        assert_eq!(cells, vec![p(2, 2)]);
    }
}
