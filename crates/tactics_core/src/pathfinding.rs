//! Grid pathfinding using interchangeable A* variants.
//!
//! All variants share one search shell: a min-heap open set ordered by
//! `f = g + h` (ties broken on the smaller `h`, then on cell coordinates so
//! results are deterministic), a closed set, and a g-score map. The variants
//! differ only in their neighbour rule and heuristic.
//!
//! Edge cost is the terrain cost of the cell being entered. Cells occupied by
//! other units are never expanded.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::PathError;
use crate::grid::{Grid, Position};

/// Orthogonal neighbour offsets: North, East, South, West.
pub const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Eight-way neighbour offsets, orthogonals first.
pub const EIGHT_WAY: [(i32, i32); 8] = [
    (0, -1),  // North
    (1, 0),   // East
    (0, 1),   // South
    (-1, 0),  // West
    (1, -1),  // Northeast
    (1, 1),   // Southeast
    (-1, 1),  // Southwest
    (-1, -1), // Northwest
];

/// A found path. `path` excludes the start cell and ends at the goal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathResult {
    /// Cells to step through, in order.
    pub path: Vec<Position>,
    /// Total movement cost.
    pub cost: u32,
}

/// A pathfinding strategy: a neighbour rule plus an admissible heuristic.
pub trait PathStrategy: fmt::Debug + Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Neighbour offsets this strategy may step along.
    fn neighbours(&self) -> &'static [(i32, i32)];

    /// Estimated remaining cost from `from` to `to`.
    fn heuristic(&self, from: Position, to: Position) -> u32;

    /// Find the cheapest path from `start` to `goal` avoiding `occupied`.
    fn find_path(
        &self,
        grid: &Grid,
        start: Position,
        goal: Position,
        occupied: &HashSet<Position>,
    ) -> Result<PathResult, PathError> {
        astar(self, grid, start, goal, occupied)
    }
}

/// 4-neighbour A* with `h = |dx| + |dy|`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManhattanAStar;

impl PathStrategy for ManhattanAStar {
    fn name(&self) -> &'static str {
        "manhattan"
    }

    fn neighbours(&self) -> &'static [(i32, i32)] {
        &ORTHOGONAL
    }

    fn heuristic(&self, from: Position, to: Position) -> u32 {
        from.manhattan(to)
    }
}

/// 4-neighbour A* with `h = round(sqrt(dx² + dy²))`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EuclideanAStar;

impl PathStrategy for EuclideanAStar {
    fn name(&self) -> &'static str {
        "euclidean"
    }

    fn neighbours(&self) -> &'static [(i32, i32)] {
        &ORTHOGONAL
    }

    fn heuristic(&self, from: Position, to: Position) -> u32 {
        from.euclidean(to)
    }
}

/// 8-neighbour A* with `h = max(|dx|, |dy|)`.
///
/// Diagonal steps cost the same as orthogonal ones but may not cut the corner
/// of an impassable cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagonalAStar;

impl PathStrategy for DiagonalAStar {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn neighbours(&self) -> &'static [(i32, i32)] {
        &EIGHT_WAY
    }

    fn heuristic(&self, from: Position, to: Position) -> u32 {
        from.chebyshev(to)
    }
}

/// Serializable selector for the built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PathHeuristic {
    /// [`ManhattanAStar`].
    #[default]
    Manhattan,
    /// [`EuclideanAStar`].
    Euclidean,
    /// [`DiagonalAStar`].
    Diagonal,
}

impl PathHeuristic {
    /// Instantiate the strategy.
    #[must_use]
    pub fn strategy(self) -> Arc<dyn PathStrategy> {
        match self {
            Self::Manhattan => Arc::new(ManhattanAStar),
            Self::Euclidean => Arc::new(EuclideanAStar),
            Self::Diagonal => Arc::new(DiagonalAStar),
        }
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    pos: Position,
    f_score: u32,
    h_score: u32,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse every key for min-heap behaviour.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.h_score.cmp(&self.h_score))
            .then_with(|| (other.pos.y, other.pos.x).cmp(&(self.pos.y, self.pos.x)))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Neighbour of `pos` along `(dx, dy)`, if it is on the grid, passable and
/// (for diagonals) does not cut an impassable corner.
fn step(grid: &Grid, pos: Position, (dx, dy): (i32, i32)) -> Option<(Position, u32)> {
    let next = pos.offset(dx, dy)?;
    let cost = grid.movement_cost(next)?;

    if dx != 0 && dy != 0 {
        let side_a = pos.offset(dx, 0)?;
        let side_b = pos.offset(0, dy)?;
        if !grid.is_passable(side_a) || !grid.is_passable(side_b) {
            return None;
        }
    }

    Some((next, cost))
}

/// Shared A* shell used by every strategy.
fn astar<S: PathStrategy + ?Sized>(
    strategy: &S,
    grid: &Grid,
    start: Position,
    goal: Position,
    occupied: &HashSet<Position>,
) -> Result<PathResult, PathError> {
    if !grid.in_bounds(start) {
        return Err(PathError::OutOfBounds(start));
    }
    if !grid.in_bounds(goal) {
        return Err(PathError::OutOfBounds(goal));
    }
    if start == goal {
        return Ok(PathResult::default());
    }
    if !grid.is_passable(goal) {
        return Err(PathError::Impassable(goal));
    }
    if occupied.contains(&goal) {
        return Err(PathError::GoalOccupied(goal));
    }

    let mut open_set = BinaryHeap::new();
    let mut closed: HashSet<Position> = HashSet::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut g_score: HashMap<Position, u32> = HashMap::new();

    let start_h = strategy.heuristic(start, goal);
    g_score.insert(start, 0);
    open_set.push(AStarNode {
        pos: start,
        f_score: start_h,
        h_score: start_h,
    });

    while let Some(current) = open_set.pop() {
        if current.pos == goal {
            let cost = g_score.get(&goal).copied().unwrap_or(0);
            let path = reconstruct_path(&came_from, start, goal);
            trace!(strategy = strategy.name(), %start, %goal, cost, "Path found");
            return Ok(PathResult { path, cost });
        }

        if !closed.insert(current.pos) {
            continue;
        }

        let current_g = g_score.get(&current.pos).copied().unwrap_or(u32::MAX);

        for &offset in strategy.neighbours() {
            let Some((next, cost)) = step(grid, current.pos, offset) else {
                continue;
            };
            if occupied.contains(&next) || closed.contains(&next) {
                continue;
            }

            let tentative_g = current_g.saturating_add(cost);
            let neighbour_g = g_score.get(&next).copied().unwrap_or(u32::MAX);

            if tentative_g < neighbour_g {
                came_from.insert(next, current.pos);
                g_score.insert(next, tentative_g);

                let h = strategy.heuristic(next, goal);
                open_set.push(AStarNode {
                    pos: next,
                    f_score: tentative_g.saturating_add(h),
                    h_score: h,
                });
            }
        }
    }

    Err(PathError::NoPath {
        from: start,
        to: goal,
    })
}

/// Walk `came_from` back from the goal. The start cell is not included.
fn reconstruct_path(
    came_from: &HashMap<Position, Position>,
    start: Position,
    goal: Position,
) -> Vec<Position> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}

/// Pathfinding service with a runtime-swappable strategy.
#[derive(Debug, Clone)]
pub struct Pathfinder {
    strategy: Arc<dyn PathStrategy>,
}

impl Pathfinder {
    /// Create a service using the given strategy.
    #[must_use]
    pub fn new(strategy: Arc<dyn PathStrategy>) -> Self {
        Self { strategy }
    }

    /// Create a service using a built-in strategy.
    #[must_use]
    pub fn with_heuristic(heuristic: PathHeuristic) -> Self {
        Self::new(heuristic.strategy())
    }

    /// Active strategy.
    #[must_use]
    pub fn strategy(&self) -> &dyn PathStrategy {
        self.strategy.as_ref()
    }

    /// Replace the active strategy.
    pub fn set_strategy(&mut self, strategy: Arc<dyn PathStrategy>) {
        self.strategy = strategy;
    }

    /// Cheapest path from `start` to `goal`.
    pub fn find_path(
        &self,
        grid: &Grid,
        start: Position,
        goal: Position,
        occupied: &HashSet<Position>,
    ) -> Result<PathResult, PathError> {
        self.strategy.find_path(grid, start, goal, occupied)
    }

    /// Cheapest path, failing with [`PathError::OutOfRange`] if it costs more
    /// than `budget`.
    pub fn path_within_budget(
        &self,
        grid: &Grid,
        start: Position,
        goal: Position,
        budget: u32,
        occupied: &HashSet<Position>,
    ) -> Result<PathResult, PathError> {
        let result = self.find_path(grid, start, goal, occupied)?;
        if result.cost > budget {
            return Err(PathError::OutOfRange {
                cost: result.cost,
                budget,
            });
        }
        Ok(result)
    }

    /// Every cell reachable from `start` within `budget`, with its cheapest
    /// cost. The start cell is not included.
    ///
    /// Uses the active strategy's neighbour rule, so move-range highlighting
    /// always agrees with [`Pathfinder::find_path`].
    #[must_use]
    pub fn reachable_cells(
        &self,
        grid: &Grid,
        start: Position,
        budget: u32,
        occupied: &HashSet<Position>,
    ) -> BTreeMap<Position, u32> {
        let mut best: BTreeMap<Position, u32> = BTreeMap::new();
        if !grid.in_bounds(start) {
            return best;
        }

        let mut frontier = BinaryHeap::new();
        best.insert(start, 0);
        frontier.push(std::cmp::Reverse((0u32, start.y, start.x)));

        while let Some(std::cmp::Reverse((cost, y, x))) = frontier.pop() {
            let pos = Position::new(x, y);
            if best.get(&pos).is_some_and(|&known| known < cost) {
                continue;
            }

            for &offset in self.strategy.neighbours() {
                let Some((next, step_cost)) = step(grid, pos, offset) else {
                    continue;
                };
                if occupied.contains(&next) {
                    continue;
                }
                let next_cost = cost.saturating_add(step_cost);
                if next_cost > budget {
                    continue;
                }
                if best.get(&next).map_or(true, |&known| next_cost < known) {
                    best.insert(next, next_cost);
                    frontier.push(std::cmp::Reverse((next_cost, next.y, next.x)));
                }
            }
        }

        best.remove(&start);
        best
    }

    /// Returns true if `goal` can be reached from `start` within `budget`.
    #[must_use]
    pub fn is_reachable(
        &self,
        grid: &Grid,
        start: Position,
        goal: Position,
        budget: u32,
        occupied: &HashSet<Position>,
    ) -> bool {
        self.path_within_budget(grid, start, goal, budget, occupied)
            .is_ok()
    }
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::with_heuristic(PathHeuristic::Manhattan)
    }
}
