//! Pathfinding benchmarks for tactics_core.
//!
//! Run with: `cargo bench -p tactics_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tactics_core::grid::{Grid, Position, TerrainType};
use tactics_core::pathfinding::{PathHeuristic, Pathfinder};

/// A 32x32 map with a wall across the middle and one gap.
fn walled_grid() -> Grid {
    let mut grid = Grid::new(32, 32);
    for x in 0..31 {
        grid.set_terrain(Position::new(x, 16), TerrainType::Obstacle);
    }
    for y in 4..12 {
        grid.set_terrain(Position::new(20, y), TerrainType::Difficult);
    }
    grid
}

/// Compares the three A* strategies on the same long path.
pub fn pathfinding_benchmark(c: &mut Criterion) {
    let grid = walled_grid();
    let occupied = HashSet::new();
    let mut group = c.benchmark_group("find_path");

    for heuristic in [PathHeuristic::Manhattan, PathHeuristic::Euclidean, PathHeuristic::Diagonal] {
        let pathfinder = Pathfinder::with_heuristic(heuristic);
        let id = BenchmarkId::from_parameter(format!("{heuristic:?}"));
        group.bench_with_input(id, &pathfinder, |b, pf| {
            b.iter(|| {
                pf.find_path(
                    black_box(&grid),
                    black_box(Position::new(0, 0)),
                    black_box(Position::new(0, 31)),
                    &occupied,
                )
            })
        });
    }
    group.finish();
}

/// Movement-range flood fill used for AI movement and range highlighting.
pub fn reachable_benchmark(c: &mut Criterion) {
    let grid = walled_grid();
    let occupied = HashSet::new();
    let pathfinder = Pathfinder::with_heuristic(PathHeuristic::Manhattan);

    c.bench_function("reachable_cells_budget_8", |b| {
        b.iter(|| {
            pathfinder.reachable_cells(
                black_box(&grid),
                Position::new(10, 10),
                black_box(8),
                &occupied,
            )
        })
    });
}

criterion_group!(benches, pathfinding_benchmark, reachable_benchmark);
criterion_main!(benches);
