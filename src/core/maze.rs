//! Randomized maze generation over a `GridWorld`.
//!
//! Passages are carved by depth-first backtracking on the lattice of cells at
//! even offsets from the start, which yields a spanning tree: every carved cell
//! is reachable and there is exactly one route between any two of them. The
//! goal sits on that tree, and traps only go on dead ends away from the start
//! and the goal, so a generated maze is always solvable.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::SandboxError;
use crate::grid::{Action, Cell, GridWorld, Position};
use crate::prng::Prng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MazeConfig {
    /// At most `floor(W * H / trap_density_divisor)` traps; 0 disables traps.
    pub trap_density_divisor: u32,
    /// Dead ends within this Manhattan distance of the start or goal stay empty.
    pub exclusion_radius: u32,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            trap_density_divisor: 40,
            exclusion_radius: 2,
        }
    }
}

impl MazeConfig {
    pub fn trap_budget(&self, width: u32, height: u32) -> usize {
        if self.trap_density_divisor == 0 {
            return 0;
        }
        ((width as usize) * (height as usize)) / (self.trap_density_divisor as usize)
    }
}

#[derive(Debug, Clone)]
pub struct MazeGenerator {
    config: MazeConfig,
    rng: Prng,
}

impl MazeGenerator {
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, MazeConfig::default())
    }

    pub fn with_config(seed: u64, config: MazeConfig) -> Self {
        Self {
            config,
            rng: Prng::new(seed ^ 0xA5A5_5A5Au64),
        }
    }

    pub fn config(&self) -> &MazeConfig {
        &self.config
    }

    /// Build a fresh maze. Repeated calls on one generator continue the same
    /// random stream, so each call yields a different layout.
    pub fn generate(&mut self, width: u32, height: u32) -> Result<GridWorld, SandboxError> {
        let mut grid = GridWorld::new(width, height)?;
        carve_passages(&mut grid, &mut self.rng);
        let goal = place_goal(&mut grid);
        let traps = self.place_traps(&mut grid, goal);

        tracing::debug!(
            width,
            height,
            goal_x = goal.x,
            goal_y = goal.y,
            traps,
            "maze generated"
        );
        Ok(grid)
    }

    fn place_traps(&mut self, grid: &mut GridWorld, goal: Position) -> usize {
        let budget = self.config.trap_budget(grid.width(), grid.height());
        if budget == 0 {
            return 0;
        }

        let start = grid.start();
        let radius = self.config.exclusion_radius;
        let mut dead_ends: Vec<Position> = grid
            .positions()
            .filter(|&p| grid.cell(p) == Ok(Cell::Empty))
            .filter(|&p| grid.open_neighbor_count(p) == 1)
            .filter(|&p| p.manhattan(start) > radius && p.manhattan(goal) > radius)
            .collect();

        self.rng.shuffle(&mut dead_ends);
        let placed = dead_ends.len().min(budget);
        for &p in &dead_ends[..placed] {
            grid.put(p, Cell::Trap);
        }
        placed
    }
}

#[inline]
fn index(grid: &GridWorld, p: Position) -> usize {
    (p.y as usize) * (grid.width() as usize) + (p.x as usize)
}

/// Lattice cells keep the outer ring as wall.
fn on_lattice(grid: &GridWorld, p: Position) -> bool {
    let start = grid.start();
    p.x >= 1
        && p.y >= 1
        && p.x + 1 < grid.width()
        && p.y + 1 < grid.height()
        && p.x.abs_diff(start.x) % 2 == 0
        && p.y.abs_diff(start.y) % 2 == 0
}

fn carve_passages(grid: &mut GridWorld, rng: &mut Prng) {
    let start = grid.start();
    grid.fill(Cell::Wall);
    grid.put(start, Cell::Empty);

    let mut visited = vec![false; (grid.width() as usize) * (grid.height() as usize)];
    visited[index(grid, start)] = true;

    let mut stack: Vec<Position> = Vec::new();
    stack.push(start);

    while let Some(&pos) = stack.last() {
        let mut options = [(pos, pos); 4];
        let mut n = 0usize;

        for a in Action::ALL {
            let Some(between) = grid.neighbor(pos, a) else {
                continue;
            };
            let Some(next) = grid.neighbor(between, a) else {
                continue;
            };
            if on_lattice(grid, next) && !visited[index(grid, next)] {
                options[n] = (between, next);
                n += 1;
            }
        }

        if n == 0 {
            stack.pop();
            continue;
        }

        let (between, next) = options[rng.gen_range_usize(0, n)];
        grid.put(between, Cell::Empty);
        grid.put(next, Cell::Empty);
        visited[index(grid, next)] = true;
        stack.push(next);
    }
}

/// Mark the carved cell nearest the corner opposite the start as the goal.
///
/// Grids too small to carve anything beyond the start get the goal right
/// next to it instead.
fn place_goal(grid: &mut GridWorld) -> Position {
    let start = grid.start();
    let target = Position::new(grid.width() - 2, grid.height() - 2);

    let carved = grid
        .positions()
        .filter(|&p| p != start && on_lattice(grid, p) && grid.is_passable(p))
        .min_by_key(|&p| p.manhattan(target));

    let goal = carved.unwrap_or_else(|| {
        [Action::Right, Action::Down, Action::Left, Action::Up]
            .into_iter()
            .filter_map(|a| grid.neighbor(start, a))
            .min_by_key(|&p| p.manhattan(target))
            .unwrap_or(target)
    });

    grid.put(goal, Cell::Goal);
    goal
}
