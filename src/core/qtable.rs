//! Tabular action-value store and the one-step Q-learning update.

use hashbrown::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::SandboxError;
use crate::grid::{Action, Cell, GridWorld, Position};

/// Value estimates for the four actions at one position, indexed by
/// [`Action::index`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActionValues(pub [f32; Action::COUNT]);

impl ActionValues {
    #[inline]
    pub fn get(&self, action: Action) -> f32 {
        self.0[action.index()]
    }

    #[inline]
    pub fn set(&mut self, action: Action, value: f32) {
        self.0[action.index()] = value;
    }

    pub fn max(&self) -> f32 {
        self.0.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Highest-valued action; the lowest index wins ties.
    pub fn argmax(&self) -> Action {
        let mut best = 0usize;
        for i in 1..Action::COUNT {
            if self.0[i] > self.0[best] {
                best = i;
            }
        }
        Action::ALL[best]
    }

    /// Bitmask (bit = action index) of every action tied at the maximum.
    pub fn argmax_mask(&self) -> u8 {
        let m = self.max();
        let mut mask = 0u8;
        for (i, &v) in self.0.iter().enumerate() {
            if v == m {
                mask |= 1 << i;
            }
        }
        mask
    }
}

/// Per-position action values. Positions are zero until first written.
#[derive(Debug, Clone, Default)]
pub struct QTable {
    values: HashMap<Position, ActionValues>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(grid: &GridWorld, pos: Position) -> Result<(), SandboxError> {
        match grid.cell(pos)? {
            Cell::Wall => Err(SandboxError::WallQuery { x: pos.x, y: pos.y }),
            _ => Ok(()),
        }
    }

    #[inline]
    fn lookup(&self, pos: Position) -> ActionValues {
        self.values.get(&pos).copied().unwrap_or_default()
    }

    /// Values at `pos`. Wall cells have none.
    pub fn values(&self, grid: &GridWorld, pos: Position) -> Result<ActionValues, SandboxError> {
        Self::check(grid, pos)?;
        Ok(self.lookup(pos))
    }

    pub fn best_value(&self, grid: &GridWorld, pos: Position) -> Result<f32, SandboxError> {
        self.values(grid, pos).map(|v| v.max())
    }

    /// Deterministic greedy choice (lowest index on ties), for rollouts.
    pub fn greedy_action(&self, grid: &GridWorld, pos: Position) -> Result<Action, SandboxError> {
        self.values(grid, pos).map(|v| v.argmax())
    }

    /// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') − Q(s,a)]
    ///
    /// Off-policy: the target bootstraps from the greedy value of `next`
    /// whatever the behaviour policy does next. Both positions are checked
    /// before anything is written. Returns the TD error.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        grid: &GridWorld,
        pos: Position,
        action: Action,
        reward: f32,
        next: Position,
        learning_rate: f32,
        discount_factor: f32,
    ) -> Result<f32, SandboxError> {
        Self::check(grid, pos)?;
        Self::check(grid, next)?;

        let max_next = self.lookup(next).max();
        let entry = self.values.entry(pos).or_default();
        let current = entry.get(action);
        let td_error = reward + discount_factor * max_next - current;
        entry.set(action, current + learning_rate * td_error);
        Ok(td_error)
    }

    /// Forget everything learned.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Number of positions that have been written at least once.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, ActionValues)> + '_ {
        self.values.iter().map(|(&p, &v)| (p, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid() -> GridWorld {
        let mut g = GridWorld::with_border_walls(5, 5).unwrap();
        g.set_cell(Position::new(3, 3), Cell::Goal).unwrap();
        g
    }

    const S: Position = Position::new(1, 1);
    const N: Position = Position::new(2, 1);

    #[test]
    fn unseen_positions_are_zero() {
        let g = open_grid();
        let q = QTable::new();
        assert_eq!(q.values(&g, S).unwrap(), ActionValues([0.0; 4]));
        assert!(q.is_empty());
    }

    #[test]
    fn wall_queries_fail() {
        let g = open_grid();
        let mut q = QTable::new();
        let wall = Position::new(0, 0);
        assert_eq!(q.values(&g, wall), Err(SandboxError::WallQuery { x: 0, y: 0 }));
        assert_eq!(
            q.update(&g, wall, Action::Up, 1.0, S, 0.5, 0.9),
            Err(SandboxError::WallQuery { x: 0, y: 0 })
        );
        assert_eq!(
            q.update(&g, S, Action::Up, 1.0, wall, 0.5, 0.9),
            Err(SandboxError::WallQuery { x: 0, y: 0 })
        );
        assert!(q.is_empty(), "failed updates must not write");
        assert!(matches!(
            q.values(&g, Position::new(9, 9)),
            Err(SandboxError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn zero_learning_rate_is_idempotent() {
        let g = open_grid();
        let mut q = QTable::new();
        q.update(&g, S, Action::Right, 3.0, N, 1.0, 0.0).unwrap();
        let before = q.values(&g, S).unwrap();
        for i in 0..100 {
            q.update(&g, S, Action::Right, i as f32 - 50.0, N, 0.0, 0.9)
                .unwrap();
        }
        assert_eq!(q.values(&g, S).unwrap(), before);
    }

    #[test]
    fn full_rate_no_discount_sets_reward() {
        let g = open_grid();
        let mut q = QTable::new();
        q.update(&g, N, Action::Down, 7.0, S, 1.0, 0.0).unwrap();
        q.update(&g, S, Action::Right, -1.0, N, 1.0, 0.0).unwrap();
        assert_eq!(q.values(&g, S).unwrap().get(Action::Right), -1.0);
    }

    #[test]
    fn update_bootstraps_from_next_state_max() {
        let g = open_grid();
        let mut q = QTable::new();
        // Seed Q(N, ·) = [0, 2, 0, 0] via α=1, γ=0.
        q.update(&g, N, Action::Down, 2.0, S, 1.0, 0.0).unwrap();

        // Q(S,Right) = 0 + 0.5 * (0 + 0.9 * 2 - 0) = 0.9
        let td = q.update(&g, S, Action::Right, 0.0, N, 0.5, 0.9).unwrap();
        assert!((td - 1.8).abs() < 1e-6);
        let v = q.values(&g, S).unwrap().get(Action::Right);
        assert!((v - 0.9).abs() < 1e-6);
    }

    #[test]
    fn reset_zeroes_everything() {
        let g = open_grid();
        let mut q = QTable::new();
        q.update(&g, S, Action::Left, 5.0, S, 1.0, 0.0).unwrap();
        assert_eq!(q.len(), 1);
        q.reset();
        assert!(q.is_empty());
        assert_eq!(q.best_value(&g, S).unwrap(), 0.0);
    }

    #[test]
    fn greedy_and_ties() {
        let v = ActionValues([1.0, 3.0, 3.0, -2.0]);
        assert_eq!(v.max(), 3.0);
        assert_eq!(v.argmax(), Action::Down);
        assert_eq!(v.argmax_mask(), 0b0110);
        assert_eq!(ActionValues::default().argmax_mask(), 0b1111);
    }
}
