//! The sandbox facade: one owned world, table, policy and loop, plus the
//! read accessors and commands an outer driver or UI needs.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::env::Environment;
use crate::error::SandboxError;
use crate::grid::{Cell, GridWorld, Position};
use crate::maze::{MazeConfig, MazeGenerator};
use crate::policy::EpsilonGreedy;
use crate::prng::Prng;
use crate::qtable::{ActionValues, QTable};
use crate::training::{clamp01, RunState, StepReport, TrainingConfig, TrainingLoop, TrainingStats};

/// Greedy walk from the start using the current table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rollout {
    /// Visited positions, starting with the start cell.
    pub path: Vec<Position>,
    pub reached_goal: bool,
    /// Moves that ran into a wall or the grid edge.
    pub bumps: u32,
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    grid: GridWorld,
    qtable: QTable,
    policy: EpsilonGreedy,
    training: TrainingLoop,
    maze: MazeGenerator,
}

impl Sandbox {
    /// Empty `width` x `height` world.
    pub fn new(
        width: u32,
        height: u32,
        config: TrainingConfig,
        seed: u64,
    ) -> Result<Self, SandboxError> {
        Ok(Self::from_grid(GridWorld::new(width, height)?, config, seed))
    }

    /// Start from a prepared layout.
    pub fn from_grid(grid: GridWorld, config: TrainingConfig, seed: u64) -> Self {
        Self::assemble(grid, config, MazeConfig::default(), seed)
    }

    /// Freshly generated maze.
    pub fn with_maze(
        width: u32,
        height: u32,
        config: TrainingConfig,
        maze: MazeConfig,
        seed: u64,
    ) -> Result<Self, SandboxError> {
        let mut sandbox = Self::assemble(GridWorld::new(width, height)?, config, maze, seed);
        sandbox.generate_maze(None)?;
        Ok(sandbox)
    }

    fn assemble(grid: GridWorld, config: TrainingConfig, maze: MazeConfig, seed: u64) -> Self {
        let mut seeds = Prng::new(seed);
        let policy = EpsilonGreedy::new(seeds.next_u64());
        let maze = MazeGenerator::with_config(seeds.next_u64(), maze);
        let start = grid.start();
        Self {
            grid,
            qtable: QTable::new(),
            policy,
            training: TrainingLoop::new(config.clamped(), start),
            maze,
        }
    }

    // ── read accessors ──────────────────────────────────────────────────

    pub fn grid(&self) -> &GridWorld {
        &self.grid
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    pub fn cell(&self, pos: Position) -> Result<Cell, SandboxError> {
        self.grid.cell(pos)
    }

    pub fn values(&self, pos: Position) -> Result<ActionValues, SandboxError> {
        self.qtable.values(&self.grid, pos)
    }

    pub fn qtable(&self) -> &QTable {
        &self.qtable
    }

    pub fn agent(&self) -> Position {
        self.training.agent()
    }

    pub fn stats(&self) -> &TrainingStats {
        self.training.stats()
    }

    pub fn state(&self) -> RunState {
        self.training.state()
    }

    pub fn config(&self) -> &TrainingConfig {
        self.training.config()
    }

    pub fn maze_config(&self) -> &MazeConfig {
        self.maze.config()
    }

    // ── world edits ─────────────────────────────────────────────────────

    /// Paint one cell. Any real change invalidates the table; if the agent's
    /// own cell stops being plain floor, the agent goes back to the start.
    pub fn set_cell(&mut self, pos: Position, cell: Cell) -> Result<bool, SandboxError> {
        let changed = self.grid.set_cell(pos, cell)?;
        if !changed {
            return Ok(false);
        }

        self.qtable.reset();
        tracing::debug!(
            x = pos.x,
            y = pos.y,
            cell = cell.as_str(),
            "layout changed; q-table cleared"
        );

        let agent = self.training.agent();
        let agent_cell = self.grid.cell(agent).unwrap_or(Cell::Wall);
        if agent_cell != Cell::Empty {
            self.training.return_to_start(self.grid.start());
        }
        Ok(true)
    }

    /// Replace the layout with a new maze of the same size and reset
    /// learning. Without a seed the next maze comes from the sandbox's own
    /// stream.
    pub fn generate_maze(&mut self, seed: Option<u64>) -> Result<(), SandboxError> {
        if let Some(seed) = seed {
            self.maze = MazeGenerator::with_config(seed, *self.maze.config());
        }
        self.grid = self.maze.generate(self.grid.width(), self.grid.height())?;
        self.reset_world();
        Ok(())
    }

    // ── run control ─────────────────────────────────────────────────────

    pub fn start(&mut self) {
        self.training.start();
    }

    pub fn stop(&mut self) {
        self.training.stop();
    }

    /// Clear the table, counters and agent; keep the layout.
    pub fn reset_world(&mut self) {
        self.qtable.reset();
        self.training.reset(self.grid.start());
        tracing::debug!("world reset");
    }

    pub fn step(&mut self) -> Result<Option<StepReport>, SandboxError> {
        self.training.step(&self.grid, &mut self.qtable, &mut self.policy)
    }

    pub fn single_step(&mut self) -> Result<StepReport, SandboxError> {
        self.training
            .single_step(&self.grid, &mut self.qtable, &mut self.policy)
    }

    /// Up to `n` steps while running; returns how many ran.
    pub fn run_steps(&mut self, n: u32) -> Result<u32, SandboxError> {
        let mut done = 0;
        while done < n && self.step()?.is_some() {
            done += 1;
        }
        Ok(done)
    }

    // ── parameters (take effect on the next step) ───────────────────────

    pub fn set_learning_rate(&mut self, alpha: f32) -> f32 {
        let v = clamp01(alpha);
        self.training.config_mut().learning_rate = v;
        v
    }

    pub fn set_discount_factor(&mut self, gamma: f32) -> f32 {
        let v = clamp01(gamma);
        self.training.config_mut().discount_factor = v;
        v
    }

    /// Also replaces the current exploration rate.
    pub fn set_initial_epsilon(&mut self, epsilon: f32) -> f32 {
        let v = clamp01(epsilon);
        self.training.config_mut().initial_epsilon = v;
        self.training.set_epsilon(v);
        v
    }

    pub fn set_epsilon_decay(&mut self, rate: f32) -> f32 {
        let v = clamp01(rate);
        self.training.config_mut().epsilon_decay = v;
        v
    }

    pub fn set_epsilon_floor(&mut self, floor: f32) -> f32 {
        let v = clamp01(floor);
        self.training.config_mut().epsilon_floor = v;
        v
    }

    pub fn set_step_interval_ms(&mut self, ms: u32) -> u32 {
        let v = ms.clamp(TrainingConfig::MIN_INTERVAL_MS, TrainingConfig::MAX_INTERVAL_MS);
        self.training.config_mut().step_interval_ms = v;
        v
    }

    pub fn set_max_episode_steps(&mut self, steps: Option<u32>) {
        self.training.config_mut().max_episode_steps = steps.map(|s| s.max(1));
    }

    // ── evaluation ──────────────────────────────────────────────────────

    /// Follow the greedy action from the start for at most `max_steps`
    /// moves, without learning.
    pub fn greedy_rollout(&self, max_steps: u32) -> Result<Rollout, SandboxError> {
        let env = Environment::new(&self.grid, self.config().rewards);
        let mut pos = self.grid.start();
        let mut path = Vec::with_capacity(max_steps as usize + 1);
        path.push(pos);
        let mut bumps = 0;
        let mut reached_goal = false;

        for _ in 0..max_steps {
            let action = self.qtable.greedy_action(&self.grid, pos)?;
            let t = env.step(pos, action);
            if t.bumped {
                bumps += 1;
            }
            pos = t.next;
            path.push(pos);
            if t.terminal {
                reached_goal = self.grid.cell(pos) == Ok(Cell::Goal);
                break;
            }
        }

        Ok(Rollout {
            path,
            reached_goal,
            bumps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Action;

    fn bordered_5x5() -> GridWorld {
        let mut g = GridWorld::with_border_walls(5, 5).unwrap();
        g.set_cell(Position::new(3, 3), Cell::Goal).unwrap();
        g
    }

    fn scenario_config() -> TrainingConfig {
        TrainingConfig::default()
            .with_learning_rate(0.5)
            .with_discount_factor(0.9)
            .with_exploration(1.0, 0.95, 0.01)
    }

    #[test]
    fn learns_to_reach_goal_in_open_room() {
        let mut sb = Sandbox::from_grid(bordered_5x5(), scenario_config(), 42);
        sb.start();
        assert_eq!(sb.run_steps(5_000).unwrap(), 5_000);

        assert_eq!(sb.stats().epsilon, 0.01);

        let budget = sb.width() * sb.height();
        let r = sb.greedy_rollout(budget).unwrap();
        assert!(r.reached_goal, "path: {:?}", r.path);
        assert_eq!(r.bumps, 0);
        assert!(r.path.len() as u32 <= budget + 1);
        assert_eq!(r.path.first(), Some(&Position::new(1, 1)));
        assert_eq!(r.path.last(), Some(&Position::new(3, 3)));
    }

    #[test]
    fn learns_to_avoid_adjacent_trap() {
        let mut g = bordered_5x5();
        g.set_cell(Position::new(2, 1), Cell::Trap).unwrap();
        let mut sb = Sandbox::from_grid(g, scenario_config(), 7);
        sb.start();
        sb.run_steps(3_000).unwrap();
        assert!(sb.stats().traps_hit > 0);

        let v = sb.values(Position::new(1, 1)).unwrap();
        let toward_trap = v.get(Action::Right);
        for safe in [Action::Up, Action::Down, Action::Left] {
            assert!(toward_trap < v.get(safe), "{v:?}");
        }
    }

    #[test]
    fn training_on_generated_maze_finds_goal() {
        let cfg = scenario_config().with_exploration(1.0, 0.97, 0.02);
        let mut sb = Sandbox::with_maze(7, 7, cfg, MazeConfig::default(), 11).unwrap();
        assert!(sb.grid().is_solvable());
        sb.start();
        sb.run_steps(30_000).unwrap();
        let r = sb.greedy_rollout(49).unwrap();
        assert!(r.reached_goal, "\n{}", sb.grid().render_ascii(None));
    }

    #[test]
    fn edits_invalidate_the_table() {
        let mut sb = Sandbox::from_grid(bordered_5x5(), scenario_config(), 1);
        sb.start();
        sb.run_steps(200).unwrap();
        assert!(!sb.qtable().is_empty());
        let episodes = sb.stats().episodes;

        // Repainting the same type is not a change.
        assert_eq!(sb.set_cell(Position::new(0, 0), Cell::Wall), Ok(false));
        assert!(!sb.qtable().is_empty());

        assert_eq!(sb.set_cell(Position::new(2, 2), Cell::Wall), Ok(true));
        assert!(sb.qtable().is_empty());
        // Counters survive edits; only learning is invalidated.
        assert_eq!(sb.stats().episodes, episodes);
        assert_eq!(sb.state(), RunState::Running);
    }

    #[test]
    fn painting_under_agent_sends_it_home() {
        let mut sb = Sandbox::from_grid(bordered_5x5(), scenario_config(), 3);
        loop {
            sb.single_step().unwrap();
            if sb.agent() != sb.grid().start() {
                break;
            }
        }
        let here = sb.agent();
        sb.set_cell(here, Cell::Wall).unwrap();
        assert_eq!(sb.agent(), sb.grid().start());
        assert_eq!(sb.stats().episode_steps, 0);
        // Stepping keeps working on the edited layout.
        sb.single_step().unwrap();
    }

    #[test]
    fn start_cell_edit_is_refused() {
        let mut sb = Sandbox::from_grid(bordered_5x5(), scenario_config(), 3);
        assert_eq!(
            sb.set_cell(Position::new(1, 1), Cell::Trap),
            Err(SandboxError::ProtectedCell { x: 1, y: 1 })
        );
    }

    #[test]
    fn reset_world_keeps_layout() {
        let mut sb = Sandbox::from_grid(bordered_5x5(), scenario_config(), 5);
        sb.set_cell(Position::new(2, 2), Cell::Trap).unwrap();
        let layout = sb.grid().clone();
        sb.start();
        sb.run_steps(300).unwrap();

        sb.reset_world();
        assert_eq!(sb.state(), RunState::Idle);
        assert!(sb.qtable().is_empty());
        assert_eq!(sb.stats().total_steps, 0);
        assert_eq!(sb.stats().episodes, 0);
        assert_eq!(sb.stats().epsilon, 1.0);
        assert_eq!(sb.agent(), Position::new(1, 1));
        assert_eq!(sb.grid(), &layout);
    }

    #[test]
    fn goal_removed_mid_training_is_not_fatal() {
        let mut sb = Sandbox::from_grid(bordered_5x5(), scenario_config(), 8);
        sb.start();
        sb.run_steps(100).unwrap();
        sb.set_cell(Position::new(3, 3), Cell::Empty).unwrap();
        let episodes = sb.stats().episodes;

        assert_eq!(sb.run_steps(500).unwrap(), 500);
        assert_eq!(sb.stats().episodes, episodes);

        sb.set_cell(Position::new(2, 3), Cell::Goal).unwrap();
        sb.run_steps(2_000).unwrap();
        assert!(sb.stats().episodes > episodes);
    }

    #[test]
    fn generate_maze_is_seeded_and_resets() {
        let mut a = Sandbox::new(11, 11, TrainingConfig::default(), 1).unwrap();
        let mut b = Sandbox::new(11, 11, TrainingConfig::default(), 2).unwrap();
        a.start();
        a.run_steps(50).unwrap();

        a.generate_maze(Some(99)).unwrap();
        b.generate_maze(Some(99)).unwrap();
        assert_eq!(a.grid(), b.grid());
        assert_eq!(a.state(), RunState::Idle);
        assert_eq!(a.stats().total_steps, 0);
        assert!(a.grid().is_solvable());

        let before = a.grid().clone();
        a.generate_maze(None).unwrap();
        assert_ne!(a.grid(), &before);
    }

    #[test]
    fn setters_clamp_and_apply_immediately() {
        let mut sb = Sandbox::from_grid(bordered_5x5(), TrainingConfig::default(), 4);
        assert_eq!(sb.set_learning_rate(2.0), 1.0);
        assert_eq!(sb.set_discount_factor(-1.0), 0.0);
        assert_eq!(sb.set_initial_epsilon(0.25), 0.25);
        assert_eq!(sb.stats().epsilon, 0.25);
        assert_eq!(sb.set_epsilon_decay(0.5), 0.5);
        assert_eq!(sb.set_epsilon_floor(0.2), 0.2);
        assert_eq!(sb.set_step_interval_ms(0), 1);
        assert_eq!(sb.set_step_interval_ms(120_000), 60_000);

        // α = 1, γ = 0: the very next update writes the raw reward.
        let r = sb.single_step().unwrap();
        let q = sb.values(r.from).unwrap().get(r.action);
        assert_eq!(q, r.transition.reward);
    }

    #[test]
    fn wall_query_through_facade() {
        let sb = Sandbox::from_grid(bordered_5x5(), TrainingConfig::default(), 4);
        assert_eq!(
            sb.values(Position::new(0, 0)),
            Err(SandboxError::WallQuery { x: 0, y: 0 })
        );
        assert!(Sandbox::new(2, 2, TrainingConfig::default(), 0).is_err());
    }
}
