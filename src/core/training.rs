//! Training loop state machine and running statistics.
//!
//! The loop owns the agent position, counters and hyperparameters. The grid,
//! table and policy are borrowed for the duration of one step, so edits and
//! steps are serialized by construction.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::env::{Environment, Rewards, Transition};
use crate::error::SandboxError;
use crate::grid::{Action, Cell, GridWorld, Position};
use crate::policy::EpsilonGreedy;
use crate::qtable::QTable;

/// Hyperparameters; every field can change between steps.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrainingConfig {
    /// α in the update rule.
    pub learning_rate: f32,
    /// γ in the update rule.
    pub discount_factor: f32,
    /// Exploration rate after a learning reset.
    pub initial_epsilon: f32,
    /// Multiplier applied to epsilon after each finished episode.
    pub epsilon_decay: f32,
    pub epsilon_floor: f32,
    /// Pacing hint for real-time drivers.
    pub step_interval_ms: u32,
    pub rewards: Rewards,
    /// End an episode as a timeout after this many steps. `None` lets the
    /// agent wander indefinitely (e.g. while no goal exists).
    pub max_episode_steps: Option<u32>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            initial_epsilon: 1.0,
            epsilon_decay: 0.99,
            epsilon_floor: 0.05,
            step_interval_ms: 50,
            rewards: Rewards::default(),
            max_episode_steps: None,
        }
    }
}

impl TrainingConfig {
    pub const MIN_INTERVAL_MS: u32 = 1;
    pub const MAX_INTERVAL_MS: u32 = 60_000;

    pub fn with_learning_rate(mut self, alpha: f32) -> Self {
        self.learning_rate = alpha;
        self
    }

    pub fn with_discount_factor(mut self, gamma: f32) -> Self {
        self.discount_factor = gamma;
        self
    }

    /// Set initial epsilon, per-episode decay and floor together.
    pub fn with_exploration(mut self, initial: f32, decay: f32, floor: f32) -> Self {
        self.initial_epsilon = initial;
        self.epsilon_decay = decay;
        self.epsilon_floor = floor;
        self
    }

    pub fn with_rewards(mut self, rewards: Rewards) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn with_max_episode_steps(mut self, steps: Option<u32>) -> Self {
        self.max_episode_steps = steps;
        self
    }

    pub fn with_step_interval_ms(mut self, ms: u32) -> Self {
        self.step_interval_ms = ms;
        self
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms as u64)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.learning_rate) {
            return Err("learning_rate must be in [0, 1]");
        }
        if !unit.contains(&self.discount_factor) {
            return Err("discount_factor must be in [0, 1]");
        }
        if !unit.contains(&self.initial_epsilon) {
            return Err("initial_epsilon must be in [0, 1]");
        }
        if !unit.contains(&self.epsilon_decay) {
            return Err("epsilon_decay must be in [0, 1]");
        }
        if !unit.contains(&self.epsilon_floor) {
            return Err("epsilon_floor must be in [0, 1]");
        }
        if !(Self::MIN_INTERVAL_MS..=Self::MAX_INTERVAL_MS).contains(&self.step_interval_ms) {
            return Err("step_interval_ms must be in [1, 60000]");
        }
        if self.max_episode_steps == Some(0) {
            return Err("max_episode_steps must be > 0");
        }
        Ok(())
    }

    /// Pull every field into its valid range.
    pub fn clamped(mut self) -> Self {
        self.learning_rate = clamp01(self.learning_rate);
        self.discount_factor = clamp01(self.discount_factor);
        self.initial_epsilon = clamp01(self.initial_epsilon);
        self.epsilon_decay = clamp01(self.epsilon_decay);
        self.epsilon_floor = clamp01(self.epsilon_floor);
        self.step_interval_ms = self
            .step_interval_ms
            .clamp(Self::MIN_INTERVAL_MS, Self::MAX_INTERVAL_MS);
        self.max_episode_steps = self.max_episode_steps.map(|s| s.max(1));
        self
    }
}

pub(crate) fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EpisodeOutcome {
    Goal,
    Trap,
    Timeout,
}

impl EpisodeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            EpisodeOutcome::Goal => "goal",
            EpisodeOutcome::Trap => "trap",
            EpisodeOutcome::Timeout => "timeout",
        }
    }

    pub fn is_success(self) -> bool {
        self == EpisodeOutcome::Goal
    }
}

/// Counters exposed to observers.
///
/// `episode_steps` resets every episode. Everything else survives episode
/// boundaries and only resets on an explicit learning reset.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainingStats {
    pub episodes: u32,
    pub episode_steps: u32,
    pub total_steps: u64,
    pub cumulative_reward: f64,
    pub epsilon: f32,

    pub goals_reached: u32,
    pub traps_hit: u32,
    pub timeouts: u32,

    pub episode_reward: f32,
    pub last_episode_steps: u32,
    pub last_episode_reward: f32,
    pub last_outcome: Option<EpisodeOutcome>,

    /// Success flags of the most recent episodes, oldest first.
    pub recent: Vec<bool>,
}

impl TrainingStats {
    pub const RECENT_WINDOW: usize = 200;

    pub fn new(epsilon: f32) -> Self {
        Self {
            episodes: 0,
            episode_steps: 0,
            total_steps: 0,
            cumulative_reward: 0.0,
            epsilon,
            goals_reached: 0,
            traps_hit: 0,
            timeouts: 0,
            episode_reward: 0.0,
            last_episode_steps: 0,
            last_episode_reward: 0.0,
            last_outcome: None,
            recent: Vec::with_capacity(Self::RECENT_WINDOW),
        }
    }

    fn record_step(&mut self, reward: f32) {
        self.episode_steps += 1;
        self.total_steps += 1;
        self.episode_reward += reward;
        self.cumulative_reward += reward as f64;
    }

    fn record_episode(&mut self, outcome: EpisodeOutcome) {
        match outcome {
            EpisodeOutcome::Goal => self.goals_reached += 1,
            EpisodeOutcome::Trap => self.traps_hit += 1,
            EpisodeOutcome::Timeout => self.timeouts += 1,
        }

        self.recent.push(outcome.is_success());
        if self.recent.len() > Self::RECENT_WINDOW {
            self.recent.remove(0);
        }

        self.episodes += 1;
        self.last_episode_steps = self.episode_steps;
        self.last_episode_reward = self.episode_reward;
        self.last_outcome = Some(outcome);
        self.episode_steps = 0;
        self.episode_reward = 0.0;
    }

    /// Fraction of all finished episodes that reached the goal.
    pub fn success_rate(&self) -> f32 {
        if self.episodes == 0 {
            0.0
        } else {
            self.goals_reached as f32 / self.episodes as f32
        }
    }

    pub fn recent_success_rate(&self) -> f32 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let hits = self.recent.iter().filter(|&&x| x).count();
        hits as f32 / self.recent.len() as f32
    }
}

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub from: Position,
    pub action: Action,
    pub transition: Transition,
    pub td_error: f32,
    /// Set when this step finished an episode.
    pub outcome: Option<EpisodeOutcome>,
}

#[derive(Debug, Clone)]
pub struct TrainingLoop {
    config: TrainingConfig,
    stats: TrainingStats,
    agent: Position,
    state: RunState,
}

impl TrainingLoop {
    pub fn new(config: TrainingConfig, start: Position) -> Self {
        Self {
            stats: TrainingStats::new(config.initial_epsilon),
            config,
            agent: start,
            state: RunState::Idle,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TrainingConfig {
        &mut self.config
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    pub fn agent(&self) -> Position {
        self.agent
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub(crate) fn set_epsilon(&mut self, epsilon: f32) {
        self.stats.epsilon = epsilon;
    }

    pub fn start(&mut self) {
        if self.state != RunState::Running {
            tracing::debug!(from = self.state.as_str(), "training started");
            self.state = RunState::Running;
        }
    }

    /// Halt stepping; learned values and counters are kept.
    pub fn stop(&mut self) {
        if self.state == RunState::Running {
            tracing::debug!("training paused");
            self.state = RunState::Paused;
        }
    }

    /// Back to `Idle` with fresh counters and the initial exploration rate.
    pub fn reset(&mut self, start: Position) {
        self.stats = TrainingStats::new(self.config.initial_epsilon);
        self.agent = start;
        self.state = RunState::Idle;
    }

    /// Abandon the current episode without counting it.
    pub fn return_to_start(&mut self, start: Position) {
        self.agent = start;
        self.stats.episode_steps = 0;
        self.stats.episode_reward = 0.0;
    }

    /// One step while `Running`; `Ok(None)` otherwise.
    pub fn step(
        &mut self,
        grid: &GridWorld,
        qtable: &mut QTable,
        policy: &mut EpsilonGreedy,
    ) -> Result<Option<StepReport>, SandboxError> {
        if !self.is_running() {
            return Ok(None);
        }
        self.advance(grid, qtable, policy).map(Some)
    }

    /// One step from any state. From `Idle` or `Paused` the loop ends up
    /// `Paused`, ready for the next manual step or `start()`.
    pub fn single_step(
        &mut self,
        grid: &GridWorld,
        qtable: &mut QTable,
        policy: &mut EpsilonGreedy,
    ) -> Result<StepReport, SandboxError> {
        if !self.is_running() {
            self.state = RunState::Paused;
        }
        self.advance(grid, qtable, policy)
    }

    fn advance(
        &mut self,
        grid: &GridWorld,
        qtable: &mut QTable,
        policy: &mut EpsilonGreedy,
    ) -> Result<StepReport, SandboxError> {
        let cfg = self.config;
        let from = self.agent;

        let action = policy.choose_action(grid, qtable, from, self.stats.epsilon)?;
        let transition = Environment::new(grid, cfg.rewards).step(from, action);
        let td_error = qtable.update(
            grid,
            from,
            action,
            transition.reward,
            transition.next,
            cfg.learning_rate,
            cfg.discount_factor,
        )?;

        self.agent = transition.next;
        self.stats.record_step(transition.reward);

        let outcome = if transition.terminal {
            match grid.cell(transition.next) {
                Ok(Cell::Goal) => Some(EpisodeOutcome::Goal),
                _ => Some(EpisodeOutcome::Trap),
            }
        } else if cfg
            .max_episode_steps
            .is_some_and(|cap| self.stats.episode_steps >= cap)
        {
            Some(EpisodeOutcome::Timeout)
        } else {
            None
        };

        if let Some(outcome) = outcome {
            self.finish_episode(outcome, grid.start());
        }

        Ok(StepReport {
            from,
            action,
            transition,
            td_error,
            outcome,
        })
    }

    fn finish_episode(&mut self, outcome: EpisodeOutcome, start: Position) {
        self.stats.record_episode(outcome);
        self.agent = start;
        self.stats.epsilon = EpsilonGreedy::decay(
            self.stats.epsilon,
            self.config.epsilon_decay,
            self.config.epsilon_floor,
        );

        tracing::debug!(
            episode = self.stats.episodes,
            outcome = outcome.as_str(),
            steps = self.stats.last_episode_steps,
            reward = self.stats.last_episode_reward,
            epsilon = self.stats.epsilon,
            "episode finished"
        );
    }
}
