//! # gridlearn
//!
//! A tabular reinforcement-learning sandbox: a grid world with walls, one goal
//! and traps, a seeded maze generator that always produces solvable layouts, a
//! Q-table with the one-step Q-learning update, an epsilon-greedy policy and a
//! training loop that an outer driver steps one move at a time.
//!
//! ## Quick Start
//!
//! ```
//! use gridlearn::prelude::*;
//!
//! let cfg = TrainingConfig::default()
//!     .with_learning_rate(0.5)
//!     .with_exploration(1.0, 0.95, 0.01);
//! let mut sandbox = Sandbox::with_maze(9, 9, cfg, MazeConfig::default(), 42).unwrap();
//!
//! sandbox.start();
//! sandbox.run_steps(1_000).unwrap();
//!
//! let stats = sandbox.stats();
//! println!("episodes={} epsilon={:.3}", stats.episodes, stats.epsilon);
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support
//! - `serde` (default): Enable serialization/deserialization of the public data types
//!
//! ## no_std Support
//!
//! Disable default features for `no_std` environments (requires `alloc`):
//! ```toml
//! gridlearn = { version = "0.1", default-features = false }
//! ```
//!
//! ## Modules
//!
//! - [`grid`]: Cells, positions, actions and the grid world
//! - [`maze`]: Randomized solvable maze generation
//! - [`qtable`]: Action-value table and update rule
//! - [`policy`]: Epsilon-greedy action selection
//! - [`env`]: One-step transition model
//! - [`training`]: Training state machine and statistics
//! - [`sandbox`]: Owning facade for drivers and UIs

// no_std support
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/grid.rs"]
pub mod grid;

#[path = "core/maze.rs"]
pub mod maze;

#[path = "core/qtable.rs"]
pub mod qtable;

#[path = "core/policy.rs"]
pub mod policy;

#[path = "core/env.rs"]
pub mod env;

#[path = "core/training.rs"]
pub mod training;

#[path = "core/sandbox.rs"]
pub mod sandbox;

/// Prelude module for convenient imports.
///
/// ```
/// use gridlearn::prelude::*;
/// ```
pub mod prelude {
    pub use crate::env::{Environment, Rewards, Transition};
    pub use crate::error::SandboxError;
    pub use crate::grid::{Action, Cell, GridWorld, Position};
    pub use crate::maze::{MazeConfig, MazeGenerator};
    pub use crate::policy::EpsilonGreedy;
    pub use crate::qtable::{ActionValues, QTable};
    pub use crate::sandbox::{Rollout, Sandbox};
    pub use crate::training::{
        EpisodeOutcome, RunState, StepReport, TrainingConfig, TrainingLoop, TrainingStats,
    };
}
