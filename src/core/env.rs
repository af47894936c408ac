//! One-step transition model over a grid world.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::grid::{Action, Cell, GridWorld, Position};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Rewards {
    pub goal: f32,
    pub trap: f32,
    /// Charged for every move, including bumps into walls and edges.
    pub step: f32,
}

impl Default for Rewards {
    fn default() -> Self {
        Self {
            goal: 100.0,
            trap: -100.0,
            step: -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: Position,
    pub reward: f32,
    pub terminal: bool,
    /// The move was blocked and the agent stayed put.
    pub bumped: bool,
}

/// Read-only view of a grid plus reward schedule.
#[derive(Debug, Clone, Copy)]
pub struct Environment<'a> {
    grid: &'a GridWorld,
    rewards: Rewards,
}

impl<'a> Environment<'a> {
    pub fn new(grid: &'a GridWorld, rewards: Rewards) -> Self {
        Self { grid, rewards }
    }

    pub fn grid(&self) -> &'a GridWorld {
        self.grid
    }

    pub fn step(&self, pos: Position, action: Action) -> Transition {
        let candidate = self
            .grid
            .neighbor(pos, action)
            .filter(|&p| self.grid.is_passable(p));

        let Some(next) = candidate else {
            return Transition {
                next: pos,
                reward: self.rewards.step,
                terminal: false,
                bumped: true,
            };
        };

        let (reward, terminal) = match self.grid.cell(next) {
            Ok(Cell::Goal) => (self.rewards.goal, true),
            Ok(Cell::Trap) => (self.rewards.trap, true),
            _ => (self.rewards.step, false),
        };

        Transition {
            next,
            reward,
            terminal,
            bumped: false,
        }
    }
}
