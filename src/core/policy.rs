//! Epsilon-greedy action selection with per-episode decay.

use crate::error::SandboxError;
use crate::grid::{Action, GridWorld, Position};
use crate::prng::Prng;
use crate::qtable::QTable;

#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    rng: Prng,
}

impl EpsilonGreedy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Prng::new(seed ^ 0x0E95_110Eu64),
        }
    }

    /// Explore with probability `epsilon`, otherwise exploit.
    ///
    /// Exploitation picks uniformly among every action tied at the maximum.
    pub fn choose_action(
        &mut self,
        grid: &GridWorld,
        qtable: &QTable,
        pos: Position,
        epsilon: f32,
    ) -> Result<Action, SandboxError> {
        let values = qtable.values(grid, pos)?;

        if self.rng.chance(epsilon) {
            return Ok(self.random_action());
        }

        let mask = values.argmax_mask();
        let ties = mask.count_ones() as usize;
        if ties <= 1 {
            return Ok(values.argmax());
        }

        let mut pick = self.rng.gen_range_usize(0, ties);
        for a in Action::ALL {
            if mask & (1 << a.index()) != 0 {
                if pick == 0 {
                    return Ok(a);
                }
                pick -= 1;
            }
        }
        Ok(values.argmax())
    }

    pub fn random_action(&mut self) -> Action {
        Action::ALL[self.rng.gen_range_usize(0, Action::COUNT)]
    }

    /// `max(floor, epsilon * rate)`; applied once per finished episode.
    pub fn decay(epsilon: f32, rate: f32, floor: f32) -> f32 {
        (epsilon * rate).max(floor)
    }
}
