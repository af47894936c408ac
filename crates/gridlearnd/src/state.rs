//! Shared daemon state and request dispatch.
//!
//! Everything here is synchronous; `main` wraps it in `Arc<RwLock<_>>` and the
//! socket handlers and the step timer take the lock around each call.

use std::time::Duration;

use gridlearn::grid::Position;
use gridlearn::sandbox::Sandbox;
use gridlearn::training::RunState;
use tracing::{info, warn};

use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::protocol::{Request, Response, StateSnapshot, ValueEntry};

/// Upper bound for one `Step` request so a client cannot hold the lock forever.
pub const MAX_MANUAL_STEPS: u32 = 100_000;

pub struct DaemonState {
    sandbox: Sandbox,
}

impl DaemonState {
    pub fn new(config: &DaemonConfig) -> Result<Self, DaemonError> {
        let sandbox = Sandbox::with_maze(
            config.width,
            config.height,
            config.training,
            config.maze,
            config.seed,
        )?;
        Ok(Self { sandbox })
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn step_interval(&self) -> Duration {
        self.sandbox.config().step_interval()
    }

    /// Timer hook: one training step if running.
    pub fn tick(&mut self) {
        if self.sandbox.state() != RunState::Running {
            return;
        }
        if let Err(e) = self.sandbox.step() {
            warn!("Step failed, pausing training: {}", e);
            self.sandbox.stop();
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let sb = &self.sandbox;
        StateSnapshot {
            width: sb.width(),
            height: sb.height(),
            cells: sb.grid().cells().to_vec(),
            start: sb.grid().start(),
            goal: sb.grid().goal(),
            agent: sb.agent(),
            state: sb.state(),
            config: *sb.config(),
            stats: sb.stats().clone(),
            visited_states: sb.qtable().len(),
        }
    }

    /// Answer one request. `Shutdown` is acknowledged here; exiting is up to the caller.
    pub fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::GetState => Response::State(Box::new(self.snapshot())),
            Request::GetValues { x, y } => match self.sandbox.values(Position::new(x, y)) {
                Ok(values) => Response::Values { x, y, values },
                Err(e) => Response::error(e.to_string()),
            },
            Request::GetValueTable => {
                let mut entries: Vec<ValueEntry> = self
                    .sandbox
                    .qtable()
                    .iter()
                    .map(|(p, values)| ValueEntry {
                        x: p.x,
                        y: p.y,
                        values,
                    })
                    .collect();
                entries.sort_by_key(|e| (e.y, e.x));
                Response::ValueTable { entries }
            }
            Request::SetCell { x, y, cell } => {
                match self.sandbox.set_cell(Position::new(x, y), cell) {
                    Ok(true) => {
                        info!("Cell ({}, {}) set to {}; q-table cleared", x, y, cell.as_str());
                        Response::success(format!("Cell ({}, {}) set to {}", x, y, cell.as_str()))
                    }
                    Ok(false) => Response::success(format!(
                        "Cell ({}, {}) already {}",
                        x,
                        y,
                        cell.as_str()
                    )),
                    Err(e) => Response::error(e.to_string()),
                }
            }
            Request::GenerateMaze { seed } => match self.sandbox.generate_maze(seed) {
                Ok(()) => {
                    info!(
                        "Generated {}x{} maze (seed {:?})",
                        self.sandbox.width(),
                        self.sandbox.height(),
                        seed
                    );
                    Response::success("Maze generated")
                }
                Err(e) => Response::error(e.to_string()),
            },
            Request::Start => {
                self.sandbox.start();
                info!("Training started");
                Response::success("Training started")
            }
            Request::Stop => {
                self.sandbox.stop();
                info!("Training stopped");
                Response::success("Training stopped")
            }
            Request::Step { count } => {
                let count = count.clamp(1, MAX_MANUAL_STEPS);
                for done in 0..count {
                    if let Err(e) = self.sandbox.single_step() {
                        return Response::error(format!("Step {} failed: {}", done + 1, e));
                    }
                }
                Response::success(format!("Ran {} step(s)", count))
            }
            Request::ResetWorld => {
                self.sandbox.reset_world();
                info!("World reset");
                Response::success("World reset")
            }
            Request::SetLearningRate { value } => {
                let v = self.sandbox.set_learning_rate(value);
                info!("Learning rate set to {}", v);
                Response::success(format!("Learning rate set to {}", v))
            }
            Request::SetDiscountFactor { value } => {
                let v = self.sandbox.set_discount_factor(value);
                info!("Discount factor set to {}", v);
                Response::success(format!("Discount factor set to {}", v))
            }
            Request::SetInitialEpsilon { value } => {
                let v = self.sandbox.set_initial_epsilon(value);
                info!("Initial epsilon set to {}", v);
                Response::success(format!("Initial epsilon set to {}", v))
            }
            Request::SetEpsilonDecay { value } => {
                let v = self.sandbox.set_epsilon_decay(value);
                info!("Epsilon decay set to {}", v);
                Response::success(format!("Epsilon decay set to {}", v))
            }
            Request::SetEpsilonFloor { value } => {
                let v = self.sandbox.set_epsilon_floor(value);
                info!("Epsilon floor set to {}", v);
                Response::success(format!("Epsilon floor set to {}", v))
            }
            Request::SetStepIntervalMs { ms } => {
                let v = self.sandbox.set_step_interval_ms(ms);
                info!("Step interval set to {} ms", v);
                Response::success(format!("Step interval set to {} ms", v))
            }
            Request::SetMaxEpisodeSteps { steps } => {
                self.sandbox.set_max_episode_steps(steps);
                let cap = self.sandbox.config().max_episode_steps;
                info!("Episode step cap set to {:?}", cap);
                match cap {
                    Some(n) => Response::success(format!("Episode step cap set to {}", n)),
                    None => Response::success("Episode step cap disabled"),
                }
            }
            Request::Shutdown => {
                self.sandbox.stop();
                info!("Shutdown requested");
                Response::success("Shutting down")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlearn::grid::Cell;

    fn state() -> DaemonState {
        DaemonState::new(&DaemonConfig {
            width: 7,
            height: 7,
            seed: 3,
            ..DaemonConfig::default()
        })
        .unwrap()
    }

    fn snapshot(s: &mut DaemonState) -> StateSnapshot {
        match s.handle(Request::GetState) {
            Response::State(snap) => *snap,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn is_success(r: &Response) -> bool {
        matches!(r, Response::Success { .. })
    }

    #[test]
    fn initial_snapshot_is_idle_maze() {
        let mut s = state();
        let snap = snapshot(&mut s);
        assert_eq!((snap.width, snap.height), (7, 7));
        assert_eq!(snap.cells.len(), 49);
        assert_eq!(snap.state, RunState::Idle);
        assert_eq!(snap.agent, snap.start);
        assert!(snap.goal.is_some());
        assert_eq!(snap.stats.total_steps, 0);
        assert_eq!(snap.visited_states, 0);
    }

    #[test]
    fn tick_only_steps_while_running() {
        let mut s = state();
        s.tick();
        assert_eq!(s.sandbox().stats().total_steps, 0);

        assert!(is_success(&s.handle(Request::Start)));
        for _ in 0..10 {
            s.tick();
        }
        assert_eq!(s.sandbox().stats().total_steps, 10);

        assert!(is_success(&s.handle(Request::Stop)));
        s.tick();
        assert_eq!(s.sandbox().stats().total_steps, 10);
        assert_eq!(snapshot(&mut s).state, RunState::Paused);
    }

    #[test]
    fn manual_step_leaves_loop_paused() {
        let mut s = state();
        assert!(is_success(&s.handle(Request::Step { count: 5 })));
        let snap = snapshot(&mut s);
        assert_eq!(snap.stats.total_steps, 5);
        assert_eq!(snap.state, RunState::Paused);
        assert!(snap.visited_states >= 1);
    }

    #[test]
    fn bad_cell_edits_are_reported_not_fatal() {
        let mut s = state();
        let r = s.handle(Request::SetCell {
            x: 99,
            y: 0,
            cell: Cell::Wall,
        });
        assert!(matches!(r, Response::Error { .. }));

        let r = s.handle(Request::SetCell {
            x: 1,
            y: 1,
            cell: Cell::Wall,
        });
        assert!(matches!(r, Response::Error { .. }));
    }

    #[test]
    fn edit_clears_learned_values() {
        let mut s = state();
        s.handle(Request::Step { count: 50 });
        assert!(snapshot(&mut s).visited_states > 0);

        // Border cells are always wall in a generated maze.
        let r = s.handle(Request::SetCell {
            x: 0,
            y: 3,
            cell: Cell::Empty,
        });
        assert!(is_success(&r));
        assert_eq!(snapshot(&mut s).visited_states, 0);
        assert!(matches!(s.handle(Request::GetValueTable), Response::ValueTable { entries } if entries.is_empty()));
    }

    #[test]
    fn values_on_wall_is_error() {
        let mut s = state();
        assert!(matches!(
            s.handle(Request::GetValues { x: 0, y: 0 }),
            Response::Error { .. }
        ));
        match s.handle(Request::GetValues { x: 1, y: 1 }) {
            Response::Values { values, .. } => assert_eq!(values.0, [0.0; 4]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn setters_clamp() {
        let mut s = state();
        s.handle(Request::SetLearningRate { value: 3.0 });
        s.handle(Request::SetDiscountFactor { value: -1.0 });
        s.handle(Request::SetStepIntervalMs { ms: 0 });
        s.handle(Request::SetMaxEpisodeSteps { steps: Some(0) });
        let cfg = snapshot(&mut s).config;
        assert_eq!(cfg.learning_rate, 1.0);
        assert_eq!(cfg.discount_factor, 0.0);
        assert_eq!(cfg.step_interval_ms, 1);
        assert_eq!(cfg.max_episode_steps, Some(1));
        assert_eq!(s.step_interval(), Duration::from_millis(1));
    }

    #[test]
    fn seeded_maze_request_is_reproducible() {
        let mut a = state();
        let mut b = state();
        a.handle(Request::Step { count: 20 });
        a.handle(Request::GenerateMaze { seed: Some(9) });
        b.handle(Request::GenerateMaze { seed: Some(9) });
        let (sa, sb) = (snapshot(&mut a), snapshot(&mut b));
        assert_eq!(sa.cells, sb.cells);
        assert_eq!(sa.stats.total_steps, 0);
        assert_eq!(sa.state, RunState::Idle);
    }

    #[test]
    fn shutdown_pauses_training() {
        let mut s = state();
        s.handle(Request::Start);
        assert!(is_success(&s.handle(Request::Shutdown)));
        assert_eq!(snapshot(&mut s).state, RunState::Paused);
    }
}
