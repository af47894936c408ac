//! Newline-delimited JSON protocol spoken over the daemon socket.
//!
//! Every line is one tagged object, e.g. `{"type":"SetCell","x":3,"y":2,"cell":"wall"}`.
//! Every request gets exactly one response line.

use gridlearn::grid::{Cell, Position};
use gridlearn::qtable::ActionValues;
use gridlearn::training::{RunState, TrainingConfig, TrainingStats};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    GetState,
    GetValues {
        x: u32,
        y: u32,
    },
    GetValueTable,
    SetCell {
        x: u32,
        y: u32,
        cell: Cell,
    },
    GenerateMaze {
        #[serde(default)]
        seed: Option<u64>,
    },
    Start,
    Stop,
    /// Manual stepping; runs even when the loop is idle and leaves it paused.
    Step {
        #[serde(default = "one")]
        count: u32,
    },
    ResetWorld,
    SetLearningRate {
        value: f32,
    },
    SetDiscountFactor {
        value: f32,
    },
    SetInitialEpsilon {
        value: f32,
    },
    SetEpsilonDecay {
        value: f32,
    },
    SetEpsilonFloor {
        value: f32,
    },
    SetStepIntervalMs {
        ms: u32,
    },
    SetMaxEpisodeSteps {
        #[serde(default)]
        steps: Option<u32>,
    },
    Shutdown,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub width: u32,
    pub height: u32,
    /// Row-major.
    pub cells: Vec<Cell>,
    pub start: Position,
    pub goal: Option<Position>,
    pub agent: Position,
    pub state: RunState,
    pub config: TrainingConfig,
    pub stats: TrainingStats,
    pub visited_states: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub x: u32,
    pub y: u32,
    pub values: ActionValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    State(Box<StateSnapshot>),
    Values {
        x: u32,
        y: u32,
        values: ActionValues,
    },
    ValueTable {
        entries: Vec<ValueEntry>,
    },
    Success {
        message: String,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Response::Success {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_requests() {
        let r: Request = serde_json::from_str(r#"{"type":"SetCell","x":3,"y":2,"cell":"trap"}"#)
            .unwrap();
        assert_eq!(
            r,
            Request::SetCell {
                x: 3,
                y: 2,
                cell: Cell::Trap
            }
        );

        let r: Request = serde_json::from_str(r#"{"type":"GenerateMaze"}"#).unwrap();
        assert_eq!(r, Request::GenerateMaze { seed: None });

        let r: Request = serde_json::from_str(r#"{"type":"Step"}"#).unwrap();
        assert_eq!(r, Request::Step { count: 1 });
    }

    #[test]
    fn rejects_unknown_cell_name() {
        let r = serde_json::from_str::<Request>(r#"{"type":"SetCell","x":1,"y":1,"cell":"lava"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn error_response_carries_type_tag() {
        let json = serde_json::to_string(&Response::error("nope")).unwrap();
        assert_eq!(json, r#"{"type":"Error","message":"nope"}"#);
    }
}
