//! CLI client for the `gridlearnd` daemon.
//!
//! Examples:
//!   gridlearn-cli status
//!   gridlearn-cli start
//!   gridlearn-cli step 10
//!   gridlearn-cli set 3 2 wall
//!   gridlearn-cli q 1 1
//!   gridlearn-cli maze 7
//!   gridlearn-cli alpha 0.5
//!
//! By default it talks to 127.0.0.1:9877; override with `--addr host:port`
//! or `GRIDLEARN_ADDR`.

use gridlearn::grid::{Action, Cell, Position};
use gridlearn::qtable::ActionValues;
use gridlearn::training::{RunState, TrainingConfig, TrainingStats};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetState,
    GetValues { x: u32, y: u32 },
    GetValueTable,
    SetCell { x: u32, y: u32, cell: Cell },
    GenerateMaze { seed: Option<u64> },
    Start,
    Stop,
    Step { count: u32 },
    ResetWorld,
    SetLearningRate { value: f32 },
    SetDiscountFactor { value: f32 },
    SetInitialEpsilon { value: f32 },
    SetEpsilonDecay { value: f32 },
    SetEpsilonFloor { value: f32 },
    SetStepIntervalMs { ms: u32 },
    SetMaxEpisodeSteps { steps: Option<u32> },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateSnapshot {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
    start: Position,
    goal: Option<Position>,
    agent: Position,
    state: RunState,
    config: TrainingConfig,
    stats: TrainingStats,
    #[serde(default)]
    visited_states: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ValueEntry {
    x: u32,
    y: u32,
    values: ActionValues,
}

fn usage() -> ! {
    eprintln!("gridlearn-cli (talks to gridlearnd @ 127.0.0.1:9877 by default)");
    eprintln!("Usage: gridlearn-cli [--addr host:port] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  status                      Show layout, agent and training stats");
    eprintln!("  start | stop                Control the step loop");
    eprintln!("  step [n]                    Run n manual steps (default 1)");
    eprintln!("  reset                       Clear learning, keep the layout");
    eprintln!("  maze [seed]                 Generate a new maze");
    eprintln!("  set <x> <y> <cell>          Paint a cell (empty|wall|goal|trap)");
    eprintln!("  q <x> <y>                   Show action values for a cell");
    eprintln!("  table                       Dump every learned state");
    eprintln!("  alpha | gamma <0-1>         Learning rate / discount factor");
    eprintln!("  epsilon | decay | floor <0-1>  Exploration parameters");
    eprintln!("  interval <1-60000>          Step interval in milliseconds");
    eprintln!("  cap <n|off>                 Episode step cap");
    eprintln!("  shutdown                    Stop the daemon");
    process::exit(1);
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let mut addr = std::env::var("GRIDLEARN_ADDR").unwrap_or_else(|_| "127.0.0.1:9877".to_string());
    if args.len() >= 2 && args[0] == "--addr" {
        addr = args[1].clone();
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }

    (addr, args)
}

fn send_request(addr: &str, req: &Request) -> Result<Response, String> {
    let mut stream = TcpStream::connect(addr).map_err(|e| format!("connect: {e}"))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(30)))
        .map_err(|e| format!("set_read_timeout: {e}"))?;
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| format!("clone: {e}"))?);

    let line = serde_json::to_string(req).map_err(|e| format!("serialize: {e}"))?;
    stream
        .write_all(line.as_bytes())
        .and_then(|_| stream.write_all(b"\n"))
        .map_err(|e| format!("send: {e}"))?;

    let mut resp_line = String::new();
    reader
        .read_line(&mut resp_line)
        .map_err(|e| format!("recv: {e}"))?;
    serde_json::from_str(&resp_line).map_err(|e| format!("parse response: {e}"))
}

fn render(s: &StateSnapshot) -> String {
    let mut out = String::with_capacity(((s.width + 1) * s.height) as usize);
    for y in 0..s.height {
        for x in 0..s.width {
            let pos = Position::new(x, y);
            let c = if pos == s.agent {
                'A'
            } else if pos == s.start {
                'S'
            } else {
                s.cells
                    .get((y * s.width + x) as usize)
                    .map_or('?', |c| c.as_char())
            };
            out.push(c);
        }
        out.push('\n');
    }
    out
}

fn print_state(s: &StateSnapshot) {
    print!("{}", render(s));
    match s.goal {
        Some(g) => println!("goal=({}, {})", g.x, g.y),
        None => println!("goal=none"),
    }
    let st = &s.stats;
    println!(
        "state={} agent=({}, {}) episodes={} steps={} goals={} traps={} timeouts={} recent={:.1}% epsilon={:.3}",
        s.state.as_str(),
        s.agent.x,
        s.agent.y,
        st.episodes,
        st.total_steps,
        st.goals_reached,
        st.traps_hit,
        st.timeouts,
        st.recent_success_rate() * 100.0,
        st.epsilon
    );
    let c = &s.config;
    println!(
        "alpha={} gamma={} decay={} floor={} interval={}ms cap={} visited={}",
        c.learning_rate,
        c.discount_factor,
        c.epsilon_decay,
        c.epsilon_floor,
        c.step_interval_ms,
        c.max_episode_steps
            .map_or_else(|| "off".to_string(), |n| n.to_string()),
        s.visited_states
    );
}

fn print_values(x: u32, y: u32, values: &ActionValues) {
    print!("({x}, {y})");
    for a in Action::ALL {
        print!("  {}={:.3}", a.as_str(), values.get(a));
    }
    println!();
}

fn fail(msg: &str) -> ! {
    eprintln!("{}", msg);
    process::exit(1);
}

fn arg(args: &[String], i: usize) -> &str {
    match args.get(i) {
        Some(a) => a.as_str(),
        None => usage(),
    }
}

fn unit_arg(args: &[String], name: &str) -> f32 {
    arg(args, 1)
        .parse()
        .unwrap_or_else(|_| fail(&format!("{name} must be a number (0-1)")))
}

fn coord_arg(args: &[String], i: usize) -> u32 {
    arg(args, i)
        .parse()
        .unwrap_or_else(|_| fail("coordinates must be non-negative integers"))
}

fn main() {
    let (addr, args) = parse_args();
    let cmd = &args[0];
    let unit = |name: &str| unit_arg(&args, name);
    let coord = |i: usize| coord_arg(&args, i);

    let req = match cmd.as_str() {
        "status" => Request::GetState,
        "start" => Request::Start,
        "stop" => Request::Stop,
        "step" => {
            let count = match args.get(1) {
                Some(n) => n
                    .parse()
                    .unwrap_or_else(|_| fail("step count must be a number")),
                None => 1,
            };
            Request::Step { count }
        }
        "reset" => Request::ResetWorld,
        "maze" => {
            let seed = args.get(1).map(|s| {
                s.parse()
                    .unwrap_or_else(|_| fail("seed must be a number"))
            });
            Request::GenerateMaze { seed }
        }
        "set" => {
            let (x, y) = (coord(1), coord(2));
            let cell = Cell::from_name(arg(&args, 3))
                .unwrap_or_else(|| fail("cell must be empty|wall|goal|trap"));
            Request::SetCell { x, y, cell }
        }
        "q" => Request::GetValues {
            x: coord(1),
            y: coord(2),
        },
        "table" => Request::GetValueTable,
        "alpha" => Request::SetLearningRate {
            value: unit("alpha"),
        },
        "gamma" => Request::SetDiscountFactor {
            value: unit("gamma"),
        },
        "epsilon" => Request::SetInitialEpsilon {
            value: unit("epsilon"),
        },
        "decay" => Request::SetEpsilonDecay {
            value: unit("decay"),
        },
        "floor" => Request::SetEpsilonFloor {
            value: unit("floor"),
        },
        "interval" => {
            let ms: u32 = arg(&args, 1)
                .parse()
                .unwrap_or_else(|_| fail("interval must be a number (1-60000)"));
            Request::SetStepIntervalMs { ms }
        }
        "cap" => {
            let steps = match arg(&args, 1) {
                "off" => None,
                n => Some(
                    n.parse()
                        .unwrap_or_else(|_| fail("cap must be a number or 'off'")),
                ),
            };
            Request::SetMaxEpisodeSteps { steps }
        }
        "shutdown" => Request::Shutdown,
        _ => usage(),
    };

    match send_request(&addr, &req) {
        Ok(Response::State(s)) => print_state(&s),
        Ok(Response::Values { x, y, values }) => print_values(x, y, &values),
        Ok(Response::ValueTable { entries }) => {
            if entries.is_empty() {
                println!("(no learned states)");
            }
            for e in entries {
                print_values(e.x, e.y, &e.values);
            }
        }
        Ok(Response::Success { message }) => println!("{message}"),
        Ok(Response::Error { message }) => {
            eprintln!("Error: {message}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed: {e}");
            process::exit(1);
        }
    }
}
