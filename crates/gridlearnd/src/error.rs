//! Daemon-level failures. Request-level problems never end up here; they are
//! answered with `Response::Error` instead.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("could not determine data directory")]
    NoDataDir,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("sandbox: {0}")]
    Sandbox(#[from] gridlearn::error::SandboxError),
}
