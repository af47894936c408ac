//! Daemon startup configuration (`<data>/gridlearn/config.json`).

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use gridlearn::grid::GridWorld;
use gridlearn::maze::MazeConfig;
use gridlearn::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DaemonError;

pub const ADDR_ENV: &str = "GRIDLEARN_ADDR";
pub const DEFAULT_ADDR: &str = "127.0.0.1:9877";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub addr: String,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub training: TrainingConfig,
    pub maze: MazeConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            width: 11,
            height: 11,
            seed: 42,
            training: TrainingConfig::default(),
            maze: MazeConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Read `path`; a missing file yields defaults. `GRIDLEARN_ADDR` wins over
    /// the file's address.
    pub fn load(path: &Path) -> Result<Self, DaemonError> {
        let mut cfg = match fs::read_to_string(path) {
            Ok(text) => {
                let cfg: DaemonConfig = serde_json::from_str(&text)?;
                info!("Loaded config from {}", path.display());
                cfg
            }
            Err(e) if e.kind() == ErrorKind::NotFound => DaemonConfig::default(),
            Err(e) => return Err(e.into()),
        };

        if let Ok(addr) = std::env::var(ADDR_ENV) {
            if !addr.trim().is_empty() {
                cfg.addr = addr.trim().to_string();
            }
        }

        cfg.validate().map_err(|reason| DaemonError::Config {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        })?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.width < GridWorld::MIN_SIZE || self.height < GridWorld::MIN_SIZE {
            return Err("width and height must be at least 3");
        }
        if self.addr.is_empty() {
            return Err("addr must not be empty");
        }
        self.training.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: DaemonConfig =
            serde_json::from_str(r#"{"width":15,"training":{"learning_rate":0.5}}"#).unwrap();
        assert_eq!(cfg.width, 15);
        assert_eq!(cfg.height, 11);
        assert_eq!(cfg.addr, DEFAULT_ADDR);
        assert_eq!(cfg.training.learning_rate, 0.5);
        assert_eq!(cfg.training.discount_factor, 0.9);
        assert_eq!(cfg.maze, MazeConfig::default());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = std::env::temp_dir().join(format!("gridlearnd-cfg-{}", std::process::id()));
        let cfg = DaemonConfig::load(&dir.join("absent.json")).unwrap();
        assert_eq!(cfg.width, 11);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn tiny_grid_is_rejected() {
        let cfg = DaemonConfig {
            width: 2,
            ..DaemonConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
