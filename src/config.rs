//! Runtime configuration (ambient stack): worker pool sizing, isolation
//! mode, coverage collection, and timeouts, loadable from a TOML file.
//!
//! Grounded in the teacher's `config/mod.rs` `load_config`/`load_config_str`
//! split, which loads a `String` from disk then hands it to `toml::from_str`
//! so the parsing path is unit-testable without touching the filesystem.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discovery::default_excluded_dirs;
use crate::error::ConfigError;

/// How worker processes are recycled between test items (spec §5/§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    /// Spawn a fresh worker for every item; strongest isolation, highest
    /// overhead.
    ProcessPerTest,
    /// Reuse a worker across every item it's assigned for the whole run.
    ProcessPerRun,
}

impl Default for IsolationMode {
    fn default() -> Self {
        IsolationMode::ProcessPerRun
    }
}

fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

fn default_timeout_secs() -> f64 {
    60.0
}

fn default_max_frame_bytes() -> u32 {
    crate::protocol::MAX_FRAME_BYTES
}

/// Top-level configuration for a run, loadable from a `taut.toml` file or
/// constructed directly by an embedding caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Number of concurrently live worker processes.
    pub worker_count: usize,
    pub isolation_mode: IsolationMode,
    pub collect_coverage: bool,
    /// Per-item wall-clock budget before the supervisor treats the worker
    /// as hung and kills it (spec §4.E).
    pub timeout_secs: f64,
    /// Upper bound on one wire frame, guarding against a runaway worker.
    pub max_frame_bytes: u32,
    pub excluded_dirs: HashSet<String>,
    /// Path to the worker executable the supervisor spawns.
    pub worker_command: PathBuf,
    pub worker_args: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            isolation_mode: IsolationMode::default(),
            collect_coverage: false,
            timeout_secs: default_timeout_secs(),
            max_frame_bytes: default_max_frame_bytes(),
            excluded_dirs: default_excluded_dirs(),
            worker_command: PathBuf::from("fixture-worker"),
            worker_args: Vec::new(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        Ok(())
    }
}

/// Loads and validates a [`RunnerConfig`] from a TOML file on disk.
pub fn load_config(path: &Path) -> Result<RunnerConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_str(&contents, path)
}

/// Parses a [`RunnerConfig`] from an in-memory TOML string. `origin` is used
/// only to attribute parse errors to a path.
pub fn load_config_str(contents: &str, origin: &Path) -> Result<RunnerConfig, ConfigError> {
    let config: RunnerConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = RunnerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_worker_count_is_rejected() {
        let mut config = RunnerConfig::default();
        config.worker_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWorkerCount)));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config = load_config_str(
            r#"
            worker_count = 4
            isolation-mode = "process-per-test"
            "#,
            Path::new("taut.toml"),
        )
        .unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.isolation_mode, IsolationMode::ProcessPerTest);
        assert!(!config.collect_coverage);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = load_config_str("not = [valid", Path::new("taut.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
