//! Error types for every stage of the discovery + dispatch pipeline.
//!
//! Each concern gets its own error enum, mirroring the way a caller needs to
//! react differently to a discovery problem than to a dead worker. The
//! top-level [`crate::run`] entry point collapses all of them into
//! `anyhow::Error` for the CLI collaborator to map onto an exit code.

use std::path::PathBuf;

/// Errors raised while walking roots and parsing source files.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("root path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the length-prefixed wire codec.
///
/// A [`ProtocolError`] is always treated as a worker crash by the
/// supervisor (spec: "Protocol error ... Treat as worker crash").
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame of {0} bytes exceeds the configured cap of {1} bytes")]
    FrameTooLarge(u32, u32),

    #[error("stream closed before a full frame was read")]
    Eof,

    #[error("failed to decode msgpack payload: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("failed to encode msgpack payload: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the worker supervisor.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker {0} exited before responding to request {1}")]
    WorkerExited(usize, u64),

    #[error("worker {0} protocol error: {1}")]
    Protocol(usize, ProtocolError),

    #[error("worker {0} timed out after {1:?} on request {2}")]
    Timeout(usize, std::time::Duration, u64),

    #[error("internal supervisor error: {0}")]
    Internal(String),
}

/// Errors raised while loading a [`crate::config::RunnerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("worker_count must be greater than zero")]
    InvalidWorkerCount,
}
