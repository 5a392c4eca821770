//! Error taxonomy for the cleaning pipeline.
//!
//! Each component that crosses an I/O or subprocess boundary gets its own
//! `thiserror` enum; [`AutoQacError`] is the orchestrator-level union that
//! callers of [`crate::orchestrator::Orchestrator`] actually see.

use camino::Utf8PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the configuration store.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file is invalid: {path}: {reason}")]
    Invalid { path: Utf8PathBuf, reason: String },

    #[error("configuration file is corrupt: {path} (at {position})")]
    Corrupt { path: Utf8PathBuf, position: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while enumerating or filtering plugins.
#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("load order file not found: {0}")]
    LoadOrderNotFound(Utf8PathBuf),

    #[error("load order file is not valid UTF-8: {0}")]
    InvalidEncoding(Utf8PathBuf),

    #[error("failed to read load order file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the backup manager.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("failed to create backup session directory {path}: {source}")]
    CreateSessionDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy plugin {plugin} into backup session: {source}")]
    CopyFailed {
        plugin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write session metadata {path}: {source}")]
    MetadataWrite {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize session metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("backup session not found: {0}")]
    SessionNotFound(String),
}

/// Errors raised by the process executor.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("xEdit timed out after {0:?}")]
    Timeout(Duration),

    #[error("xEdit appears hung (low CPU usage for {0:?})")]
    Hung(Duration),

    #[error("failed to spawn xEdit process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("xEdit process was terminated by the orchestrator")]
    Killed,

    #[error("xEdit did not exit within the grace period after a graceful stop request")]
    GracePeriodExpired,

    #[error("xEdit's handle on {0} was not released after termination")]
    HandleStillHeld(Utf8PathBuf),

    #[error("io error communicating with xEdit: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error type surfaced by [`crate::orchestrator::Orchestrator`].
#[derive(Error, Debug)]
pub enum AutoQacError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("configuration corrupt: {0}")]
    ConfigCorrupt(String),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error("backup failed: {0}")]
    BackupFailure(#[from] BackupError),

    #[error("subprocess timed out after {0:?}")]
    SubprocessTimeout(Duration),

    #[error("subprocess hung: {0:?} without CPU progress")]
    SubprocessHang(Duration),

    #[error("subprocess was forcibly killed")]
    SubprocessKilled,

    #[error("xEdit retained a file handle after termination: {0}")]
    HandleStillHeld(Utf8PathBuf),

    #[error("could not parse xEdit log: {0}")]
    LogParseWarning(String),

    #[error("operation was cancelled")]
    OperationCancelled,

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for AutoQacError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid { path, reason } => {
                AutoQacError::ConfigInvalid(format!("{path}: {reason}"))
            }
            ConfigError::Corrupt { path, position } => {
                AutoQacError::ConfigCorrupt(format!("{path} (at {position})"))
            }
            ConfigError::Io { path, source } => {
                AutoQacError::ConfigInvalid(format!("{path}: {source}"))
            }
        }
    }
}

impl From<&ConfigError> for AutoQacError {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::Invalid { path, reason } => {
                AutoQacError::ConfigInvalid(format!("{path}: {reason}"))
            }
            ConfigError::Corrupt { path, position } => {
                AutoQacError::ConfigCorrupt(format!("{path} (at {position})"))
            }
            ConfigError::Io { path, source } => {
                AutoQacError::ConfigInvalid(format!("{path}: {source}"))
            }
        }
    }
}
