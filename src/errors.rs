// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::ExitCode;

#[derive(Error, Debug)]
pub enum BackhaulError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("failed to launch '{name}': {source}")]
    Launch {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process handle '{0}' still holds a running process")]
    HandleInUse(String),

    #[error("phase aborted by '{name}': {reason}")]
    PhaseAborted { name: String, reason: String },

    #[error("{message}")]
    Fatal { code: i32, message: String },

    #[error("Lockfile error: {0}")]
    Lockfile(String),

    /// An operator command (`status`, `stop`, ...) could not do its job.
    #[error("{0}")]
    Control(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BackhaulError {
    /// Exit value the binary should terminate with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BackhaulError::ConfigError(_)
            | BackhaulError::TomlError(_)
            | BackhaulError::Control(_) => ExitCode::STARTUP,
            BackhaulError::Lockfile(_) => ExitCode::LOCKFILE,
            BackhaulError::PhaseAborted { .. } => ExitCode::SSH_TUNNEL,
            BackhaulError::Fatal { code, .. } => *code,
            BackhaulError::IoError(_)
            | BackhaulError::Launch { .. }
            | BackhaulError::HandleInUse(_)
            | BackhaulError::Other(_) => ExitCode::INTERNAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackhaulError>;
