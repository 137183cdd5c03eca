//! Launch error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors from launching the game or attaching the injector
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("game executable not found at '{0}'")]
    ExecutableNotFound(PathBuf),

    #[error("could not spawn '{program}'")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target process died or misbehaved before injection could happen
    #[error("process lifecycle failure: {detail}")]
    ProcessLifecycle { detail: String },

    /// No candidate location held a valid runtime; lists every path checked
    #[error("no valid runtime found; checked: {checked:?}")]
    RuntimeNotFound { checked: Vec<PathBuf> },

    #[error("file operation failed on '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("launch cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LaunchError>;
