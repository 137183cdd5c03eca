//! Installation error types

use std::path::PathBuf;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::fetch::FetchError;

/// Errors that can occur while provisioning the installation
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Required files missing after an install completed; never silently
    /// retried with stale state.
    #[error("installation at '{dir}' is incomplete, missing: {missing:?}")]
    IntegrityMismatch { dir: PathBuf, missing: Vec<String> },

    /// The release descriptor did not contain the asset we install from
    #[error("release '{tag}' has no asset named '{name}'")]
    DescriptorAssetMissing { tag: String, name: String },

    /// An externally supplied injector directory failed validation
    #[error("external injector directory '{dir}' is not a valid install, missing: {missing:?}")]
    ExternalInstallInvalid { dir: PathBuf, missing: Vec<String> },

    #[error("file operation failed on '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, InstallError>;

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source,
        }
    }
}
