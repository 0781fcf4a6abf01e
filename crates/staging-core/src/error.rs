//! Error taxonomy for resolving and applying staged files.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used across the staging crate.
pub type StagingResult<T> = Result<T, StagingError>;

/// Errors raised while resolving or applying a staged file.
#[derive(Debug, Error)]
pub enum StagingError {
    /// The source does not match any supported scheme.
    #[error("unrecognized source scheme: {source_url}")]
    UnrecognizedScheme { source_url: String },

    /// The request is missing data needed to compute a plan.
    #[error("invalid staging request: {reason}")]
    InvalidRequest { reason: String },

    /// The configured downloader flavor is not one of curl, wget, powershell.
    #[error("unknown downloader flavor: {flavor}")]
    UnknownFlavor { flavor: String },

    /// The external download command failed on every try.
    #[error("transfer failed after {attempts} attempt(s) running `{command}`: {reason}")]
    Transfer {
        command: String,
        attempts: u32,
        reason: String,
    },

    /// Ownership or mode could not be applied. The file is left in place.
    #[error("failed to apply permissions to {}: {reason}", path.display())]
    Permission { path: PathBuf, reason: String },

    /// Filesystem failure outside of the permission fix.
    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operation cannot be performed on this host.
    #[error("unsupported operation {operation}: {detail}")]
    Unsupported {
        operation: &'static str,
        detail: String,
    },
}

impl StagingError {
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn permission(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Permission {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors detected before any side effect took place.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedScheme { .. }
                | Self::InvalidRequest { .. }
                | Self::UnknownFlavor { .. }
        )
    }
}
