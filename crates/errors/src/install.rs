//! Installation system error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum InstallError {
    /// Downloaded bytes could not be written into the staging area.
    #[error("failed to open file for writing: {path}: {message}")]
    Staging { path: String, message: String },

    /// A verified artifact could not be moved into the destination.
    #[error("writing file failed: {path}: {message}")]
    Commit { path: String, message: String },

    #[error("invalid artifact set: {message}")]
    InvalidArtifactSet { message: String },

    #[error("no install attempt in progress")]
    NoActiveAttempt,
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Staging { .. } => Some("Check free space and permissions of the temp directory."),
            Self::Commit { .. } => {
                Some("Check that the destination directory is writable, then retry.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Staging { .. } | Self::Commit { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Staging { .. } => "install.staging",
            Self::Commit { .. } => "install.commit",
            Self::InvalidArtifactSet { .. } => "install.invalid_artifact_set",
            Self::NoActiveAttempt => "install.no_active_attempt",
        };
        Some(code)
    }
}
