use serde::{Deserialize, Serialize};

use crate::EventSource;
use plugfetch_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether a fresh attempt might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod download;
pub mod general;
pub mod install;

pub use download::*;
pub use general::*;
pub use install::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// Warnings that do not change an attempt's outcome
    General(GeneralEvent),

    /// Per-artifact transfer events
    Download(DownloadEvent),

    /// Install attempt lifecycle: progress and the terminal outcome
    Install(InstallEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::General,
            Self::Download(_) => EventSource::Download,
            Self::Install(_) => EventSource::Install,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::Download(DownloadEvent::Failed { .. })
            | Self::Install(InstallEvent::Failed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Install(InstallEvent::Cancelled { .. })
            | Self::Download(DownloadEvent::Aborted { .. }) => Level::WARN,

            Self::Install(InstallEvent::Progress { .. } | InstallEvent::PhaseChanged { .. }) => {
                Level::DEBUG
            }

            _ => Level::INFO,
        }
    }

    /// Whether this event ends an install attempt.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Install(event) if event.is_terminal())
    }
}
