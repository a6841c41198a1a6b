use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::FailureContext;

/// Non-terminal phases of an install attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPhase {
    Downloading,
    Verifying,
    Committing,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloading => write!(f, "downloading"),
            Self::Verifying => write!(f, "verifying"),
            Self::Committing => write!(f, "committing"),
        }
    }
}

/// Install attempt lifecycle events
///
/// Exactly one of `Succeeded`, `Failed` or `Cancelled` is emitted per
/// attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    Started {
        attempt_id: Uuid,
        version: String,
        destination: PathBuf,
        artifacts: Vec<String>,
    },

    PhaseChanged {
        attempt_id: Uuid,
        phase: InstallPhase,
    },

    /// Aggregate download progress; `fraction` never decreases within an attempt
    Progress {
        attempt_id: Uuid,
        fraction: f64,
        received: u64,
        total: u64,
    },

    ArtifactVerified {
        attempt_id: Uuid,
        artifact: String,
    },

    ArtifactInstalled {
        attempt_id: Uuid,
        artifact: String,
        path: PathBuf,
    },

    Succeeded {
        attempt_id: Uuid,
        installed: Vec<PathBuf>,
    },

    Failed {
        attempt_id: Uuid,
        failure: FailureContext,
    },

    Cancelled {
        attempt_id: Uuid,
    },
}

impl InstallEvent {
    #[must_use]
    pub fn attempt_id(&self) -> Uuid {
        match self {
            Self::Started { attempt_id, .. }
            | Self::PhaseChanged { attempt_id, .. }
            | Self::Progress { attempt_id, .. }
            | Self::ArtifactVerified { attempt_id, .. }
            | Self::ArtifactInstalled { attempt_id, .. }
            | Self::Succeeded { attempt_id, .. }
            | Self::Failed { attempt_id, .. }
            | Self::Cancelled { attempt_id } => *attempt_id,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}
