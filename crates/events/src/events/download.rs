use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Per-artifact transfer events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    /// Transfer requested from the transport
    Started { artifact: String, url: String },

    /// All bytes of the artifact received
    Completed {
        artifact: String,
        url: String,
        bytes: u64,
    },

    /// The transport reported an error for this artifact
    Failed {
        artifact: String,
        url: String,
        failure: FailureContext,
    },

    /// The coordinator asked the transport to stop this transfer
    Aborted { artifact: String, url: String },
}
