#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! All-or-nothing artifact installation for plugfetch
//!
//! The [`BatchCoordinator`] fetches every artifact of a release concurrently,
//! stages the payloads in a temporary directory, checks each detached
//! signature against the trusted key, and only then moves the artifacts into
//! the destination. Any failure or cancellation leaves the destination as it
//! was and removes the staging directory.

mod commit;
mod coordinator;
mod progress;
mod staging;
mod verify;

pub use commit::{commit, CommitReport, InstalledArtifact};
pub use coordinator::{AttemptOutcome, AttemptState, BatchCoordinator, CoordinatorConfig};
pub use progress::{ProgressAggregator, ProgressSnapshot};
pub use staging::{stage_all, StagedFile, StagingArea};
pub use verify::{verify_staging, VerifiedStaging};

// Re-exports for embedders wiring up a coordinator
pub use plugfetch_events::EventSender;
pub use tokio_util::sync::CancellationToken;
