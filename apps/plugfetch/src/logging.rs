//! Structured logging integration for events
//!
//! Every event that reaches the CLI is also recorded through `tracing`, at
//! the level the event reports for itself, with its fields as structured
//! log fields.

use plugfetch_events::{AppEvent, DownloadEvent, EventMessage, GeneralEvent, InstallEvent};
use tracing::{debug, error, info, warn};

/// Log an event message using the tracing infrastructure
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    match &message.event {
        AppEvent::General(GeneralEvent::Warning { message, context }) => {
            warn!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation = ?meta.correlation_id,
                context = %context,
                "{message}"
            );
        }

        AppEvent::Download(download) => match download {
            DownloadEvent::Started { artifact, url } => {
                debug!(
                    source = meta.source.as_str(),
                    correlation = ?meta.correlation_id,
                    artifact = %artifact,
                    url = %url,
                    "Download started"
                );
            }
            DownloadEvent::Completed {
                artifact,
                url,
                bytes,
            } => {
                info!(
                    source = meta.source.as_str(),
                    correlation = ?meta.correlation_id,
                    artifact = %artifact,
                    url = %url,
                    bytes = bytes,
                    "Download completed"
                );
            }
            DownloadEvent::Failed {
                artifact,
                url,
                failure,
            } => {
                error!(
                    source = meta.source.as_str(),
                    correlation = ?meta.correlation_id,
                    artifact = %artifact,
                    url = %url,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Download failed"
                );
            }
            DownloadEvent::Aborted { artifact, url } => {
                warn!(
                    source = meta.source.as_str(),
                    correlation = ?meta.correlation_id,
                    artifact = %artifact,
                    url = %url,
                    "Download aborted"
                );
            }
        },

        AppEvent::Install(install) => match install {
            InstallEvent::Started {
                attempt_id,
                version,
                destination,
                artifacts,
            } => {
                info!(
                    source = meta.source.as_str(),
                    attempt = %attempt_id,
                    version = %version,
                    destination = %destination.display(),
                    artifacts = ?artifacts,
                    "Install started"
                );
            }
            InstallEvent::PhaseChanged { attempt_id, phase } => {
                debug!(
                    source = meta.source.as_str(),
                    attempt = %attempt_id,
                    phase = %phase,
                    "Install phase changed"
                );
            }
            InstallEvent::Progress {
                attempt_id,
                fraction,
                received,
                total,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    attempt = %attempt_id,
                    fraction = fraction,
                    received = received,
                    total = total,
                    "Install progress"
                );
            }
            InstallEvent::ArtifactVerified {
                attempt_id,
                artifact,
            } => {
                info!(
                    source = meta.source.as_str(),
                    attempt = %attempt_id,
                    artifact = %artifact,
                    "Signature verified"
                );
            }
            InstallEvent::ArtifactInstalled {
                attempt_id,
                artifact,
                path,
            } => {
                info!(
                    source = meta.source.as_str(),
                    attempt = %attempt_id,
                    artifact = %artifact,
                    path = %path.display(),
                    "Artifact installed"
                );
            }
            InstallEvent::Succeeded {
                attempt_id,
                installed,
            } => {
                info!(
                    source = meta.source.as_str(),
                    attempt = %attempt_id,
                    installed = installed.len(),
                    "Install succeeded"
                );
            }
            InstallEvent::Failed {
                attempt_id,
                failure,
            } => {
                error!(
                    source = meta.source.as_str(),
                    attempt = %attempt_id,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Install failed"
                );
            }
            InstallEvent::Cancelled { attempt_id } => {
                warn!(
                    source = meta.source.as_str(),
                    attempt = %attempt_id,
                    "Install cancelled"
                );
            }
        },
    }
}

/// Initialize tracing/logging
///
/// JSON mode logs JSON records to stderr so stdout stays machine-readable.
/// `RUST_LOG` overrides the default filters.
pub fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let default_filter = if debug_enabled {
        "info,plugfetch=debug,plugfetch_install=debug,plugfetch_net=debug"
    } else {
        "warn,plugfetch=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
}
