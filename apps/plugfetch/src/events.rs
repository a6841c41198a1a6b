//! Event rendering for the terminal

use crate::logging::log_event_with_tracing;
use plugfetch_events::{AppEvent, DownloadEvent, EventMessage, GeneralEvent, InstallEvent};

/// Renders install events for the user
pub struct EventHandler {
    json: bool,
    /// Last progress decile printed, so progress prints at most ten lines
    last_decile: Option<u8>,
}

impl EventHandler {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            last_decile: None,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);

        if self.json {
            match serde_json::to_string(&message) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
            }
            return;
        }

        if let Some(line) = self.render(&message.event) {
            eprintln!("{line}");
        }
    }

    fn render(&mut self, event: &AppEvent) -> Option<String> {
        match event {
            AppEvent::General(GeneralEvent::Warning { message, context }) => {
                Some(format!("warning: {message} ({context})"))
            }

            AppEvent::Download(DownloadEvent::Completed { artifact, bytes, .. }) => {
                Some(format!("  fetched {artifact} ({bytes} bytes)"))
            }
            AppEvent::Download(DownloadEvent::Failed {
                artifact, failure, ..
            }) => Some(format!("  failed to fetch {artifact}: {}", failure.message)),
            AppEvent::Download(DownloadEvent::Started { .. } | DownloadEvent::Aborted { .. }) => {
                None
            }

            AppEvent::Install(install) => self.render_install(install),
        }
    }

    fn render_install(&mut self, event: &InstallEvent) -> Option<String> {
        match event {
            InstallEvent::Started {
                version,
                destination,
                ..
            } => {
                self.last_decile = None;
                Some(format!(
                    "Installing {version} into {}",
                    destination.display()
                ))
            }
            InstallEvent::PhaseChanged { phase, .. } => Some(format!("{phase}...")),
            InstallEvent::Progress { fraction, .. } => {
                let decile = decile(*fraction);
                if self.last_decile.is_some_and(|last| last >= decile) {
                    return None;
                }
                self.last_decile = Some(decile);
                Some(format!("  {}%", u32::from(decile) * 10))
            }
            InstallEvent::ArtifactVerified { artifact, .. } => {
                Some(format!("  signature ok: {artifact}"))
            }
            InstallEvent::ArtifactInstalled { path, .. } => {
                Some(format!("  installed {}", path.display()))
            }
            InstallEvent::Succeeded { installed, .. } => {
                Some(format!("Installed {} artifact(s)", installed.len()))
            }
            InstallEvent::Failed { failure, .. } => {
                let mut line = format!("Install failed: {}", failure.message);
                if let Some(hint) = &failure.hint {
                    line.push_str("\n  Hint: ");
                    line.push_str(hint);
                }
                Some(line)
            }
            InstallEvent::Cancelled { .. } => Some("Install cancelled".to_string()),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn decile(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 10.0).floor() as u8
}
