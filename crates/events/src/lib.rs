#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for plugfetch
//!
//! This is the notification capability of the installer: library crates
//! never print or prompt, they emit [`AppEvent`]s through an
//! [`EventSender`]. The CLI (or any embedding application) drains the
//! receiving end and decides how to render progress and outcomes.

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod events;
pub use events::{
    AppEvent, DownloadEvent, FailureContext, GeneralEvent, InstallEvent, InstallPhase,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Event plus the metadata captured when it was emitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: AppEvent,
}

impl EventMessage {
    #[must_use]
    pub fn new(meta: EventMeta, event: AppEvent) -> Self {
        Self { meta, event }
    }

    /// Wrap an event with metadata derived from its domain and level
    #[must_use]
    pub fn from_event(event: AppEvent) -> Self {
        let meta = EventMeta::new(event.log_level(), event.event_source());
        Self { meta, event }
    }
}

/// Type alias for the sending half of the event channel
pub type EventSender = UnboundedSender<EventMessage>;

/// Type alias for the receiving half of the event channel
pub type EventReceiver = UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout plugfetch
///
/// Implementors only provide access to a sender; an implementor that tracks
/// an install attempt also overrides [`EventEmitter::correlation_id`] so every
/// event it emits is tagged with the attempt id.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Correlation id attached to every emitted event
    fn correlation_id(&self) -> Option<String> {
        None
    }

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            let mut message = EventMessage::from_event(event);
            if let Some(id) = self.correlation_id() {
                message.meta = message.meta.with_correlation_id(id);
            }
            // Receiver gone means nobody is listening; the install carries on.
            let _ = sender.send(message);
        }
    }

    /// Emit a warning that does not affect the outcome
    fn emit_warning(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message, context)));
    }

    /// Emit an install lifecycle event
    fn emit_install(&self, event: InstallEvent) {
        self.emit(AppEvent::Install(event));
    }

    /// Emit a per-artifact download event
    fn emit_download(&self, event: DownloadEvent) {
        self.emit(AppEvent::Download(event));
    }
}
