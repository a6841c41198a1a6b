//! Fetch job contract between a transport and the install coordinator
//!
//! A transport starts one transfer per [`FetchRequest`] and reports back
//! through the [`JobSink`] it was handed. Every report is tagged with the
//! attempt generation and job index so the receiver can drop reports from
//! attempts it has already abandoned.

use bytes::Bytes;
use plugfetch_errors::NetworkError;
use plugfetch_types::ArtifactName;
use tokio::sync::mpsc;
use url::Url;

/// One artifact to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub artifact: ArtifactName,
    pub url: Url,
}

/// What a transfer reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEventKind {
    /// Bytes received so far; `total` once the transport knows it
    Progress { received: u64, total: Option<u64> },
    /// The transfer finished, with the full payload or the reason it failed
    Completed(Result<Bytes, NetworkError>),
}

/// A report from a single transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub generation: u64,
    pub job: usize,
    pub kind: JobEventKind,
}

pub type JobEventSender = mpsc::UnboundedSender<JobEvent>;
pub type JobEventReceiver = mpsc::UnboundedReceiver<JobEvent>;

/// Create the channel transports report into
#[must_use]
pub fn job_channel() -> (JobEventSender, JobEventReceiver) {
    mpsc::unbounded_channel()
}

/// Where a transfer sends its reports
#[derive(Debug, Clone)]
pub struct JobSink {
    tx: JobEventSender,
    generation: u64,
    job: usize,
}

impl JobSink {
    #[must_use]
    pub fn new(tx: JobEventSender, generation: u64, job: usize) -> Self {
        Self {
            tx,
            generation,
            job,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn job(&self) -> usize {
        self.job
    }

    pub fn progress(&self, received: u64, total: Option<u64>) {
        self.send(JobEventKind::Progress { received, total });
    }

    pub fn complete(&self, result: Result<Bytes, NetworkError>) {
        self.send(JobEventKind::Completed(result));
    }

    /// The coordinator is gone; nothing will read further reports
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, kind: JobEventKind) {
        // A closed receiver means the attempt was torn down.
        let _ = self.tx.send(JobEvent {
            generation: self.generation,
            job: self.job,
            kind,
        });
    }
}

/// Handle to an in-flight transfer
pub trait TransferHandle: Send {
    /// Stop the transfer. No further reports are sent after this returns.
    fn abort(&self);

    fn is_finished(&self) -> bool;
}

impl TransferHandle for tokio::task::AbortHandle {
    fn abort(&self) {
        tokio::task::AbortHandle::abort(self);
    }

    fn is_finished(&self) -> bool {
        tokio::task::AbortHandle::is_finished(self)
    }
}

/// Capability to start artifact transfers
pub trait Transport: Send + Sync {
    /// Begin fetching `request`, reporting into `sink`
    ///
    /// Must not block; progress and completion are reported asynchronously.
    fn fetch(&self, request: FetchRequest, sink: JobSink) -> Box<dyn TransferHandle>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn fetch(&self, request: FetchRequest, sink: JobSink) -> Box<dyn TransferHandle> {
        (**self).fetch(request, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_tags_reports() {
        let (tx, mut rx) = job_channel();
        let sink = JobSink::new(tx, 4, 2);
        sink.progress(10, Some(20));
        sink.complete(Ok(Bytes::from_static(b"abc")));

        assert_eq!(
            rx.try_recv().unwrap(),
            JobEvent {
                generation: 4,
                job: 2,
                kind: JobEventKind::Progress {
                    received: 10,
                    total: Some(20)
                },
            }
        );
        let done = rx.try_recv().unwrap();
        assert_eq!(done.kind, JobEventKind::Completed(Ok(Bytes::from_static(b"abc"))));
    }

    #[test]
    fn sink_survives_closed_receiver() {
        let (tx, rx) = job_channel();
        let sink = JobSink::new(tx, 1, 0);
        drop(rx);
        assert!(sink.is_closed());
        sink.complete(Err(NetworkError::DownloadFailed("late".to_string())));
    }
}
