//! Batch coordinator: one all-or-nothing install attempt at a time
//!
//! The coordinator owns every fetch job of the active attempt and reacts to
//! transport reports one at a time. Nothing touches the destination until
//! all transfers have finished and every signature has been checked.

use crate::commit::{commit, CommitReport};
use crate::progress::ProgressAggregator;
use crate::staging::stage_all;
use crate::verify::verify_staging;
use bytes::Bytes;
use plugfetch_config::Config;
use plugfetch_errors::{Error, InstallError, NetworkError};
use plugfetch_events::{
    DownloadEvent, EventEmitter, EventSender, FailureContext, InstallEvent, InstallPhase,
};
use plugfetch_net::{
    artifact_url, job_channel, FetchRequest, JobEvent, JobEventKind, JobEventReceiver,
    JobEventSender, JobSink, TransferHandle, Transport,
};
use plugfetch_signing::TrustedKeySource;
use plugfetch_types::{Artifact, ArtifactSet, ReleaseVersion};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

/// What the coordinator needs to know about every attempt it runs
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Base URL ending in `/`
    pub base_url: String,
    pub artifacts: ArtifactSet,
    /// Parent of per-attempt staging directories; system temp when `None`
    pub staging_parent: Option<PathBuf>,
    pub key_source: Arc<TrustedKeySource>,
}

impl CoordinatorConfig {
    /// Derive from the application configuration, trusting the embedded key
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            base_url: config.source.normalized_base_url(),
            artifacts: config.artifact_set()?,
            staging_parent: config.paths.staging_dir.clone(),
            key_source: Arc::new(TrustedKeySource::embedded()),
        })
    }

    #[must_use]
    pub fn with_key_source(mut self, key_source: TrustedKeySource) -> Self {
        self.key_source = Arc::new(key_source);
        self
    }
}

/// Terminal result of an attempt
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Succeeded { installed: Vec<PathBuf> },
    Failed(Error),
    Cancelled,
}

impl AttemptOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Where the coordinator is in its current attempt
#[derive(Debug, Clone)]
pub enum AttemptState {
    Idle,
    Downloading,
    Verifying,
    Committing,
    Finished(AttemptOutcome),
}

impl AttemptState {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Downloading | Self::Verifying | Self::Committing)
    }
}

struct FetchJob {
    artifact: Artifact,
    url: Url,
    handle: Option<Box<dyn TransferHandle>>,
    completed: bool,
    error: Option<NetworkError>,
    received: u64,
    total: Option<u64>,
    payload: Option<Bytes>,
}

impl FetchJob {
    fn new(artifact: Artifact, url: Url) -> Self {
        Self {
            artifact,
            url,
            handle: None,
            completed: false,
            error: None,
            received: 0,
            total: None,
            payload: None,
        }
    }

    fn succeeded(&self) -> bool {
        self.completed && self.error.is_none() && self.payload.is_some()
    }
}

struct InstallAttempt {
    id: Uuid,
    destination: PathBuf,
    artifacts: ArtifactSet,
    jobs: Vec<FetchJob>,
    progress: ProgressAggregator,
}

/// Drives fetch, staging, verification and commit for one attempt at a time
pub struct BatchCoordinator<T> {
    transport: T,
    config: CoordinatorConfig,
    events: Option<EventSender>,
    job_tx: JobEventSender,
    job_rx: JobEventReceiver,
    /// Token of the running attempt, or the one the next attempt adopts
    cancel: CancellationToken,
    generation: u64,
    state: AttemptState,
    attempt: Option<InstallAttempt>,
}

impl<T: Transport> BatchCoordinator<T> {
    #[must_use]
    pub fn new(transport: T, config: CoordinatorConfig) -> Self {
        let (job_tx, job_rx) = job_channel();
        Self {
            transport,
            config,
            events: None,
            job_tx,
            job_rx,
            cancel: CancellationToken::new(),
            generation: 0,
            state: AttemptState::Idle,
            attempt: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Token other tasks can use to cancel the running attempt
    ///
    /// Taken while no attempt is running, it cancels the next attempt to
    /// start, even when cancelled before that `start`.
    #[must_use]
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<Uuid> {
        self.attempt.as_ref().map(|a| a.id)
    }

    /// Generation that job reports must carry to be accepted
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run a complete attempt and return its outcome
    pub async fn install(
        &mut self,
        version: ReleaseVersion,
        destination: impl Into<PathBuf>,
    ) -> AttemptOutcome {
        self.start(version, destination);
        self.run().await
    }

    /// Begin a new attempt, superseding any attempt still in flight
    ///
    /// A superseded attempt finishes as cancelled. An attempt whose token was
    /// cancelled before it started finishes as cancelled without fetching.
    pub fn start(&mut self, version: ReleaseVersion, destination: impl Into<PathBuf>) {
        let destination = destination.into();
        if self.state.is_active() {
            tracing::debug!("superseding in-flight install attempt");
            self.finish(AttemptOutcome::Cancelled);
        }
        self.generation += 1;

        let artifacts = self.config.artifacts.clone();
        let jobs: Result<Vec<FetchJob>, NetworkError> = artifacts
            .iter()
            .map(|artifact| {
                artifact_url(&self.config.base_url, &version, &artifact.name)
                    .map(|url| FetchJob::new(artifact.clone(), url))
            })
            .collect();

        let id = Uuid::new_v4();
        self.attempt = Some(InstallAttempt {
            id,
            destination: destination.clone(),
            artifacts: artifacts.clone(),
            jobs: Vec::new(),
            progress: ProgressAggregator::new(artifacts.len()),
        });
        self.state = AttemptState::Downloading;
        tracing::debug!(attempt = %id, version = %version, generation = self.generation, "install attempt started");
        self.emit_install(InstallEvent::Started {
            attempt_id: id,
            version: version.to_string(),
            destination,
            artifacts: artifacts.iter().map(|a| a.name.to_string()).collect(),
        });

        if self.cancel.is_cancelled() {
            tracing::debug!(attempt = %id, "cancelled before any transfer started");
            self.finish(AttemptOutcome::Cancelled);
            return;
        }

        let mut jobs = match jobs {
            Ok(jobs) => jobs,
            Err(e) => {
                self.finish(AttemptOutcome::Failed(e.into()));
                return;
            }
        };

        self.emit_install(InstallEvent::PhaseChanged {
            attempt_id: id,
            phase: InstallPhase::Downloading,
        });
        for (index, job) in jobs.iter_mut().enumerate() {
            self.emit_download(DownloadEvent::Started {
                artifact: job.artifact.name.to_string(),
                url: job.url.to_string(),
            });
            let sink = JobSink::new(self.job_tx.clone(), self.generation, index);
            let request = FetchRequest {
                artifact: job.artifact.name.clone(),
                url: job.url.clone(),
            };
            job.handle = Some(self.transport.fetch(request, sink));
        }

        if let Some(attempt) = self.attempt.as_mut() {
            attempt.jobs = jobs;
        }
    }

    /// Dispatch one transport report
    ///
    /// Reports from superseded attempts, or arriving after the download
    /// phase, are dropped.
    pub async fn handle_event(&mut self, event: JobEvent) {
        if event.generation != self.generation
            || !matches!(self.state, AttemptState::Downloading)
        {
            tracing::trace!(
                generation = event.generation,
                current = self.generation,
                job = event.job,
                "ignoring stale job event"
            );
            return;
        }

        match event.kind {
            JobEventKind::Progress { received, total } => {
                self.on_job_progress(event.job, received, total);
            }
            JobEventKind::Completed(result) => self.on_job_completed(event.job, result).await,
        }
    }

    /// Fold a progress report into the aggregate and forward it
    pub fn on_job_progress(&mut self, job: usize, received: u64, total: Option<u64>) {
        if !matches!(self.state, AttemptState::Downloading) {
            return;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        let Some(entry) = attempt.jobs.get_mut(job) else {
            return;
        };
        if entry.completed {
            return;
        }

        entry.received = received;
        if total.is_some() {
            entry.total = total;
        }
        let snapshot = attempt.progress.update(job, received, total);
        let attempt_id = attempt.id;

        self.emit_install(InstallEvent::Progress {
            attempt_id,
            fraction: snapshot.fraction,
            received: snapshot.received,
            total: snapshot.total,
        });
    }

    /// Record a finished transfer
    ///
    /// A failed transfer ends the attempt at once. When the last transfer
    /// succeeds the attempt moves on to staging, verification and commit.
    pub async fn on_job_completed(&mut self, job: usize, result: Result<Bytes, NetworkError>) {
        if !matches!(self.state, AttemptState::Downloading) {
            return;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        let attempt_id = attempt.id;
        let Some(entry) = attempt.jobs.get_mut(job) else {
            return;
        };
        if entry.completed {
            return;
        }
        entry.completed = true;
        entry.handle = None;
        let artifact = entry.artifact.name.to_string();
        let url = entry.url.to_string();

        match result {
            Err(e) => {
                entry.error = Some(e.clone());
                self.emit_download(DownloadEvent::Failed {
                    artifact,
                    url,
                    failure: FailureContext::from_error(&e),
                });
                self.finish(AttemptOutcome::Failed(e.into()));
            }
            Ok(bytes) => {
                let size = bytes.len() as u64;
                entry.received = size;
                entry.total = Some(entry.total.unwrap_or(size));
                entry.payload = Some(bytes);
                let snapshot = attempt.progress.complete(job, size);
                let all_done = attempt.jobs.iter().all(FetchJob::succeeded);

                self.emit_download(DownloadEvent::Completed {
                    artifact,
                    url,
                    bytes: size,
                });
                self.emit_install(InstallEvent::Progress {
                    attempt_id,
                    fraction: snapshot.fraction,
                    received: snapshot.received,
                    total: snapshot.total,
                });

                if all_done {
                    self.install_downloaded().await;
                }
            }
        }
    }

    /// Cancel the running attempt
    ///
    /// Does nothing when no attempt is active. Has no effect once the commit
    /// has begun.
    pub fn cancel(&mut self) {
        match self.state {
            AttemptState::Downloading | AttemptState::Verifying => {
                self.finish(AttemptOutcome::Cancelled);
            }
            AttemptState::Committing => {
                tracing::debug!("cancellation requested during commit; ignoring");
            }
            AttemptState::Idle | AttemptState::Finished(_) => {}
        }
    }

    /// Process transport reports and cancellation requests until the attempt
    /// is finished
    pub async fn run(&mut self) -> AttemptOutcome {
        loop {
            match &self.state {
                AttemptState::Idle => {
                    return AttemptOutcome::Failed(InstallError::NoActiveAttempt.into());
                }
                AttemptState::Finished(outcome) => return outcome.clone(),
                _ => {}
            }

            let cancel = self.cancel.clone();
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                event = self.job_rx.recv() => Some(event),
            };

            match next {
                None => self.cancel(),
                Some(Some(event)) => self.handle_event(event).await,
                Some(None) => {
                    self.finish(AttemptOutcome::Failed(Error::internal(
                        "job event channel closed",
                    )));
                }
            }
        }
    }

    async fn install_downloaded(&mut self) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        let payloads: Vec<(Artifact, Bytes)> = attempt
            .jobs
            .iter_mut()
            .filter_map(|job| job.payload.take().map(|p| (job.artifact.clone(), p)))
            .collect();
        let artifacts = attempt.artifacts.clone();
        let destination = attempt.destination.clone();
        let attempt_id = attempt.id;

        self.set_phase(InstallPhase::Verifying);
        match self
            .stage_verify_commit(payloads, &artifacts, &destination, attempt_id)
            .await
        {
            Ok(report) => {
                for item in &report.installed {
                    self.emit_install(InstallEvent::ArtifactInstalled {
                        attempt_id,
                        artifact: item.name.to_string(),
                        path: item.path.clone(),
                    });
                }
                if let Some(e) = &report.cleanup_error {
                    self.emit_warning("failed to remove staging area", e.to_string());
                }
                let installed = report.installed.into_iter().map(|i| i.path).collect();
                self.finish(AttemptOutcome::Succeeded { installed });
            }
            Err(Error::Cancelled) => self.finish(AttemptOutcome::Cancelled),
            Err(e) => self.finish(AttemptOutcome::Failed(e)),
        }
    }

    async fn stage_verify_commit(
        &mut self,
        payloads: Vec<(Artifact, Bytes)>,
        artifacts: &ArtifactSet,
        destination: &std::path::Path,
        attempt_id: Uuid,
    ) -> Result<CommitReport, Error> {
        let staging = stage_all(
            self.config.staging_parent.as_deref(),
            payloads,
            &self.cancel,
        )
        .await?;

        let key = match self.config.key_source.load() {
            Ok(key) => key,
            Err(e) => {
                staging.discard();
                return Err(e);
            }
        };

        let verified = verify_staging(staging, artifacts, &key, &self.cancel, |name| {
            self.emit_install(InstallEvent::ArtifactVerified {
                attempt_id,
                artifact: name.to_string(),
            });
        })
        .await?;

        if self.cancel.is_cancelled() {
            verified.into_staging().discard();
            return Err(Error::Cancelled);
        }

        self.set_phase(InstallPhase::Committing);
        commit(verified, artifacts, destination, attempt_id).await
    }

    fn set_phase(&mut self, phase: InstallPhase) {
        self.state = match phase {
            InstallPhase::Downloading => AttemptState::Downloading,
            InstallPhase::Verifying => AttemptState::Verifying,
            InstallPhase::Committing => AttemptState::Committing,
        };
        if let Some(attempt_id) = self.attempt_id() {
            tracing::debug!(attempt = %attempt_id, %phase, "install phase changed");
            self.emit_install(InstallEvent::PhaseChanged { attempt_id, phase });
        }
    }

    /// Abort what is still in flight and report the single terminal outcome
    fn finish(&mut self, outcome: AttemptOutcome) {
        if !self.state.is_active() {
            return;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        let attempt_id = attempt.id;

        let mut aborted = Vec::new();
        for job in &mut attempt.jobs {
            job.payload = None;
            if let Some(handle) = job.handle.take() {
                if !job.completed {
                    handle.abort();
                    aborted.push((job.artifact.name.to_string(), job.url.to_string()));
                }
            }
        }
        // reports already queued by aborted transfers now carry a stale generation
        self.generation += 1;

        for (artifact, url) in aborted {
            self.emit_download(DownloadEvent::Aborted { artifact, url });
        }

        let event = match &outcome {
            AttemptOutcome::Succeeded { installed } => InstallEvent::Succeeded {
                attempt_id,
                installed: installed.clone(),
            },
            AttemptOutcome::Failed(error) => InstallEvent::Failed {
                attempt_id,
                failure: FailureContext::from_error(error),
            },
            AttemptOutcome::Cancelled => InstallEvent::Cancelled { attempt_id },
        };
        tracing::debug!(attempt = %attempt_id, ?outcome, "install attempt finished");
        self.emit_install(event);
        self.state = AttemptState::Finished(outcome);
        // the finished attempt keeps its token; the next one gets a fresh one
        self.cancel = CancellationToken::new();
    }
}

impl<T> EventEmitter for BatchCoordinator<T> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }

    fn correlation_id(&self) -> Option<String> {
        self.attempt.as_ref().map(|a| a.id.to_string())
    }
}

impl<T> Drop for BatchCoordinator<T> {
    fn drop(&mut self) {
        if let Some(attempt) = self.attempt.as_mut() {
            for handle in attempt.jobs.iter_mut().filter_map(|j| j.handle.take()) {
                handle.abort();
            }
        }
    }
}
