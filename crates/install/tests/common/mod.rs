//! Shared fixtures for coordinator tests

#![allow(dead_code)]

use bytes::Bytes;
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::EncodePublicKey;
use ed25519_dalek::Signer;
use plugfetch_errors::NetworkError;
use plugfetch_events::{AppEvent, EventReceiver};
use plugfetch_install::CoordinatorConfig;
use plugfetch_net::{FetchRequest, JobSink, TransferHandle, Transport};
use plugfetch_signing::{SignatureScheme, TrustedKeySource};
use plugfetch_types::{ArtifactKind, ArtifactName, ArtifactSet, ArtifactSpec};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const HOST: &[u8] = b"#!/bin/sh\necho plugin host\n";
pub const LIBRARY: &[u8] = b"\x7fELF native plugin library";

/// `plugin-host`, `plugin-host.sig`, `libplugin.so.1`
pub fn artifact_set() -> ArtifactSet {
    ArtifactSet::from_layout(&[
        ArtifactSpec {
            name: ArtifactName::new("plugin-host").unwrap(),
            kind: ArtifactKind::Executable,
            signed: true,
        },
        ArtifactSpec {
            name: ArtifactName::new("libplugin.so.1").unwrap(),
            kind: ArtifactKind::Library,
            signed: false,
        },
    ])
    .unwrap()
}

pub fn signing_key() -> ed25519_dalek::SigningKey {
    ed25519_dalek::SigningKey::from_bytes(&[21; 32])
}

pub fn key_source() -> TrustedKeySource {
    let pem = signing_key()
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap();
    TrustedKeySource::new(SignatureScheme::Ed25519, pem)
}

pub fn host_signature() -> Vec<u8> {
    signing_key().sign(HOST).to_bytes().to_vec()
}

pub fn coordinator_config(base_url: &str, staging_parent: &Path) -> CoordinatorConfig {
    CoordinatorConfig {
        base_url: base_url.to_string(),
        artifacts: artifact_set(),
        staging_parent: Some(staging_parent.to_path_buf()),
        key_source: Arc::new(TrustedKeySource::embedded()),
    }
    .with_key_source(key_source())
}

pub fn drain(rx: &mut EventReceiver) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        events.push(message.event);
    }
    events
}

pub fn terminal_count(events: &[AppEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Destination pre-populated with an older install
pub fn seeded_destination(root: &Path) -> PathBuf {
    let dest = root.join("plugins");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("plugin-host"), b"old host").unwrap();
    std::fs::write(dest.join("libplugin.so.1"), b"old library").unwrap();
    dest
}

struct Started {
    request: FetchRequest,
    sink: JobSink,
    aborted: Arc<AtomicBool>,
}

struct MockHandle {
    aborted: Arc<AtomicBool>,
}

impl TransferHandle for MockHandle {
    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Transport that records requests and lets the test decide every outcome
#[derive(Clone, Default)]
pub struct MockTransport {
    started: Arc<Mutex<Vec<Started>>>,
}

impl Transport for MockTransport {
    fn fetch(&self, request: FetchRequest, sink: JobSink) -> Box<dyn TransferHandle> {
        let aborted = Arc::new(AtomicBool::new(false));
        self.started.lock().unwrap().push(Started {
            request,
            sink,
            aborted: aborted.clone(),
        });
        Box::new(MockHandle { aborted })
    }
}

impl MockTransport {
    /// Requested URLs in request order
    pub fn urls(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.request.url.to_string())
            .collect()
    }

    /// Sink of the most recent request for `artifact`
    pub fn sink(&self, artifact: &str) -> JobSink {
        self.started
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.request.artifact.as_str() == artifact)
            .map(|s| s.sink.clone())
            .unwrap()
    }

    pub fn progress(&self, artifact: &str, received: u64, total: Option<u64>) {
        self.sink(artifact).progress(received, total);
    }

    pub fn succeed(&self, artifact: &str, body: &[u8]) {
        self.sink(artifact)
            .complete(Ok(Bytes::copy_from_slice(body)));
    }

    pub fn fail(&self, artifact: &str, error: NetworkError) {
        self.sink(artifact).complete(Err(error));
    }

    /// Whether every request for `artifact` so far was aborted
    pub fn aborted(&self, artifact: &str) -> bool {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.request.artifact.as_str() == artifact)
            .all(|s| s.aborted.load(Ordering::SeqCst))
    }

    pub fn abort_count(&self) -> usize {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.aborted.load(Ordering::SeqCst))
            .count()
    }
}
