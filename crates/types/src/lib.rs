#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for plugfetch
//!
//! This crate provides the vocabulary shared by every other crate: artifact
//! names and kinds, the ordered artifact set fetched by one install attempt,
//! and release version labels.

pub mod artifact;
pub mod version;

pub use artifact::{Artifact, ArtifactKind, ArtifactName, ArtifactSet, ArtifactSpec};
pub use version::ReleaseVersion;

/// Suffix appended to a subject artifact's name to form its detached
/// signature's name.
pub const SIGNATURE_SUFFIX: &str = ".sig";
