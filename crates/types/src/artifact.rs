//! Artifact naming and the ordered artifact set of one install attempt
//!
//! Every signature artifact is named after its subject plus
//! [`SIGNATURE_SUFFIX`](crate::SIGNATURE_SUFFIX); [`ArtifactSet::new`] refuses
//! any list where that pairing does not hold exactly.

use crate::SIGNATURE_SUFFIX;
use plugfetch_errors::{ConfigError, Error, InstallError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A plain file name addressing one artifact, both remotely and on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Validate and wrap an artifact file name
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, `.`/`..`, contains a path
    /// separator or a NUL byte, or would change meaning inside a URL.
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name
                .chars()
                .any(|c| c.is_control() || matches!(c, '/' | '\\' | '?' | '#' | '%'));
        if invalid {
            return Err(ConfigError::InvalidValue {
                field: "artifact name".to_string(),
                value: name,
            }
            .into());
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the detached signature covering this artifact
    #[must_use]
    pub fn signature_name(&self) -> ArtifactName {
        Self(format!("{}{SIGNATURE_SUFFIX}", self.0))
    }

    /// Whether the name follows the signature naming convention
    #[must_use]
    pub fn has_signature_suffix(&self) -> bool {
        self.0.len() > SIGNATURE_SUFFIX.len() && self.0.ends_with(SIGNATURE_SUFFIX)
    }

    /// Name of the artifact a signature with this name covers
    #[must_use]
    pub fn subject_name(&self) -> Option<ArtifactName> {
        if !self.has_signature_suffix() {
            return None;
        }
        self.0
            .strip_suffix(SIGNATURE_SUFFIX)
            .map(|subject| Self(subject.to_string()))
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactName> for String {
    fn from(name: ArtifactName) -> Self {
        name.0
    }
}

/// What an artifact is used for once downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Primary binary, installed and marked executable
    Executable,
    /// Companion native library, installed and marked executable
    Library,
    /// Detached signature, used for verification only and never installed
    Signature,
}

impl ArtifactKind {
    #[must_use]
    pub fn is_installable(self) -> bool {
        !matches!(self, Self::Signature)
    }

    /// Unix permission bits for the staged and installed file
    #[must_use]
    pub fn file_mode(self) -> u32 {
        match self {
            Self::Executable | Self::Library => 0o755,
            Self::Signature => 0o644,
        }
    }
}

/// One entry of an [`ArtifactSet`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: ArtifactName,
    pub kind: ArtifactKind,
}

impl Artifact {
    #[must_use]
    pub fn new(name: ArtifactName, kind: ArtifactKind) -> Self {
        Self { name, kind }
    }
}

/// Declarative layout entry describing an installable artifact
///
/// This is the shape stored in configuration; [`ArtifactSet::from_layout`]
/// expands signed entries into a subject/signature pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub name: ArtifactName,
    pub kind: ArtifactKind,
    #[serde(default)]
    pub signed: bool,
}

/// Ordered, immutable list of artifacts fetched by one install attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    artifacts: Vec<Artifact>,
}

impl ArtifactSet {
    /// Build a set, checking the signature pairing invariant
    ///
    /// # Errors
    ///
    /// Returns an error if the set is empty, a name repeats, a signature has
    /// no subject in the set, or a non-signature artifact uses the signature
    /// suffix.
    pub fn new(artifacts: Vec<Artifact>) -> Result<Self, Error> {
        if artifacts.is_empty() {
            return Err(invalid("artifact set is empty"));
        }

        let mut seen = HashSet::with_capacity(artifacts.len());
        for artifact in &artifacts {
            if !seen.insert(artifact.name.as_str()) {
                return Err(invalid(format!("duplicate artifact {}", artifact.name)));
            }
        }

        for artifact in &artifacts {
            match artifact.kind {
                ArtifactKind::Signature => {
                    let subject = artifact
                        .name
                        .subject_name()
                        .ok_or_else(|| invalid(format!("{} lacks the signature suffix", artifact.name)))?;
                    let subject_kind = artifacts
                        .iter()
                        .find(|candidate| candidate.name == subject)
                        .map(|candidate| candidate.kind);
                    match subject_kind {
                        Some(kind) if kind.is_installable() => {}
                        Some(_) => {
                            return Err(invalid(format!(
                                "{} signs another signature",
                                artifact.name
                            )))
                        }
                        None => {
                            return Err(invalid(format!(
                                "{} has no subject artifact {subject}",
                                artifact.name
                            )))
                        }
                    }
                }
                ArtifactKind::Executable | ArtifactKind::Library => {
                    if artifact.name.has_signature_suffix() {
                        return Err(invalid(format!(
                            "{} uses the signature suffix but is not a signature",
                            artifact.name
                        )));
                    }
                }
            }
        }

        Ok(Self { artifacts })
    }

    /// Expand a layout into an artifact set
    ///
    /// Each signed entry is immediately followed by its signature, so the
    /// layout `[binary (signed), library]` yields `binary`, `binary.sig`,
    /// `library`.
    ///
    /// # Errors
    ///
    /// Returns an error if a layout entry is itself a signature or the
    /// resulting set violates the [`ArtifactSet::new`] invariants.
    pub fn from_layout(layout: &[ArtifactSpec]) -> Result<Self, Error> {
        let mut artifacts = Vec::with_capacity(layout.len() * 2);
        for spec in layout {
            if !spec.kind.is_installable() {
                return Err(invalid(format!(
                    "layout entry {} must not be a signature; set `signed = true` on its subject",
                    spec.name
                )));
            }
            artifacts.push(Artifact::new(spec.name.clone(), spec.kind));
            if spec.signed {
                artifacts.push(Artifact::new(
                    spec.name.signature_name(),
                    ArtifactKind::Signature,
                ));
            }
        }
        Self::new(artifacts)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Artifact> {
        self.artifacts.get(index)
    }

    /// Artifacts that end up in the destination directory, in set order
    pub fn installables(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| a.kind.is_installable())
    }

    /// `(signature, subject)` pairs in set order
    pub fn signature_pairs(&self) -> impl Iterator<Item = (&Artifact, &Artifact)> {
        self.artifacts
            .iter()
            .filter(|a| a.kind == ArtifactKind::Signature)
            .filter_map(|signature| {
                let subject = signature.name.subject_name()?;
                self.artifacts
                    .iter()
                    .find(|a| a.name == subject)
                    .map(|subject| (signature, subject))
            })
    }
}

impl<'a> IntoIterator for &'a ArtifactSet {
    type Item = &'a Artifact;
    type IntoIter = std::slice::Iter<'a, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.iter()
    }
}

fn invalid(message: impl Into<String>) -> Error {
    InstallError::InvalidArtifactSet {
        message: message.into(),
    }
    .into()
}
