//! Temporary holding area for fetched, not-yet-trusted artifacts
//!
//! Bytes land here only after every transfer of the attempt has finished.
//! Nothing in the staging area is trusted until verification has passed.

use bytes::Bytes;
use plugfetch_errors::{Error, InstallError};
use plugfetch_types::{Artifact, ArtifactName};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use tokio_util::sync::CancellationToken;

const STAGING_PREFIX: &str = "plugfetch-staging-";

/// An artifact written into the staging area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub artifact: Artifact,
    pub path: PathBuf,
}

/// Staging directory for one install attempt
///
/// Dropping it removes the directory and everything staged in it.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    files: Vec<StagedFile>,
}

impl StagingArea {
    /// Create an empty staging directory under `parent`, or the system temp
    /// directory when no parent is configured
    ///
    /// # Errors
    ///
    /// Returns `InstallError::Staging` if the directory cannot be created.
    pub fn create(parent: Option<&Path>) -> Result<Self, Error> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);

        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| staging_error(parent, &e))?;
                builder.tempdir_in(parent).map_err(|e| staging_error(parent, &e))?
            }
            None => builder
                .tempdir()
                .map_err(|e| staging_error(&std::env::temp_dir(), &e))?,
        };

        tracing::debug!(root = %dir.path().display(), "created staging area");
        Ok(Self {
            dir,
            files: Vec::new(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Files staged so far, in staging order
    #[must_use]
    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    #[must_use]
    pub fn path_of(&self, name: &ArtifactName) -> Option<&Path> {
        self.files
            .iter()
            .find(|f| &f.artifact.name == name)
            .map(|f| f.path.as_path())
    }

    /// Write one artifact's bytes to `<root>/<name>` with its kind's mode
    ///
    /// # Errors
    ///
    /// Returns `InstallError::Staging` naming the file if it cannot be written.
    pub async fn stage(&mut self, artifact: &Artifact, bytes: &[u8]) -> Result<PathBuf, Error> {
        let path = self.dir.path().join(artifact.name.as_str());
        fs::write(&path, bytes)
            .await
            .map_err(|e| staging_error(&path, &e))?;
        set_mode(&path, artifact.kind.file_mode())
            .await
            .map_err(|e| staging_error(&path, &e))?;

        self.files.push(StagedFile {
            artifact: artifact.clone(),
            path: path.clone(),
        });
        Ok(path)
    }

    /// Remove the staging directory
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn close(self) -> Result<(), Error> {
        let root = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| Error::io_with_path(&e, root))
    }

    /// Remove the staging directory, logging instead of failing
    pub fn discard(self) {
        let root = self.dir.path().to_path_buf();
        if let Err(e) = self.close() {
            tracing::warn!(root = %root.display(), error = %e, "failed to remove staging area");
        }
    }
}

/// Stage every payload in order, checking for cancellation between files
///
/// On any failure the partially filled staging area is removed before the
/// error is returned.
///
/// # Errors
///
/// Returns `InstallError::Staging` on I/O failure and `Error::Cancelled` when
/// cancellation was requested.
pub async fn stage_all(
    parent: Option<&Path>,
    payloads: Vec<(Artifact, Bytes)>,
    cancel: &CancellationToken,
) -> Result<StagingArea, Error> {
    let mut staging = StagingArea::create(parent)?;
    for (artifact, bytes) in payloads {
        if cancel.is_cancelled() {
            staging.discard();
            return Err(Error::Cancelled);
        }
        if let Err(e) = staging.stage(&artifact, &bytes).await {
            staging.discard();
            return Err(e);
        }
    }
    Ok(staging)
}

fn staging_error(path: &Path, err: &std::io::Error) -> Error {
    InstallError::Staging {
        path: path.display().to_string(),
        message: err.to_string(),
    }
    .into()
}

#[cfg(unix)]
pub(crate) async fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
pub(crate) async fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugfetch_types::ArtifactKind;

    fn artifact(name: &str, kind: ArtifactKind) -> Artifact {
        Artifact::new(ArtifactName::new(name).unwrap(), kind)
    }

    #[tokio::test]
    async fn stages_under_configured_parent() {
        let parent = tempfile::tempdir().unwrap();
        let mut staging = StagingArea::create(Some(&parent.path().join("nested"))).unwrap();
        assert!(staging.root().starts_with(parent.path()));
        assert!(staging
            .root()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(STAGING_PREFIX));

        let path = staging
            .stage(&artifact("plugin-host", ArtifactKind::Executable), b"host")
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"host");
        assert_eq!(
            staging.path_of(&ArtifactName::new("plugin-host").unwrap()),
            Some(path.as_path())
        );

        let root = staging.root().to_path_buf();
        staging.close().unwrap();
        assert!(!root.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn modes_follow_artifact_kind() {
        use std::os::unix::fs::PermissionsExt;

        let mut staging = StagingArea::create(None).unwrap();
        for (name, kind, mode) in [
            ("plugin-host", ArtifactKind::Executable, 0o755),
            ("libplugin.so.1", ArtifactKind::Library, 0o755),
            ("plugin-host.sig", ArtifactKind::Signature, 0o644),
        ] {
            let path = staging.stage(&artifact(name, kind), b"x").await.unwrap();
            let actual = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(actual, mode, "{name}");
        }
    }

    #[tokio::test]
    async fn drop_removes_directory() {
        let staging = StagingArea::create(None).unwrap();
        let root = staging.root().to_path_buf();
        drop(staging);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn cancelled_staging_leaves_nothing() {
        let parent = tempfile::tempdir().unwrap();
        let signal = CancellationToken::new();
        signal.cancel();

        let err = stage_all(
            Some(parent.path()),
            vec![(
                artifact("plugin-host", ArtifactKind::Executable),
                Bytes::from_static(b"host"),
            )],
            &signal,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unwritable_parent_is_a_staging_error() {
        let parent = tempfile::tempdir().unwrap();
        let blocker = parent.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = StagingArea::create(Some(&blocker.join("child"))).unwrap_err();
        assert!(matches!(
            err,
            Error::Install(InstallError::Staging { ref path, .. }) if path.contains("not-a-dir")
        ));
    }
}
