//! Moving verified artifacts into the destination directory
//!
//! The commit runs in two phases. Prepare moves every installable artifact to
//! a hidden temporary name inside the destination; a failure there removes
//! the temporaries, and any directories the commit created, leaving the
//! visible destination as it was. Publish then
//! renames each temporary over its final name. A publish failure stops at
//! that file and removes the temporaries not yet published.

use crate::staging::set_mode;
use crate::verify::VerifiedStaging;
use plugfetch_errors::{Error, InstallError};
use plugfetch_types::{ArtifactName, ArtifactSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// An artifact placed in the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledArtifact {
    pub name: ArtifactName,
    pub path: PathBuf,
}

/// Result of a successful commit
#[derive(Debug)]
pub struct CommitReport {
    pub installed: Vec<InstalledArtifact>,
    /// Set when the staging area could not be removed afterwards; the
    /// install itself still succeeded
    pub cleanup_error: Option<Error>,
}

struct Prepared {
    name: ArtifactName,
    temp: PathBuf,
    target: PathBuf,
}

/// Install every non-signature artifact of `artifacts` into `destination`
///
/// Signature artifacts stay in staging and are removed with it.
///
/// # Errors
///
/// Returns `InstallError::Commit` naming the destination path that could not
/// be written.
pub async fn commit(
    verified: VerifiedStaging,
    artifacts: &ArtifactSet,
    destination: &Path,
    attempt_id: Uuid,
) -> Result<CommitReport, Error> {
    let created = missing_dirs(destination).await;
    if let Err(e) = fs::create_dir_all(destination).await {
        remove_created(&created).await;
        verified.into_staging().discard();
        return Err(commit_error(destination, &e));
    }

    let prepared = match prepare(&verified, artifacts, destination, attempt_id).await {
        Ok(prepared) => prepared,
        Err(e) => {
            remove_created(&created).await;
            verified.into_staging().discard();
            return Err(e);
        }
    };

    let installed = match publish(prepared).await {
        Ok(installed) => installed,
        Err(e) => {
            verified.into_staging().discard();
            return Err(e);
        }
    };

    let cleanup_error = verified.into_staging().close().err();
    Ok(CommitReport {
        installed,
        cleanup_error,
    })
}

async fn prepare(
    verified: &VerifiedStaging,
    artifacts: &ArtifactSet,
    destination: &Path,
    attempt_id: Uuid,
) -> Result<Vec<Prepared>, Error> {
    let staging = verified.staging();
    let mut prepared: Vec<Prepared> = Vec::new();

    for (index, artifact) in artifacts.installables().enumerate() {
        let target = destination.join(artifact.name.as_str());
        // independent of the artifact name so long names still fit
        let temp = destination.join(format!(".plugfetch-{attempt_id}-{index}.part"));
        let source = staging
            .path_of(&artifact.name)
            .map_or_else(|| staging.root().join(artifact.name.as_str()), Path::to_path_buf);

        let moved = match move_file(&source, &temp).await {
            Ok(()) => set_mode(&temp, artifact.kind.file_mode()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = moved {
            let _ = fs::remove_file(&temp).await;
            remove_temps(&prepared).await;
            return Err(commit_error(&target, &e));
        }

        prepared.push(Prepared {
            name: artifact.name.clone(),
            temp,
            target,
        });
    }

    Ok(prepared)
}

async fn publish(prepared: Vec<Prepared>) -> Result<Vec<InstalledArtifact>, Error> {
    let mut installed = Vec::with_capacity(prepared.len());

    for (index, item) in prepared.iter().enumerate() {
        if let Err(e) = fs::rename(&item.temp, &item.target).await {
            remove_temps(&prepared[index..]).await;
            if !installed.is_empty() {
                tracing::warn!(
                    published = installed.len(),
                    "commit stopped after some artifacts were published"
                );
            }
            return Err(commit_error(&item.target, &e));
        }
        tracing::debug!(artifact = %item.name, path = %item.target.display(), "published artifact");
        installed.push(InstalledArtifact {
            name: item.name.clone(),
            path: item.target.clone(),
        });
    }

    Ok(installed)
}

/// Rename, falling back to copy when source and target are on different
/// filesystems
async fn move_file(source: &Path, target: &Path) -> std::io::Result<()> {
    match fs::rename(source, target).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(error = %rename_err, "rename failed, copying instead");
            fs::copy(source, target).await?;
            let _ = fs::remove_file(source).await;
            Ok(())
        }
    }
}

/// Directories `create_dir_all(destination)` will create, deepest first
async fn missing_dirs(destination: &Path) -> Vec<PathBuf> {
    let mut missing = Vec::new();
    for dir in destination.ancestors() {
        if dir.as_os_str().is_empty() || fs::try_exists(dir).await.unwrap_or(true) {
            break;
        }
        missing.push(dir.to_path_buf());
    }
    missing
}

/// Remove directories this commit created; stops at the first one that is no
/// longer empty
async fn remove_created(dirs: &[PathBuf]) {
    for dir in dirs {
        if fs::remove_dir(dir).await.is_err() {
            break;
        }
    }
}

async fn remove_temps(prepared: &[Prepared]) {
    for item in prepared {
        let _ = fs::remove_file(&item.temp).await;
    }
}

fn commit_error(path: &Path, err: &std::io::Error) -> Error {
    InstallError::Commit {
        path: path.display().to_string(),
        message: err.to_string(),
    }
    .into()
}
