//! Detached signature checks over a filled staging area

use crate::staging::StagingArea;
use plugfetch_errors::{Error, InstallError};
use plugfetch_signing::TrustedKey;
use plugfetch_types::{ArtifactName, ArtifactSet};
use std::path::Path;
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// A staging area whose every signature has been checked
///
/// Only [`verify_staging`] produces one, so holding a `VerifiedStaging` is
/// proof that the commit precondition holds.
#[derive(Debug)]
pub struct VerifiedStaging {
    staging: StagingArea,
}

impl VerifiedStaging {
    #[must_use]
    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    #[must_use]
    pub fn into_staging(self) -> StagingArea {
        self.staging
    }
}

/// Check each `(signature, subject)` pair of `artifacts` in set order
///
/// `on_verified` is called with the subject name after each passing check.
/// On any failure, including cancellation, the staging area is removed before
/// the error is returned.
///
/// # Errors
///
/// Returns `SigningError::SignatureMismatch` naming the first subject that
/// fails, `InstallError::Staging` if a staged file cannot be read, or
/// `Error::Cancelled`.
pub async fn verify_staging<F>(
    staging: StagingArea,
    artifacts: &ArtifactSet,
    key: &TrustedKey,
    cancel: &CancellationToken,
    mut on_verified: F,
) -> Result<VerifiedStaging, Error>
where
    F: FnMut(&ArtifactName),
{
    for (signature, subject) in artifacts.signature_pairs() {
        if cancel.is_cancelled() {
            staging.discard();
            return Err(Error::Cancelled);
        }

        let checked = check_pair(&staging, &subject.name, &signature.name, key).await;
        if let Err(e) = checked {
            tracing::debug!(artifact = %subject.name, error = %e, "signature check failed");
            staging.discard();
            return Err(e);
        }
        on_verified(&subject.name);
    }

    Ok(VerifiedStaging { staging })
}

async fn check_pair(
    staging: &StagingArea,
    subject: &ArtifactName,
    signature: &ArtifactName,
    key: &TrustedKey,
) -> Result<(), Error> {
    let message = read_staged(staging, subject).await?;
    let signature_bytes = read_staged(staging, signature).await?;
    key.verify(subject.as_str(), &message, &signature_bytes)
}

async fn read_staged(staging: &StagingArea, name: &ArtifactName) -> Result<Vec<u8>, Error> {
    let path = staging
        .path_of(name)
        .map_or_else(|| staging.root().join(name.as_str()), Path::to_path_buf);
    fs::read(&path).await.map_err(|e| {
        InstallError::Staging {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}
