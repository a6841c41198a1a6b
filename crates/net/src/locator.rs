//! Artifact URL convention: `<base>/<version>/<artifact>`

use plugfetch_errors::NetworkError;
use plugfetch_types::{ArtifactName, ReleaseVersion};
use url::Url;

/// Build the remote location of one artifact of a release
///
/// A missing trailing `/` on `base` is supplied. Only `http` and `https`
/// locations are accepted.
///
/// # Errors
///
/// Returns `NetworkError::InvalidUrl` if the result does not parse or uses
/// another scheme.
pub fn artifact_url(
    base: &str,
    version: &ReleaseVersion,
    artifact: &ArtifactName,
) -> Result<Url, NetworkError> {
    let separator = if base.ends_with('/') { "" } else { "/" };
    let raw = format!("{base}{separator}{version}/{artifact}");
    let url = Url::parse(&raw).map_err(|e| NetworkError::InvalidUrl(format!("{raw}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(NetworkError::InvalidUrl(format!(
            "{raw}: unsupported scheme {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ArtifactName {
        ArtifactName::new(s).unwrap()
    }

    fn version(s: &str) -> ReleaseVersion {
        ReleaseVersion::new(s).unwrap()
    }

    #[test]
    fn joins_base_version_and_name() {
        let url = artifact_url(
            "https://plugins.example.com/releases/",
            &version("2.4.1"),
            &name("plugin-host.sig"),
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://plugins.example.com/releases/2.4.1/plugin-host.sig"
        );
    }

    #[test]
    fn supplies_missing_slash() {
        let url = artifact_url("http://localhost:8080/r", &version("1.0"), &name("libplugin.so.1"))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/r/1.0/libplugin.so.1");
    }

    #[test]
    fn rejects_other_schemes() {
        let err = artifact_url("file:///srv/releases/", &version("1.0"), &name("plugin-host"))
            .unwrap_err();
        assert!(matches!(err, NetworkError::InvalidUrl(_)));
        assert!(artifact_url("not a url", &version("1.0"), &name("plugin-host")).is_err());
    }
}
