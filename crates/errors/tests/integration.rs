//! Integration tests for error types

#[cfg(test)]
mod tests {
    use plugfetch_errors::*;

    #[test]
    fn test_error_conversion() {
        let net_err = NetworkError::Timeout {
            url: "https://releases.example.com/2.4.1/plugin-host".into(),
        };
        let err: Error = net_err.into();
        assert!(matches!(err, Error::Network(_)));
        assert!(err.is_retryable());
        assert_eq!(err.user_code(), Some("network.timeout"));
    }

    #[test]
    fn test_error_display() {
        let err = InstallError::Commit {
            path: "/opt/plugins/plugin-host".into(),
            message: "permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "writing file failed: /opt/plugins/plugin-host: permission denied"
        );
    }

    #[test]
    fn test_error_clone() {
        let err: Error = SigningError::SignatureMismatch {
            artifact: "plugin-host".into(),
        }
        .into();
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert_eq!(cloned.user_code(), Some("signing.signature_mismatch"));
    }

    #[test]
    fn test_http_status_retryability() {
        let not_found = NetworkError::HttpError {
            status: 404,
            url: "https://releases.example.com/9.9.9/plugin-host".into(),
        };
        let unavailable = NetworkError::HttpError {
            status: 503,
            url: "https://releases.example.com/2.4.1/plugin-host".into(),
        };
        assert!(!not_found.is_retryable());
        assert!(not_found.user_hint().is_some());
        assert!(unavailable.is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let err = Error::io_with_path(&io_err, "/opt/plugins");
        match err {
            Error::Io { kind, path, .. } => {
                assert_eq!(kind, std::io::ErrorKind::PermissionDenied);
                assert_eq!(path, Some(std::path::PathBuf::from("/opt/plugins")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
