//! Integration tests for config

#[cfg(test)]
mod tests {
    use plugfetch_config::*;
    use plugfetch_types::ArtifactKind;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[source]
base_url = "https://mirror.example.org/plugins"

[layout]
artifacts = [
    {{ name = "plugin-host", kind = "executable", signed = true }},
    {{ name = "libplugin.so.1", kind = "library" }},
]

[network]
timeout = 60
chunk_timeout = 15

[paths]
destination = "/opt/plugins"
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(
            config.source.normalized_base_url(),
            "https://mirror.example.org/plugins/"
        );
        assert_eq!(config.network.timeout, 60);
        assert_eq!(config.network.chunk_timeout, 15);
        assert_eq!(config.destination().unwrap(), PathBuf::from("/opt/plugins"));
        config.validate().unwrap();

        let set = config.artifact_set().unwrap();
        let names: Vec<&str> = set.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["plugin-host", "plugin-host.sig", "libplugin.so.1"]);
        assert_eq!(set.get(1).unwrap().kind, ArtifactKind::Signature);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from_file(&dir.path().join("absent.toml")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::set_var("PLUGFETCH_BASE_URL", "http://127.0.0.1:8080/releases/");
        std::env::set_var("PLUGFETCH_DESTINATION", "/tmp/plugfetch-dest");

        let mut config = Config::default();
        let result = config.merge_env();

        std::env::remove_var("PLUGFETCH_BASE_URL");
        std::env::remove_var("PLUGFETCH_DESTINATION");

        result.unwrap();
        assert_eq!(config.source.base_url, "http://127.0.0.1:8080/releases/");
        assert_eq!(
            config.paths.destination,
            Some(PathBuf::from("/tmp/plugfetch-dest"))
        );
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::set_var("PLUGFETCH_TIMEOUT", "soon");

        let mut config = Config::default();
        let result = config.merge_env();

        std::env::remove_var("PLUGFETCH_TIMEOUT");

        assert!(result.is_err());
    }
}
