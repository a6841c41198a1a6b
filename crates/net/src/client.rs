//! HTTP client with connection pooling and bounded streaming reads

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use plugfetch_config::NetworkConfig;
use plugfetch_errors::NetworkError;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use url::Url;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub chunk_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub max_body_size: u64,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // 5 minutes for large artifacts
            connect_timeout: Duration::from_secs(30),
            chunk_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            max_body_size: 512 * 1024 * 1024,
            user_agent: format!("plugfetch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&NetworkConfig> for NetConfig {
    fn from(config: &NetworkConfig) -> Self {
        let defaults = Self::default();
        Self {
            timeout: config.timeout(),
            connect_timeout: config.connect_timeout(),
            chunk_timeout: config.chunk_timeout(),
            max_body_size: config.max_artifact_size,
            user_agent: config.user_agent.clone().unwrap_or(defaults.user_agent),
            ..defaults
        }
    }
}

/// HTTP client wrapper
///
/// Requests are issued exactly once; a failed fetch is reported to the
/// caller, which decides whether the whole attempt is lost.
#[derive(Debug, Clone)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: NetConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| NetworkError::ConnectionRefused(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created with default settings.
    pub fn with_defaults() -> Result<Self, NetworkError> {
        Self::new(NetConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Execute a GET request
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure or timeout. HTTP error statuses
    /// are not errors at this level.
    pub async fn get(&self, url: &Url) -> Result<Response, NetworkError> {
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(url, &e))
    }

    /// Fetch a whole response body into memory
    ///
    /// `on_progress` receives `(received, total)` for the first chunk, at most
    /// every 50ms afterwards, and once more when the body is complete. `total`
    /// comes from `Content-Length` when the server sends one.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` for a non-2xx status, `Timeout` when no chunk
    /// arrives within the chunk timeout, `TooLarge` when the body exceeds the
    /// configured limit, and `DownloadFailed` for stream errors.
    pub async fn fetch_bytes<F>(&self, url: &Url, mut on_progress: F) -> Result<Bytes, NetworkError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let limit = self.config.max_body_size;
        let total = response.content_length();
        if total.is_some_and(|total| total > limit) {
            return Err(NetworkError::TooLarge {
                url: url.to_string(),
                limit,
            });
        }

        let capacity = total
            .and_then(|total| usize::try_from(total).ok())
            .unwrap_or(0);
        let mut body = BytesMut::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        let mut last_update = Instant::now();
        let mut first_chunk = true;

        loop {
            match tokio::time::timeout(self.config.chunk_timeout, stream.next()).await {
                Ok(Some(chunk)) => {
                    let chunk = chunk.map_err(|e| classify(url, &e))?;
                    if body.len() as u64 + chunk.len() as u64 > limit {
                        return Err(NetworkError::TooLarge {
                            url: url.to_string(),
                            limit,
                        });
                    }
                    body.extend_from_slice(&chunk);

                    if first_chunk || last_update.elapsed() >= Duration::from_millis(50) {
                        on_progress(body.len() as u64, total);
                        last_update = Instant::now();
                        first_chunk = false;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    return Err(NetworkError::Timeout {
                        url: url.to_string(),
                    });
                }
            }
        }

        on_progress(body.len() as u64, total);
        Ok(body.freeze())
    }
}

fn classify(url: &Url, error: &reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        NetworkError::ConnectionRefused(error.to_string())
    } else {
        NetworkError::DownloadFailed(error.to_string())
    }
}
