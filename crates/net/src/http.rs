//! reqwest-backed transport

use crate::client::NetClient;
use crate::transport::{FetchRequest, JobSink, TransferHandle, Transport};

/// Transport that runs every fetch as its own tokio task
///
/// `fetch` must be called from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: NetClient,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &NetClient {
        &self.client
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, request: FetchRequest, sink: JobSink) -> Box<dyn TransferHandle> {
        let client = self.client.clone();
        let task = tokio::spawn(async move {
            tracing::debug!(artifact = %request.artifact, url = %request.url, job = sink.job(), "transfer started");
            let result = client
                .fetch_bytes(&request.url, |received, total| sink.progress(received, total))
                .await;
            match &result {
                Ok(body) => {
                    tracing::debug!(artifact = %request.artifact, bytes = body.len(), "transfer finished");
                }
                Err(e) => tracing::debug!(artifact = %request.artifact, error = %e, "transfer failed"),
            }
            sink.complete(result);
        });
        Box::new(task.abort_handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NetConfig;
    use crate::transport::{job_channel, JobEventKind};
    use httpmock::prelude::*;
    use plugfetch_errors::NetworkError;
    use plugfetch_types::ArtifactName;
    use std::time::Duration;
    use url::Url;

    fn request(server: &MockServer, path: &str) -> FetchRequest {
        FetchRequest {
            artifact: ArtifactName::new(path.rsplit('/').next().unwrap()).unwrap(),
            url: Url::parse(&server.url(path)).unwrap(),
        }
    }

    #[tokio::test]
    async fn delivers_payload_through_sink() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/1.0/plugin-host");
            then.status(200).body("host-bytes");
        });

        let transport = HttpTransport::new(NetClient::with_defaults().unwrap());
        let (tx, mut rx) = job_channel();
        let _handle = transport.fetch(request(&server, "/1.0/plugin-host"), JobSink::new(tx, 3, 1));

        let mut saw_progress = false;
        loop {
            let event = rx.recv().await.unwrap();
            assert_eq!((event.generation, event.job), (3, 1));
            match event.kind {
                JobEventKind::Progress { received, total } => {
                    assert!(received <= 10);
                    assert_eq!(total, Some(10));
                    saw_progress = true;
                }
                JobEventKind::Completed(result) => {
                    assert_eq!(result.unwrap().as_ref(), b"host-bytes");
                    break;
                }
            }
        }
        assert!(saw_progress);
    }

    #[tokio::test]
    async fn reports_http_failure_as_completion() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/1.0/plugin-host.sig");
            then.status(503);
        });

        let transport = HttpTransport::new(NetClient::with_defaults().unwrap());
        let (tx, mut rx) = job_channel();
        let _handle = transport.fetch(request(&server, "/1.0/plugin-host.sig"), JobSink::new(tx, 1, 0));

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.kind,
            JobEventKind::Completed(Err(NetworkError::HttpError { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn slow_response_hits_request_timeout() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/1.0/slow");
            then.status(200)
                .body("late")
                .delay(Duration::from_millis(500));
        });

        let client = NetClient::new(NetConfig {
            timeout: Duration::from_millis(200),
            ..NetConfig::default()
        })
        .unwrap();
        let (tx, mut rx) = job_channel();
        let _handle = HttpTransport::new(client).fetch(request(&server, "/1.0/slow"), JobSink::new(tx, 1, 0));

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.kind,
            JobEventKind::Completed(Err(NetworkError::Timeout { .. }))
        ));
    }

    #[tokio::test]
    async fn aborted_transfer_reports_nothing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/1.0/libplugin.so.1");
            then.status(200)
                .body("lib")
                .delay(Duration::from_millis(300));
        });

        let transport = HttpTransport::new(NetClient::with_defaults().unwrap());
        let (tx, mut rx) = job_channel();
        let handle = transport.fetch(request(&server, "/1.0/libplugin.so.1"), JobSink::new(tx, 1, 0));
        handle.abort();

        // the aborted task drops its sink, closing the channel without a report
        let next = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(next.is_none());
        assert!(handle.is_finished());
    }
}
