//! HTTP round-trip primitive.
//!
//! [`HttpPoller`] issues one HTTP request per poll on the tokio runtime it was
//! created in. The response text is handed back verbatim; status codes are not
//! interpreted. Any failure, including the request timeout, delivers an empty
//! body so the polling adapter's in-flight flag is always released.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::runtime::Handle;
use tracing::{trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::polling::{PollCallback, Poller};

// ============================================================================
// Constants
// ============================================================================

/// Content type of the outbound envelope.
const STRATUM_CONTENT_TYPE: &str = "application/stratum";

// ============================================================================
// HttpPoller
// ============================================================================

/// [`Poller`] backed by an HTTP client.
#[derive(Debug, Clone)]
pub struct HttpPoller {
    client: Client,
    runtime: Handle,
    timeout: Duration,
}

impl HttpPoller {
    /// Creates a poller bound to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if called outside a tokio runtime
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("HttpPoller requires a tokio runtime: {e}")))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            runtime,
            timeout,
        })
    }

    /// Returns the per-request timeout.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn round_trip(client: Client, url: Url, payload: String) -> Result<String> {
        let response = client
            .get(url)
            .header(CONTENT_TYPE, STRATUM_CONTENT_TYPE)
            .body(payload)
            .send()
            .await?;

        trace!(status = %response.status(), "Poll answered");
        Ok(response.text().await?)
    }
}

impl Poller for HttpPoller {
    fn request(&self, url: &Url, payload: String, on_response: PollCallback) {
        let client = self.client.clone();
        let url = url.clone();

        self.runtime.spawn(async move {
            let body = match Self::round_trip(client, url.clone(), payload).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(url = %url, error = %e, "Poll failed, delivering empty body");
                    String::new()
                }
            };

            on_response(body);
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[test]
    fn test_requires_runtime() {
        let err = HttpPoller::new(Duration::from_secs(1)).expect_err("no runtime");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_round_trip_delivers_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(String::new()));
        let server_seen = Arc::clone(&seen);

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut request = Vec::new();
            // Read until the JSON body has arrived.
            while !request.ends_with(b"]}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            *server_seen.lock() = String::from_utf8_lossy(&request).into_owned();

            let body = "{\"id\":\"0\",\"result\":true}\n";
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
        });

        let poller = HttpPoller::new(Duration::from_secs(5)).expect("poller");
        let (tx, rx) = oneshot::channel();
        let url = Url::parse(&format!("http://{addr}/poll")).unwrap();

        poller.request(
            &url,
            r#"{"messages":[]}"#.to_string(),
            Box::new(move |body| {
                let _ = tx.send(body);
            }),
        );

        let body = rx.await.expect("callback fired");
        assert_eq!(body, "{\"id\":\"0\",\"result\":true}\n");

        let request = seen.lock().clone();
        assert!(request.starts_with("GET /poll"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/stratum"));
        assert!(request.ends_with(r#"{"messages":[]}"#));
    }

    #[tokio::test]
    async fn test_failure_delivers_empty_body() {
        // Bind then drop so the port refuses connections.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let poller = HttpPoller::new(Duration::from_secs(2)).expect("poller");
        let (tx, rx) = oneshot::channel();
        let url = Url::parse(&format!("http://{addr}/poll")).unwrap();

        poller.request(
            &url,
            r#"{"messages":[]}"#.to_string(),
            Box::new(move |body| {
                let _ = tx.send(body);
            }),
        );

        assert_eq!(rx.await.expect("callback fired"), "");
    }
}
