//! Website monitoring implementation

use super::{ProbeResult, Prober};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// Default probe timeout (seconds). A check must never hang indefinitely.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// HTTP prober: one GET per check, response body is never read.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpProber {
    pub fn new(timeout_secs: u64, accept_invalid_certs: bool) -> Result<Self> {
        let user_agent = format!("ping-watch/{}", env!("CARGO_PKG_VERSION"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

/// Status line in the `<code> <reason>` form, e.g. `503 Service Unavailable`.
fn status_line(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeResult {
        trace!("Monitor: Starting website check - URL: {}, Timeout: {}s", url, self.timeout_secs);

        let start_time = std::time::Instant::now();
        let response = self.client.get(url).send().await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        match response {
            // The response (and its pooled connection) is dropped here without reading the body.
            Ok(resp) => {
                let status = resp.status();
                trace!(
                    "Monitor: Website check done - URL: {}, Status code: {}, Response time: {}ms",
                    url,
                    status.as_u16(),
                    elapsed_ms
                );
                ProbeResult::new(url, status.as_u16(), status_line(status))
            }
            Err(e) => {
                trace!(
                    "Monitor: Website check error - URL: {}, Error: {}, Response time: {}ms",
                    url,
                    e,
                    elapsed_ms
                );
                ProbeResult::failed(url, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitors::PROBE_FAILED;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_probe_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = HttpProber::new(5, false).unwrap();
        let url = format!("{}/health", server.uri());
        let result = prober.probe(&url).await;
        assert_eq!(result.url, url);
        assert_eq!(result.status_code, 200);
        assert_eq!(result.status_line, "200 OK");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_probe_reports_http_error_codes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let prober = HttpProber::new(5, false).unwrap();
        let result = prober.probe(&server.uri()).await;
        assert_eq!(result.status_code, 404);
        assert_eq!(result.status_line, "404 Not Found");
    }

    #[tokio::test]
    async fn test_probe_timeout_is_absorbed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let prober = HttpProber::new(1, false).unwrap();
        let result = prober.probe(&server.uri()).await;
        assert_eq!(result.status_code, PROBE_FAILED);
        assert!(result.status_line.starts_with("Failed to ping:"));
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_absorbed() {
        // Bind then drop a listener so the port is known to be closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let prober = HttpProber::new(5, false).unwrap();
        let result = prober.probe(&format!("http://127.0.0.1:{}", port)).await;
        assert_eq!(result.status_code, PROBE_FAILED);
    }
}
