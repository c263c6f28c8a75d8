//! HTTP client for communicating with the valve controller server.

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use valve_core::api::{
    ConnectionResponse, ControlValveResponse, ErrorResponse, PortsResponse, ResetValveResponse,
    ScoreSubmission, ServiceStatus,
};

/// Normalize a server URL by removing trailing slashes.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Which transport failures a request may be retried on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryOn {
    /// Reads: any failure to get an answer, timeouts included
    AnyTransportError,
    /// Commands that move the valve: only when the request never left, since
    /// a timed-out command may already have run
    ConnectOnly,
}

impl RetryOn {
    fn allows(self, err: &reqwest::Error) -> bool {
        match self {
            RetryOn::AnyTransportError => err.is_connect() || err.is_timeout() || err.is_request(),
            RetryOn::ConnectOnly => err.is_connect(),
        }
    }
}

/// HTTP client for the `valved` REST API.
///
/// Requests that fail to reach the server are retried with a linearly
/// growing delay. Reads are also retried on timeouts; valve commands are not,
/// so a slow server never gets the same score twice. Any HTTP answer,
/// including 4xx and 5xx, is final.
///
/// ```no_run
/// use valvectl::client::ValveClient;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = ValveClient::with_config(
///     "http://localhost:5000".to_string(),
///     10,
///     3,
///     Duration::from_millis(500),
/// )?;
///
/// let result = client.send_score(75, Some("Happy")).await?;
/// println!("{}", result.message);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ValveClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ValveClient {
    /// Create a client.
    ///
    /// * `server_url` - base URL of the server (e.g. "http://localhost:5000")
    /// * `timeout_secs` - per-request timeout
    /// * `max_retries` - retry attempts for unreachable servers
    /// * `retry_delay` - delay before the first retry
    pub fn with_config(
        server_url: String,
        timeout_secs: u64,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("valvectl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: normalize_url(&server_url),
            max_retries,
            retry_delay,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turn an HTTP response into `T`, or into an error carrying the
    /// server's `{"error": ...}` message.
    async fn handle_response<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", endpoint))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);

            let error_msg = match status {
                StatusCode::NOT_FOUND => format!("Endpoint {} not found", endpoint),
                StatusCode::BAD_REQUEST => format!("Bad request to {}: {}", endpoint, detail),
                StatusCode::INTERNAL_SERVER_ERROR => {
                    format!("Server error at {}: {}", endpoint, detail)
                }
                _ => format!("HTTP {} error at {}: {}", status, endpoint, detail),
            };
            return Err(anyhow::anyhow!(error_msg));
        }

        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON response from {}", endpoint))
    }

    /// Send a request, retrying the failures `retry_on` allows.
    async fn execute_with_retry<F, Fut>(
        &self,
        endpoint: &str,
        retry_on: RetryOn,
        request_fn: F,
    ) -> Result<Response>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempt = 0;

        loop {
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt < self.max_retries && retry_on.allows(&e) {
                        attempt += 1;
                        tokio::time::sleep(self.retry_delay * attempt).await;
                        continue;
                    }

                    return Err(anyhow::anyhow!(
                        "Failed to reach {} after {} attempts: {}",
                        endpoint,
                        attempt + 1,
                        e
                    ));
                }
            }
        }
    }

    /// Submit a score; the server opens the valve accordingly.
    pub async fn send_score(&self, score: i64, name: Option<&str>) -> Result<ControlValveResponse> {
        let url = format!("{}/api/control-valve", self.base_url);
        let endpoint = "control-valve";
        let body = ScoreSubmission {
            score,
            name: name.map(str::to_string),
        };

        let response = self
            .execute_with_retry(endpoint, RetryOn::ConnectOnly, || {
                self.client.post(&url).json(&body).send()
            })
            .await?;
        Self::handle_response(response, endpoint).await
    }

    /// Close the valve.
    pub async fn reset_valve(&self) -> Result<ResetValveResponse> {
        let url = format!("{}/api/reset-valve", self.base_url);
        let endpoint = "reset-valve";

        let response = self
            .execute_with_retry(endpoint, RetryOn::ConnectOnly, || {
                self.client.post(&url).send()
            })
            .await?;
        Self::handle_response(response, endpoint).await
    }

    /// Ask the server whether the controller is reachable.
    ///
    /// The server answers 500 when it is not, with the same body shape, so
    /// both statuses decode into a [`ConnectionResponse`].
    pub async fn test_connection(&self) -> Result<ConnectionResponse> {
        let url = format!("{}/api/test-connection", self.base_url);
        let endpoint = "test-connection";

        let response = self
            .execute_with_retry(endpoint, RetryOn::AnyTransportError, || {
                self.client.get(&url).send()
            })
            .await?;

        if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            let text = response
                .text()
                .await
                .with_context(|| format!("Failed to read response body from {}", endpoint))?;
            return serde_json::from_str(&text)
                .with_context(|| format!("Server error at {}: {}", endpoint, text));
        }

        Self::handle_response(response, endpoint).await
    }

    /// List serial ports visible on the server host.
    pub async fn list_ports(&self) -> Result<PortsResponse> {
        let url = format!("{}/api/ports", self.base_url);
        let endpoint = "ports";

        let response = self
            .execute_with_retry(endpoint, RetryOn::AnyTransportError, || {
                self.client.get(&url).send()
            })
            .await?;
        Self::handle_response(response, endpoint).await
    }

    /// Fetch the service status from the root endpoint.
    pub async fn health(&self) -> Result<ServiceStatus> {
        let url = format!("{}/", self.base_url);
        let endpoint = "/";

        let response = self
            .execute_with_retry(endpoint, RetryOn::AnyTransportError, || {
                self.client.get(&url).send()
            })
            .await?;
        Self::handle_response(response, endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("http://localhost:5000"),
            "http://localhost:5000"
        );
        assert_eq!(
            normalize_url("http://localhost:5000/"),
            "http://localhost:5000"
        );
        assert_eq!(
            normalize_url("http://localhost:5000///"),
            "http://localhost:5000"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_attempts() {
        // Port 9 (discard) is closed on any sane test host
        let client = ValveClient::with_config(
            "http://127.0.0.1:9".to_string(),
            1,
            1,
            Duration::from_millis(1),
        )
        .unwrap();

        let err = client.health().await.unwrap_err();
        assert!(
            err.to_string().contains("after 2 attempts"),
            "unexpected error: {}",
            err
        );
    }
}
