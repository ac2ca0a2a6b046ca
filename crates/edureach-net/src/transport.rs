//! HTTP transport with a bounded timeout and a fixed retry count.
//!
//! Retries cover transport-level failures only (connect errors, timeouts).
//! A response with a non-success status is an answer, not a transient
//! failure, and is surfaced on the first attempt.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use edureach_shared::constants::{REQUEST_TIMEOUT_SECS, RETRY_ATTEMPTS};

use crate::error::NetworkFault;

/// Pause between attempts; doubles each retry.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    attempts: u32,
}

impl HttpTransport {
    pub fn new(timeout: Duration, attempts: u32) -> Result<Self, NetworkFault> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edureach-offline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            attempts: attempts.max(1),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Send the request built by `build`, retrying transient failures.
    ///
    /// `build` is called once per attempt because a `RequestBuilder` is
    /// consumed by sending it.
    pub async fn send<F>(&self, build: F) -> Result<Response, NetworkFault>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 1;
        loop {
            match build(&self.client).send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let fault = NetworkFault::from(e);
                    if !fault.is_transient() || attempt >= self.attempts {
                        return Err(fault);
                    }
                    warn!(attempt, error = %fault, "request failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }

    /// POST a JSON body with an optional bearer token. Any non-2xx status is
    /// a [`NetworkFault::Status`].
    pub async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<Response, NetworkFault> {
        let response = self
            .send(|client| {
                let request = client.post(url).json(body);
                match bearer {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "POST completed");
        if !status.is_success() {
            return Err(NetworkFault::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            attempts: RETRY_ATTEMPTS,
        }
    }
}
