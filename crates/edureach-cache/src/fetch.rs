//! The network side of interception.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use url::{Origin, Url};

use edureach_net::{HttpTransport, NetworkFault};

use crate::request::{CachedResponse, ContentRequest, ResponseKind};

#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform the request. Any HTTP answer, whatever its status, is `Ok`.
    async fn fetch(&self, request: &ContentRequest) -> Result<CachedResponse, NetworkFault>;
}

/// Fetches over [`HttpTransport`] and labels responses `Basic` when they
/// come from the application's own origin.
pub struct HttpFetcher {
    transport: HttpTransport,
    app_origin: Origin,
}

impl HttpFetcher {
    pub fn new(transport: HttpTransport, app_origin: &Url) -> Self {
        Self {
            transport,
            app_origin: app_origin.origin(),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &ContentRequest) -> Result<CachedResponse, NetworkFault> {
        let response = self
            .transport
            .send(|client| client.request(request.method.clone(), request.url.clone()))
            .await?;

        let kind = if response.url().origin() == self.app_origin {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body: Bytes = response.bytes().await?;

        debug!(url = %request.url, status, ?kind, size = body.len(), "fetched");
        Ok(CachedResponse {
            status,
            kind,
            headers,
            body,
        })
    }
}
