//! Inputs to quality detection: a passive bandwidth hint and an active
//! latency probe.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CACHE_CONTROL;
use tracing::debug;
use url::Url;

use crate::error::NetworkFault;
use crate::transport::HttpTransport;

/// Platform-provided downlink estimate.
pub trait BandwidthHint: Send + Sync {
    /// Downlink in Mbps, or `None` when the platform has no estimate right now.
    fn downlink_mbps(&self) -> Option<f64>;
}

/// A lightweight network round-trip.
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    async fn probe(&self) -> Result<Duration, NetworkFault>;
}

/// `HEAD {base}/ping?t=<now>` with caching disabled.
///
/// Any HTTP answer counts; only a transport failure is a probe failure.
/// The probe is sent once: a retried probe would measure the retries.
pub struct HttpProbe {
    transport: HttpTransport,
    ping_url: Url,
}

impl HttpProbe {
    pub fn new(transport: HttpTransport, api_base: &str) -> Result<Self, NetworkFault> {
        let mut base = Url::parse(api_base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            transport,
            ping_url: base.join("ping")?,
        })
    }

    pub fn ping_url(&self) -> &Url {
        &self.ping_url
    }
}

#[async_trait]
impl LatencyProbe for HttpProbe {
    async fn probe(&self) -> Result<Duration, NetworkFault> {
        let mut url = self.ping_url.clone();
        url.query_pairs_mut()
            .append_pair("t", &Utc::now().timestamp_millis().to_string());

        let started = Instant::now();
        let response = self
            .transport
            .client()
            .head(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let elapsed = started.elapsed();

        debug!(
            status = response.status().as_u16(),
            latency_ms = elapsed.as_millis() as u64,
            "latency probe answered"
        );
        Ok(elapsed)
    }
}
