//! Stand-ins for the platform connectivity signals a browser would provide.
//!
//! A headless agent has no `online`/`offline` events and no downlink
//! estimate, so reachability of the API host is polled instead and the
//! downlink figure comes from configuration.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info};
use url::Url;

use crate::error::NetworkFault;
use crate::estimator::ConnectivityEvent;
use crate::probe::BandwidthHint;

/// Downlink figure supplied up front (e.g. from `EDUREACH_DOWNLINK_MBPS`).
#[derive(Debug, Clone, Copy)]
pub struct FixedBandwidthHint(pub f64);

impl BandwidthHint for FixedBandwidthHint {
    fn downlink_mbps(&self) -> Option<f64> {
        (self.0.is_finite() && self.0 >= 0.0).then_some(self.0)
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

fn host_and_port(api_base: &str) -> Result<(String, u16), NetworkFault> {
    let url = Url::parse(api_base)?;
    let host = url
        .host_str()
        .ok_or_else(|| NetworkFault::Transport(format!("no host in {api_base}")))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| NetworkFault::Transport(format!("no port for {api_base}")))?;
    Ok((host, port))
}

/// Can a TCP connection to the API host be opened right now?
pub async fn is_reachable(api_base: &str) -> bool {
    let Ok((host, port)) = host_and_port(api_base) else {
        return false;
    };
    matches!(
        timeout(CONNECT_TIMEOUT, TcpStream::connect((host.as_str(), port))).await,
        Ok(Ok(_))
    )
}

/// Poll reachability every `interval` and emit an event on each change.
///
/// `initially_online` is the state the estimator was constructed with, so the
/// first event only fires if the first poll disagrees with it. The task stops
/// once the receiver is dropped.
pub fn spawn_connectivity_watcher(
    api_base: String,
    initially_online: bool,
    interval: Duration,
    events: mpsc::Sender<ConnectivityEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut online = initially_online;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let reachable = is_reachable(&api_base).await;
            if reachable == online {
                continue;
            }
            online = reachable;

            let event = if online {
                ConnectivityEvent::WentOnline
            } else {
                ConnectivityEvent::WentOffline
            };
            debug!(?event, host = %api_base, "connectivity changed");
            if events.send(event).await.is_err() {
                break;
            }
        }

        info!("connectivity watcher stopped");
    })
}
