//! Network plumbing for the EduReach offline client: an HTTP transport with a
//! bounded timeout and retry count, a latency probe, a reachability watcher
//! standing in for the platform's online/offline signal, and the network
//! quality estimator built on top of them.

pub mod error;
pub mod estimator;
pub mod platform;
pub mod probe;
pub mod transport;

pub use error::NetworkFault;
pub use estimator::{
    ConnectivityEvent, Estimator, OfflineIndicator, SubscriptionId, SyncTrigger,
};
pub use platform::{is_reachable, spawn_connectivity_watcher, FixedBandwidthHint};
pub use probe::{BandwidthHint, HttpProbe, LatencyProbe};
pub use transport::HttpTransport;
