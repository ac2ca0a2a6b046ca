//! Request-interception cache: named on-disk cache generations, a fetcher
//! abstraction over the network, and the worker that decides per request
//! whether to answer from the cache or the network.

pub mod error;
pub mod fetch;
pub mod message;
pub mod request;
pub mod storage;
pub mod worker;

pub use error::{CacheError, Result};
pub use fetch::{Fetch, HttpFetcher};
pub use message::{parse_message, WorkerMessage};
pub use request::{CachedResponse, ContentRequest, RequestMode, ResponseKind};
pub use storage::{CacheStorage, Generation};
pub use worker::{CacheWorker, InstallReport, Interception, WorkerState};
