//! The request-interception worker.
//!
//! Lifecycle: `Parsed → Installing → Installed → Activating → Activated`.
//! An installed worker waits until the old clients are released or a
//! skip-waiting message arrives. Only an activated worker intercepts; before
//! that every request passes through to the network untouched.
//!
//! Interception policy for intercepted requests:
//! 1. exact match in the current generation, answered with no network call;
//! 2. otherwise the network. A `200` same-origin response is written back,
//!    best-effort;
//! 3. on network failure a navigation gets the offline fallback document,
//!    anything else a synthetic `408`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;
use reqwest::Method;
use tracing::{debug, error, info, warn};
use url::{Origin, Url};

use edureach_net::NetworkFault;
use edureach_shared::constants::OFFLINE_FALLBACK_PATH;

use crate::error::Result;
use crate::fetch::Fetch;
use crate::message::{parse_message, WorkerMessage};
use crate::request::{CachedResponse, ContentRequest, ResponseKind};
use crate::storage::{CacheStorage, Generation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

/// What the worker decided for one request.
#[derive(Debug)]
pub enum Interception {
    /// Not ours; the caller goes to the network directly.
    Passthrough,
    Respond(CachedResponse),
}

/// Outcome of an install. Individual asset failures do not fail the install.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub struct CacheWorker {
    version: String,
    app_base: Url,
    app_origin: Origin,
    storage: CacheStorage,
    fetcher: Arc<dyn Fetch>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl CacheWorker {
    /// `app_base` is the application's own origin; manifest paths and the
    /// offline fallback are resolved against it.
    pub fn new(
        version: impl Into<String>,
        app_base: Url,
        storage: CacheStorage,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        let app_origin = app_base.origin();
        Self {
            version: version.into(),
            app_base,
            app_origin,
            storage,
            fetcher,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*state, to = ?next, version = %self.version, "worker state");
        *state = next;
    }

    async fn generation(&self) -> Result<Generation> {
        self.storage.open_generation(&self.version).await
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Fetch every manifest path, concurrently, into a fresh generation named
    /// after this version. Failed assets are logged and reported, never fatal.
    pub async fn install(&self, manifest: &[&str]) -> Result<InstallReport> {
        info!(version = %self.version, assets = manifest.len(), "installing");
        self.set_state(WorkerState::Installing);

        let generation = match self.generation().await {
            Ok(generation) => generation,
            Err(e) => {
                self.set_state(WorkerState::Parsed);
                return Err(e);
            }
        };

        let generation = &generation;
        let outcomes = join_all(
            manifest
                .iter()
                .map(|path| async move { (*path, self.cache_asset(generation, path).await) }),
        )
        .await;

        let mut report = InstallReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(()) => report.cached.push(path.to_string()),
                Err(reason) => {
                    warn!(path, %reason, "asset failed to cache");
                    report.failed.push((path.to_string(), reason));
                }
            }
        }

        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install complete"
        );
        self.set_state(WorkerState::Installed);

        if self.skip_waiting.load(Ordering::SeqCst) {
            self.activate().await?;
        }
        Ok(report)
    }

    async fn cache_asset(&self, generation: &Generation, path: &str) -> std::result::Result<(), String> {
        let url = self.app_base.join(path).map_err(|e| e.to_string())?;
        let response = self
            .fetcher
            .fetch(&ContentRequest::get(url.clone()))
            .await
            .map_err(|e| e.to_string())?;
        if !response.is_ok() {
            return Err(format!("HTTP {}", response.status));
        }
        generation
            .put(&url, &response)
            .await
            .map_err(|e| e.to_string())
    }

    /// Delete every generation not named after this version, then start
    /// intercepting.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.set_state(WorkerState::Activating);

        let mut deleted = Vec::new();
        let result = async {
            for name in self.storage.keys().await? {
                if name != self.version {
                    info!(generation = %name, "deleting stale cache generation");
                    self.storage.delete(&name).await?;
                    deleted.push(name);
                }
            }
            self.generation().await.map(|_| ())
        }
        .await;

        if let Err(e) = result {
            error!(error = %e, "activation failed");
            self.set_state(WorkerState::Installed);
            return Err(e);
        }

        self.set_state(WorkerState::Activated);
        info!(version = %self.version, "worker activated");
        Ok(deleted)
    }

    /// Adopt this version immediately. Takes effect right away when already
    /// installed, otherwise as soon as install finishes.
    pub async fn skip_waiting(&self) -> Result<()> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        if self.state() == WorkerState::Installed {
            self.activate().await?;
        }
        Ok(())
    }

    /// The clients controlled by the previous version are gone.
    pub async fn release_clients(&self) -> Result<()> {
        if self.state() == WorkerState::Installed {
            self.activate().await?;
        }
        Ok(())
    }

    /// Handle a raw message from the page. Malformed messages are logged and
    /// dropped.
    pub async fn handle_message(&self, raw: &str) -> Result<()> {
        match parse_message(raw) {
            Ok(Some(WorkerMessage::SkipWaiting)) => self.skip_waiting().await,
            Ok(None) => {
                debug!("ignoring unrecognised worker message");
                Ok(())
            }
            Err(fault) => {
                warn!(error = %fault, "malformed worker message");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Interception
    // ------------------------------------------------------------------

    pub async fn intercept(&self, request: &ContentRequest) -> Interception {
        if self.state() != WorkerState::Activated
            || request.method != Method::GET
            || !request.is_network_scheme()
        {
            return Interception::Passthrough;
        }

        let generation = match self.generation().await {
            Ok(generation) => Some(generation),
            Err(e) => {
                warn!(error = %e, "cache generation unavailable");
                None
            }
        };

        if let Some(generation) = &generation {
            match generation.match_url(&request.url).await {
                Ok(Some(hit)) => {
                    debug!(url = %request.url, "serving from cache");
                    return Interception::Respond(hit);
                }
                Ok(None) => {}
                Err(e) => warn!(url = %request.url, error = %e, "cache lookup failed"),
            }
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if let Some(generation) = &generation {
                    self.write_back(generation, request, &response).await;
                }
                Interception::Respond(response)
            }
            Err(fault) => {
                error!(url = %request.url, error = %fault, "fetch failed");
                Interception::Respond(self.offline_response(generation.as_ref(), request).await)
            }
        }
    }

    /// Intercept, or go straight to the network for passthrough requests.
    pub async fn respond(&self, request: &ContentRequest) -> std::result::Result<CachedResponse, NetworkFault> {
        match self.intercept(request).await {
            Interception::Respond(response) => Ok(response),
            Interception::Passthrough => self.fetcher.fetch(request).await,
        }
    }

    async fn write_back(&self, generation: &Generation, request: &ContentRequest, response: &CachedResponse) {
        if !response.is_ok()
            || response.kind != ResponseKind::Basic
            || request.url.origin() != self.app_origin
        {
            return;
        }
        if let Err(e) = generation.put(&request.url, response).await {
            warn!(url = %request.url, error = %e, "cache write-back failed");
        }
    }

    async fn offline_response(&self, generation: Option<&Generation>, request: &ContentRequest) -> CachedResponse {
        if request.is_navigation() {
            if let (Some(generation), Ok(fallback)) = (generation, self.app_base.join(OFFLINE_FALLBACK_PATH)) {
                match generation.match_url(&fallback).await {
                    Ok(Some(page)) => return page,
                    Ok(None) => warn!("offline fallback document is not cached"),
                    Err(e) => warn!(error = %e, "offline fallback lookup failed"),
                }
            }
        }
        CachedResponse::network_error()
    }
}
