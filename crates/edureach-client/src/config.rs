//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the agent starts with zero configuration
//! against a local development backend.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use tracing::warn;
use url::Url;

use edureach_shared::constants::{
    CACHE_VERSION, DB_NAME, DEFAULT_API_BASE_URL, DEFAULT_APP_ORIGIN, MAX_STORAGE_BYTES,
    QUALITY_CHECK_INTERVAL_MS, REQUEST_TIMEOUT_SECS, RETRY_ATTEMPTS,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote API; sync calls go to `{base}/{action}`.
    /// Env: `EDUREACH_API_BASE_URL`
    pub api_base_url: String,

    /// Origin the application is served from. Only responses from this
    /// origin are cached.
    /// Env: `EDUREACH_APP_ORIGIN`
    pub app_origin: String,

    /// Directory for the local database and the cache generations.
    /// Env: `EDUREACH_DATA_DIR`
    /// Default: the platform data directory.
    pub data_dir: PathBuf,

    /// Name of the cache generation for this build.
    /// Env: `EDUREACH_CACHE_VERSION`
    pub cache_version: String,

    /// Env: `EDUREACH_REQUEST_TIMEOUT_SECS`
    pub request_timeout: Duration,

    /// Env: `EDUREACH_RETRY_ATTEMPTS`
    pub retry_attempts: u32,

    /// Env: `EDUREACH_QUALITY_CHECK_INTERVAL_MS`
    pub quality_check_interval: Duration,

    /// Env: `EDUREACH_STORAGE_QUOTA_BYTES`
    pub storage_quota_bytes: u64,

    /// Downlink figure used instead of the latency probe when set.
    /// Env: `EDUREACH_DOWNLINK_MBPS`
    pub downlink_mbps: Option<f64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            data_dir: default_data_dir(),
            cache_version: CACHE_VERSION.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry_attempts: RETRY_ATTEMPTS,
            quality_check_interval: Duration::from_millis(QUALITY_CHECK_INTERVAL_MS),
            storage_quota_bytes: MAX_STORAGE_BYTES,
            downlink_mbps: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    match ProjectDirs::from("org", "edureach", "edureach") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => PathBuf::from("./edureach-data"),
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("EDUREACH_API_BASE_URL") {
            match Url::parse(&url) {
                Ok(_) => config.api_base_url = url.trim_end_matches('/').to_string(),
                Err(e) => warn!(value = %url, error = %e, "Invalid EDUREACH_API_BASE_URL, using default"),
            }
        }

        if let Some(origin) = lookup("EDUREACH_APP_ORIGIN") {
            match Url::parse(&origin) {
                Ok(_) => config.app_origin = origin,
                Err(e) => warn!(value = %origin, error = %e, "Invalid EDUREACH_APP_ORIGIN, using default"),
            }
        }

        if let Some(dir) = lookup("EDUREACH_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        if let Some(version) = lookup("EDUREACH_CACHE_VERSION") {
            if !version.is_empty() {
                config.cache_version = version;
            }
        }

        if let Some(secs) = parse_number::<u64>(&lookup, "EDUREACH_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }

        if let Some(n) = parse_number::<u32>(&lookup, "EDUREACH_RETRY_ATTEMPTS") {
            config.retry_attempts = n.max(1);
        }

        if let Some(ms) = parse_number::<u64>(&lookup, "EDUREACH_QUALITY_CHECK_INTERVAL_MS") {
            config.quality_check_interval = Duration::from_millis(ms.max(100));
        }

        match parse_number::<u64>(&lookup, "EDUREACH_STORAGE_QUOTA_BYTES") {
            Some(0) => warn!("EDUREACH_STORAGE_QUOTA_BYTES must be positive, using default"),
            Some(bytes) => config.storage_quota_bytes = bytes,
            None => {}
        }

        if let Some(mbps) = parse_number::<f64>(&lookup, "EDUREACH_DOWNLINK_MBPS") {
            if mbps.is_finite() && mbps >= 0.0 {
                config.downlink_mbps = Some(mbps);
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{DB_NAME}.sqlite"))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Invalid number, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ClientConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:5000/api");
        assert_eq!(config.app_origin, "http://localhost:8000");
        assert_eq!(config.cache_version, "edureach-v1.0.0");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.quality_check_interval, Duration::from_millis(5000));
        assert!(config.downlink_mbps.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("EDUREACH_API_BASE_URL", "https://api.edureach.org/v2/"),
            ("EDUREACH_DATA_DIR", "/tmp/edureach"),
            ("EDUREACH_RETRY_ATTEMPTS", "5"),
            ("EDUREACH_DOWNLINK_MBPS", "0.75"),
        ]);
        assert_eq!(config.api_base_url, "https://api.edureach.org/v2");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/edureach/edureach_db.sqlite"));
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/edureach/cache"));
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.downlink_mbps, Some(0.75));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("EDUREACH_APP_ORIGIN", "not a url"),
            ("EDUREACH_REQUEST_TIMEOUT_SECS", "soon"),
            ("EDUREACH_DOWNLINK_MBPS", "-3"),
            ("EDUREACH_STORAGE_QUOTA_BYTES", "0"),
        ]);
        assert_eq!(config.app_origin, "http://localhost:8000");
        assert_eq!(
            config.storage_quota_bytes,
            ClientConfig::default().storage_quota_bytes
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.downlink_mbps.is_none());
    }
}
