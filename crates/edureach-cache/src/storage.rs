//! On-disk cache generations.
//!
//! Layout: `<root>/<generation>/<blake3(url)>.body` next to a
//! `<blake3(url)>.json` metadata file. Both land through a rename from a
//! per-write temp file, metadata last, so an entry exists only once it is
//! complete. The metadata carries the body's hash; a body and metadata left
//! by two different writes never match and read as a miss.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

use crate::error::{CacheError, Result};
use crate::request::{CachedResponse, ResponseKind};

/// Generation names become directory names; anything that could escape the
/// cache root is rejected.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
    {
        return Err(CacheError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Cache key: the URL without its fragment.
fn entry_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    blake3::hash(url.as_str().as_bytes()).to_hex().to_string()
}

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// A temp path next to `key` that no concurrent write shares.
fn temp_path(dir: &Path, key: &str) -> PathBuf {
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("{key}.{}-{seq}.tmp", std::process::id()))
}

async fn write_atomic(dir: &Path, key: &str, target: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temp_path(dir, key);
    if let Err(e) = fs::write(&tmp, contents).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(CacheError::io(&tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, target).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(CacheError::io(target, e));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    kind: ResponseKind,
    headers: Vec<(String, String)>,
    body_hash: String,
}

/// The set of named generations under one root directory.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CacheError::io(&root, e))?;
        info!(path = %root.display(), "cache storage ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of every generation on disk, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| CacheError::io(&self.root, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    pub async fn has(&self, name: &str) -> bool {
        validate_name(name).is_ok() && fs::metadata(self.root.join(name)).await.is_ok()
    }

    /// Open a generation, creating it when absent.
    pub async fn open_generation(&self, name: &str) -> Result<Generation> {
        validate_name(name)?;
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(&dir, e))?;
        Ok(Generation {
            name: name.to_string(),
            dir,
        })
    }

    /// Remove a generation and everything in it. `Ok(false)` when absent.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let dir = self.root.join(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(generation = name, "cache generation deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(dir, e)),
        }
    }
}

/// One named snapshot of url → response pairs.
#[derive(Debug, Clone)]
pub struct Generation {
    name: String,
    dir: PathBuf,
}

impl Generation {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn paths(&self, key: &str) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{key}.body")),
            self.dir.join(format!("{key}.json")),
        )
    }

    pub async fn put(&self, url: &Url, response: &CachedResponse) -> Result<()> {
        let key = entry_key(url);
        let (body_path, meta_path) = self.paths(&key);
        let meta = EntryMeta {
            url: url.to_string(),
            status: response.status,
            kind: response.kind,
            headers: response.headers.clone(),
            body_hash: blake3::hash(&response.body).to_hex().to_string(),
        };

        write_atomic(&self.dir, &key, &body_path, &response.body).await?;
        write_atomic(&self.dir, &key, &meta_path, &serde_json::to_vec(&meta)?).await?;

        debug!(generation = %self.name, url = %url, size = response.body.len(), "cached");
        Ok(())
    }

    /// Exact-URL lookup.
    pub async fn match_url(&self, url: &Url) -> Result<Option<CachedResponse>> {
        let (body_path, meta_path) = self.paths(&entry_key(url));

        let raw = match fs::read(&meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(meta_path, e)),
        };
        let meta: EntryMeta = serde_json::from_slice(&raw)?;

        let body = match fs::read(&body_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(body_path, e)),
        };
        if blake3::hash(&body).to_hex().as_str() != meta.body_hash {
            debug!(generation = %self.name, url = %url, "cache entry mid-rewrite; treated as miss");
            return Ok(None);
        }

        Ok(Some(CachedResponse {
            status: meta.status,
            kind: meta.kind,
            headers: meta.headers,
            body: Bytes::from(body),
        }))
    }

    /// URLs of every complete entry, sorted.
    pub async fn urls(&self) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read(&path)
                .await
                .map_err(|e| CacheError::io(&path, e))?;
            let meta: EntryMeta = serde_json::from_slice(&raw)?;
            urls.push(meta.url);
        }

        urls.sort();
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_storage() -> (CacheStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = CacheStorage::open(dir.path().join("cache")).await.unwrap();
        (storage, dir)
    }

    fn page(body: &'static str) -> CachedResponse {
        CachedResponse {
            status: 200,
            kind: ResponseKind::Basic,
            headers: vec![("Content-Type".into(), "text/html".into())],
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[tokio::test]
    async fn put_then_match() {
        let (storage, _dir) = test_storage().await;
        let generation = storage.open_generation("v1").await.unwrap();
        let url = Url::parse("http://localhost:8000/index.html").unwrap();

        assert!(generation.match_url(&url).await.unwrap().is_none());
        generation.put(&url, &page("<html>")).await.unwrap();

        let hit = generation.match_url(&url).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"<html>"));
        assert_eq!(hit.header("content-type"), Some("text/html"));

        // fragment is not part of the key
        let with_fragment = Url::parse("http://localhost:8000/index.html#top").unwrap();
        assert!(generation.match_url(&with_fragment).await.unwrap().is_some());
        assert_eq!(generation.urls().await.unwrap(), vec![url.to_string()]);
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let (storage, _dir) = test_storage().await;
        let url = Url::parse("http://localhost:8000/manifest.json").unwrap();
        storage
            .open_generation("v1")
            .await
            .unwrap()
            .put(&url, &page("{}"))
            .await
            .unwrap();

        let reopened = CacheStorage::open(storage.root()).await.unwrap();
        let generation = reopened.open_generation("v1").await.unwrap();
        assert!(generation.match_url(&url).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn keys_and_delete() {
        let (storage, _dir) = test_storage().await;
        storage.open_generation("v2").await.unwrap();
        storage.open_generation("v1").await.unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["v1", "v2"]);
        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert!(!storage.has("v1").await);
        assert!(storage.has("v2").await);
    }

    #[tokio::test]
    async fn traversal_names_rejected() {
        let (storage, _dir) = test_storage().await;
        for name in ["", "..", "../etc", "a/b", ".hidden"] {
            assert!(matches!(
                storage.open_generation(name).await,
                Err(CacheError::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn concurrent_rewrites_never_mix_entries() {
        let (storage, _dir) = test_storage().await;
        let generation = storage.open_generation("v1").await.unwrap();
        let url = Url::parse("http://localhost:8000/app.js").unwrap();
        let a = CachedResponse {
            headers: vec![("ETag".into(), "a".into())],
            body: Bytes::from(vec![b'a'; 64 * 1024]),
            ..page("")
        };
        let b = CachedResponse {
            headers: vec![("ETag".into(), "b".into())],
            body: Bytes::from(vec![b'b'; 32 * 1024]),
            ..page("")
        };

        for _ in 0..20 {
            let (ra, rb) = tokio::join!(generation.put(&url, &a), generation.put(&url, &b));
            ra.unwrap();
            rb.unwrap();
            if let Some(hit) = generation.match_url(&url).await.unwrap() {
                let expected = if hit.header("etag") == Some("a") { &a } else { &b };
                assert_eq!(hit.body, expected.body);
            }
        }

        let mut leftovers = fs::read_dir(generation.dir.clone()).await.unwrap();
        while let Some(entry) = leftovers.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().into_owned();
            assert!(!name.ends_with(".tmp"), "temp file left behind: {name}");
        }
    }

    #[tokio::test]
    async fn body_from_another_write_reads_as_miss() {
        let (storage, _dir) = test_storage().await;
        let generation = storage.open_generation("v1").await.unwrap();
        let url = Url::parse("http://localhost:8000/index.html").unwrap();
        generation.put(&url, &page("<html>v1")).await.unwrap();

        let (body_path, _) = generation.paths(&entry_key(&url));
        fs::write(&body_path, b"<html>v2, half written").await.unwrap();

        assert!(generation.match_url(&url).await.unwrap().is_none());

        generation.put(&url, &page("<html>v2")).await.unwrap();
        let hit = generation.match_url(&url).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"<html>v2"));
    }
}
