//! File-backed HTTP response cache with validator semantics.
//!
//! Each URL maps to two files named by the SHA-256 of the URL: `<key>.json`
//! holds status, headers and storage time, `<key>.body` the payload. Both are
//! written through a temporary file and renamed into place, body first, so a
//! readable entry always has its body.
//!
//! The directory assumes a single writer. Two processes sharing one cache
//! directory may overwrite each other's entries.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::CacheControl;
use crate::data::{Headers, Response};
use crate::effects::http::HttpClient;
use crate::error::Result;

/// Headers a `304 Not Modified` may carry that replace the stored ones.
const REFRESHED_ON_304: [&str; 5] = ["cache-control", "date", "etag", "expires", "last-modified"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub status: u16,
    pub headers: Headers,
    pub cache_control: CacheControl,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn from_response(response: &Response, now: DateTime<Utc>) -> Self {
        Self {
            url: response.url.clone(),
            status: response.status,
            headers: response.headers.clone(),
            cache_control: response
                .header("cache-control")
                .map(CacheControl::parse)
                .unwrap_or_default(),
            stored_at: now,
        }
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.get("etag")
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.headers.get("last-modified")
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.cache_control.is_fresh(self.stored_at, now)
    }

    pub fn has_validators(&self) -> bool {
        self.etag().is_some() || self.last_modified().is_some()
    }

    /// `If-None-Match` / `If-Modified-Since` built from the stored validators.
    pub fn conditional_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(2);
        if let Some(etag) = self.etag() {
            headers.push(("If-None-Match".to_string(), etag.to_string()));
        }
        if let Some(last_modified) = self.last_modified() {
            headers.push(("If-Modified-Since".to_string(), last_modified.to_string()));
        }
        headers
    }

    /// Fold a `304 Not Modified` into the entry.
    fn revalidated(mut self, not_modified: &Response, now: DateTime<Utc>) -> Self {
        let mut headers = Headers::new();
        for (name, value) in self.headers.iter() {
            if !(REFRESHED_ON_304.contains(&name) && not_modified.headers.contains(name)) {
                headers.insert(name, value);
            }
        }
        for name in REFRESHED_ON_304 {
            if let Some(value) = not_modified.header(name) {
                headers.insert(name, value);
            }
        }
        self.cache_control = headers
            .get("cache-control")
            .map(CacheControl::parse)
            .unwrap_or_default();
        self.headers = headers;
        self.stored_at = now;
        self
    }

    fn into_response(self, body: Bytes) -> Response {
        Response {
            url: self.url,
            status: self.status,
            headers: self.headers,
            body,
        }
    }
}

/// On-disk store of [`CacheEntry`] records.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Open (and create if needed) a cache directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn key(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(url)))
    }

    fn body_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.body", Self::key(url)))
    }

    /// Load the entry stored for `url`.
    ///
    /// Unreadable or foreign entries count as a miss.
    pub async fn load(&self, url: &str) -> Result<Option<(CacheEntry, Bytes)>> {
        let raw = match tokio::fs::read(self.entry_path(url)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(url, error = %e, "discarding unreadable cache entry");
                return Ok(None);
            }
        };
        if entry.url != url {
            return Ok(None);
        }
        match tokio::fs::read(self.body_path(url)).await {
            Ok(body) => Ok(Some((entry, Bytes::from(body)))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn store(&self, entry: &CacheEntry, body: &[u8]) -> Result<()> {
        write_replace(&self.body_path(&entry.url), body).await?;
        write_replace(&self.entry_path(&entry.url), &serde_json::to_vec_pretty(entry)?).await
    }

    pub async fn remove(&self, url: &str) -> Result<()> {
        for path in [self.entry_path(url), self.body_path(url)] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

async fn write_replace(path: &Path, contents: &[u8]) -> Result<()> {
    let staging = path.with_extension("tmp");
    tokio::fs::write(&staging, contents).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

/// A response together with where it came from.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub response: Response,
    /// `true` when the local cache answered, either because the stored copy
    /// was still fresh or because the origin replied `304 Not Modified`.
    pub from_cache: bool,
}

/// `GET` through a [`ResponseCache`].
pub struct CachingClient<C> {
    inner: C,
    cache: ResponseCache,
}

impl<C: HttpClient> CachingClient<C> {
    pub fn new(inner: C, cache: ResponseCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn get(&self, url: &str) -> Result<CachedResponse> {
        let now = Utc::now();
        let stored = self.cache.load(url).await?;

        let (entry, body) = match stored {
            Some((entry, body)) if entry.is_fresh(now) => {
                debug!(url, "served from cache without revalidation");
                return Ok(CachedResponse {
                    response: entry.into_response(body),
                    from_cache: true,
                });
            }
            Some(stored) => stored,
            None => return self.fetch_and_store(url, &[], now).await,
        };

        if !entry.has_validators() {
            return self.fetch_and_store(url, &[], now).await;
        }

        let response = self.inner.get(url, &entry.conditional_headers()).await?;
        if response.is_not_modified() {
            debug!(url, "revalidated cache entry");
            let entry = entry.revalidated(&response, now);
            self.cache.store(&entry, &body).await?;
            return Ok(CachedResponse {
                response: entry.into_response(body),
                from_cache: true,
            });
        }
        self.store_if_cacheable(&response, now).await?;
        Ok(CachedResponse {
            response,
            from_cache: false,
        })
    }

    async fn fetch_and_store(
        &self,
        url: &str,
        headers: &[(String, String)],
        now: DateTime<Utc>,
    ) -> Result<CachedResponse> {
        let response = self.inner.get(url, headers).await?;
        self.store_if_cacheable(&response, now).await?;
        Ok(CachedResponse {
            response,
            from_cache: false,
        })
    }

    async fn store_if_cacheable(&self, response: &Response, now: DateTime<Utc>) -> Result<()> {
        let entry = CacheEntry::from_response(response, now);
        if response.status == 200 && entry.cache_control.is_storable() {
            self.cache.store(&entry, &response.body).await
        } else {
            self.cache.remove(&response.url).await
        }
    }
}
