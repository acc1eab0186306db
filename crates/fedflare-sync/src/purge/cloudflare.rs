//! Cloudflare API v4 as a [`PurgeProvider`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PurgeProvider, ZoneId};
use crate::error::ProviderError;

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// API credentials, either a scoped token or the legacy email + global key.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Key { email: String, key: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(..)"),
            Self::Key { email, .. } => f.debug_struct("Key").field("email", email).finish_non_exhaustive(),
        }
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    ///
    /// `CLOUDFLARE_API_TOKEN` or `CF_API_TOKEN` wins over `CF_API_EMAIL` +
    /// `CF_API_KEY`.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("CLOUDFLARE_API_TOKEN").or_else(|| non_empty("CF_API_TOKEN")) {
            return Some(Self::Token(token));
        }
        match (non_empty("CF_API_EMAIL"), non_empty("CF_API_KEY")) {
            (Some(email), Some(key)) => Some(Self::Key { email, key }),
            _ => None,
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Token(token) => request.bearer_auth(token),
            Self::Key { email, key } => request.header("X-Auth-Email", email).header("X-Auth-Key", key),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Zone {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct PurgeFiles<'a> {
    files: &'a [String],
}

/// Decode a Cloudflare response envelope into its `result`.
fn decode<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ProviderError> {
    let success_status = (200..300).contains(&status);
    let envelope: Envelope<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) if success_status => return Err(ProviderError::Decode(e.to_string())),
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            return Err(ProviderError::Api {
                status,
                message: text.chars().take(200).collect(),
            });
        }
    };
    if !envelope.success || !success_status {
        let message = if envelope.errors.is_empty() {
            "request was not successful".to_string()
        } else {
            envelope
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; ")
        };
        return Err(ProviderError::Api { status, message });
    }
    envelope
        .result
        .ok_or_else(|| ProviderError::Decode("response has no result".to_string()))
}

/// Zones are sorted by name and the last one is used; a name lookup with
/// `per_page=1` should only ever return one.
fn pick_zone(mut zones: Vec<Zone>) -> Option<String> {
    zones.sort_by(|a, b| a.name.cmp(&b.name));
    zones.pop().map(|zone| zone.id)
}

pub struct CloudflareClient {
    http: reqwest::Client,
    api_base: String,
    credentials: Credentials,
}

impl CloudflareClient {
    pub fn new(api_base: &str, credentials: Credentials, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ProviderError> {
        let response = self.credentials.apply(request).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        decode(status, &body)
    }
}

#[async_trait]
impl PurgeProvider for CloudflareClient {
    async fn resolve_zone(&self, domain: &str) -> Result<ZoneId, ProviderError> {
        let request = self
            .http
            .get(format!("{}/zones", self.api_base))
            .query(&[("name", domain), ("per_page", "1")]);
        let zones: Vec<Zone> = self.call(request).await?;
        let id = pick_zone(zones).ok_or_else(|| ProviderError::ZoneNotFound(domain.to_string()))?;
        debug!(domain, zone = %id, "resolved zone");
        Ok(ZoneId(id))
    }

    async fn purge(&self, zone: &ZoneId, urls: &[String]) -> Result<(), ProviderError> {
        let request = self
            .http
            .post(format!("{}/zones/{}/purge_cache", self.api_base, zone))
            .json(&PurgeFiles { files: urls });
        let _: serde_json::Value = self.call(request).await?;
        Ok(())
    }
}
