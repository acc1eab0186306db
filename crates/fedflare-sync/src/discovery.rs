//! Discovery of the repository locations to check this iteration.
//!
//! Both strategies return an ordered list without duplicates, first-seen
//! order preserved.

use std::collections::HashSet;

use async_trait::async_trait;
use fedflare_fetch::HttpClient;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{Catalog, publish_prefix};
use crate::error::DiscoveryError;
use crate::location::RepositoryLocation;

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Strategy name, for logging.
    fn name(&self) -> &str;

    async fn discover(&self) -> Result<Vec<RepositoryLocation>, DiscoveryError>;
}

/// Repository paths listed in a plaintext origin manifest.
///
/// Each line's last whitespace-delimited token is a path. A token counts
/// when it starts with `prefix` and one of its path segments equals
/// `marker`; the location is everything before that segment. Blank and
/// unmatched lines are skipped, repeated locations kept once.
pub fn parse_manifest(text: &str, marker: &str, prefix: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for line in text.lines() {
        let Some(token) = line.split_whitespace().last() else {
            continue;
        };
        if !token.contains(marker) || !token.starts_with(prefix) {
            continue;
        }
        let segments: Vec<&str> = token.split('/').collect();
        let Some(at) = segments.iter().position(|segment| *segment == marker) else {
            continue;
        };
        let path = segments[..at].join("/");
        if path.is_empty() {
            continue;
        }
        if seen.insert(path.clone()) {
            paths.push(path);
        }
    }
    paths
}

/// Fetches the origin's directory manifest and filters it to one project.
pub struct DirectoryListing<C> {
    client: C,
    manifest_url: String,
    marker: String,
    prefix: String,
    catalog: Option<Catalog>,
}

impl<C: HttpClient> DirectoryListing<C> {
    pub fn new(client: C, manifest_url: impl Into<String>, marker: impl Into<String>, project: &str) -> Self {
        Self {
            client,
            manifest_url: manifest_url.into(),
            marker: marker.into(),
            prefix: publish_prefix(project),
            catalog: Catalog::for_project(project),
        }
    }
}

#[async_trait]
impl<C: HttpClient + 'static> Discovery for DirectoryListing<C> {
    fn name(&self) -> &str {
        "listing"
    }

    #[instrument(skip(self), fields(manifest = %self.manifest_url))]
    async fn discover(&self) -> Result<Vec<RepositoryLocation>, DiscoveryError> {
        let response = self
            .client
            .get(&self.manifest_url, &[])
            .await
            .map_err(|source| DiscoveryError::Fetch {
                url: self.manifest_url.clone(),
                source,
            })?;
        if !response.is_success() {
            return Err(DiscoveryError::Status {
                url: self.manifest_url.clone(),
                status: response.status,
            });
        }

        let text = String::from_utf8_lossy(&response.body);
        let locations: Vec<_> = parse_manifest(&text, &self.marker, &self.prefix)
            .into_iter()
            .map(|path| {
                let alias = self.catalog.as_ref().and_then(|c| c.alias_for(&path));
                RepositoryLocation::new(path).with_alias(alias)
            })
            .collect();

        if locations.is_empty() {
            warn!(prefix = %self.prefix, "manifest lists no repositories for project");
        } else {
            info!(count = locations.len(), "discovered repositories");
        }
        Ok(locations)
    }
}

/// Synthesizes one location per catalog (release, segment) pair.
pub struct CatalogDiscovery {
    catalog: Catalog,
}

impl CatalogDiscovery {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Discovery for CatalogDiscovery {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn discover(&self) -> Result<Vec<RepositoryLocation>, DiscoveryError> {
        let mut seen = HashSet::new();
        let locations: Vec<_> = self
            .catalog
            .locations()
            .into_iter()
            .filter(|location| seen.insert(location.path().to_string()))
            .collect();
        debug!(project = self.catalog.project(), count = locations.len(), "catalog locations");
        Ok(locations)
    }
}
