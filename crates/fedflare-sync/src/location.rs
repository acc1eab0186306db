//! Repository locations and the metadata URLs derived from them.

use std::fmt;

/// One publishable metadata directory, e.g. `/pub/epel/8/Everything/x86_64`.
///
/// The path excludes the metadata directory itself. A location may carry an
/// alias path that the CDN also serves and that must be purged alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryLocation {
    path: String,
    alias: Option<String>,
}

impl RepositoryLocation {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: normalize(path.as_ref()),
            alias: None,
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias.map(|a| normalize(&a));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

impl fmt::Display for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// The origin and CDN URLs for one location's metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTarget {
    pub location: RepositoryLocation,
    pub origin_url: String,
    pub cdn_url: String,
    pub alias_cdn_url: Option<String>,
}

impl MetadataTarget {
    /// CDN URLs to purge when this location changes: canonical, then alias.
    pub fn cdn_urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.cdn_url.as_str()).chain(self.alias_cdn_url.as_deref())
    }
}

/// Builds metadata URLs for the origin mirror and the CDN-fronted domain.
#[derive(Debug, Clone)]
pub struct UrlScheme {
    origin: String,
    cdn: String,
    metadata_file: String,
}

impl UrlScheme {
    /// `origin` is a base URL (`https://dl.fedoraproject.org`), `domain` the
    /// bare CDN hostname, `metadata_file` the path below each location
    /// (`repodata/repomd.xml`).
    pub fn new(origin: &str, domain: &str, metadata_file: &str) -> Self {
        let domain = domain.trim().trim_end_matches('/');
        let cdn = if domain.contains("://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };
        Self {
            origin: origin.trim().trim_end_matches('/').to_string(),
            cdn,
            metadata_file: metadata_file.trim_matches('/').to_string(),
        }
    }

    fn join(&self, base: &str, path: &str) -> String {
        format!("{base}{path}/{}", self.metadata_file)
    }

    pub fn origin_url(&self, location: &RepositoryLocation) -> String {
        self.join(&self.origin, location.path())
    }

    pub fn cdn_url(&self, location: &RepositoryLocation) -> String {
        self.join(&self.cdn, location.path())
    }

    pub fn target(&self, location: &RepositoryLocation) -> MetadataTarget {
        MetadataTarget {
            origin_url: self.origin_url(location),
            cdn_url: self.cdn_url(location),
            alias_cdn_url: location.alias().map(|alias| self.join(&self.cdn, alias)),
            location: location.clone(),
        }
    }
}
