use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Parsed `Cache-Control` response directives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControl {
    pub max_age: Option<u64>,
    pub no_cache: bool,
    pub no_store: bool,
}

impl CacheControl {
    pub fn parse(header: &str) -> Self {
        let mut control = Self::default();

        for directive in header.split(',') {
            let directive = directive.trim().to_ascii_lowercase();

            match directive.as_str() {
                "no-cache" => control.no_cache = true,
                "no-store" => control.no_store = true,
                _ => {
                    if let Some(max_age) = directive.strip_prefix("max-age=") {
                        control.max_age = max_age.trim_matches('"').parse().ok();
                    }
                }
            }
        }

        control
    }

    /// Whether the response may be written to the cache at all.
    pub fn is_storable(&self) -> bool {
        !self.no_store
    }

    /// Whether a response stored at `stored_at` may be served at `now`
    /// without contacting the origin.
    ///
    /// Responses without an explicit lifetime are never fresh: they are kept
    /// only for their validators and always revalidated. A lifetime too
    /// large to represent never expires.
    pub fn is_fresh(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if self.no_cache {
            return false;
        }
        let Some(lifetime) = self.max_age else {
            return false;
        };
        match i64::try_from(lifetime).ok().and_then(Duration::try_seconds) {
            Some(lifetime) => now.signed_duration_since(stored_at) < lifetime,
            None => true,
        }
    }
}
