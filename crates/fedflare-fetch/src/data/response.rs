use std::collections::BTreeMap;

use bytes::Bytes;

/// Response headers keyed by lowercase name.
///
/// Repeated headers are folded into one comma-separated value.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.0
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k.as_ref(), v);
        }
        headers
    }
}

/// A completed HTTP exchange with its body fully read.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let headers: Headers = [("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")]
            .into_iter()
            .collect();
        assert_eq!(headers.get("last-modified"), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(headers.get("LAST-MODIFIED"), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert!(!headers.contains("etag"));
    }

    #[test]
    fn repeated_headers_fold() {
        let headers: Headers = [("Vary", "Accept"), ("vary", "Accept-Encoding")]
            .into_iter()
            .collect();
        assert_eq!(headers.get("vary"), Some("Accept, Accept-Encoding"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn status_classes() {
        assert!(Response::new("u", 200).is_success());
        assert!(!Response::new("u", 404).is_success());
        assert!(Response::new("u", 304).is_not_modified());
    }
}
