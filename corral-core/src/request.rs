//! Request descriptors and cache keys

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP method subset the cache layer cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Write-type methods are candidates for the sync queue when the
    /// network is unreachable.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Method::Post | Method::Put | Method::Patch | Method::Delete
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// An outgoing network request as seen by the interception layer
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Path component of the URL. Accepts both absolute URLs and bare
    /// paths; the query string and fragment are excluded.
    pub fn path(&self) -> &str {
        let url = &self.url;
        let after_scheme = match url.find("://") {
            Some(idx) => {
                let rest = &url[idx + 3..];
                match rest.find('/') {
                    Some(slash) => &rest[slash..],
                    None => "/",
                }
            }
            None => url.as_str(),
        };

        let end = after_scheme
            .find(['?', '#'])
            .unwrap_or(after_scheme.len());
        &after_scheme[..end]
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method, &self.url)
    }
}

/// Normalized (method, URL) pair identifying a cacheable request.
///
/// At most one cache entry exists per (key, partition); writes overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: Method,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: normalize_url(url),
        }
    }

    /// Canonical rendering, used directly as the storage key.
    pub fn canonical(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Drop the fragment and any trailing slash (except a bare root path) so
/// equivalent spellings of the same resource share one cache entry.
fn normalize_url(url: &str) -> String {
    let without_fragment = match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    };

    let trimmed = without_fragment.trim_end_matches('/');
    if trimmed.is_empty() {
        // bare root path
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_is_mutation() {
        assert!(Method::Post.is_mutation());
        assert!(Method::Put.is_mutation());
        assert!(Method::Delete.is_mutation());
        assert!(!Method::Get.is_mutation());
        assert!(!Method::Head.is_mutation());
    }

    #[test]
    fn test_path_from_absolute_url() {
        let req = RequestDescriptor::get("https://ranch.example/api/bovinos?page=2");
        assert_eq!(req.path(), "/api/bovinos");

        let req = RequestDescriptor::get("https://ranch.example");
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn test_path_from_bare_path() {
        let req = RequestDescriptor::get("/static/js/bundle.js");
        assert_eq!(req.path(), "/static/js/bundle.js");

        let req = RequestDescriptor::get("/api/fincas#section");
        assert_eq!(req.path(), "/api/fincas");
    }

    #[test]
    fn test_key_normalization() {
        let a = RequestKey::new(Method::Get, "/api/bovinos/");
        let b = RequestKey::new(Method::Get, "/api/bovinos");
        assert_eq!(a, b);

        let root = RequestKey::new(Method::Get, "/");
        assert_eq!(root.url, "/");

        let frag = RequestKey::new(Method::Get, "/app#dashboard");
        assert_eq!(frag.url, "/app");
    }

    #[test]
    fn test_query_is_part_of_key() {
        let a = RequestKey::new(Method::Get, "/api/bovinos?finca=F1");
        let b = RequestKey::new(Method::Get, "/api/bovinos?finca=F2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical() {
        let key = RequestKey::new(Method::Post, "/api/bovinos");
        assert_eq!(key.canonical(), "POST /api/bovinos");
    }
}
