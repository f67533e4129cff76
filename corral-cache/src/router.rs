// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request classification
//!
//! Every intercepted request lands in exactly one class; first match wins:
//! static-asset patterns, then the API path prefix, then Other. Nothing is
//! ever dropped — an unclassifiable request is simply Other.

use serde::{Deserialize, Serialize};

use corral_core::RequestDescriptor;

/// Request class driving strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Static,
    Api,
    Other,
}

/// Router configuration
///
/// Pattern semantics: `"/"` matches only the root path; a pattern ending in
/// `/` is a path prefix; a pattern starting with `.` matches by file
/// extension; anything else must match the path exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub static_patterns: Vec<String>,
    pub api_prefix: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            static_patterns: vec![
                "/".into(),
                "/static/".into(),
                "/manifest.json".into(),
                "/favicon.ico".into(),
                ".js".into(),
                ".css".into(),
                ".png".into(),
                ".ico".into(),
                ".woff2".into(),
            ],
            api_prefix: "/api/".into(),
        }
    }
}

/// Classifies outgoing requests
#[derive(Debug, Clone)]
pub struct RequestRouter {
    config: RouterConfig,
}

impl RequestRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, request: &RequestDescriptor) -> RequestClass {
        let path = request.path();

        if self
            .config
            .static_patterns
            .iter()
            .any(|pattern| pattern_matches(pattern, path))
        {
            return RequestClass::Static;
        }

        if path.starts_with(&self.config.api_prefix) {
            return RequestClass::Api;
        }

        RequestClass::Other
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern == "/" {
        path == "/"
    } else if let Some(prefix) = pattern.strip_suffix('/') {
        path == prefix || path.starts_with(pattern)
    } else if pattern.starts_with('.') {
        path.ends_with(pattern)
    } else {
        path == pattern
    }
}
