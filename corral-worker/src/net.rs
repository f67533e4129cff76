// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP transport
//!
//! The one real [`Fetcher`]: a reqwest client with a hard timeout.
//! Connectivity failures map to the connectivity error variants so the
//! strategies and the sync queue treat them as recoverable; an HTTP error
//! status is a successful fetch and comes back as a snapshot.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use corral_core::{CorralError, CorralResult, Fetcher, RequestDescriptor, ResponseSnapshot};

pub struct HttpFetcher {
    client: reqwest::Client,
    /// Prepended to bare-path request URLs, e.g. `https://ranch.example`.
    base_url: Option<String>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, base_url: Option<String>) -> CorralResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CorralError::Config(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn absolute_url(&self, url: &str) -> CorralResult<String> {
        if url.contains("://") {
            return Ok(url.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!("{}{}", base.trim_end_matches('/'), url)),
            None => Err(CorralError::InvalidUrl(format!(
                "bare path {url} with no base URL configured"
            ))),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> CorralResult<ResponseSnapshot> {
        let url = self.absolute_url(&request.url)?;
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| CorralError::Other(e.to_string()))?;

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CorralError::Timeout
            } else {
                CorralError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), text.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CorralError::Network(e.to_string()))?;

        Ok(ResponseSnapshot::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_resolution() {
        let fetcher = HttpFetcher::new(
            Duration::from_secs(5),
            Some("https://ranch.example/".into()),
        )
        .unwrap();

        assert_eq!(
            fetcher.absolute_url("/api/bovinos").unwrap(),
            "https://ranch.example/api/bovinos"
        );
        assert_eq!(
            fetcher.absolute_url("https://other.example/x").unwrap(),
            "https://other.example/x"
        );
    }

    #[test]
    fn test_bare_path_without_base_is_invalid() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5), None).unwrap();
        let err = fetcher.absolute_url("/api/bovinos").unwrap_err();
        assert!(matches!(err, CorralError::InvalidUrl(_)));
    }
}
