// SPDX-License-Identifier: AGPL-3.0-or-later
//! Retrieval strategies
//!
//! Cache-first for static assets, network-first-with-fallback for API
//! reads, best-effort network-then-any-cache for everything else. All three
//! degrade to a synthesized 503 instead of surfacing connectivity failures;
//! cache-store failures, by contrast, always propagate — masking a broken
//! store with stale data would serve incorrect state indefinitely.

use std::sync::Arc;
use tracing::{debug, warn};

use corral_core::{CorralResult, Fetcher, RequestDescriptor, ResponseSnapshot};

use crate::router::RequestClass;
use crate::store::{CacheStore, Partition};

pub struct StrategyEngine {
    store: Arc<CacheStore>,
}

impl StrategyEngine {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Dispatch a read-type request to the strategy for its class.
    pub async fn dispatch(
        &self,
        class: RequestClass,
        fetcher: &dyn Fetcher,
        request: &RequestDescriptor,
    ) -> CorralResult<ResponseSnapshot> {
        match class {
            RequestClass::Static => self.cache_first(fetcher, request).await,
            RequestClass::Api => self.network_first(fetcher, request).await,
            RequestClass::Other => self.other_fallback(fetcher, request).await,
        }
    }

    /// Serve from the static partition when possible; the network is only
    /// consulted on a miss, and a 2xx fill is stored for next time.
    pub async fn cache_first(
        &self,
        fetcher: &dyn Fetcher,
        request: &RequestDescriptor,
    ) -> CorralResult<ResponseSnapshot> {
        let key = request.key();

        if let Some(cached) = self.store.get(Partition::Static, &key)? {
            debug!(key = %key, "cache-first hit");
            return Ok(cached);
        }

        match fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store.put(Partition::Static, &key, &response)?;
                }
                Ok(response)
            }
            Err(e) if e.is_connectivity() => {
                warn!(key = %key, error = %e, "cache-first miss with network down");
                Ok(ResponseSnapshot::offline_page("Offline - content unavailable"))
            }
            Err(e) => Err(e),
        }
    }

    /// Always try the network for freshness; fall back to the last
    /// successful snapshot, and only then to the structured offline error.
    pub async fn network_first(
        &self,
        fetcher: &dyn Fetcher,
        request: &RequestDescriptor,
    ) -> CorralResult<ResponseSnapshot> {
        let key = request.key();

        match fetcher.fetch(request).await {
            Ok(response) if response.is_success() => {
                self.store.put(Partition::Api, &key, &response)?;
                Ok(response)
            }
            Ok(response) => {
                debug!(key = %key, status = response.status, "network-first got non-2xx, trying cache");
                self.api_fallback(&key).await
            }
            Err(e) if e.is_connectivity() => {
                debug!(key = %key, error = %e, "network-first fetch failed, trying cache");
                self.api_fallback(&key).await
            }
            Err(e) => Err(e),
        }
    }

    async fn api_fallback(
        &self,
        key: &corral_core::RequestKey,
    ) -> CorralResult<ResponseSnapshot> {
        match self.store.get(Partition::Api, key)? {
            Some(cached) => {
                debug!(key = %key, captured_at = %cached.captured_at, "serving stale API snapshot");
                Ok(cached)
            }
            None => Ok(ResponseSnapshot::offline_api(
                "No connection and no cached data for this request",
            )),
        }
    }

    /// Uncategorized requests: network, then any cached copy, then a plain
    /// offline page. Never an error for the caller, never a hang.
    pub async fn other_fallback(
        &self,
        fetcher: &dyn Fetcher,
        request: &RequestDescriptor,
    ) -> CorralResult<ResponseSnapshot> {
        match fetcher.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_connectivity() => {
                let key = request.key();
                match self.store.get_any(&key)? {
                    Some(cached) => Ok(cached),
                    None => Ok(ResponseSnapshot::offline_page(
                        "Offline - content unavailable",
                    )),
                }
            }
            Err(e) => Err(e),
        }
    }
}
