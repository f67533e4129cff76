//! Network seam
//!
//! Everything that talks to the network goes through [`Fetcher`], so the
//! cache strategies, the sync queue replay, and the lifecycle install can
//! all be exercised against scripted implementations.

use async_trait::async_trait;

use crate::{CorralResult, RequestDescriptor, ResponseSnapshot};

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request against the real network.
    ///
    /// Connectivity failures (unreachable host, timeout) must map to
    /// `CorralError::Network` or `CorralError::Timeout`; an HTTP response
    /// with a non-2xx status is a successful fetch and comes back as a
    /// snapshot, not an error.
    async fn fetch(&self, request: &RequestDescriptor) -> CorralResult<ResponseSnapshot>;
}
