// SPDX-License-Identifier: AGPL-3.0-or-later
//! Corral cache layer
//!
//! The pieces that sit between an application and the network:
//! - [`store`]: sled-backed response cache, partitioned into static-asset
//!   and API snapshots, with generation-based eviction.
//! - [`router`]: classifies outgoing requests into static / API / other.
//! - [`strategy`]: cache-first and network-first-with-fallback retrieval.
//! - [`lifecycle`]: install / activate state machine that pre-populates the
//!   static partition and retires stale cache generations.

pub mod lifecycle;
pub mod router;
pub mod store;
pub mod strategy;

pub use lifecycle::{ActivateReport, InstallReport, LifecycleManager, WorkerState};
pub use router::{RequestClass, RequestRouter, RouterConfig};
pub use store::{CacheStore, Partition, StoreConfig, StoreStats};
pub use strategy::StrategyEngine;

#[cfg(test)]
pub(crate) mod testutil;
