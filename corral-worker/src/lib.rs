// SPDX-License-Identifier: AGPL-3.0-or-later
//! Corral worker
//!
//! Ties the cache and sync layers together behind a single
//! [`CacheSyncManager`] with one explicit method per runtime event, plus
//! the reqwest-backed [`HttpFetcher`] and TOML configuration.

pub mod config;
pub mod manager;
pub mod net;

pub use config::WorkerConfig;
pub use manager::{CacheSyncManager, ControlMessage, WorkerStats};
pub use net::HttpFetcher;
