// SPDX-License-Identifier: AGPL-3.0-or-later
//! Corral sync layer
//!
//! - [`queue`]: durable FIFO queue of mutations that could not reach the
//!   server, with per-entry retry accounting.
//! - [`replay`]: single-flight replay of pending mutations when
//!   connectivity returns.
//! - [`notify`]: push payload parsing and notification routing.

pub mod notify;
pub mod queue;
pub mod replay;

pub use notify::{ClickOutcome, Notification, NotificationDispatcher, NotifyConfig};
pub use queue::{MutationStatus, MutationTarget, PendingMutation, QueueConfig, QueueStats, SyncQueue};
pub use replay::ReplayReport;

#[cfg(test)]
pub(crate) mod testutil;
