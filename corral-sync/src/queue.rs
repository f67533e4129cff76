// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable mutation queue
//!
//! Writes that fail while the server is unreachable are appended here and
//! replayed later. Entries live in a dedicated sled tree keyed by a
//! monotonic sequence number in big-endian form, so tree iteration order is
//! creation (FIFO) order. An entry is only ever removed by an explicit
//! purge: synced entries stay visible until purged, and failed entries stay
//! until an operator clears them — a mutation is never silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::AtomicBool;
use uuid::Uuid;

use corral_core::{CorralError, CorralResult, Method, RequestDescriptor};

/// Tree name within the shared database
pub const QUEUE_TREE: &str = "sync-queue";

/// Header carrying the client-generated mutation id so an idempotent
/// backend can deduplicate at-least-once replays.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Where a queued mutation is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationStatus::Pending => "pending",
            MutationStatus::Syncing => "syncing",
            MutationStatus::Synced => "synced",
            MutationStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The operation a mutation was meant to perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationTarget {
    pub method: Method,
    pub endpoint: String,
}

impl MutationTarget {
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.endpoint)
    }
}

/// A locally created record waiting to reach the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: Uuid,
    /// Monotonic sequence assigned at enqueue; defines replay order.
    pub seq: u64,
    pub target: MutationTarget,
    pub payload: serde_json::Value,
    pub status: MutationStatus,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub last_error: Option<String>,
}

impl PendingMutation {
    /// Build the network request this mutation intended to send.
    pub fn request(&self) -> RequestDescriptor {
        RequestDescriptor::new(self.target.method, self.target.endpoint.clone())
            .with_header("content-type", "application/json")
            .with_header(IDEMPOTENCY_HEADER, self.id.to_string())
            .with_body(serde_json::to_vec(&self.payload).unwrap_or_default())
    }
}

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Retry budget per mutation; once exhausted the entry is marked
    /// failed and kept for user-visible reporting.
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub syncing: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Durable FIFO mutation queue
pub struct SyncQueue {
    db: sled::Db,
    tree: sled::Tree,
    config: QueueConfig,
    /// Single-flight replay flag; see `replay`.
    pub(crate) replaying: AtomicBool,
}

impl SyncQueue {
    /// Open the queue tree on a shared database. Any entry left in the
    /// syncing state by an interrupted replay is reverted to pending, so
    /// the next replay resumes from it instead of skipping it.
    pub fn open(db: sled::Db, config: QueueConfig) -> CorralResult<Self> {
        let tree = db.open_tree(QUEUE_TREE).map_err(storage_err)?;
        let queue = Self {
            db,
            tree,
            config,
            replaying: AtomicBool::new(false),
        };

        let mut recovered = 0;
        for item in queue.entries()? {
            let (key, mut mutation) = item;
            if mutation.status == MutationStatus::Syncing {
                mutation.status = MutationStatus::Pending;
                queue.persist(&key, &mutation)?;
                recovered += 1;
            }
        }
        if recovered > 0 {
            tracing::warn!(recovered, "reverted interrupted syncing entries to pending");
        }

        Ok(queue)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Append a mutation in the pending state. Once this returns, the
    /// caller may treat the write as accepted for eventual delivery.
    pub fn enqueue(
        &self,
        target: MutationTarget,
        payload: serde_json::Value,
    ) -> CorralResult<PendingMutation> {
        let seq = self.db.generate_id().map_err(storage_err)?;
        let mutation = PendingMutation {
            id: Uuid::new_v4(),
            seq,
            target,
            payload,
            status: MutationStatus::Pending,
            created_at: Utc::now(),
            last_attempt_at: None,
            attempt_count: 0,
            last_error: None,
        };

        self.persist(&seq.to_be_bytes(), &mutation)?;
        tracing::info!(id = %mutation.id, endpoint = %mutation.target, "queued offline mutation");
        Ok(mutation)
    }

    /// All entries in FIFO order.
    pub fn all(&self) -> CorralResult<Vec<PendingMutation>> {
        Ok(self.entries()?.into_iter().map(|(_, m)| m).collect())
    }

    pub fn pending(&self) -> CorralResult<Vec<PendingMutation>> {
        self.by_status(MutationStatus::Pending)
    }

    pub fn failed(&self) -> CorralResult<Vec<PendingMutation>> {
        self.by_status(MutationStatus::Failed)
    }

    pub fn synced(&self) -> CorralResult<Vec<PendingMutation>> {
        self.by_status(MutationStatus::Synced)
    }

    pub fn get(&self, id: Uuid) -> CorralResult<Option<PendingMutation>> {
        Ok(self.entries()?.into_iter().map(|(_, m)| m).find(|m| m.id == id))
    }

    pub fn stats(&self) -> CorralResult<QueueStats> {
        let mut stats = QueueStats::default();
        for (_, mutation) in self.entries()? {
            match mutation.status {
                MutationStatus::Pending => stats.pending += 1,
                MutationStatus::Syncing => stats.syncing += 1,
                MutationStatus::Synced => stats.synced += 1,
                MutationStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    /// Remove entries that have reached the synced state.
    pub fn purge_synced(&self) -> CorralResult<usize> {
        self.purge(MutationStatus::Synced)
    }

    /// Remove failed entries after the operator has dealt with them.
    pub fn purge_failed(&self) -> CorralResult<usize> {
        self.purge(MutationStatus::Failed)
    }

    fn purge(&self, status: MutationStatus) -> CorralResult<usize> {
        let mut purged = 0;
        for (key, mutation) in self.entries()? {
            if mutation.status == status {
                self.tree.remove(&key).map_err(storage_err)?;
                purged += 1;
            }
        }
        if purged > 0 {
            tracing::debug!(purged, status = %status, "purged queue entries");
        }
        Ok(purged)
    }

    pub fn flush(&self) -> CorralResult<()> {
        self.tree.flush().map_err(storage_err)?;
        Ok(())
    }

    pub(crate) fn entries(&self) -> CorralResult<Vec<(Vec<u8>, PendingMutation)>> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (key, value) = item.map_err(storage_err)?;
            let mutation: PendingMutation = serde_json::from_slice(&value)
                .map_err(|e| CorralError::Serialization(e.to_string()))?;
            out.push((key.to_vec(), mutation));
        }
        Ok(out)
    }

    pub(crate) fn persist(&self, key: &[u8], mutation: &PendingMutation) -> CorralResult<()> {
        let value = serde_json::to_vec(mutation)
            .map_err(|e| CorralError::Serialization(e.to_string()))?;
        self.tree.insert(key, value).map_err(storage_err)?;
        Ok(())
    }

    fn by_status(&self, status: MutationStatus) -> CorralResult<Vec<PendingMutation>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|(_, m)| m)
            .filter(|m| m.status == status)
            .collect())
    }
}

fn storage_err(e: sled::Error) -> CorralError {
    CorralError::Storage(e.to_string())
}
