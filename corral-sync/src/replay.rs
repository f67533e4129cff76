// SPDX-License-Identifier: AGPL-3.0-or-later
//! Replay of queued mutations
//!
//! Triggered by a reconnect signal or a periodic background-sync event.
//! Single-flight: a trigger that arrives while a replay is running is a
//! no-op, and exactly one mutation is in flight at a time so submission
//! order matches enqueue order. A mutation that exhausts its retry budget
//! is marked failed and does not block the entries behind it — the queued
//! operations are independent record writes, and head-of-line blocking
//! would strand every later record behind one poisoned payload.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

use corral_core::{CorralResult, Fetcher};

use crate::queue::{MutationStatus, SyncQueue};

/// What a replay pass did
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    /// True when another replay was already in flight and this trigger
    /// did nothing.
    pub skipped: bool,
    pub attempted: usize,
    pub synced: Vec<Uuid>,
    pub requeued: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

impl ReplayReport {
    fn skipped_run() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

/// Clears the in-flight flag when the pass ends, normally or not.
struct ReplayGuard<'a>(&'a AtomicBool);

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncQueue {
    /// Replay pending mutations in FIFO order, one at a time, giving each
    /// pending entry one attempt this pass.
    pub async fn replay(&self, fetcher: &dyn Fetcher) -> CorralResult<ReplayReport> {
        if self.replaying.swap(true, Ordering::SeqCst) {
            debug!("replay already in progress, trigger ignored");
            return Ok(ReplayReport::skipped_run());
        }
        let _guard = ReplayGuard(&self.replaying);

        let pending: Vec<_> = self
            .entries()?
            .into_iter()
            .filter(|(_, m)| m.status == MutationStatus::Pending)
            .collect();
        if pending.is_empty() {
            return Ok(ReplayReport::default());
        }
        info!(pending = pending.len(), "replaying offline mutations");

        let mut report = ReplayReport::default();
        for (key, mut mutation) in pending {
            report.attempted += 1;
            mutation.status = MutationStatus::Syncing;
            mutation.attempt_count += 1;
            mutation.last_attempt_at = Some(chrono::Utc::now());
            self.persist(&key, &mutation)?;

            let outcome = fetcher.fetch(&mutation.request()).await;
            match outcome {
                Ok(response) if response.is_success() => {
                    mutation.status = MutationStatus::Synced;
                    mutation.last_error = None;
                    self.persist(&key, &mutation)?;
                    debug!(id = %mutation.id, endpoint = %mutation.target, "mutation synced");
                    report.synced.push(mutation.id);
                }
                failure => {
                    let reason = match failure {
                        Ok(response) => format!("server returned {}", response.status),
                        Err(e) => e.to_string(),
                    };
                    mutation.last_error = Some(reason.clone());

                    if mutation.attempt_count >= self.config().max_attempts {
                        mutation.status = MutationStatus::Failed;
                        self.persist(&key, &mutation)?;
                        warn!(
                            id = %mutation.id,
                            endpoint = %mutation.target,
                            attempts = mutation.attempt_count,
                            reason = %reason,
                            "mutation failed permanently"
                        );
                        report.failed.push(mutation.id);
                    } else {
                        mutation.status = MutationStatus::Pending;
                        self.persist(&key, &mutation)?;
                        debug!(
                            id = %mutation.id,
                            attempts = mutation.attempt_count,
                            reason = %reason,
                            "mutation requeued"
                        );
                        report.requeued.push(mutation.id);
                    }
                }
            }
        }

        info!(
            synced = report.synced.len(),
            requeued = report.requeued.len(),
            failed = report.failed.len(),
            "replay pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{MutationTarget, QueueConfig};
    use crate::testutil::ScriptedFetcher;

    fn temp_queue(max_attempts: u32) -> SyncQueue {
        let db = sled::Config::new().temporary(true).open().unwrap();
        SyncQueue::open(db, QueueConfig { max_attempts }).unwrap()
    }

    #[tokio::test]
    async fn test_replay_submits_in_fifo_order() {
        let queue = temp_queue(5);
        let m1 = queue
            .enqueue(MutationTarget::post("/api/bovinos"), serde_json::json!({"n": 1}))
            .unwrap();
        let m2 = queue
            .enqueue(MutationTarget::post("/api/fincas"), serde_json::json!({"n": 2}))
            .unwrap();
        let m3 = queue
            .enqueue(MutationTarget::post("/api/bovinos"), serde_json::json!({"n": 3}))
            .unwrap();

        let fetcher = ScriptedFetcher::new();
        fetcher.always_status("/api/bovinos", 201);
        fetcher.always_status("/api/fincas", 201);

        let report = queue.replay(&fetcher).await.unwrap();
        assert_eq!(report.synced, vec![m1.id, m2.id, m3.id]);
        assert_eq!(
            fetcher.calls(),
            vec!["/api/bovinos", "/api/fincas", "/api/bovinos"]
        );
        assert!(queue.pending().unwrap().is_empty());
        assert_eq!(queue.synced().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_at_least_once_across_transient_failure() {
        let queue = temp_queue(5);
        let m = queue
            .enqueue(MutationTarget::post("/api/bovinos"), serde_json::json!({}))
            .unwrap();

        let fetcher = ScriptedFetcher::new();
        fetcher.fail_times("/api/bovinos", 2, 201);

        let report = queue.replay(&fetcher).await.unwrap();
        assert_eq!(report.requeued, vec![m.id]);

        let report = queue.replay(&fetcher).await.unwrap();
        assert_eq!(report.requeued, vec![m.id]);

        let report = queue.replay(&fetcher).await.unwrap();
        assert_eq!(report.synced, vec![m.id]);

        // Submitted once per attempt: at-least-once, never skipped.
        assert_eq!(fetcher.calls().len(), 3);
        let synced = queue.synced().unwrap();
        assert_eq!(synced[0].attempt_count, 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_does_not_block_later_entries() {
        let queue = temp_queue(2);
        let m1 = queue
            .enqueue(MutationTarget::post("/api/bovinos"), serde_json::json!({"n": 1}))
            .unwrap();
        let m2 = queue
            .enqueue(MutationTarget::post("/api/poison"), serde_json::json!({"n": 2}))
            .unwrap();
        let m3 = queue
            .enqueue(MutationTarget::post("/api/bovinos"), serde_json::json!({"n": 3}))
            .unwrap();

        let fetcher = ScriptedFetcher::new();
        fetcher.always_status("/api/bovinos", 201);
        fetcher.always_status("/api/poison", 500);

        let report = queue.replay(&fetcher).await.unwrap();
        assert_eq!(report.synced, vec![m1.id, m3.id]);
        assert_eq!(report.requeued, vec![m2.id]);

        let report = queue.replay(&fetcher).await.unwrap();
        assert_eq!(report.failed, vec![m2.id]);

        // The poisoned entry is retained and visible, not dropped.
        let failed = queue.failed().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, m2.id);
        assert!(failed[0].last_error.as_deref().unwrap().contains("500"));
        assert_eq!(queue.synced().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_noop() {
        let queue = temp_queue(5);
        queue
            .enqueue(MutationTarget::post("/api/bovinos"), serde_json::json!({}))
            .unwrap();

        // A replay is already in flight.
        queue.replaying.store(true, Ordering::SeqCst);

        let fetcher = ScriptedFetcher::new();
        let report = queue.replay(&fetcher).await.unwrap();
        assert!(report.skipped);
        assert_eq!(fetcher.calls().len(), 0);

        // Once the in-flight pass ends, triggers work again.
        queue.replaying.store(false, Ordering::SeqCst);
        fetcher.always_status("/api/bovinos", 201);
        let report = queue.replay(&fetcher).await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.synced.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_queue_replay_is_quiet() {
        let queue = temp_queue(5);
        let fetcher = ScriptedFetcher::new();
        let report = queue.replay(&fetcher).await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.attempted, 0);
    }
}
