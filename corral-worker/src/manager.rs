// SPDX-License-Identifier: AGPL-3.0-or-later
//! The cache & sync manager
//!
//! One instance constructed at worker start owns every moving part: the
//! shared database, the cache store, the router, the strategies, the
//! lifecycle state, the sync queue, and the notification dispatcher.
//! The hosting runtime's event bindings (install, activate, fetch, push,
//! notification click, background sync, control message) each forward to
//! exactly one method here, which keeps every handler independently
//! testable and leaves no module-level mutable state anywhere.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use corral_cache::{
    ActivateReport, CacheStore, InstallReport, LifecycleManager, RequestClass, RequestRouter,
    StoreStats, StrategyEngine, WorkerState,
};
use corral_core::{CorralResult, Fetcher, RequestDescriptor, ResponseSnapshot};
use corral_sync::{
    ClickOutcome, MutationTarget, Notification, NotificationDispatcher, QueueStats, ReplayReport,
    SyncQueue,
};

use crate::config::WorkerConfig;

/// Control messages from the hosting application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Force the newly installed generation to become eligible for
    /// immediate activation (zero-downtime update rollout).
    SkipWaiting,
}

/// Combined view for operators and diagnostics
#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub state: WorkerState,
    pub cache: StoreStats,
    pub queue: QueueStats,
}

pub struct CacheSyncManager {
    db: sled::Db,
    router: RequestRouter,
    strategies: StrategyEngine,
    lifecycle: Mutex<LifecycleManager>,
    queue: SyncQueue,
    notifier: NotificationDispatcher,
    fetcher: Arc<dyn Fetcher>,
}

impl CacheSyncManager {
    /// Open the database at the configured path and build the manager.
    pub fn new(config: WorkerConfig, fetcher: Arc<dyn Fetcher>) -> CorralResult<Self> {
        let db = sled::open(&config.db_path)
            .map_err(|e| corral_core::CorralError::Storage(e.to_string()))?;
        Self::with_db(db, config, fetcher)
    }

    /// Build on an already-open database (tests use a temporary one).
    pub fn with_db(
        db: sled::Db,
        config: WorkerConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> CorralResult<Self> {
        let store = Arc::new(CacheStore::new(db.clone(), config.store_config()));
        let queue = SyncQueue::open(db.clone(), config.queue_config())?;

        info!(
            version = %config.version,
            db = %config.db_path.display(),
            "cache & sync manager starting"
        );

        Ok(Self {
            db,
            router: RequestRouter::new(config.router_config()),
            strategies: StrategyEngine::new(store.clone()),
            lifecycle: Mutex::new(LifecycleManager::new(
                store,
                config.precache_manifest.clone(),
            )),
            queue,
            notifier: NotificationDispatcher::new(config.notifications.clone()),
            fetcher,
        })
    }

    /// Install event: pre-populate the static partition.
    pub async fn handle_install(&self) -> CorralResult<InstallReport> {
        self.lifecycle.lock().await.install(self.fetcher.as_ref()).await
    }

    /// Activate event: retire stale generations and start serving.
    pub async fn handle_activate(&self) -> CorralResult<ActivateReport> {
        self.lifecycle.lock().await.activate()
    }

    /// Fetch event: classify and serve through the matching strategy.
    /// API writes never fail on connectivity — they are queued and
    /// acknowledged instead.
    pub async fn handle_fetch(
        &self,
        request: &RequestDescriptor,
    ) -> CorralResult<ResponseSnapshot> {
        let class = self.router.classify(request);

        if class == RequestClass::Api && request.method.is_mutation() {
            return self.api_write(request).await;
        }

        self.strategies
            .dispatch(class, self.fetcher.as_ref(), request)
            .await
    }

    /// Push event: always yields a notification, defaults on bad payload.
    pub fn handle_push(&self, raw: Option<&[u8]>) -> Notification {
        self.notifier.on_push(raw)
    }

    /// Notification click: route by action id.
    pub fn handle_notification_click(&self, tag: &str, action: Option<&str>) -> ClickOutcome {
        self.notifier.on_click(tag, action)
    }

    /// Background-sync or reconnect signal: replay queued mutations.
    pub async fn handle_sync_trigger(&self) -> CorralResult<ReplayReport> {
        self.queue.replay(self.fetcher.as_ref()).await
    }

    /// Control message from the hosting application.
    pub async fn handle_message(&self, message: ControlMessage) {
        match message {
            ControlMessage::SkipWaiting => self.lifecycle.lock().await.skip_waiting(),
        }
    }

    pub async fn worker_state(&self) -> WorkerState {
        self.lifecycle.lock().await.state()
    }

    pub async fn ready_to_activate(&self) -> bool {
        self.lifecycle.lock().await.ready_to_activate()
    }

    pub fn store(&self) -> &CacheStore {
        self.strategies.store()
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub async fn stats(&self) -> CorralResult<WorkerStats> {
        Ok(WorkerStats {
            state: self.worker_state().await,
            cache: self.store().stats()?,
            queue: self.queue.stats()?,
        })
    }

    /// Flush the shared database; call before shutdown.
    pub fn flush(&self) -> CorralResult<()> {
        self.db
            .flush()
            .map_err(|e| corral_core::CorralError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn api_write(&self, request: &RequestDescriptor) -> CorralResult<ResponseSnapshot> {
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_connectivity() => {
                let payload = match &request.body {
                    Some(body) => serde_json::from_slice(body).unwrap_or_else(|_| {
                        serde_json::Value::String(String::from_utf8_lossy(body).into_owned())
                    }),
                    None => serde_json::Value::Null,
                };

                let mutation = self.queue.enqueue(
                    MutationTarget {
                        method: request.method,
                        endpoint: request.url.clone(),
                    },
                    payload,
                )?;
                info!(
                    id = %mutation.id,
                    endpoint = %mutation.target,
                    "write queued while offline"
                );
                Ok(ResponseSnapshot::accepted_for_sync(&mutation.id.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
