// SPDX-License-Identifier: AGPL-3.0-or-later
//! Install / activate lifecycle
//!
//! A cache generation is installed (static partition pre-populated from the
//! precache manifest), then activated (every stale generation tree is
//! dropped). Activation is only legal once install has completed, so a
//! request racing a generation change always finds either the old or the
//! new cache — never neither.

use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use corral_core::{CorralError, CorralResult, Fetcher, RequestDescriptor};

use crate::store::{CacheStore, Partition};

/// Lifecycle states, in the order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    New,
    Installing,
    Installed,
    Activating,
    Activated,
}

impl WorkerState {
    /// Whether this generation may handle intercepted requests.
    pub fn can_serve(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::New => "new",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
        };
        f.write_str(s)
    }
}

/// Outcome of an install: which manifest entries made it into the cache
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

/// Outcome of an activate: which stale generations were retired
#[derive(Debug, Clone, Default)]
pub struct ActivateReport {
    pub dropped: Vec<String>,
}

/// Drives a cache generation through install and activate
pub struct LifecycleManager {
    store: Arc<CacheStore>,
    manifest: Vec<String>,
    state: WorkerState,
    skip_waiting: bool,
}

impl LifecycleManager {
    pub fn new(store: Arc<CacheStore>, manifest: Vec<String>) -> Self {
        Self {
            store,
            manifest,
            state: WorkerState::New,
            skip_waiting: false,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Set by the host's skip-waiting control message: the newly installed
    /// generation should activate immediately instead of waiting for open
    /// application instances to close.
    pub fn skip_waiting(&mut self) {
        info!("skip-waiting requested");
        self.skip_waiting = true;
    }

    pub fn ready_to_activate(&self) -> bool {
        self.state == WorkerState::Installed && self.skip_waiting
    }

    /// Pre-populate the static partition from the manifest. Best effort:
    /// an entry that fails to fetch is logged and skipped, it never aborts
    /// the rest of the manifest. Storage failures do abort — a broken store
    /// must not be papered over.
    pub async fn install(&mut self, fetcher: &dyn Fetcher) -> CorralResult<InstallReport> {
        if self.state != WorkerState::New {
            return Err(CorralError::Lifecycle(format!(
                "cannot install from state {}",
                self.state
            )));
        }
        self.state = WorkerState::Installing;
        info!(
            generation = %self.store.generation_name(Partition::Static),
            entries = self.manifest.len(),
            "installing cache generation"
        );

        let mut report = InstallReport::default();
        for url in &self.manifest {
            let request = RequestDescriptor::get(url.clone());
            match fetcher.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    self.store
                        .put(Partition::Static, &request.key(), &response)?;
                    report.cached.push(url.clone());
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status, "precache entry rejected");
                    report.failed.push(url.clone());
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "precache entry unreachable");
                    report.failed.push(url.clone());
                }
            }
        }

        self.state = WorkerState::Installed;
        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install complete"
        );
        Ok(report)
    }

    /// Retire every generation that is not current, then start serving.
    /// Only legal after install has completed.
    pub fn activate(&mut self) -> CorralResult<ActivateReport> {
        if self.state != WorkerState::Installed {
            return Err(CorralError::Lifecycle(format!(
                "cannot activate from state {}",
                self.state
            )));
        }
        self.state = WorkerState::Activating;

        let dropped = self.store.drop_stale_generations()?;
        self.state = WorkerState::Activated;
        info!(dropped = dropped.len(), "cache generation activated");

        Ok(ActivateReport { dropped })
    }
}
