// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker configuration
//!
//! One TOML-loadable struct decomposed into the per-layer configs. Every
//! field has a default so an empty file (or none at all) yields a working
//! worker.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use corral_cache::{RouterConfig, StoreConfig};
use corral_core::{CorralError, CorralResult};
use corral_sync::{NotifyConfig, QueueConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Sled database location, shared by the cache and the sync queue.
    pub db_path: PathBuf,
    /// Cache generation version. Bumping this string is the sole mechanism
    /// for invalidating previously cached assets and API snapshots.
    pub version: String,
    pub api_prefix: String,
    pub static_patterns: Vec<String>,
    /// URLs pre-cached into the static partition at install.
    pub precache_manifest: Vec<String>,
    pub max_sync_attempts: u32,
    pub request_timeout_secs: u64,
    pub compress: bool,
    pub compress_threshold: usize,
    pub verify_on_read: bool,
    pub notifications: NotifyConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("dev", "corral", "corral")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/tmp/corral"));

        let router = RouterConfig::default();
        let store = StoreConfig::default();

        Self {
            db_path: data_dir.join("corral.db"),
            version: store.version,
            api_prefix: router.api_prefix,
            static_patterns: router.static_patterns,
            precache_manifest: vec![
                "/".into(),
                "/static/js/bundle.js".into(),
                "/static/css/main.css".into(),
                "/manifest.json".into(),
                "/favicon.ico".into(),
            ],
            max_sync_attempts: QueueConfig::default().max_attempts,
            request_timeout_secs: 30,
            compress: store.compress,
            compress_threshold: store.compress_threshold,
            verify_on_read: store.verify_on_read,
            notifications: NotifyConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load from a TOML file; missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> CorralResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&text).map_err(|e| CorralError::Config(e.to_string()))
    }

    /// Load `path` if given and present, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> CorralResult<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => Err(CorralError::Config(format!(
                "config file not found: {}",
                p.display()
            ))),
            None => Ok(Self::default()),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            version: self.version.clone(),
            compress: self.compress,
            compress_threshold: self.compress_threshold,
            verify_on_read: self.verify_on_read,
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            static_patterns: self.static_patterns.clone(),
            api_prefix: self.api_prefix.clone(),
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_attempts: self.max_sync_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg: WorkerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.version, "1.0.0");
        assert_eq!(cfg.api_prefix, "/api/");
        assert_eq!(cfg.max_sync_attempts, 5);
        assert!(!cfg.precache_manifest.is_empty());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let cfg: WorkerConfig = toml::from_str(
            r#"
            version = "2.1.0"
            max_sync_attempts = 3
            precache_manifest = ["/", "/offline.html"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.version, "2.1.0");
        assert_eq!(cfg.store_config().version, "2.1.0");
        assert_eq!(cfg.queue_config().max_attempts, 3);
        assert_eq!(cfg.precache_manifest.len(), 2);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.api_prefix, "/api/");
    }
}
