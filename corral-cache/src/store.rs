// SPDX-License-Identifier: AGPL-3.0-or-later
//! Partitioned, generational response cache on sled
//!
//! Each cache generation is a sled tree named `{partition}-v{version}`.
//! Bumping the version string is the sole invalidation mechanism: activate
//! drops every partition-prefixed tree that is not current. Within a tree,
//! the key is the request's canonical `"METHOD url"` form, so writes for
//! the same request overwrite the prior entry.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};
use std::fmt;

use corral_core::{CorralError, CorralResult, Method, RequestKey, ResponseSnapshot};

/// Logical subdivision of the cache with independent generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partition {
    Static,
    Api,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Static, Partition::Api];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Static => "static",
            Partition::Api => "api",
        }
    }

    fn tree_prefix(&self) -> String {
        format!("{}-v", self.as_str())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Version string embedded in generation names; bumping it retires all
    /// previously cached entries at the next activate.
    pub version: String,
    /// Compress entry values with LZ4
    pub compress: bool,
    /// Minimum serialized size to compress (bytes)
    pub compress_threshold: usize,
    /// Verify the body checksum on read
    pub verify_on_read: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version: "1.0.0".into(),
            compress: true,
            compress_threshold: 1024,
            verify_on_read: true,
        }
    }
}

/// Stored cache entry: the snapshot plus enough context to audit it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    method: Method,
    url: String,
    /// BLAKE3 hash of the body bytes at write time
    checksum: String,
    snapshot: ResponseSnapshot,
}

/// Partitioned response cache
pub struct CacheStore {
    db: sled::Db,
    config: StoreConfig,
}

impl CacheStore {
    /// Wrap an already-open database. The db handle is shared with other
    /// components (the sync queue lives in its own tree of the same db).
    pub fn new(db: sled::Db, config: StoreConfig) -> Self {
        Self { db, config }
    }

    /// Current generation name for a partition, e.g. `static-v1.0.0`.
    pub fn generation_name(&self, partition: Partition) -> String {
        format!("{}-v{}", partition.as_str(), self.config.version)
    }

    fn tree(&self, partition: Partition) -> CorralResult<sled::Tree> {
        self.db
            .open_tree(self.generation_name(partition))
            .map_err(storage_err)
    }

    /// Store a snapshot, replacing any prior entry for the same key.
    pub fn put(
        &self,
        partition: Partition,
        key: &RequestKey,
        snapshot: &ResponseSnapshot,
    ) -> CorralResult<()> {
        let entry = CacheEntry {
            key: key.canonical(),
            method: key.method,
            url: key.url.clone(),
            checksum: blake3::hash(&snapshot.body).to_hex().to_string(),
            snapshot: snapshot.clone(),
        };

        let raw = serde_json::to_vec(&entry)
            .map_err(|e| CorralError::Serialization(e.to_string()))?;
        let value = if self.config.compress && raw.len() >= self.config.compress_threshold {
            let compressed = compress_prepend_size(&raw);
            if compressed.len() < raw.len() {
                compressed
            } else {
                raw
            }
        } else {
            raw
        };

        self.tree(partition)?
            .insert(entry.key.as_bytes(), value)
            .map_err(storage_err)?;

        tracing::debug!(partition = %partition, key = %entry.key, "cached response");
        Ok(())
    }

    /// Look up a snapshot in the current generation of a partition.
    pub fn get(
        &self,
        partition: Partition,
        key: &RequestKey,
    ) -> CorralResult<Option<ResponseSnapshot>> {
        let canonical = key.canonical();
        let value = self
            .tree(partition)?
            .get(canonical.as_bytes())
            .map_err(storage_err)?;

        match value {
            Some(bytes) => {
                let entry = self.decode(&canonical, &bytes)?;
                Ok(Some(entry.snapshot))
            }
            None => Ok(None),
        }
    }

    /// Last-resort lookup across both partitions, static first.
    pub fn get_any(&self, key: &RequestKey) -> CorralResult<Option<ResponseSnapshot>> {
        for partition in Partition::ALL {
            if let Some(snapshot) = self.get(partition, key)? {
                return Ok(Some(snapshot));
            }
        }
        Ok(None)
    }

    pub fn delete(&self, partition: Partition, key: &RequestKey) -> CorralResult<()> {
        self.tree(partition)?
            .remove(key.canonical().as_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    /// Wipe the current generation of both partitions.
    pub fn clear(&self) -> CorralResult<()> {
        for partition in Partition::ALL {
            self.tree(partition)?.clear().map_err(storage_err)?;
        }
        Ok(())
    }

    /// Every generation tree present in the database, current or stale.
    pub fn generations(&self) -> Vec<String> {
        self.db
            .tree_names()
            .into_iter()
            .map(|name| String::from_utf8_lossy(&name).into_owned())
            .filter(|name| {
                Partition::ALL
                    .iter()
                    .any(|p| name.starts_with(&p.tree_prefix()))
            })
            .collect()
    }

    /// Drop every generation tree that is not the current one for its
    /// partition. Returns the names that were dropped.
    pub fn drop_stale_generations(&self) -> CorralResult<Vec<String>> {
        let current: Vec<String> = Partition::ALL
            .iter()
            .map(|p| self.generation_name(*p))
            .collect();

        let mut dropped = Vec::new();
        for name in self.generations() {
            if !current.contains(&name) {
                self.db.drop_tree(name.as_bytes()).map_err(storage_err)?;
                tracing::info!(generation = %name, "dropped stale cache generation");
                dropped.push(name);
            }
        }
        Ok(dropped)
    }

    pub fn stats(&self) -> CorralResult<StoreStats> {
        let static_entries = self.tree(Partition::Static)?.len();
        let api_entries = self.tree(Partition::Api)?.len();
        let current: Vec<String> = Partition::ALL
            .iter()
            .map(|p| self.generation_name(*p))
            .collect();
        let stale_generations = self
            .generations()
            .into_iter()
            .filter(|name| !current.contains(name))
            .count();

        Ok(StoreStats {
            static_entries,
            api_entries,
            stale_generations,
            disk_bytes: self.db.size_on_disk().map_err(storage_err)?,
        })
    }

    pub fn flush(&self) -> CorralResult<()> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    fn decode(&self, canonical: &str, bytes: &[u8]) -> CorralResult<CacheEntry> {
        // Values above the threshold are LZ4-compressed; older or small
        // values are raw JSON, so fall back when decompression fails.
        let raw = match decompress_size_prepended(bytes) {
            Ok(decompressed) => decompressed,
            Err(_) => bytes.to_vec(),
        };

        let entry: CacheEntry = serde_json::from_slice(&raw)
            .map_err(|e| CorralError::Serialization(e.to_string()))?;

        if self.config.verify_on_read {
            let computed = blake3::hash(&entry.snapshot.body).to_hex().to_string();
            if computed != entry.checksum {
                return Err(CorralError::CorruptedEntry(canonical.to_string()));
            }
        }

        Ok(entry)
    }
}

fn storage_err(e: sled::Error) -> CorralError {
    match e {
        sled::Error::Io(io) => CorralError::Storage(io.to_string()),
        other => CorralError::Storage(other.to_string()),
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub static_entries: usize,
    pub api_entries: usize,
    pub stale_generations: usize,
    pub disk_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_core::Method;
    use std::collections::BTreeMap;

    fn temp_store(version: &str) -> CacheStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        CacheStore::new(
            db,
            StoreConfig {
                version: version.into(),
                ..Default::default()
            },
        )
    }

    fn snapshot(body: &str) -> ResponseSnapshot {
        ResponseSnapshot::new(200, BTreeMap::new(), body.as_bytes().to_vec())
    }

    #[test]
    fn test_put_get_roundtrip() {
        let store = temp_store("1.0.0");
        let key = RequestKey::new(Method::Get, "/static/js/bundle.js");

        store.put(Partition::Static, &key, &snapshot("bundle")).unwrap();
        let got = store.get(Partition::Static, &key).unwrap().unwrap();
        assert_eq!(got.body.as_ref(), b"bundle");

        assert!(store.get(Partition::Api, &key).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let store = temp_store("1.0.0");
        let key = RequestKey::new(Method::Get, "/api/bovinos");

        store.put(Partition::Api, &key, &snapshot("old")).unwrap();
        store.put(Partition::Api, &key, &snapshot("new")).unwrap();

        let got = store.get(Partition::Api, &key).unwrap().unwrap();
        assert_eq!(got.body.as_ref(), b"new");
        assert_eq!(store.stats().unwrap().api_entries, 1);
    }

    #[test]
    fn test_delete_is_partition_scoped() {
        let store = temp_store("1.0.0");
        let key = RequestKey::new(Method::Get, "/api/alertas");

        store.put(Partition::Static, &key, &snapshot("static copy")).unwrap();
        store.put(Partition::Api, &key, &snapshot("api copy")).unwrap();

        store.delete(Partition::Api, &key).unwrap();
        assert!(store.get(Partition::Api, &key).unwrap().is_none());
        assert!(store.get(Partition::Static, &key).unwrap().is_some());

        // Deleting an absent key is not an error.
        store.delete(Partition::Api, &key).unwrap();
    }

    #[test]
    fn test_large_bodies_roundtrip_compressed() {
        let store = temp_store("1.0.0");
        let key = RequestKey::new(Method::Get, "/static/css/main.css");
        let body = "a".repeat(16 * 1024);

        store.put(Partition::Static, &key, &snapshot(&body)).unwrap();
        let got = store.get(Partition::Static, &key).unwrap().unwrap();
        assert_eq!(got.body.len(), body.len());
    }

    #[test]
    fn test_get_any_prefers_static() {
        let store = temp_store("1.0.0");
        let key = RequestKey::new(Method::Get, "/manifest.json");

        store.put(Partition::Api, &key, &snapshot("api copy")).unwrap();
        store.put(Partition::Static, &key, &snapshot("static copy")).unwrap();

        let got = store.get_any(&key).unwrap().unwrap();
        assert_eq!(got.body.as_ref(), b"static copy");
    }

    #[test]
    fn test_corruption_is_detected() {
        let store = temp_store("1.0.0");
        let key = RequestKey::new(Method::Get, "/api/fincas");
        store.put(Partition::Api, &key, &snapshot("truth")).unwrap();

        // Tamper with the stored body behind the store's back.
        let tree = store.db.open_tree(store.generation_name(Partition::Api)).unwrap();
        let raw = tree.get(key.canonical().as_bytes()).unwrap().unwrap();
        let mut entry: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        entry["snapshot"]["body"] = serde_json::json!(b"liess".to_vec());
        tree.insert(
            key.canonical().as_bytes(),
            serde_json::to_vec(&entry).unwrap(),
        )
        .unwrap();

        let err = store.get(Partition::Api, &key).unwrap_err();
        assert!(matches!(err, CorralError::CorruptedEntry(_)));
    }

    #[test]
    fn test_stale_generation_dropped() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let old = CacheStore::new(db.clone(), StoreConfig { version: "1.0.0".into(), ..Default::default() });
        let new = CacheStore::new(db, StoreConfig { version: "2.0.0".into(), ..Default::default() });

        let key = RequestKey::new(Method::Get, "/");
        old.put(Partition::Static, &key, &snapshot("v1 shell")).unwrap();
        new.put(Partition::Static, &key, &snapshot("v2 shell")).unwrap();

        assert_eq!(new.generations().len(), 2);

        let dropped = new.drop_stale_generations().unwrap();
        assert_eq!(dropped, vec!["static-v1.0.0".to_string()]);
        assert!(old.get(Partition::Static, &key).unwrap().is_none());
        assert_eq!(
            new.get(Partition::Static, &key).unwrap().unwrap().body.as_ref(),
            b"v2 shell"
        );
    }
}
