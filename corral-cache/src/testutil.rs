//! Test support: a scripted fetcher and store helpers

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use corral_core::{CorralError, CorralResult, Fetcher, RequestDescriptor, ResponseSnapshot};

use crate::store::{CacheStore, StoreConfig};

/// Fetcher that serves canned responses and records every call
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, ResponseSnapshot>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, snapshot: ResponseSnapshot) {
        self.routes.lock().unwrap().insert(url.to_string(), snapshot);
    }

    pub fn respond_text(&self, url: &str, status: u16, body: &str) {
        self.respond(
            url,
            ResponseSnapshot::new(status, BTreeMap::new(), body.as_bytes().to_vec()),
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> CorralResult<ResponseSnapshot> {
        self.calls.lock().unwrap().push(request.url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(CorralError::Network("network unreachable".into()));
        }

        match self.routes.lock().unwrap().get(&request.url) {
            Some(snapshot) => Ok(snapshot.clone()),
            None => Ok(ResponseSnapshot::new(
                404,
                BTreeMap::new(),
                b"not found".to_vec(),
            )),
        }
    }
}

pub fn temp_store() -> CacheStore {
    let db = sled::Config::new().temporary(true).open().unwrap();
    CacheStore::new(db, StoreConfig::default())
}
