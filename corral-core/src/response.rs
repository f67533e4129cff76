//! Captured responses and the offline wire contracts

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CorralError, CorralResult};

pub const CONTENT_TYPE: &str = "content-type";

/// A response captured at a point in time: status, headers, and body bytes.
///
/// This is both what gets stored in the cache and what every strategy
/// returns to the caller. `captured_at` is diagnostic only; nothing in the
/// cache evicts by age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub captured_at: DateTime<Utc>,
}

impl ResponseSnapshot {
    pub fn new(status: u16, headers: BTreeMap<String, String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            captured_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).map(String::as_str)
    }

    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> CorralResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| CorralError::Serialization(e.to_string()))
    }

    /// Structured offline error for API requests: 503 with a JSON body
    /// carrying `offline: true` so callers can tell "no data at all" apart
    /// from a genuine server error.
    pub fn offline_api(message: &str) -> Self {
        let payload = OfflineError {
            error: "Offline".into(),
            message: message.into(),
            offline: true,
        };
        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE.into(), "application/json".into());
        Self::new(
            503,
            headers,
            serde_json::to_vec(&payload).unwrap_or_default(),
        )
    }

    /// Plain 503 for static-asset and uncategorized requests.
    pub fn offline_page(message: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE.into(), "text/plain".into());
        Self::new(503, headers, message.as_bytes().to_vec())
    }

    /// 202 acknowledgment returned when a write has been queued for later
    /// delivery instead of failing.
    pub fn accepted_for_sync(mutation_id: &str) -> Self {
        let payload = serde_json::json!({
            "accepted": true,
            "mutation_id": mutation_id,
            "offline": true,
        });
        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE.into(), "application/json".into());
        Self::new(
            202,
            headers,
            serde_json::to_vec(&payload).unwrap_or_default(),
        )
    }

    /// True if this snapshot is one of the synthesized offline responses.
    pub fn is_offline_synthesized(&self) -> bool {
        if self.status != 503 && self.status != 202 {
            return false;
        }
        self.body_json::<serde_json::Value>()
            .ok()
            .and_then(|v| v.get("offline").and_then(|o| o.as_bool()))
            .unwrap_or(self.status == 503)
    }
}

/// The offline error wire contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineError {
    pub error: String,
    pub message: String,
    pub offline: bool,
}
