//! Test support: a fetcher with per-endpoint scripted behavior

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use corral_core::{CorralError, CorralResult, Fetcher, RequestDescriptor, ResponseSnapshot};

enum Script {
    /// Always answer with this status.
    Always(u16),
    /// Fail with a network error N times, then answer with this status.
    FailThen { remaining: u32, status: u16 },
}

#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_status(&self, url: &str, status: u16) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Always(status));
    }

    pub fn fail_times(&self, url: &str, times: u32, then_status: u16) {
        self.scripts.lock().unwrap().insert(
            url.to_string(),
            Script::FailThen {
                remaining: times,
                status: then_status,
            },
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> CorralResult<ResponseSnapshot> {
        self.calls.lock().unwrap().push(request.url.clone());

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&request.url) {
            Some(Script::Always(status)) => {
                Ok(ResponseSnapshot::new(*status, Default::default(), &b""[..]))
            }
            Some(Script::FailThen { remaining, status }) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Err(CorralError::Network("connection refused".into()))
                } else {
                    Ok(ResponseSnapshot::new(*status, Default::default(), &b""[..]))
                }
            }
            None => Err(CorralError::Network("no route".into())),
        }
    }
}
