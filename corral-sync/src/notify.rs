// SPDX-License-Identifier: AGPL-3.0-or-later
//! Push notifications
//!
//! A push event carries an optional JSON payload; any missing or
//! unparseable field falls back to the configured defaults, so a push
//! always produces a notification. Notifications sharing a tag replace one
//! another instead of stacking.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Incoming push payload; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
}

/// An action button on a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub id: String,
    pub label: String,
}

/// A notification ready to present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub actions: Vec<NotificationAction>,
}

/// Defaults applied when a push payload is absent or partial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub default_title: String,
    pub default_body: String,
    pub default_icon: String,
    pub default_badge: String,
    pub default_tag: String,
    pub open_url: String,
    pub actions: Vec<NotificationAction>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            default_title: "Corral".into(),
            default_body: "New notification".into(),
            default_icon: "/icon-192x192.png".into(),
            default_badge: "/icon-96x96.png".into(),
            default_tag: "corral-notification".into(),
            open_url: "/".into(),
            actions: vec![
                NotificationAction {
                    id: "view".into(),
                    label: "View details".into(),
                },
                NotificationAction {
                    id: "dismiss".into(),
                    label: "Dismiss".into(),
                },
            ],
        }
    }
}

/// Where a notification click routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Open or focus the application at the given URL.
    OpenApp { url: String },
    /// Close the notification and do nothing else.
    Dismissed,
}

/// Builds notifications from push events and routes clicks
pub struct NotificationDispatcher {
    config: NotifyConfig,
    /// Unread notifications keyed by tag; a new push with an existing tag
    /// replaces the prior entry.
    active: Mutex<HashMap<String, Notification>>,
}

impl NotificationDispatcher {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Handle a push event. Never fails: a missing or malformed payload
    /// produces the default notification.
    pub fn on_push(&self, raw: Option<&[u8]>) -> Notification {
        let payload = match raw {
            Some(bytes) => match serde_json::from_slice::<PushPayload>(bytes) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "malformed push payload, using defaults");
                    PushPayload::default()
                }
            },
            None => PushPayload::default(),
        };

        let notification = Notification {
            title: payload.title.unwrap_or_else(|| self.config.default_title.clone()),
            body: payload.body.unwrap_or_else(|| self.config.default_body.clone()),
            icon: payload.icon.unwrap_or_else(|| self.config.default_icon.clone()),
            badge: payload.badge.unwrap_or_else(|| self.config.default_badge.clone()),
            tag: payload.tag.unwrap_or_else(|| self.config.default_tag.clone()),
            actions: self.config.actions.clone(),
        };

        let replaced = self
            .active
            .lock()
            .insert(notification.tag.clone(), notification.clone())
            .is_some();
        debug!(tag = %notification.tag, replaced, "notification presented");

        notification
    }

    /// Handle a click. `action` is the chosen action id, or `None` for a
    /// click on the notification body, which behaves like "view".
    pub fn on_click(&self, tag: &str, action: Option<&str>) -> ClickOutcome {
        self.active.lock().remove(tag);

        match action {
            Some("dismiss") => ClickOutcome::Dismissed,
            // "view", the body, or an unrecognized action all open the app.
            _ => ClickOutcome::OpenApp {
                url: self.config.open_url.clone(),
            },
        }
    }

    /// Currently unread notifications.
    pub fn active(&self) -> Vec<Notification> {
        self.active.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> NotificationDispatcher {
        NotificationDispatcher::new(NotifyConfig::default())
    }

    #[test]
    fn test_missing_payload_uses_defaults() {
        let d = dispatcher();
        let n = d.on_push(None);
        assert_eq!(n.title, "Corral");
        assert_eq!(n.body, "New notification");
        assert_eq!(n.tag, "corral-notification");
        assert_eq!(n.actions.len(), 2);
    }

    #[test]
    fn test_malformed_payload_uses_defaults() {
        let d = dispatcher();
        let n = d.on_push(Some(b"not json at all {"));
        assert_eq!(n.title, "Corral");
        assert_eq!(n.body, "New notification");
    }

    #[test]
    fn test_partial_payload_merges_over_defaults() {
        let d = dispatcher();
        let n = d.on_push(Some(
            br#"{"title": "Vaccination due", "tag": "alert-42"}"#,
        ));
        assert_eq!(n.title, "Vaccination due");
        assert_eq!(n.body, "New notification");
        assert_eq!(n.tag, "alert-42");
    }

    #[test]
    fn test_same_tag_replaces() {
        let d = dispatcher();
        d.on_push(Some(br#"{"title": "First", "tag": "alert-1"}"#));
        d.on_push(Some(br#"{"title": "Second", "tag": "alert-1"}"#));

        let active = d.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "Second");
    }

    #[test]
    fn test_click_routing() {
        let d = dispatcher();
        d.on_push(Some(br#"{"tag": "alert-1"}"#));

        assert_eq!(
            d.on_click("alert-1", Some("view")),
            ClickOutcome::OpenApp { url: "/".into() }
        );
        assert!(d.active().is_empty());

        d.on_push(Some(br#"{"tag": "alert-2"}"#));
        assert_eq!(d.on_click("alert-2", Some("dismiss")), ClickOutcome::Dismissed);

        // Body click behaves as "view".
        d.on_push(Some(br#"{"tag": "alert-3"}"#));
        assert_eq!(
            d.on_click("alert-3", None),
            ClickOutcome::OpenApp { url: "/".into() }
        );
    }
}
