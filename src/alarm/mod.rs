//! Boundary to whatever actually wakes the process up and shows notifications.
//!
//! The engine only speaks [`AlarmDispatcher`] and [`Notifier`]. Delivery is
//! at-least-once and may be stale: a payload can arrive after its reminder was
//! cancelled or rescheduled, and the engine is expected to cope.

pub mod console;
pub mod timer;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the dispatcher hands back when an alarm fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub reminder_id: String,
    pub owner_id: String,
    pub message: String,
    pub fire_at: DateTime<Utc>,
}

impl AlarmPayload {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// A payload as the dispatcher cached it. `raw` may not decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAlarm {
    pub alarm_id: u32,
    pub raw: String,
}

pub trait AlarmDispatcher: Send + Sync {
    /// Arm (or re-arm) `alarm_id` to fire at `fire_at`, replacing any earlier
    /// registration and cached payload for that id. `Ok(false)` means the
    /// platform refused, e.g. for lack of permission.
    fn schedule(&self, alarm_id: u32, fire_at: DateTime<Utc>, payload: &AlarmPayload)
        -> Result<bool>;

    /// Cancel the wake-up. Does not touch the cached payload.
    fn cancel(&self, alarm_id: u32) -> Result<()>;

    fn is_scheduled(&self, alarm_id: u32) -> Result<bool>;

    /// Every payload the dispatcher still holds.
    fn cached_payloads(&self) -> Result<Vec<CachedAlarm>>;

    fn remove_payload(&self, alarm_id: u32) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "minutes")]
pub enum NotificationAction {
    Snooze(u32),
    Stop,
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub reminder_id: String,
    pub actions: Vec<NotificationAction>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<()>;

    /// Lower-fidelity fallback when the dispatcher refuses: a notification
    /// shown at `at` that runs no wake logic of its own.
    fn schedule_notification(
        &self,
        alarm_id: u32,
        at: DateTime<Utc>,
        notification: &Notification,
    ) -> Result<()>;

    fn cancel_notification(&self, alarm_id: u32) -> Result<()>;

    /// When the fallback notification for `alarm_id` will show, if one is
    /// still pending.
    fn pending_notification(&self, alarm_id: u32) -> Result<Option<DateTime<Utc>>>;
}
