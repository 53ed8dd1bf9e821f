//! The reminder state machine.
//!
//! ```text
//! Active ──fire──▶ Active (recurring, next_trigger advanced)
//!        ──fire──▶ Retired (one-time)
//!        ──cancel─▶ deleted
//! Retired ──promote──▶ Active (recurring)
//! ```
//!
//! Every operation re-reads persisted state, so handlers can run from any
//! context (alarm callback, CLI, MCP tool) without shared in-memory state.
//! A reminder that is missing or inactive when an alarm arrives is the normal
//! result of a cancel racing an in-flight alarm and is ignored.

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::error::ReminderError;
use super::schedule::{advance_past, to_minutes, DurationUnit};
use super::store::ReminderStore;
use super::types::{alarm_id, NewReminder, Reminder, ReminderKind};
use crate::alarm::{AlarmDispatcher, AlarmPayload, Notification, NotificationAction, Notifier};
use crate::clock::Clock;
use crate::config::ReminderConfig;

type EngineResult<T> = Result<T, ReminderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The reminder was deleted (cancelled) before the alarm was handled.
    Missing,
    /// The reminder was already retired.
    Inactive,
    /// The payload's fire time is not the reminder's current trigger; a
    /// newer alarm superseded it.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "reminder", rename_all = "snake_case")]
pub enum FireOutcome {
    Ignored(IgnoreReason),
    Retired(Reminder),
    Rescheduled(Reminder),
}

/// What a reconciliation pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Past-due one-time reminders retired without firing.
    pub expired: usize,
    /// Past-due recurring reminders moved forward.
    pub advanced: usize,
    /// Future reminders whose alarm was missing or out of date.
    pub rearmed: usize,
    /// Cached alarm payloads with no matching active reminder.
    pub orphans_removed: usize,
    /// Undecodable reminder rows deleted.
    pub corrupt_removed: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

pub struct ReminderEngine {
    store: Arc<dyn ReminderStore>,
    alarms: Arc<dyn AlarmDispatcher>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: ReminderConfig,
    reconcile_gate: Mutex<()>,
}

impl ReminderEngine {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        alarms: Arc<dyn AlarmDispatcher>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            alarms,
            notifier,
            clock,
            config,
            reconcile_gate: Mutex::new(()),
        }
    }

    pub fn default_snooze_minutes(&self) -> u32 {
        self.config.default_snooze_minutes
    }

    /// Create a reminder, replacing any active reminder of the same owner
    /// whose message matches, then arm its alarm.
    pub fn create(&self, new: NewReminder) -> EngineResult<Reminder> {
        let message = new.message.trim().to_string();
        if message.is_empty() {
            return Err(ReminderError::EmptyMessage);
        }

        let now = self.clock.now();
        let (next_trigger, is_duration_based) = match new.kind {
            ReminderKind::Recurring => {
                let interval = positive(new.interval_minutes.ok_or(ReminderError::MissingSchedule)?)?;
                (now + minutes(interval), new.is_duration_based)
            }
            ReminderKind::OneTime => match (new.scheduled_time, new.interval_minutes) {
                // a time already behind us fires as soon as it is armed
                (Some(at), _) => (at.max(now), new.is_duration_based),
                (None, Some(offset)) => (now + minutes(positive(offset)?), true),
                (None, None) => return Err(ReminderError::MissingSchedule),
            },
        };

        let _gate = self.reconcile_gate.lock().unwrap_or_else(|e| e.into_inner());

        for existing in self.store.find_active_by_message(&new.owner_id, &message)? {
            tracing::info!(reminder_id = %existing.id, "replacing reminder with matching message");
            self.cancel(&existing.id)?;
        }

        let reminder = Reminder {
            id: uuid::Uuid::now_v7().to_string(),
            owner_id: new.owner_id,
            message,
            kind: new.kind,
            interval_minutes: new.interval_minutes,
            scheduled_time: new.scheduled_time,
            next_trigger,
            is_active: true,
            is_duration_based,
            created_at: now,
            triggered_at: None,
        };

        self.store.insert(&reminder)?;
        self.store.log_event(
            "create",
            &reminder.id,
            Some(&json!({"kind": reminder.kind, "next_trigger": reminder.next_trigger})),
            self.clock.now(),
        );
        self.arm(&reminder);

        tracing::info!(
            reminder_id = %reminder.id,
            owner_id = %reminder.owner_id,
            kind = %reminder.kind,
            next_trigger = %reminder.next_trigger,
            "reminder created"
        );
        Ok(reminder)
    }

    pub fn get(&self, id: &str) -> EngineResult<Option<Reminder>> {
        Ok(self.store.get(id)?)
    }

    pub fn list(&self, owner_id: &str) -> EngineResult<Vec<Reminder>> {
        Ok(self.store.list_for_owner(owner_id)?)
    }

    pub fn list_active(&self, owner_id: &str) -> EngineResult<Vec<Reminder>> {
        Ok(self
            .store
            .list_for_owner(owner_id)?
            .into_iter()
            .filter(|r| r.is_active)
            .collect())
    }

    /// Handle a fire for `id`: notify, then retire a one-time reminder or
    /// advance a recurring one strictly past now and re-arm it.
    pub fn on_fire(&self, id: &str) -> EngineResult<FireOutcome> {
        let Some(mut reminder) = self.store.get(id)? else {
            tracing::debug!(reminder_id = id, "fire for missing reminder ignored");
            return Ok(FireOutcome::Ignored(IgnoreReason::Missing));
        };
        if !reminder.is_active {
            tracing::debug!(reminder_id = id, "fire for inactive reminder ignored");
            return Ok(FireOutcome::Ignored(IgnoreReason::Inactive));
        }

        let now = self.clock.now();
        if let Err(e) = self.notifier.notify(&self.notification(&reminder)) {
            tracing::warn!(reminder_id = id, error = %e, "notification failed");
        }

        match reminder.kind {
            ReminderKind::OneTime => {
                reminder.is_active = false;
                reminder.triggered_at = Some(now);
                self.store.update(&reminder)?;
                self.disarm(reminder.alarm_id());
                self.store.log_event("retire", id, None, now);
                tracing::info!(reminder_id = id, "one-time reminder fired and retired");
                Ok(FireOutcome::Retired(reminder))
            }
            ReminderKind::Recurring => {
                let interval = reminder
                    .interval_minutes
                    .unwrap_or(self.config.default_recurring_minutes);
                reminder.next_trigger = advance_past(reminder.next_trigger, interval, now);
                self.store.update(&reminder)?;
                self.arm(&reminder);
                self.store.log_event(
                    "fire",
                    id,
                    Some(&json!({"next_trigger": reminder.next_trigger})),
                    now,
                );
                tracing::info!(reminder_id = id, next_trigger = %reminder.next_trigger, "recurring reminder fired");
                Ok(FireOutcome::Rescheduled(reminder))
            }
        }
    }

    /// Entry point for payloads delivered by the alarm dispatcher.
    pub fn on_alarm(&self, payload: &AlarmPayload) -> EngineResult<FireOutcome> {
        if let Some(reminder) = self.store.get(&payload.reminder_id)? {
            if reminder.is_active && reminder.next_trigger != payload.fire_at {
                tracing::debug!(
                    reminder_id = %payload.reminder_id,
                    payload_fire_at = %payload.fire_at,
                    next_trigger = %reminder.next_trigger,
                    "stale alarm ignored"
                );
                return Ok(FireOutcome::Ignored(IgnoreReason::Stale));
            }
        }
        self.on_fire(&payload.reminder_id)
    }

    /// Push the next fire to `now + minutes`, reactivating the reminder if it
    /// had retired. `Ok(None)` if it no longer exists.
    pub fn snooze(&self, id: &str, minutes_from_now: u32) -> EngineResult<Option<Reminder>> {
        if minutes_from_now == 0 {
            return Err(ReminderError::InvalidSnooze(minutes_from_now));
        }
        let Some(mut reminder) = self.store.get(id)? else {
            return Ok(None);
        };

        reminder.next_trigger = self.clock.now() + minutes(minutes_from_now);
        reminder.is_active = true;
        reminder.triggered_at = None;
        self.store.update(&reminder)?;
        self.arm(&reminder);
        self.store.log_event(
            "snooze",
            id,
            Some(&json!({"minutes": minutes_from_now})),
            self.clock.now(),
        );

        tracing::info!(reminder_id = id, next_trigger = %reminder.next_trigger, "reminder snoozed");
        Ok(Some(reminder))
    }

    /// Delete a reminder and tear down its alarm, cached payload, and any
    /// fallback notification. Returns whether a record existed; cancelling
    /// twice is not an error.
    pub fn cancel(&self, id: &str) -> EngineResult<bool> {
        self.disarm(alarm_id(id));
        let existed = self.store.delete(id)?;
        if existed {
            self.store.log_event("cancel", id, None, self.clock.now());
            tracing::info!(reminder_id = id, "reminder cancelled");
        }
        Ok(existed)
    }

    /// Cancel every active reminder of `owner_id`, plus any cached alarm of
    /// that owner left without an active reminder. Returns how many
    /// reminders were cancelled.
    pub fn cancel_all(&self, owner_id: &str) -> EngineResult<usize> {
        let mut cancelled = 0;
        for reminder in self.list_active(owner_id)? {
            if self.cancel(&reminder.id)? {
                cancelled += 1;
            }
        }

        for cached in self.alarms.cached_payloads()? {
            let Ok(payload) = AlarmPayload::from_json(&cached.raw) else {
                continue;
            };
            if payload.owner_id != owner_id {
                continue;
            }
            let live = self
                .store
                .get(&payload.reminder_id)
                .ok()
                .flatten()
                .is_some_and(|r| r.is_active);
            if !live {
                self.disarm(cached.alarm_id);
            }
        }

        tracing::info!(owner_id, cancelled, "cancelled all reminders");
        Ok(cancelled)
    }

    /// Cancel the owner's active reminders whose message contains `topic`
    /// (case-insensitive). Returns the cancelled reminders.
    pub fn cancel_matching(&self, owner_id: &str, topic: &str) -> EngineResult<Vec<Reminder>> {
        let needle = topic.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(vec![]);
        }
        let mut cancelled = Vec::new();
        for reminder in self.list_active(owner_id)? {
            if reminder.message.to_lowercase().contains(&needle) && self.cancel(&reminder.id)? {
                cancelled.push(reminder);
            }
        }
        Ok(cancelled)
    }

    /// Turn a one-time reminder (active or retired) into a recurring one
    /// firing from now.
    ///
    /// Interval priority: `interval` if given; the stored offset of a
    /// duration-based reminder; `next_trigger - created_at` of a
    /// duration-based reminder; the configured default.
    pub fn promote_to_recurring(&self, id: &str, interval: Option<u32>) -> EngineResult<Reminder> {
        let mut reminder = self
            .store
            .get(id)?
            .ok_or_else(|| ReminderError::NotFound(id.to_string()))?;
        if reminder.kind == ReminderKind::Recurring {
            return Err(ReminderError::AlreadyRecurring(id.to_string()));
        }

        let interval = match interval {
            Some(m) => positive(m)?,
            None => self.inferred_interval(&reminder),
        };

        reminder.kind = ReminderKind::Recurring;
        reminder.interval_minutes = Some(interval);
        reminder.next_trigger = self.clock.now() + minutes(interval);
        reminder.is_active = true;
        reminder.triggered_at = None;
        self.store.update(&reminder)?;
        self.arm(&reminder);
        self.store.log_event(
            "promote",
            id,
            Some(&json!({"interval_minutes": interval})),
            self.clock.now(),
        );

        tracing::info!(reminder_id = id, interval, "reminder promoted to recurring");
        Ok(reminder)
    }

    fn inferred_interval(&self, reminder: &Reminder) -> u32 {
        if reminder.is_duration_based {
            if let Some(m) = reminder.interval_minutes.filter(|m| *m > 0) {
                return m;
            }
            let secs = (reminder.next_trigger - reminder.created_at).num_seconds();
            if secs > 0 {
                return to_minutes(u32::try_from(secs).unwrap_or(u32::MAX), DurationUnit::Seconds);
            }
        }
        self.config.default_recurring_minutes
    }

    /// Route a notification action.
    pub fn handle_action(&self, id: &str, action: NotificationAction) -> EngineResult<()> {
        match action {
            NotificationAction::Snooze(m) => {
                self.snooze(id, m)?;
            }
            NotificationAction::Stop => {
                self.cancel(id)?;
            }
            NotificationAction::Dismiss => {
                tracing::debug!(reminder_id = id, "notification dismissed");
            }
        }
        Ok(())
    }

    /// Repair drift between persisted reminders and the dispatcher after a
    /// restart. Blocks `create` until done. Running it twice in a row without
    /// other changes makes no changes the second time.
    pub fn reconcile_on_startup(&self) -> EngineResult<ReconcileReport> {
        let _gate = self.reconcile_gate.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        let mut report = ReconcileReport::default();

        let cached_before: HashMap<u32, String> = self
            .alarms
            .cached_payloads()?
            .into_iter()
            .map(|c| (c.alarm_id, c.raw))
            .collect();
        let mut live: HashMap<u32, String> = HashMap::new();

        for scanned in self.store.scan_active()? {
            let mut reminder = match scanned {
                Ok(r) => r,
                Err(corrupt) => {
                    tracing::warn!(reminder_id = %corrupt.id, reason = %corrupt.reason, "removing corrupt reminder");
                    if let Err(e) = self.store.delete(&corrupt.id) {
                        tracing::warn!(reminder_id = %corrupt.id, error = %e, "failed to delete corrupt reminder");
                    }
                    self.disarm(alarm_id(&corrupt.id));
                    self.store.log_event(
                        "corrupt",
                        &corrupt.id,
                        Some(&json!({"reason": corrupt.reason})),
                        now,
                    );
                    report.corrupt_removed += 1;
                    continue;
                }
            };

            if reminder.next_trigger <= now {
                match reminder.kind {
                    ReminderKind::OneTime => {
                        reminder.is_active = false;
                        self.store.update(&reminder)?;
                        self.disarm(reminder.alarm_id());
                        self.store.log_event("expire", &reminder.id, None, now);
                        tracing::info!(reminder_id = %reminder.id, "missed one-time reminder expired");
                        report.expired += 1;
                    }
                    ReminderKind::Recurring => {
                        let interval = reminder
                            .interval_minutes
                            .unwrap_or(self.config.default_recurring_minutes);
                        reminder.next_trigger = advance_past(reminder.next_trigger, interval, now);
                        self.store.update(&reminder)?;
                        self.arm(&reminder);
                        self.store.log_event(
                            "advance",
                            &reminder.id,
                            Some(&json!({"next_trigger": reminder.next_trigger})),
                            now,
                        );
                        report.advanced += 1;
                        live.insert(reminder.alarm_id(), reminder.id.clone());
                    }
                }
                continue;
            }

            let id = reminder.alarm_id();
            let expected = self.payload(&reminder).to_json().ok();
            let armed = self.alarms.is_scheduled(id).unwrap_or(false);
            let cached = cached_before.get(&id);
            let in_sync = armed && cached.is_some() && cached == expected.as_ref();
            // a refused alarm leaves only the fallback notification behind
            let fallback_at = self.notifier.pending_notification(id).ok().flatten();
            let fallback_pending = !armed && cached.is_none() && fallback_at == Some(reminder.next_trigger);
            if !in_sync && !fallback_pending {
                self.arm(&reminder);
                report.rearmed += 1;
            }
            live.insert(id, reminder.id.clone());
        }

        for cached in self.alarms.cached_payloads()? {
            let owner = AlarmPayload::from_json(&cached.raw)
                .ok()
                .filter(|p| live.get(&cached.alarm_id) == Some(&p.reminder_id));
            if owner.is_none() {
                tracing::info!(alarm_id = cached.alarm_id, "removing orphaned alarm");
                self.disarm(cached.alarm_id);
                report.orphans_removed += 1;
            }
        }

        if report.is_noop() {
            tracing::debug!("reconciliation found nothing to repair");
        } else {
            tracing::info!(?report, "reconciliation complete");
        }
        Ok(report)
    }

    fn payload(&self, reminder: &Reminder) -> AlarmPayload {
        AlarmPayload {
            reminder_id: reminder.id.clone(),
            owner_id: reminder.owner_id.clone(),
            message: reminder.message.clone(),
            fire_at: reminder.next_trigger,
        }
    }

    fn notification(&self, reminder: &Reminder) -> Notification {
        let last = match reminder.kind {
            ReminderKind::Recurring => NotificationAction::Stop,
            ReminderKind::OneTime => NotificationAction::Dismiss,
        };
        Notification {
            title: "Reminder".into(),
            body: reminder.message.clone(),
            reminder_id: reminder.id.clone(),
            actions: vec![NotificationAction::Snooze(self.config.default_snooze_minutes), last],
        }
    }

    /// Schedule the alarm for `next_trigger`, falling back to a plain
    /// scheduled notification when the dispatcher refuses or fails.
    fn arm(&self, reminder: &Reminder) {
        let id = reminder.alarm_id();
        let payload = self.payload(reminder);
        let accepted = match self.alarms.schedule(id, reminder.next_trigger, &payload) {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(reminder_id = %reminder.id, alarm_id = id, error = %e, "alarm scheduling failed");
                false
            }
        };
        if accepted {
            return;
        }

        tracing::warn!(reminder_id = %reminder.id, alarm_id = id, "alarm refused, falling back to scheduled notification");
        if let Err(e) =
            self.notifier
                .schedule_notification(id, reminder.next_trigger, &self.notification(reminder))
        {
            tracing::warn!(reminder_id = %reminder.id, error = %e, "fallback notification failed");
        }
    }

    fn disarm(&self, id: u32) {
        if let Err(e) = self.alarms.cancel(id) {
            tracing::warn!(alarm_id = id, error = %e, "failed to cancel alarm");
        }
        if let Err(e) = self.alarms.remove_payload(id) {
            tracing::warn!(alarm_id = id, error = %e, "failed to remove alarm payload");
        }
        if let Err(e) = self.notifier.cancel_notification(id) {
            tracing::warn!(alarm_id = id, error = %e, "failed to cancel notification");
        }
    }
}

fn positive(m: u32) -> EngineResult<u32> {
    if m == 0 {
        Err(ReminderError::InvalidInterval(m))
    } else {
        Ok(m)
    }
}

fn minutes(m: u32) -> chrono::Duration {
    chrono::Duration::minutes(m as i64)
}
