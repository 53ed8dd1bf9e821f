#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use recollect::alarm::{AlarmDispatcher, AlarmPayload, CachedAlarm, Notification, Notifier};
use recollect::clock::{Clock, ManualClock};
use recollect::config::ReminderConfig;
use recollect::db;
use recollect::embedding::{l2_normalize, EmbedMode, Embedder, EmbeddingProvider};
use recollect::memory::recall::MemoryService;
use recollect::memory::search::SearchParams;
use recollect::memory::similarity::RecencyBonus;
use recollect::memory::store::SqliteMemoryStore;
use recollect::reminder::store::SqliteReminderStore;
use recollect::reminder::ReminderEngine;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(db::open_memory_database().unwrap()))
}

/// 2025-06-01 12:00 UTC, a Sunday with no DST edge nearby.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub fn mins(m: i64) -> chrono::Duration {
    chrono::Duration::minutes(m)
}

// ── Alarm fakes ───────────────────────────────────────────────────────────

#[derive(Default)]
struct AlarmState {
    armed: HashMap<u32, DateTime<Utc>>,
    cache: HashMap<u32, String>,
    cancelled: Vec<u32>,
    refuse: bool,
}

/// Dispatcher that records what the engine asked for.
#[derive(Default)]
pub struct FakeAlarms {
    state: Mutex<AlarmState>,
}

impl FakeAlarms {
    /// A dispatcher that refuses every schedule call (no permission).
    pub fn refusing() -> Self {
        let alarms = Self::default();
        alarms.state().refuse = true;
        alarms
    }

    fn state(&self) -> std::sync::MutexGuard<'_, AlarmState> {
        self.state.lock().unwrap()
    }

    pub fn armed_at(&self, alarm_id: u32) -> Option<DateTime<Utc>> {
        self.state().armed.get(&alarm_id).copied()
    }

    pub fn armed_count(&self) -> usize {
        self.state().armed.len()
    }

    pub fn cached(&self, alarm_id: u32) -> Option<AlarmPayload> {
        self.state()
            .cache
            .get(&alarm_id)
            .and_then(|raw| AlarmPayload::from_json(raw).ok())
    }

    pub fn cache_len(&self) -> usize {
        self.state().cache.len()
    }

    pub fn was_cancelled(&self, alarm_id: u32) -> bool {
        self.state().cancelled.contains(&alarm_id)
    }

    /// Put a payload in the cache without arming anything.
    pub fn insert_cached(&self, alarm_id: u32, raw: &str) {
        self.state().cache.insert(alarm_id, raw.to_string());
    }

    /// Arm a timer and cache its payload, as an earlier process might have.
    pub fn insert_armed(&self, alarm_id: u32, payload: &AlarmPayload) {
        let mut state = self.state();
        state.armed.insert(alarm_id, payload.fire_at);
        state.cache.insert(alarm_id, payload.to_json().unwrap());
    }

    /// Simulate a process restart: timers die, the persisted cache survives.
    pub fn drop_timers(&self) {
        self.state().armed.clear();
    }
}

impl AlarmDispatcher for FakeAlarms {
    fn schedule(&self, alarm_id: u32, fire_at: DateTime<Utc>, payload: &AlarmPayload) -> Result<bool> {
        let mut state = self.state();
        if state.refuse {
            return Ok(false);
        }
        state.armed.insert(alarm_id, fire_at);
        state.cache.insert(alarm_id, payload.to_json()?);
        Ok(true)
    }

    fn cancel(&self, alarm_id: u32) -> Result<()> {
        let mut state = self.state();
        state.armed.remove(&alarm_id);
        state.cancelled.push(alarm_id);
        Ok(())
    }

    fn is_scheduled(&self, alarm_id: u32) -> Result<bool> {
        Ok(self.state().armed.contains_key(&alarm_id))
    }

    fn cached_payloads(&self) -> Result<Vec<CachedAlarm>> {
        Ok(self
            .state()
            .cache
            .iter()
            .map(|(id, raw)| CachedAlarm {
                alarm_id: *id,
                raw: raw.clone(),
            })
            .collect())
    }

    fn remove_payload(&self, alarm_id: u32) -> Result<()> {
        self.state().cache.remove(&alarm_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub shown: Mutex<Vec<Notification>>,
    pub scheduled: Mutex<HashMap<u32, DateTime<Utc>>>,
}

impl RecordingNotifier {
    pub fn shown_count(&self) -> usize {
        self.shown.lock().unwrap().len()
    }

    pub fn scheduled_at(&self, alarm_id: u32) -> Option<DateTime<Utc>> {
        self.scheduled.lock().unwrap().get(&alarm_id).copied()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn schedule_notification(&self, alarm_id: u32, at: DateTime<Utc>, _notification: &Notification) -> Result<()> {
        self.scheduled.lock().unwrap().insert(alarm_id, at);
        Ok(())
    }

    fn cancel_notification(&self, alarm_id: u32) -> Result<()> {
        self.scheduled.lock().unwrap().remove(&alarm_id);
        Ok(())
    }

    fn pending_notification(&self, alarm_id: u32) -> Result<Option<DateTime<Utc>>> {
        Ok(self.scheduled_at(alarm_id))
    }
}

/// A reminder engine over an in-memory database with recording fakes.
pub struct Harness {
    pub engine: Arc<ReminderEngine>,
    pub alarms: Arc<FakeAlarms>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub db: Arc<Mutex<Connection>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_alarms(FakeAlarms::default())
    }

    pub fn with_alarms(alarms: FakeAlarms) -> Self {
        let db = test_db();
        let alarms = Arc::new(alarms);
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = Arc::new(ReminderEngine::new(
            Arc::new(SqliteReminderStore::new(Arc::clone(&db))),
            Arc::clone(&alarms) as Arc<dyn AlarmDispatcher>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            ReminderConfig::default(),
        ));
        Self {
            engine,
            alarms,
            notifier,
            clock,
            db,
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A second engine over the same database and alarm cache, as after a
    /// process restart.
    pub fn restart(&self) -> Arc<ReminderEngine> {
        self.alarms.drop_timers();
        Arc::new(ReminderEngine::new(
            Arc::new(SqliteReminderStore::new(Arc::clone(&self.db))),
            Arc::clone(&self.alarms) as Arc<dyn AlarmDispatcher>,
            Arc::clone(&self.notifier) as Arc<dyn Notifier>,
            Arc::clone(&self.clock) as Arc<dyn Clock>,
            ReminderConfig::default(),
        ))
    }
}

// ── Embedding fakes ───────────────────────────────────────────────────────

const CONCEPTS: &[&[&str]] = &[
    &["car", "vehicle", "parked", "park", "parking", "lot", "garage", "drove"],
    &["keys", "key", "keychain", "spare"],
    &["wifi", "password", "router", "network"],
    &["mom", "mother", "birthday", "anniversary"],
    &["medicine", "pills", "meds", "pharmacy"],
];

/// Maps words to a handful of concept axes, so "where is my car" and
/// "I parked in lot B5" point the same way. Text with no concept word embeds
/// to the zero vector.
pub struct ConceptEmbeddingProvider;

impl ConceptEmbeddingProvider {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; CONCEPTS.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .map(|w| w.to_lowercase())
        {
            for (axis, words) in CONCEPTS.iter().enumerate() {
                if words.contains(&word.as_str()) {
                    v[axis] += 1.0;
                }
            }
        }
        l2_normalize(&v)
    }
}

impl EmbeddingProvider for ConceptEmbeddingProvider {
    fn embed(&self, text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        CONCEPTS.len()
    }

    fn model_id(&self) -> &str {
        "concepts"
    }
}

/// Provider that is always down.
pub struct FailingEmbeddingProvider;

impl EmbeddingProvider for FailingEmbeddingProvider {
    fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<Vec<f32>> {
        anyhow::bail!("connection refused")
    }

    fn dimensions(&self) -> usize {
        CONCEPTS.len()
    }

    fn model_id(&self) -> &str {
        "unreachable"
    }
}

pub fn search_params(threshold: f32) -> SearchParams {
    SearchParams {
        top_k: 5,
        similarity_threshold: threshold,
        recency: RecencyBonus::default(),
    }
}

/// Memory service over an in-memory database and the given provider.
pub fn memory_service(
    provider: Arc<dyn EmbeddingProvider>,
    clock: Arc<ManualClock>,
    db: Arc<Mutex<Connection>>,
) -> MemoryService {
    let embedder = Arc::new(Embedder::new(provider, Duration::from_secs(2)));
    MemoryService::new(
        Arc::new(SqliteMemoryStore::new(db)),
        embedder,
        search_params(0.2),
        clock,
    )
}
