//! In-process alarm dispatcher backed by tokio timers.
//!
//! Payloads are cached in the `alarm_payloads` table, so after a restart the
//! cache describes alarms that no longer have a live timer; reconciliation
//! re-arms or discards them. Fired payloads are delivered on an unbounded
//! channel for the daemon loop to hand to the engine.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{AlarmDispatcher, AlarmPayload, CachedAlarm};

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

type Timers = Arc<Mutex<HashMap<u32, Timer>>>;

pub struct TimerDispatcher {
    db: Arc<Mutex<Connection>>,
    timers: Timers,
    tx: mpsc::UnboundedSender<AlarmPayload>,
    runtime: Option<Handle>,
    generation: AtomicU64,
}

impl TimerDispatcher {
    /// Create the dispatcher and the receiver fired payloads arrive on.
    ///
    /// Outside a tokio runtime every `schedule` call reports `false`.
    pub fn new(db: Arc<Mutex<Connection>>) -> (Self, mpsc::UnboundedReceiver<AlarmPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            db,
            timers: Arc::new(Mutex::new(HashMap::new())),
            tx,
            runtime: Handle::try_current().ok(),
            generation: AtomicU64::new(0),
        };
        (dispatcher, rx)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow::anyhow!("database lock poisoned: {e}"))
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<u32, Timer>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AlarmDispatcher for TimerDispatcher {
    fn schedule(
        &self,
        alarm_id: u32,
        fire_at: DateTime<Utc>,
        payload: &AlarmPayload,
    ) -> Result<bool> {
        let Some(runtime) = &self.runtime else {
            tracing::warn!(alarm_id, "no async runtime, cannot arm timer");
            return Ok(false);
        };

        self.conn()?.execute(
            "INSERT OR REPLACE INTO alarm_payloads (alarm_id, payload, updated_at)
             VALUES (?1, ?2, ?3)",
            params![alarm_id, payload.to_json()?, Utc::now().to_rfc3339()],
        )?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let delay = (fire_at - Utc::now()).to_std().unwrap_or_default();
        let tx = self.tx.clone();
        let timers = Arc::clone(&self.timers);
        let payload = payload.clone();

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut timers = timers.lock().unwrap_or_else(|e| e.into_inner());
                if timers.get(&alarm_id).map(|t| t.generation) == Some(generation) {
                    timers.remove(&alarm_id);
                }
            }
            tracing::debug!(alarm_id, reminder_id = %payload.reminder_id, "alarm fired");
            if tx.send(payload).is_err() {
                tracing::warn!(alarm_id, "alarm receiver dropped");
            }
        });

        if let Some(previous) = self.timers().insert(alarm_id, Timer { generation, handle }) {
            previous.handle.abort();
        }
        tracing::debug!(alarm_id, %fire_at, "alarm armed");
        Ok(true)
    }

    fn cancel(&self, alarm_id: u32) -> Result<()> {
        if let Some(timer) = self.timers().remove(&alarm_id) {
            timer.handle.abort();
            tracing::debug!(alarm_id, "alarm cancelled");
        }
        Ok(())
    }

    fn is_scheduled(&self, alarm_id: u32) -> Result<bool> {
        Ok(self
            .timers()
            .get(&alarm_id)
            .is_some_and(|t| !t.handle.is_finished()))
    }

    fn cached_payloads(&self) -> Result<Vec<CachedAlarm>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT alarm_id, payload FROM alarm_payloads ORDER BY alarm_id")?;
        let cached = stmt
            .query_map([], |row| {
                Ok(CachedAlarm {
                    alarm_id: row.get(0)?,
                    raw: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cached)
    }

    fn remove_payload(&self, alarm_id: u32) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM alarm_payloads WHERE alarm_id = ?1", params![alarm_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db() -> Arc<Mutex<Connection>> {
        Arc::new(Mutex::new(crate::db::open_memory_database().unwrap()))
    }

    fn payload(fire_at: DateTime<Utc>) -> AlarmPayload {
        AlarmPayload {
            reminder_id: "r1".into(),
            owner_id: "me".into(),
            message: "Stretch".into(),
            fire_at,
        }
    }

    #[test]
    fn refuses_without_runtime() {
        let (dispatcher, _rx) = TimerDispatcher::new(db());
        let ok = dispatcher
            .schedule(7, Utc::now(), &payload(Utc::now()))
            .unwrap();
        assert!(!ok);
        assert!(dispatcher.cached_payloads().unwrap().is_empty());
    }

    #[tokio::test]
    async fn due_alarm_is_delivered() {
        let (dispatcher, mut rx) = TimerDispatcher::new(db());
        let at = Utc::now() - Duration::seconds(1);
        assert!(dispatcher.schedule(7, at, &payload(at)).unwrap());

        let fired = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.reminder_id, "r1");
        // payload stays cached until the engine removes it
        assert_eq!(dispatcher.cached_payloads().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_stops_delivery_and_keeps_payload() {
        let (dispatcher, mut rx) = TimerDispatcher::new(db());
        let at = Utc::now() + Duration::milliseconds(100);
        dispatcher.schedule(9, at, &payload(at)).unwrap();
        assert!(dispatcher.is_scheduled(9).unwrap());

        dispatcher.cancel(9).unwrap();
        assert!(!dispatcher.is_scheduled(9).unwrap());
        let res = tokio::time::timeout(std::time::Duration::from_millis(300), rx.recv()).await;
        assert!(res.is_err(), "cancelled alarm must not fire");

        assert_eq!(dispatcher.cached_payloads().unwrap().len(), 1);
        dispatcher.remove_payload(9).unwrap();
        assert!(dispatcher.cached_payloads().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reschedule_replaces_previous_timer() {
        let (dispatcher, mut rx) = TimerDispatcher::new(db());
        let soon = Utc::now() + Duration::milliseconds(50);
        let later = Utc::now() + Duration::hours(1);
        dispatcher.schedule(3, soon, &payload(soon)).unwrap();
        dispatcher.schedule(3, later, &payload(later)).unwrap();

        let res = tokio::time::timeout(std::time::Duration::from_millis(250), rx.recv()).await;
        assert!(res.is_err());
        assert!(dispatcher.is_scheduled(3).unwrap());

        let cached = dispatcher.cached_payloads().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(AlarmPayload::from_json(&cached[0].raw).unwrap().fire_at, later);
    }
}
