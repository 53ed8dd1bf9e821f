//! Terminal notifier for the CLI daemon.
//!
//! Writes to stderr so stdout stays clean for MCP JSON-RPC.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::{Notification, NotificationAction, Notifier};

struct Pending {
    generation: u64,
    at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<u32, Pending>>>;

pub struct ConsoleNotifier {
    pending: PendingMap,
    runtime: Option<Handle>,
    generation: AtomicU64,
}

impl ConsoleNotifier {
    /// Fallback notifications need a tokio runtime; outside one,
    /// `schedule_notification` fails.
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            runtime: Handle::try_current().ok(),
            generation: AtomicU64::new(0),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u32, Pending>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn render(notification: &Notification) -> String {
    let actions: Vec<String> = notification
        .actions
        .iter()
        .map(|a| match a {
            NotificationAction::Snooze(m) => format!("snooze {m}m"),
            NotificationAction::Stop => "stop".into(),
            NotificationAction::Dismiss => "dismiss".into(),
        })
        .collect();
    format!(
        "[{}] {}  ({}; id {})",
        notification.title,
        notification.body,
        actions.join(" / "),
        notification.reminder_id
    )
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(reminder_id = %notification.reminder_id, body = %notification.body, "notification");
        eprintln!("{}", render(notification));
        Ok(())
    }

    fn schedule_notification(
        &self,
        alarm_id: u32,
        at: DateTime<Utc>,
        notification: &Notification,
    ) -> Result<()> {
        let Some(runtime) = &self.runtime else {
            anyhow::bail!("no async runtime for scheduled notification {alarm_id}");
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let pending = Arc::clone(&self.pending);
        let line = render(notification);

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = pending.lock().unwrap_or_else(|e| e.into_inner());
                if pending.get(&alarm_id).map(|p| p.generation) == Some(generation) {
                    pending.remove(&alarm_id);
                }
            }
            eprintln!("{line}");
        });

        if let Some(previous) = self.pending().insert(
            alarm_id,
            Pending {
                generation,
                at,
                handle,
            },
        ) {
            previous.handle.abort();
        }
        tracing::info!(alarm_id, %at, "scheduled plain notification");
        Ok(())
    }

    fn cancel_notification(&self, alarm_id: u32) -> Result<()> {
        if let Some(previous) = self.pending().remove(&alarm_id) {
            previous.handle.abort();
        }
        Ok(())
    }

    fn pending_notification(&self, alarm_id: u32) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .pending()
            .get(&alarm_id)
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_actions() {
        let line = render(&Notification {
            title: "Reminder".into(),
            body: "Call mom".into(),
            reminder_id: "r1".into(),
            actions: vec![NotificationAction::Snooze(10), NotificationAction::Stop],
        });
        assert_eq!(line, "[Reminder] Call mom  (snooze 10m / stop; id r1)");
    }

    fn notification() -> Notification {
        Notification {
            title: "Reminder".into(),
            body: "Stretch".into(),
            reminder_id: "r1".into(),
            actions: vec![NotificationAction::Dismiss],
        }
    }

    #[test]
    fn fails_without_runtime() {
        let notifier = ConsoleNotifier::new();
        assert!(notifier
            .schedule_notification(1, Utc::now(), &notification())
            .is_err());
        assert_eq!(notifier.pending_notification(1).unwrap(), None);
    }

    #[tokio::test]
    async fn shown_notification_is_pruned() {
        let notifier = ConsoleNotifier::new();
        let at = Utc::now() - chrono::Duration::seconds(1);
        notifier.schedule_notification(4, at, &notification()).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(notifier.pending().is_empty());
        assert_eq!(notifier.pending_notification(4).unwrap(), None);
    }

    #[tokio::test]
    async fn reschedule_and_cancel_replace_the_pending_task() {
        let notifier = ConsoleNotifier::new();
        let soon = Utc::now() + chrono::Duration::hours(1);
        let later = Utc::now() + chrono::Duration::hours(2);
        notifier.schedule_notification(5, soon, &notification()).unwrap();
        notifier.schedule_notification(5, later, &notification()).unwrap();
        assert_eq!(notifier.pending().len(), 1);
        assert_eq!(notifier.pending_notification(5).unwrap(), Some(later));

        notifier.cancel_notification(5).unwrap();
        assert_eq!(notifier.pending_notification(5).unwrap(), None);
        assert!(notifier.pending().is_empty());
    }
}
