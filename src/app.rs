//! Service wiring shared by the CLI and the MCP server.

use anyhow::Result;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::alarm::console::ConsoleNotifier;
use crate::alarm::timer::TimerDispatcher;
use crate::alarm::AlarmPayload;
use crate::assistant::Assistant;
use crate::clock::{Clock, SystemClock};
use crate::config::RecollectConfig;
use crate::db;
use crate::embedding::Embedder;
use crate::memory::recall::MemoryService;
use crate::memory::search::SearchParams;
use crate::memory::store::SqliteMemoryStore;
use crate::reminder::store::SqliteReminderStore;
use crate::reminder::{FireOutcome, ReminderEngine};

/// Fully wired services over one database connection.
pub struct App {
    pub config: Arc<RecollectConfig>,
    pub db: Arc<Mutex<Connection>>,
    pub memory: Arc<MemoryService>,
    pub reminders: Arc<ReminderEngine>,
    pub assistant: Arc<Assistant>,
    pub clock: Arc<dyn Clock>,
}

impl App {
    /// Open the configured database and build every service on top of it.
    ///
    /// Must be called inside a tokio runtime; the alarm dispatcher captures
    /// the current handle for its timers.
    pub fn open(config: RecollectConfig) -> Result<(Self, UnboundedReceiver<AlarmPayload>)> {
        let db_path = config.resolved_db_path();
        let conn = db::open_database(&db_path)?;
        tracing::info!(db = %db_path.display(), "database ready");
        Self::with_connection(config, conn, Arc::new(SystemClock))
    }

    pub fn with_connection(
        config: RecollectConfig,
        conn: Connection,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, UnboundedReceiver<AlarmPayload>)> {
        let embedder = Arc::new(Embedder::from_config(&config.embedding));
        check_dimensions(&conn, embedder.dimensions())?;

        let db = Arc::new(Mutex::new(conn));

        let memory = Arc::new(MemoryService::new(
            Arc::new(SqliteMemoryStore::new(Arc::clone(&db))),
            embedder,
            SearchParams::from(&config.retrieval),
            Arc::clone(&clock),
        ));

        let (dispatcher, alarm_rx) = TimerDispatcher::new(Arc::clone(&db));
        let reminders = Arc::new(ReminderEngine::new(
            Arc::new(SqliteReminderStore::new(Arc::clone(&db))),
            Arc::new(dispatcher),
            Arc::new(ConsoleNotifier::new()),
            Arc::clone(&clock),
            config.reminders.clone(),
        ));

        let assistant = Arc::new(Assistant::new(
            Arc::clone(&memory),
            Arc::clone(&reminders),
            None,
            Arc::clone(&clock),
            config.reminders.tz(),
        ));

        let app = Self {
            config: Arc::new(config),
            db,
            memory,
            reminders,
            assistant,
            clock,
        };
        Ok((app, alarm_rx))
    }

    pub fn owner(&self) -> &str {
        &self.config.storage.default_owner
    }
}

/// Record the vector width on first use and warn when it later changes.
fn check_dimensions(conn: &Connection, configured: usize) -> Result<()> {
    match db::migrations::get_embedding_dimensions(conn)? {
        None => db::migrations::set_embedding_dimensions(conn, configured)?,
        Some(stored) if stored != configured => {
            tracing::warn!(
                stored,
                configured,
                "embedding dimensions changed; run `recollect backfill` to re-embed memories"
            );
        }
        Some(_) => {}
    }
    Ok(())
}

/// Hand every fired alarm to the engine until the channel closes.
pub async fn run_alarm_loop(engine: Arc<ReminderEngine>, mut rx: UnboundedReceiver<AlarmPayload>) {
    while let Some(payload) = rx.recv().await {
        let engine = Arc::clone(&engine);
        let reminder_id = payload.reminder_id.clone();
        let result = tokio::task::spawn_blocking(move || engine.on_alarm(&payload)).await;
        match result {
            Ok(Ok(FireOutcome::Ignored(reason))) => {
                tracing::debug!(reminder_id = %reminder_id, ?reason, "alarm ignored");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!(reminder_id = %reminder_id, error = %e, "alarm handling failed"),
            Err(e) => tracing::error!(reminder_id = %reminder_id, error = %e, "alarm task panicked"),
        }
    }
    tracing::info!("alarm channel closed");
}

/// Run startup reconciliation off the async threads.
pub async fn reconcile(engine: Arc<ReminderEngine>) -> Result<crate::reminder::ReconcileReport> {
    let report = tokio::task::spawn_blocking(move || engine.reconcile_on_startup()).await??;
    if report.is_noop() {
        tracing::info!("reminders already consistent");
    } else {
        tracing::info!(?report, "reminders reconciled");
    }
    Ok(report)
}
