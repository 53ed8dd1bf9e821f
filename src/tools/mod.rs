pub mod ask;
pub mod cancel_reminder;
pub mod create_reminder;
pub mod forget_memory;
pub mod list_reminders;
pub mod promote_reminder;
pub mod save_memory;
pub mod search_memory;
pub mod snooze_reminder;

use ask::AskParams;
use cancel_reminder::CancelReminderParams;
use chrono::{DateTime, NaiveTime, Utc};
use create_reminder::CreateReminderParams;
use forget_memory::ForgetMemoryParams;
use list_reminders::ListRemindersParams;
use promote_reminder::PromoteReminderParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use save_memory::SaveMemoryParams;
use search_memory::SearchMemoryParams;
use serde::Serialize;
use snooze_reminder::SnoozeReminderParams;
use std::sync::Arc;

use recollect::app::App;
use recollect::parser::{parse_reminder, ReminderParse};
use recollect::reminder::schedule::next_occurrence;
use recollect::reminder::{NewReminder, ReminderEngine};

/// The Recollect MCP tool handler. Holds the wired services and exposes all
/// MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct RecollectTools {
    tool_router: ToolRouter<Self>,
    app: Arc<App>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

/// Run a synchronous reminder-engine call off the async threads.
async fn with_engine<T, F>(engine: &Arc<ReminderEngine>, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&ReminderEngine) -> Result<T, recollect::reminder::ReminderError> + Send + 'static,
{
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| format!("reminder task failed: {e}"))?
        .map_err(|e| e.to_string())
}

#[tool_router]
impl RecollectTools {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            app,
        }
    }

    fn owner(&self, owner: Option<String>) -> String {
        owner.unwrap_or_else(|| self.app.owner().to_string())
    }

    /// Turn structured or free-text parameters into a reminder request.
    fn new_reminder(&self, params: CreateReminderParams) -> Result<NewReminder, String> {
        let owner = self.owner(params.owner);
        let now = self.app.clock.now();
        let tz = self.app.config.reminders.tz();

        let Some(message) = params.message else {
            let text = params
                .text
                .ok_or("either 'message' or 'text' is required")?;
            return match parse_reminder(&text, now, tz) {
                ReminderParse::Parsed(request) => Ok(request.into_new_reminder(&owner)),
                ReminderParse::Malformed(reason) => Err(reason),
                ReminderParse::NotAReminder => Err("no time found in text".into()),
            };
        };

        match (params.every_minutes, params.in_minutes, params.at) {
            (Some(every), None, None) => Ok(NewReminder::recurring(&owner, &message, every)),
            (None, Some(after), None) => Ok(NewReminder::after(&owner, &message, after)),
            (None, None, Some(at)) => {
                let when = parse_at(&at, now, tz)?;
                Ok(NewReminder::at(&owner, &message, when))
            }
            _ => Err("give exactly one of 'every_minutes', 'in_minutes', 'at'".into()),
        }
    }

    /// Save a fact for later recall.
    #[tool(description = "Remember a fact the user stated, e.g. 'I parked in lot B5' or 'the wifi password is hunter2'.")]
    async fn save_memory(
        &self,
        Parameters(params): Parameters<SaveMemoryParams>,
    ) -> Result<String, String> {
        if params.content.trim().is_empty() {
            return Err("content must not be empty".into());
        }
        let owner = self.owner(params.owner);
        tracing::info!(content_len = params.content.len(), owner = %owner, "save_memory called");

        let record = self
            .app
            .memory
            .remember(&owner, &params.content)
            .await
            .map_err(|e| format!("save failed: {e}"))?;

        Ok(serde_json::json!({
            "id": record.id,
            "content": record.content,
            "created_at": record.created_at,
            "embedding_model": record.embedding_model,
        })
        .to_string())
    }

    /// Answer a question from saved facts.
    #[tool(description = "Search saved facts with a natural language question. Returns ranked memories and the strategy used (semantic, keyword, recent_fallback, nothing).")]
    async fn search_memory(
        &self,
        Parameters(params): Parameters<SearchMemoryParams>,
    ) -> Result<String, String> {
        let owner = self.owner(params.owner);
        tracing::info!(query = %params.query, owner = %owner, "search_memory called");

        let response = self
            .app
            .memory
            .recall(&owner, &params.query)
            .await
            .map_err(|e| format!("search failed: {e}"))?;
        to_json(&response)
    }

    #[tool(description = "Delete one memory by ID, or every memory of the owner with all=true and confirm=true.")]
    async fn forget_memory(
        &self,
        Parameters(params): Parameters<ForgetMemoryParams>,
    ) -> Result<String, String> {
        match (params.memory_id, params.all.unwrap_or(false)) {
            (Some(id), false) => {
                let deleted = self
                    .app
                    .memory
                    .forget(&id)
                    .map_err(|e| format!("forget failed: {e}"))?;
                Ok(serde_json::json!({ "id": id, "deleted": deleted }).to_string())
            }
            (None, true) => {
                if params.confirm != Some(true) {
                    return Err("all=true requires confirm=true".into());
                }
                let owner = self.owner(params.owner);
                let deleted = self
                    .app
                    .memory
                    .forget_all(&owner)
                    .map_err(|e| format!("forget failed: {e}"))?;
                tracing::info!(owner = %owner, deleted, "forgot all memories");
                Ok(serde_json::json!({ "owner": owner, "deleted": deleted }).to_string())
            }
            _ => Err("give either 'memory_id' or all=true".into()),
        }
    }

    /// Schedule a one-time or recurring reminder.
    #[tool(description = "Create a reminder from free text ('remind me to stretch every 45 minutes') or from 'message' plus one of every_minutes / in_minutes / at. An active reminder with the same message is replaced.")]
    async fn create_reminder(
        &self,
        Parameters(params): Parameters<CreateReminderParams>,
    ) -> Result<String, String> {
        let new = self.new_reminder(params)?;
        tracing::info!(kind = %new.kind, owner = %new.owner_id, "create_reminder called");

        let reminder = with_engine(&self.app.reminders, move |engine| engine.create(new)).await?;
        to_json(&reminder)
    }

    #[tool(description = "List the owner's reminders, soonest first.")]
    async fn list_reminders(
        &self,
        Parameters(params): Parameters<ListRemindersParams>,
    ) -> Result<String, String> {
        let owner = self.owner(params.owner);
        let include_retired = params.include_retired.unwrap_or(false);
        let reminders = with_engine(&self.app.reminders, move |engine| {
            if include_retired {
                engine.list(&owner)
            } else {
                engine.list_active(&owner)
            }
        })
        .await?;
        to_json(&reminders)
    }

    /// Cancel by id, by topic, or everything.
    #[tool(description = "Cancel a reminder by ID, every active reminder whose message contains 'topic', or all active reminders with all=true.")]
    async fn cancel_reminder(
        &self,
        Parameters(params): Parameters<CancelReminderParams>,
    ) -> Result<String, String> {
        let owner = self.owner(params.owner);
        match (params.reminder_id, params.topic, params.all.unwrap_or(false)) {
            (Some(id), None, false) => {
                let key = id.clone();
                let cancelled = with_engine(&self.app.reminders, move |engine| engine.cancel(&key)).await?;
                Ok(serde_json::json!({ "id": id, "cancelled": cancelled }).to_string())
            }
            (None, Some(topic), false) => {
                let needle = topic.clone();
                let cancelled = with_engine(&self.app.reminders, move |engine| {
                    engine.cancel_matching(&owner, &needle)
                })
                .await?;
                Ok(serde_json::json!({ "topic": topic, "cancelled": cancelled }).to_string())
            }
            (None, None, true) => {
                let count = with_engine(&self.app.reminders, move |engine| engine.cancel_all(&owner)).await?;
                Ok(serde_json::json!({ "cancelled": count }).to_string())
            }
            _ => Err("give exactly one of 'reminder_id', 'topic', all=true".into()),
        }
    }

    #[tool(description = "Push a reminder's next alarm to N minutes from now. Reactivates a fired one-time reminder.")]
    async fn snooze_reminder(
        &self,
        Parameters(params): Parameters<SnoozeReminderParams>,
    ) -> Result<String, String> {
        let minutes = params
            .minutes
            .unwrap_or_else(|| self.app.reminders.default_snooze_minutes());
        let id = params.reminder_id;
        let key = id.clone();
        match with_engine(&self.app.reminders, move |engine| engine.snooze(&key, minutes)).await? {
            Some(reminder) => to_json(&reminder),
            None => Err(format!("reminder not found: {id}")),
        }
    }

    #[tool(description = "Turn a one-time reminder (active or already fired) into a recurring one.")]
    async fn promote_reminder(
        &self,
        Parameters(params): Parameters<PromoteReminderParams>,
    ) -> Result<String, String> {
        let interval = params.interval_minutes;
        let id = params.reminder_id;
        let reminder = with_engine(&self.app.reminders, move |engine| {
            engine.promote_to_recurring(&id, interval)
        })
        .await?;
        to_json(&reminder)
    }

    /// Route free text the way a voice assistant would.
    #[tool(description = "Handle anything the user said: saves facts, answers questions, sets or cancels reminders. Returns the structured reply and a 'message' to show the user.")]
    async fn ask(&self, Parameters(params): Parameters<AskParams>) -> Result<String, String> {
        let owner = self.owner(params.owner);
        tracing::info!(text_len = params.text.len(), owner = %owner, "ask called");

        let reply = self
            .app
            .assistant
            .handle(&owner, &params.text)
            .await
            .map_err(|e| format!("ask failed: {e}"))?;

        let mut body = serde_json::to_value(&reply).map_err(|e| format!("serialization failed: {e}"))?;
        body["message"] = serde_json::Value::String(reply.message());
        Ok(body.to_string())
    }
}

/// `at` accepts RFC 3339, or a local `HH:MM` meaning its next occurrence.
fn parse_at(at: &str, now: DateTime<Utc>, tz: chrono_tz::Tz) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(at) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveTime::parse_from_str(at.trim(), "%H:%M")
        .map(|time| next_occurrence(time, now, tz))
        .map_err(|_| format!("invalid time '{at}': use RFC 3339 or HH:MM"))
}

#[tool_handler]
impl ServerHandler for RecollectTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Recollect is a personal memory assistant. Use save_memory for facts the user \
                 states, search_memory to answer questions about them, and create_reminder / \
                 cancel_reminder for time-based reminders. `ask` routes free text automatically."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn at_accepts_rfc3339() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let when = parse_at("2025-06-01T17:00:00+02:00", now, chrono_tz::UTC).unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn at_accepts_local_clock_time() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let when = parse_at("09:30", now, chrono_tz::UTC).unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap());
    }

    #[test]
    fn at_rejects_garbage() {
        let now = Utc::now();
        assert!(parse_at("tomorrow-ish", now, chrono_tz::UTC).is_err());
    }
}
