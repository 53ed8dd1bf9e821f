//! Routes a free-text utterance to the memory service or the reminder engine.
//!
//! An external [`IntentService`] is used when configured; any failure from it
//! degrades to the rule-based parsers for that step.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;

use crate::clock::Clock;
use crate::memory::recall::{MemoryService, RecallResponse, RecallStrategy};
use crate::parser::intent::strip_save_prefix;
use crate::parser::{self, CancelTarget, Intent, ReminderParse};
use crate::reminder::{Reminder, ReminderEngine};

/// Classifier and extractors; normally a remote NLP service.
pub trait IntentService: Send + Sync {
    fn classify(&self, text: &str) -> Result<Intent>;

    fn parse_reminder(&self, text: &str, now: DateTime<Utc>, tz: Tz) -> Result<ReminderParse>;

    fn parse_cancel_target(&self, text: &str) -> Result<CancelTarget>;
}

/// [`IntentService`] backed by the regex parsers. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedIntents;

impl IntentService for RuleBasedIntents {
    fn classify(&self, text: &str) -> Result<Intent> {
        Ok(parser::classify_intent(text))
    }

    fn parse_reminder(&self, text: &str, now: DateTime<Utc>, tz: Tz) -> Result<ReminderParse> {
        Ok(parser::parse_reminder(text, now, tz))
    }

    fn parse_cancel_target(&self, text: &str) -> Result<CancelTarget> {
        Ok(parser::parse_cancel_target(text))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Saved { id: String, content: String },
    Found { recall: RecallResponse },
    NothingFound,
    ReminderSet { reminder: Reminder },
    CouldNotParseTime { reason: String },
    CancelledAll { count: usize },
    CancelledMatching { topic: String, reminders: Vec<Reminder> },
    NothingToCancel { topic: String },
    ClarifyCancel,
    Unclear,
}

impl Reply {
    /// User-facing text.
    pub fn message(&self) -> String {
        match self {
            Reply::Saved { content, .. } => format!("Got it, I'll remember: {content}"),
            Reply::Found { recall } => {
                let lines: Vec<String> = recall
                    .results
                    .iter()
                    .map(|r| format!("- {}", r.content))
                    .collect();
                let lead = match recall.strategy {
                    RecallStrategy::RecentFallback => "I'm not sure, but here's what you've told me recently:",
                    _ => "Here's what I found:",
                };
                format!("{lead}\n{}", lines.join("\n"))
            }
            Reply::NothingFound => "I couldn't find anything about that.".into(),
            Reply::ReminderSet { reminder } => match reminder.interval_minutes {
                Some(m) if reminder.kind == crate::reminder::ReminderKind::Recurring => {
                    format!("I'll remind you to {} every {m} minutes.", lower_first(&reminder.message))
                }
                _ => format!(
                    "I'll remind you to {} at {}.",
                    lower_first(&reminder.message),
                    reminder.next_trigger.format("%Y-%m-%d %H:%M UTC")
                ),
            },
            Reply::CouldNotParseTime { reason } => {
                format!("I couldn't understand the time ({reason}). When should I remind you?")
            }
            Reply::CancelledAll { count: 0 } => "You don't have any active reminders.".into(),
            Reply::CancelledAll { count } => format!("Cancelled {count} reminder(s)."),
            Reply::CancelledMatching { reminders, .. } => {
                let names: Vec<&str> = reminders.iter().map(|r| r.message.as_str()).collect();
                format!("Cancelled: {}", names.join(", "))
            }
            Reply::NothingToCancel { topic } => {
                format!("I couldn't find an active reminder about \"{topic}\".")
            }
            Reply::ClarifyCancel => "Which reminder should I cancel?".into(),
            Reply::Unclear => {
                "Sorry, I didn't catch that. You can tell me something to remember, ask me a question, or set a reminder."
                    .into()
            }
        }
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct Assistant {
    memory: Arc<MemoryService>,
    reminders: Arc<ReminderEngine>,
    intents: Option<Arc<dyn IntentService>>,
    rules: RuleBasedIntents,
    clock: Arc<dyn Clock>,
    tz: Tz,
}

impl Assistant {
    pub fn new(
        memory: Arc<MemoryService>,
        reminders: Arc<ReminderEngine>,
        intents: Option<Arc<dyn IntentService>>,
        clock: Arc<dyn Clock>,
        tz: Tz,
    ) -> Self {
        Self {
            memory,
            reminders,
            intents,
            rules: RuleBasedIntents,
            clock,
            tz,
        }
    }

    /// Run `f` against the external service, falling back to the rules.
    fn with_fallback<T>(&self, step: &str, f: impl Fn(&dyn IntentService) -> Result<T>) -> Result<T> {
        if let Some(service) = &self.intents {
            match f(service.as_ref()) {
                Ok(value) => return Ok(value),
                Err(e) => tracing::warn!(step, error = %e, "intent service failed, using rules"),
            }
        }
        f(&self.rules)
    }

    pub async fn handle(&self, owner_id: &str, text: &str) -> Result<Reply> {
        let intent = self.with_fallback("classify", |s| s.classify(text))?;
        tracing::debug!(owner_id, ?intent, "classified utterance");

        match intent {
            Intent::Save => {
                let record = self.memory.remember(owner_id, strip_save_prefix(text)).await?;
                Ok(Reply::Saved {
                    id: record.id,
                    content: record.content,
                })
            }
            Intent::Search => {
                let recall = self.memory.recall(owner_id, text).await?;
                if recall.results.is_empty() {
                    Ok(Reply::NothingFound)
                } else {
                    Ok(Reply::Found { recall })
                }
            }
            Intent::Reminder => {
                let now = self.clock.now();
                let parsed = self.with_fallback("parse_reminder", |s| s.parse_reminder(text, now, self.tz))?;
                match parsed {
                    ReminderParse::Parsed(request) => {
                        let reminder = self.reminders.create(request.into_new_reminder(owner_id))?;
                        Ok(Reply::ReminderSet { reminder })
                    }
                    ReminderParse::Malformed(reason) => Ok(Reply::CouldNotParseTime { reason }),
                    ReminderParse::NotAReminder => Ok(Reply::CouldNotParseTime {
                        reason: "no time was given".into(),
                    }),
                }
            }
            Intent::CancelAll => {
                let count = self.reminders.cancel_all(owner_id)?;
                Ok(Reply::CancelledAll { count })
            }
            Intent::CancelSpecific => {
                match self.with_fallback("parse_cancel_target", |s| s.parse_cancel_target(text))? {
                    CancelTarget::All => {
                        let count = self.reminders.cancel_all(owner_id)?;
                        Ok(Reply::CancelledAll { count })
                    }
                    CancelTarget::Topic(topic) => {
                        let reminders = self.reminders.cancel_matching(owner_id, &topic)?;
                        if reminders.is_empty() {
                            Ok(Reply::NothingToCancel { topic })
                        } else {
                            Ok(Reply::CancelledMatching { topic, reminders })
                        }
                    }
                    CancelTarget::NoMatch => Ok(Reply::ClarifyCancel),
                }
            }
            Intent::Unclear => Ok(Reply::Unclear),
        }
    }
}
