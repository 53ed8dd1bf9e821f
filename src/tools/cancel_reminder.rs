//! MCP `cancel_reminder` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Exactly one of `reminder_id`, `topic`, or `all` selects what to cancel.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CancelReminderParams {
    #[schemars(description = "ID of the reminder to cancel")]
    pub reminder_id: Option<String>,

    #[schemars(description = "Cancel active reminders whose message contains this text")]
    pub topic: Option<String>,

    #[schemars(description = "Cancel every active reminder of the owner")]
    pub all: Option<bool>,

    #[schemars(description = "Owner for topic/all. Defaults to the configured owner.")]
    pub owner: Option<String>,
}
