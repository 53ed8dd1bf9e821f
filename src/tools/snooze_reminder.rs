use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SnoozeReminderParams {
    #[schemars(description = "ID of the reminder to snooze")]
    pub reminder_id: String,

    #[schemars(description = "Minutes from now until it fires again. Defaults to the configured snooze.")]
    pub minutes: Option<u32>,
}
