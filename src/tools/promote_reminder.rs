use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PromoteReminderParams {
    #[schemars(description = "ID of a one-time reminder, active or already fired")]
    pub reminder_id: String,

    #[schemars(
        description = "Repeat interval in minutes. Defaults to the original offset of an 'in N minutes' reminder, else the configured default."
    )]
    pub interval_minutes: Option<u32>,
}
