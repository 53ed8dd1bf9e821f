use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListRemindersParams {
    #[schemars(description = "Include retired one-time reminders (default: false)")]
    pub include_retired: Option<bool>,

    #[schemars(description = "Owner whose reminders to list. Defaults to the configured owner.")]
    pub owner: Option<String>,
}
