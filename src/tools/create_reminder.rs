//! MCP `create_reminder` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `create_reminder` MCP tool.
///
/// Either `text` (parsed like a spoken request) or `message` plus exactly one
/// of `every_minutes`, `in_minutes`, `at`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateReminderParams {
    #[schemars(
        description = "Free-text request, e.g. 'remind me to drink water every 30 minutes'. Used when 'message' is absent."
    )]
    pub text: Option<String>,

    #[schemars(description = "What to be reminded of")]
    pub message: Option<String>,

    #[schemars(description = "Repeat every N minutes (recurring reminder)")]
    pub every_minutes: Option<u32>,

    #[schemars(description = "Fire once, N minutes from now")]
    pub in_minutes: Option<u32>,

    #[schemars(
        description = "Fire once at this time: RFC 3339 ('2025-06-01T17:00:00Z') or local 'HH:MM'"
    )]
    pub at: Option<String>,

    #[schemars(description = "Owner of the reminder. Defaults to the configured owner.")]
    pub owner: Option<String>,
}
