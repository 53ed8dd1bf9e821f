//! MCP `ask` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `ask` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    /// Anything the user said: a fact, a question, a reminder, or a cancel.
    #[schemars(
        description = "What the user said, e.g. 'I parked in lot B5', 'where is my car?', 'remind me to call mom at 5pm', 'stop the water reminder'"
    )]
    pub text: String,

    #[schemars(description = "Owner the utterance belongs to. Defaults to the configured owner.")]
    pub owner: Option<String>,
}
