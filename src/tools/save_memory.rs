//! MCP `save_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SaveMemoryParams {
    #[schemars(description = "The fact to remember, in natural language")]
    pub content: String,

    #[schemars(description = "Owner of the memory. Defaults to the configured owner.")]
    pub owner: Option<String>,
}
