//! MCP `search_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_memory` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchMemoryParams {
    /// Natural language question or keywords.
    #[schemars(description = "Natural language question, e.g. 'where did I park?'")]
    pub query: String,

    #[schemars(description = "Owner whose memories to search. Defaults to the configured owner.")]
    pub owner: Option<String>,
}
