use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ForgetMemoryParams {
    #[schemars(description = "ID of the memory to forget. Omit and set all=true to forget everything.")]
    pub memory_id: Option<String>,

    #[schemars(description = "Forget every memory of the owner. Requires confirm=true.")]
    pub all: Option<bool>,

    #[schemars(description = "Safety gate for all=true")]
    pub confirm: Option<bool>,

    #[schemars(description = "Owner for all=true. Defaults to the configured owner.")]
    pub owner: Option<String>,
}
