use anyhow::{anyhow, Result};
use jsonschema::JSONSchema;
use serde_json::Value;

/// Compile the request schema included at build time
pub fn load_schema() -> Result<JSONSchema> {
    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/analysis.json"));
    let schema: Value = serde_json::from_str(SCHEMA)?;
    JSONSchema::compile(&schema).map_err(|e| anyhow!("Invalid request schema: {e}"))
}
