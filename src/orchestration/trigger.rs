use super::partitioner;
use crate::error::{MigrationError, Result};
use crate::models::Bounds;
use serde::Deserialize;

/// Body of a migration trigger. Anything else in the payload (an API key, say) is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerPayload {
    division_codes: Vec<String>,
    chapters: Vec<String>,
}

/// Parse and validate a trigger payload such as
/// `{"divisionCodes": ["000","111"], "chapters": ["11","15"]}`
pub fn parse_trigger(payload: &str) -> Result<Bounds> {
    let payload: TriggerPayload = serde_json::from_str(payload)
        .map_err(|e| MigrationError::InvalidInput(format!("unparseable trigger payload: {e}")))?;

    let bounds = Bounds::new(payload.division_codes, payload.chapters);
    partitioner::flatten(&bounds)?;
    Ok(bounds)
}
