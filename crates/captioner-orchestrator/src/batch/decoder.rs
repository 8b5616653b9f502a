//! Request decoding for batch processing.
//!
//! Expected format:
//! ```json
//! {"calls": [["gs://bucket/a.jpg", "describe"], ["https://ex/b.png", "count objects"]]}
//! ```

use crate::batch::error::BatchError;
use crate::batch::types::{Batch, WorkItem};
use serde_json::Value;
use tracing::debug;

/// Name of the field holding the batch entries.
pub const CALLS_FIELD: &str = "calls";

/// Decode a raw request body.
///
/// # Errors
/// Returns `BatchError::MalformedBatch` if the body is empty, is not JSON,
/// or does not have the expected shape.
pub fn decode(body: &[u8]) -> Result<Batch, BatchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(BatchError::malformed("request body is empty"));
    }

    let json: Value = serde_json::from_slice(body)
        .map_err(|e| BatchError::malformed(format!("invalid JSON: {}", e)))?;

    decode_value(&json)
}

/// Decode a request body held as text.
///
/// # Errors
/// Same as [`decode`].
pub fn decode_str(body: &str) -> Result<Batch, BatchError> {
    decode(body.as_bytes())
}

/// Decode an already-parsed request.
///
/// Every entry of `calls` must be a two-element array. Elements are coerced
/// to text; locators are not checked for URI syntax.
///
/// # Errors
/// Returns `BatchError::MalformedBatch` on any deviation from that shape.
pub fn decode_value(json: &Value) -> Result<Batch, BatchError> {
    let root = json
        .as_object()
        .ok_or_else(|| BatchError::malformed("request root must be an object"))?;

    let calls = root
        .get(CALLS_FIELD)
        .ok_or_else(|| BatchError::malformed(format!("missing '{}' field", CALLS_FIELD)))?
        .as_array()
        .ok_or_else(|| BatchError::malformed(format!("'{}' must be an array", CALLS_FIELD)))?;

    let mut items = Vec::with_capacity(calls.len());

    for (index, call) in calls.iter().enumerate() {
        let pair = match call.as_array() {
            Some(pair) if pair.len() == 2 => pair,
            Some(other) => {
                return Err(BatchError::malformed(format!(
                    "entry {} must be a [locator, instruction] pair, got {} elements",
                    index,
                    other.len()
                )));
            }
            None => {
                return Err(BatchError::malformed(format!(
                    "entry {} must be a [locator, instruction] pair",
                    index
                )));
            }
        };

        let item = WorkItem::new(coerce_text(&pair[0]), coerce_text(&pair[1]));
        debug!(
            index = index,
            locator = %item.locator(),
            instruction = %item.instruction(),
            "Decoded batch entry"
        );
        items.push(item);
    }

    Ok(Batch::new(items))
}

/// Strings are taken verbatim; anything else uses its compact JSON rendering.
fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
