use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::PayloadLimits;
use crate::error::{Error, ErrorDetails};

/// Identifies the row a payload belongs to, so that decode failures can be traced back to it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PayloadContext<'a> {
    pub dataset_name: &'a str,
    pub datapoint_id: Uuid,
    pub field: &'a str,
}

impl PayloadContext<'_> {
    pub(crate) fn failure(&self, message: String) -> Error {
        Error::new(ErrorDetails::ParseFailure {
            dataset_name: self.dataset_name.to_string(),
            datapoint_id: self.datapoint_id,
            field: self.field.to_string(),
            message,
        })
    }
}

/// Checks an encoded payload against `limits` without recursing into it.
/// Brackets inside string literals do not count towards the depth.
pub(crate) fn check_payload_limits(raw: &str, limits: &PayloadLimits) -> Result<(), String> {
    if raw.len() > limits.max_bytes {
        return Err(format!(
            "payload is {} bytes, which exceeds the limit of {} bytes",
            raw.len(),
            limits.max_bytes
        ));
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for byte in raw.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth > limits.max_depth {
                    return Err(format!(
                        "payload nesting exceeds the limit of {} levels",
                        limits.max_depth
                    ));
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

/// Decodes a string-encoded payload after checking it against `limits`.
pub(crate) fn decode_payload<T: DeserializeOwned>(
    raw: &str,
    limits: &PayloadLimits,
    context: PayloadContext<'_>,
) -> Result<T, Error> {
    check_payload_limits(raw, limits).map_err(|message| context.failure(message))?;
    serde_json::from_str(raw).map_err(|e| context.failure(e.to_string()))
}

/// Like `decode_payload`, but the empty string decodes to `T::default()`.
/// The storage engine writes `""` for payload columns that were never set.
pub(crate) fn decode_defaulted_payload<T: DeserializeOwned + Default>(
    raw: &str,
    limits: &PayloadLimits,
    context: PayloadContext<'_>,
) -> Result<T, Error> {
    if raw.is_empty() {
        return Ok(T::default());
    }
    decode_payload(raw, limits, context)
}

pub(crate) fn encode_payload<T: serde::Serialize>(value: &T, field: &str) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| {
        Error::new(ErrorDetails::Serialization {
            message: format!("Failed to serialize datapoint `{field}`: {e}"),
        })
    })
}
