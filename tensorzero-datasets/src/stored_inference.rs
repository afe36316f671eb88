use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::datasets::DatapointKind;
use crate::inference::types::{ContentBlockChatOutput, JsonInferenceOutput, StoredInput};
use crate::serde_util::deserialize_string_or_parsed_json;

/// An executed inference as it was logged, the source record for a new datapoint.
/// Payload fields may arrive either decoded or as the JSON strings the inference tables store.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredInference {
    Chat(StoredChatInference),
    Json(StoredJsonInference),
}

impl std::fmt::Display for StoredInference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{json}")
    }
}

impl StoredInference {
    pub fn kind(&self) -> DatapointKind {
        match self {
            StoredInference::Chat(_) => DatapointKind::Chat,
            StoredInference::Json(_) => DatapointKind::Json,
        }
    }

    pub fn inference_id(&self) -> Uuid {
        match self {
            StoredInference::Chat(inference) => inference.inference_id,
            StoredInference::Json(inference) => inference.inference_id,
        }
    }

    pub fn function_name(&self) -> &str {
        match self {
            StoredInference::Chat(inference) => &inference.function_name,
            StoredInference::Json(inference) => &inference.function_name,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StoredChatInference {
    pub function_name: String,
    pub variant_name: String,
    #[serde(deserialize_with = "deserialize_string_or_parsed_json")]
    pub input: StoredInput,
    #[serde(deserialize_with = "deserialize_string_or_parsed_json")]
    pub output: Vec<ContentBlockChatOutput>,
    pub timestamp: DateTime<Utc>,
    pub episode_id: Uuid,
    pub inference_id: Uuid,
    #[serde(default, deserialize_with = "deserialize_string_or_parsed_json")]
    pub tool_params: Map<String, Value>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StoredJsonInference {
    pub function_name: String,
    pub variant_name: String,
    #[serde(deserialize_with = "deserialize_string_or_parsed_json")]
    pub input: StoredInput,
    #[serde(deserialize_with = "deserialize_string_or_parsed_json")]
    pub output: JsonInferenceOutput,
    pub timestamp: DateTime<Utc>,
    pub episode_id: Uuid,
    pub inference_id: Uuid,
    #[serde(deserialize_with = "deserialize_string_or_parsed_json")]
    pub output_schema: Map<String, Value>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_stored_inference() {
        let inference: StoredInference = serde_json::from_value(json!({
            "type": "chat",
            "function_name": "f1",
            "variant_name": "v1",
            "input": {"messages": []},
            "output": [{"type": "text", "text": "Hello"}],
            "timestamp": "2024-01-01T00:00:00Z",
            "episode_id": "0196a0e5-9600-7c83-ab3b-daa1a0b9d7e1",
            "inference_id": "0196a0e5-9600-7c83-ab3b-da81097b66cd"
        }))
        .unwrap();
        assert_eq!(inference.kind(), DatapointKind::Chat);
        assert_eq!(inference.function_name(), "f1");
        let StoredInference::Chat(chat) = &inference else {
            panic!("Expected a chat inference");
        };
        assert!(chat.tool_params.is_empty());
        assert!(chat.tags.is_empty());
        assert!(inference.to_string().contains("\"variant_name\": \"v1\""));

        // Json inferences must say what schema their output was validated against
        let err = serde_json::from_value::<StoredInference>(json!({
            "type": "json",
            "function_name": "extract",
            "variant_name": "v1",
            "input": {"messages": []},
            "output": {"raw": "{}", "parsed": {}},
            "timestamp": "2024-01-01T00:00:00Z",
            "episode_id": "0196a0e5-9600-7c83-ab3b-daa1a0b9d7e1",
            "inference_id": "0196a0e5-9600-7c83-ab3b-da81097b66cd"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("missing field `output_schema`"), "{err}");
    }

    #[test]
    fn test_deserialize_stored_inference_from_storage_strings() {
        let inference: StoredInference = serde_json::from_value(json!({
            "type": "json",
            "function_name": "extract",
            "variant_name": "v1",
            "input": "{\"messages\":[]}",
            "output": "{\"raw\":\"{}\",\"parsed\":{}}",
            "timestamp": "2024-01-01T00:00:00Z",
            "episode_id": "0196a0e5-9600-7c83-ab3b-daa1a0b9d7e1",
            "inference_id": "0196a0e5-9600-7c83-ab3b-da81097b66cd",
            "output_schema": "{\"type\":\"object\"}"
        }))
        .unwrap();
        let StoredInference::Json(json_inference) = inference else {
            panic!("Expected a json inference");
        };
        assert_eq!(json_inference.input, StoredInput::default());
        assert_eq!(json_inference.output.parsed, Some(json!({})));
        assert_eq!(json_inference.output_schema["type"], "object");
    }
}
