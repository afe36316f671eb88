use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::PayloadLimits;
use crate::datasets::DatapointKind;
use crate::datasets::payload::{
    PayloadContext, decode_defaulted_payload, decode_payload, encode_payload,
};
use crate::datasets::row::{ChatInferenceDatapointRow, DatapointRow, JsonInferenceDatapointRow};
use crate::error::Error;
use crate::inference::types::{ContentBlockChatOutput, JsonInferenceOutput, StoredInput};
use crate::serde_util::{
    deserialize_optional_string_or_parsed_json, deserialize_string_or_parsed_json,
    storage_timestamp,
};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParsedChatInferenceDatapointRow {
    pub dataset_name: String,
    pub function_name: String,
    pub id: Uuid,
    pub episode_id: Uuid,
    #[serde(deserialize_with = "deserialize_string_or_parsed_json")]
    pub input: StoredInput,
    /// `None` means no output was recorded, which is distinct from an empty output.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_string_or_parsed_json"
    )]
    pub output: Option<Vec<ContentBlockChatOutput>>,
    pub tool_params: Map<String, Value>,
    pub tags: HashMap<String, String>,
    pub auxiliary: Map<String, Value>,
    pub is_deleted: bool,
    #[serde(with = "storage_timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParsedJsonInferenceDatapointRow {
    pub dataset_name: String,
    pub function_name: String,
    pub id: Uuid,
    pub episode_id: Uuid,
    #[serde(deserialize_with = "deserialize_string_or_parsed_json")]
    pub input: StoredInput,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_string_or_parsed_json"
    )]
    pub output: Option<JsonInferenceOutput>,
    pub output_schema: Map<String, Value>,
    pub tags: HashMap<String, String>,
    pub auxiliary: Map<String, Value>,
    pub is_deleted: bool,
    #[serde(with = "storage_timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedDatapointRow {
    Chat(ParsedChatInferenceDatapointRow),
    Json(ParsedJsonInferenceDatapointRow),
}

impl ParsedDatapointRow {
    pub fn kind(&self) -> DatapointKind {
        match self {
            ParsedDatapointRow::Chat(_) => DatapointKind::Chat,
            ParsedDatapointRow::Json(_) => DatapointKind::Json,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ParsedDatapointRow::Chat(row) => row.id,
            ParsedDatapointRow::Json(row) => row.id,
        }
    }

    pub fn dataset_name(&self) -> &str {
        match self {
            ParsedDatapointRow::Chat(row) => &row.dataset_name,
            ParsedDatapointRow::Json(row) => &row.dataset_name,
        }
    }

    pub fn function_name(&self) -> &str {
        match self {
            ParsedDatapointRow::Chat(row) => &row.function_name,
            ParsedDatapointRow::Json(row) => &row.function_name,
        }
    }

    pub fn episode_id(&self) -> Uuid {
        match self {
            ParsedDatapointRow::Chat(row) => row.episode_id,
            ParsedDatapointRow::Json(row) => row.episode_id,
        }
    }

    pub fn input(&self) -> &StoredInput {
        match self {
            ParsedDatapointRow::Chat(row) => &row.input,
            ParsedDatapointRow::Json(row) => &row.input,
        }
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        match self {
            ParsedDatapointRow::Chat(row) => &row.tags,
            ParsedDatapointRow::Json(row) => &row.tags,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            ParsedDatapointRow::Chat(row) => row.is_deleted,
            ParsedDatapointRow::Json(row) => row.is_deleted,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            ParsedDatapointRow::Chat(row) => row.updated_at,
            ParsedDatapointRow::Json(row) => row.updated_at,
        }
    }

    /// Re-encodes the structured payloads into their stored string form.
    pub fn encode(&self) -> Result<DatapointRow, Error> {
        Ok(match self {
            ParsedDatapointRow::Chat(row) => DatapointRow::Chat(ChatInferenceDatapointRow {
                dataset_name: row.dataset_name.clone(),
                function_name: row.function_name.clone(),
                id: row.id,
                episode_id: row.episode_id,
                input: encode_payload(&row.input, "input")?,
                output: row
                    .output
                    .as_ref()
                    .map(|output| encode_payload(output, "output"))
                    .transpose()?,
                tool_params: encode_payload(&row.tool_params, "tool_params")?,
                tags: row.tags.clone(),
                auxiliary: encode_payload(&row.auxiliary, "auxiliary")?,
                is_deleted: row.is_deleted,
                updated_at: row.updated_at,
            }),
            ParsedDatapointRow::Json(row) => DatapointRow::Json(JsonInferenceDatapointRow {
                dataset_name: row.dataset_name.clone(),
                function_name: row.function_name.clone(),
                id: row.id,
                episode_id: row.episode_id,
                input: encode_payload(&row.input, "input")?,
                output: row
                    .output
                    .as_ref()
                    .map(|output| encode_payload(output, "output"))
                    .transpose()?,
                output_schema: encode_payload(&row.output_schema, "output_schema")?,
                tags: row.tags.clone(),
                auxiliary: encode_payload(&row.auxiliary, "auxiliary")?,
                is_deleted: row.is_deleted,
                updated_at: row.updated_at,
            }),
        })
    }
}

impl DatapointRow {
    /// Decodes the string-encoded payloads of this row.
    /// Failures carry the dataset name and id of the row along with the offending field.
    pub fn parse(&self, limits: &PayloadLimits) -> Result<ParsedDatapointRow, Error> {
        let context = |field| PayloadContext {
            dataset_name: self.dataset_name(),
            datapoint_id: self.id(),
            field,
        };
        let parsed = match self {
            DatapointRow::Chat(row) => ParsedDatapointRow::Chat(ParsedChatInferenceDatapointRow {
                dataset_name: row.dataset_name.clone(),
                function_name: row.function_name.clone(),
                id: row.id,
                episode_id: row.episode_id,
                input: decode_payload(&row.input, limits, context("input"))?,
                output: decode_output(row.output.as_deref(), limits, context("output"))?,
                tool_params: decode_defaulted_payload(
                    &row.tool_params,
                    limits,
                    context("tool_params"),
                )?,
                tags: row.tags.clone(),
                auxiliary: decode_defaulted_payload(&row.auxiliary, limits, context("auxiliary"))?,
                is_deleted: row.is_deleted,
                updated_at: row.updated_at,
            }),
            DatapointRow::Json(row) => ParsedDatapointRow::Json(ParsedJsonInferenceDatapointRow {
                dataset_name: row.dataset_name.clone(),
                function_name: row.function_name.clone(),
                id: row.id,
                episode_id: row.episode_id,
                input: decode_payload(&row.input, limits, context("input"))?,
                output: decode_output(row.output.as_deref(), limits, context("output"))?,
                output_schema: decode_defaulted_payload(
                    &row.output_schema,
                    limits,
                    context("output_schema"),
                )?,
                tags: row.tags.clone(),
                auxiliary: decode_defaulted_payload(&row.auxiliary, limits, context("auxiliary"))?,
                is_deleted: row.is_deleted,
                updated_at: row.updated_at,
            }),
        };
        tracing::debug!(
            datapoint_id = %parsed.id(),
            dataset_name = parsed.dataset_name(),
            "Parsed datapoint row"
        );
        Ok(parsed)
    }
}

impl TryFrom<DatapointRow> for ParsedDatapointRow {
    type Error = Error;

    fn try_from(row: DatapointRow) -> Result<Self, Self::Error> {
        row.parse(&PayloadLimits::default())
    }
}

/// `null` and `""` both mean that no output was recorded.
fn decode_output<T: serde::de::DeserializeOwned>(
    raw: Option<&str>,
    limits: &PayloadLimits,
    context: PayloadContext<'_>,
) -> Result<Option<T>, Error> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => decode_payload(raw, limits, context).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorDetails;
    use crate::inference::types::{Role, StoredInputMessageContent, Text};
    use crate::tool::ToolCall;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;
    use tracing_test::traced_test;

    fn chat_row() -> DatapointRow {
        DatapointRow::validate_value(
            DatapointKind::Chat,
            json!({
                "dataset_name": "ds1",
                "function_name": "f1",
                "id": "0196a0e5-9600-7c83-ab3b-da81097b66cd",
                "episode_id": "0196a0e5-9600-7c83-ab3b-daa1a0b9d7e1",
                "input": "{\"messages\":[]}",
                "output": null,
                "tool_params": "{}",
                "tags": {},
                "auxiliary": "{}",
                "is_deleted": false,
                "updated_at": "2024-01-01T00:00:00Z"
            }),
        )
        .unwrap()
    }

    fn with_chat(
        row: DatapointRow,
        edit: impl FnOnce(&mut ChatInferenceDatapointRow),
    ) -> DatapointRow {
        let DatapointRow::Chat(mut row) = row else {
            panic!("Expected a chat row");
        };
        edit(&mut row);
        DatapointRow::Chat(row)
    }

    #[test]
    fn test_parse_chat_row_without_output() {
        let parsed = chat_row().parse(&PayloadLimits::default()).unwrap();
        let ParsedDatapointRow::Chat(parsed) = parsed else {
            panic!("Expected a parsed chat row");
        };
        assert_eq!(parsed.output, None);
        assert_eq!(parsed.input, StoredInput::default());
        assert!(parsed.tool_params.is_empty());
        assert!(parsed.auxiliary.is_empty());
        assert_eq!(
            parsed.updated_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_distinguishes_empty_output() {
        let row = with_chat(chat_row(), |row| row.output = Some("[]".to_string()));
        let ParsedDatapointRow::Chat(parsed) = ParsedDatapointRow::try_from(row).unwrap() else {
            panic!("Expected a parsed chat row");
        };
        assert_eq!(parsed.output, Some(vec![]));

        let row = with_chat(chat_row(), |row| row.output = Some(String::new()));
        let ParsedDatapointRow::Chat(parsed) = ParsedDatapointRow::try_from(row).unwrap() else {
            panic!("Expected a parsed chat row");
        };
        assert_eq!(parsed.output, None);
    }

    #[test]
    fn test_parse_structured_payloads() {
        let row = with_chat(chat_row(), |row| {
            row.input = json!({
                "system": "Be brief",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "Hi"}]}]
            })
            .to_string();
            row.output = Some(json!([{"type": "text", "text": "Hello"}]).to_string());
            row.tool_params =
                json!({"tools_available": [], "parallel_tool_calls": null}).to_string();
            row.auxiliary = String::new();
            row.tags.insert("split".to_string(), "train".to_string());
        });
        let ParsedDatapointRow::Chat(parsed) = ParsedDatapointRow::try_from(row).unwrap() else {
            panic!("Expected a parsed chat row");
        };
        assert_eq!(parsed.input.system, Some(json!("Be brief")));
        assert_eq!(parsed.input.messages[0].role, Role::User);
        assert_eq!(
            parsed.input.messages[0].content,
            vec![StoredInputMessageContent::Text(Text {
                text: "Hi".to_string()
            })]
        );
        assert_eq!(
            parsed.output,
            Some(vec![ContentBlockChatOutput::Text(Text {
                text: "Hello".to_string()
            })])
        );
        assert_eq!(parsed.tool_params["parallel_tool_calls"], Value::Null);
        assert!(parsed.auxiliary.is_empty());
        assert_eq!(parsed.tags.len(), 1);
    }

    #[test]
    #[traced_test]
    fn test_parse_stored_tool_call_round_trip() {
        let row = with_chat(chat_row(), |row| {
            row.input = json!({
                "messages": [{
                    "role": "assistant",
                    "content": [{
                        "type": "tool_call",
                        "name": "search",
                        "arguments": "{\"q\":\"x\"}",
                        "id": "c1"
                    }]
                }]
            })
            .to_string();
        });
        let parsed = row.parse(&PayloadLimits::default()).unwrap();
        assert_eq!(
            parsed.input().messages[0].content,
            vec![StoredInputMessageContent::ToolCall(ToolCall {
                name: "search".to_string(),
                arguments: "{\"q\":\"x\"}".to_string(),
                id: "c1".to_string(),
            })]
        );
        let reparsed = parsed
            .encode()
            .unwrap()
            .parse(&PayloadLimits::default())
            .unwrap();
        assert_eq!(reparsed, parsed);
        assert!(!logs_contain("WARN"));
    }

    proptest! {
        #[test]
        fn test_parse_keeps_tags_key_for_key(
            tags in prop::collection::hash_map(any::<String>(), any::<String>(), 0..16)
        ) {
            let row = with_chat(chat_row(), |row| row.tags = tags.clone());
            let raw = serde_json::to_string(&row).unwrap();
            let row = DatapointRow::validate_tagged(&raw).unwrap();
            let parsed = row.parse(&PayloadLimits::default()).unwrap();
            prop_assert_eq!(parsed.tags(), &tags);
        }
    }

    #[test]
    fn test_parse_keeps_empty_tag_keys() {
        let row = with_chat(chat_row(), |row| {
            row.tags = HashMap::from([
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), String::new()),
                (String::new(), "empty key".to_string()),
            ]);
        });
        let parsed = row.parse(&PayloadLimits::default()).unwrap();
        assert_eq!(parsed.tags(), row.tags());
    }

    #[test]
    fn test_parse_json_row() {
        let row = DatapointRow::validate_value(
            DatapointKind::Json,
            json!({
                "dataset_name": "ds1",
                "function_name": "extract",
                "id": "0196a0e5-9600-7c83-ab3b-da81097b66ce",
                "episode_id": "0196a0e5-9600-7c83-ab3b-daa1a0b9d7e1",
                "input": "{\"messages\":[]}",
                "output": "{\"raw\":\"{\\\"a\\\":1}\",\"parsed\":{\"a\":1}}",
                "output_schema": "{\"type\":\"object\"}",
                "tags": {},
                "auxiliary": "{\"note\":[1,2]}",
                "updated_at": "2024-01-01T00:00:00Z"
            }),
        )
        .unwrap();
        let ParsedDatapointRow::Json(parsed) = row.parse(&PayloadLimits::default()).unwrap() else {
            panic!("Expected a parsed json row");
        };
        assert_eq!(
            parsed.output,
            Some(JsonInferenceOutput {
                raw: Some("{\"a\":1}".to_string()),
                parsed: Some(json!({"a": 1})),
            })
        );
        assert_eq!(parsed.output_schema["type"], "object");
        assert_eq!(parsed.auxiliary["note"], json!([1, 2]));
    }

    #[test]
    fn test_parse_failure_carries_identity() {
        let row = with_chat(chat_row(), |row| row.input = "{\"messages\":".to_string());
        let err = row.parse(&PayloadLimits::default()).unwrap_err();
        match err.get_details() {
            ErrorDetails::ParseFailure {
                dataset_name,
                datapoint_id,
                field,
                ..
            } => {
                assert_eq!(dataset_name, "ds1");
                assert_eq!(*datapoint_id, row.id());
                assert_eq!(field, "input");
            }
            details => panic!("Unexpected error: {details:?}"),
        }

        let row = with_chat(chat_row(), |row| row.tool_params = "[]".to_string());
        let err = row.parse(&PayloadLimits::default()).unwrap_err();
        assert!(matches!(
            err.get_details(),
            ErrorDetails::ParseFailure { field, .. } if field == "tool_params"
        ));

        let row = with_chat(chat_row(), |row| {
            row.output = Some("[{\"type\": \"image\"}]".to_string());
        });
        let err = row.parse(&PayloadLimits::default()).unwrap_err();
        assert!(matches!(
            err.get_details(),
            ErrorDetails::ParseFailure { field, .. } if field == "output"
        ));
    }

    #[test]
    fn test_parse_enforces_payload_limits() {
        let nested = format!("{}{}", "[".repeat(10), "]".repeat(10));
        let row = with_chat(chat_row(), |row| {
            row.auxiliary = format!("{{\"deep\":{nested}}}");
        });
        let limits = PayloadLimits {
            max_depth: 8,
            max_bytes: 1024,
        };
        let err = row.parse(&limits).unwrap_err();
        match err.get_details() {
            ErrorDetails::ParseFailure { field, message, .. } => {
                assert_eq!(field, "auxiliary");
                assert_eq!(message, "payload nesting exceeds the limit of 8 levels");
            }
            details => panic!("Unexpected error: {details:?}"),
        }
        assert!(row.parse(&PayloadLimits::default()).is_ok());
    }

    #[test]
    fn test_parsed_row_serde() {
        let parsed = chat_row().parse(&PayloadLimits::default()).unwrap();
        let value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(value["type"], "chat");
        assert!(value.get("output").is_none());
        let deserialized: ParsedDatapointRow = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(deserialized, parsed);

        // Payloads may also be supplied in their stored string form
        let mut value = value;
        value["input"] = json!("{\"messages\":[]}");
        value["output"] = json!("[]");
        let ParsedDatapointRow::Chat(deserialized) = serde_json::from_value(value).unwrap() else {
            panic!("Expected a parsed chat row");
        };
        assert_eq!(deserialized.input, StoredInput::default());
        assert_eq!(deserialized.output, Some(vec![]));
    }

    #[test]
    fn test_encode_inverts_parse() {
        let row = with_chat(chat_row(), |row| {
            row.output = Some("[]".to_string());
            row.tags.insert("k".to_string(), "v".to_string());
        });
        let parsed = row.parse(&PayloadLimits::default()).unwrap();
        let encoded = parsed.encode().unwrap();
        assert_eq!(encoded.parse(&PayloadLimits::default()).unwrap(), parsed);
        let DatapointRow::Chat(encoded) = encoded else {
            panic!("Expected a chat row");
        };
        assert_eq!(encoded.input, "{\"messages\":[]}");
        assert_eq!(encoded.output.as_deref(), Some("[]"));
        assert_eq!(encoded.tool_params, "{}");
    }
}
