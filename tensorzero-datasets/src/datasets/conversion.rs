use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::config::PayloadLimits;
use crate::datasets::parsed::{
    ParsedChatInferenceDatapointRow, ParsedDatapointRow, ParsedJsonInferenceDatapointRow,
};
use crate::datasets::payload::{PayloadContext, decode_payload};
use crate::error::Error;
use crate::stored_inference::StoredInference;

/// Where the output of a datapoint created from an inference comes from.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputKind {
    /// The output the inference produced.
    Inherit,
    /// No output.
    None,
    /// A human-provided output, encoded the way the inference's variant stores outputs.
    Demonstration { value: String },
}

/// Converts an inference into a datapoint of `dataset_name` that keeps its output.
/// The datapoint reuses the inference id.
pub fn to_dataset_row(
    inference: StoredInference,
    dataset_name: &str,
    now: DateTime<Utc>,
) -> ParsedDatapointRow {
    let row = match inference {
        StoredInference::Chat(inference) => {
            ParsedDatapointRow::Chat(ParsedChatInferenceDatapointRow {
                dataset_name: dataset_name.to_string(),
                function_name: inference.function_name,
                id: inference.inference_id,
                episode_id: inference.episode_id,
                input: inference.input,
                output: Some(inference.output),
                tool_params: inference.tool_params,
                tags: inference.tags,
                auxiliary: Map::new(),
                is_deleted: false,
                updated_at: now,
            })
        }
        StoredInference::Json(inference) => {
            ParsedDatapointRow::Json(ParsedJsonInferenceDatapointRow {
                dataset_name: dataset_name.to_string(),
                function_name: inference.function_name,
                id: inference.inference_id,
                episode_id: inference.episode_id,
                input: inference.input,
                output: Some(inference.output),
                output_schema: inference.output_schema,
                tags: inference.tags,
                auxiliary: Map::new(),
                is_deleted: false,
                updated_at: now,
            })
        }
    };
    tracing::debug!(
        datapoint_id = %row.id(),
        dataset_name,
        "Converted inference to datapoint"
    );
    row
}

/// Like `to_dataset_row`, but takes the output from `output`.
pub fn to_dataset_row_with_output(
    inference: StoredInference,
    dataset_name: &str,
    output: OutputKind,
    now: DateTime<Utc>,
) -> Result<ParsedDatapointRow, Error> {
    let mut row = to_dataset_row(inference, dataset_name, now);
    match output {
        OutputKind::Inherit => {}
        OutputKind::None => match &mut row {
            ParsedDatapointRow::Chat(row) => row.output = None,
            ParsedDatapointRow::Json(row) => row.output = None,
        },
        OutputKind::Demonstration { value } => {
            let context = PayloadContext {
                dataset_name,
                datapoint_id: row.id(),
                field: "output",
            };
            let limits = PayloadLimits::default();
            match &mut row {
                ParsedDatapointRow::Chat(row) => {
                    row.output = Some(decode_payload(&value, &limits, context)?);
                }
                ParsedDatapointRow::Json(row) => {
                    row.output = Some(decode_payload(&value, &limits, context)?);
                }
            }
        }
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::DatapointKind;
    use crate::error::ErrorDetails;
    use crate::inference::types::{ContentBlockChatOutput, JsonInferenceOutput, Text};
    use chrono::TimeZone;
    use serde_json::json;

    fn chat_inference() -> StoredInference {
        serde_json::from_value(json!({
            "type": "chat",
            "function_name": "f1",
            "variant_name": "v1",
            "input": {
                "system": {"assistant_name": "Dr. Mehta"},
                "messages": [{"role": "user", "content": [{"type": "text", "text": "Hi"}]}]
            },
            "output": [{"type": "text", "text": "Hello"}],
            "timestamp": "2024-01-01T00:00:00Z",
            "episode_id": "0196a0e5-9600-7c83-ab3b-daa1a0b9d7e1",
            "inference_id": "0196a0e5-9600-7c83-ab3b-da81097b66cd",
            "tool_params": {"tools_available": [{"name": "search"}]},
            "tags": {"user": "alice", "split": "train"}
        }))
        .unwrap()
    }

    fn json_inference() -> StoredInference {
        serde_json::from_value(json!({
            "type": "json",
            "function_name": "extract",
            "variant_name": "v1",
            "input": {"messages": []},
            "output": {"raw": "{\"a\":1}", "parsed": {"a": 1}},
            "timestamp": "2024-01-01T00:00:00Z",
            "episode_id": "0196a0e5-9600-7c83-ab3b-daa1a0b9d7e1",
            "inference_id": "0196a0e5-9600-7c83-ab3b-da81097b66ce",
            "output_schema": {"type": "object"}
        }))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_to_dataset_row_chat() {
        let inference = chat_inference();
        let StoredInference::Chat(source) = inference.clone() else {
            panic!("Expected a chat inference");
        };
        let row = to_dataset_row(inference, "ds1", now());
        let ParsedDatapointRow::Chat(row) = row else {
            panic!("Expected a chat row");
        };
        assert_eq!(row.dataset_name, "ds1");
        assert_eq!(row.id, source.inference_id);
        assert_eq!(row.episode_id, source.episode_id);
        assert_eq!(row.input, source.input);
        assert_eq!(row.tags, source.tags);
        assert_eq!(row.tool_params, source.tool_params);
        assert_eq!(row.output, Some(source.output));
        assert!(row.auxiliary.is_empty());
        assert!(!row.is_deleted);
        assert_eq!(row.updated_at, now());
    }

    #[test]
    fn test_to_dataset_row_carries_variant_field() {
        let chat = serde_json::to_value(to_dataset_row(chat_inference(), "ds1", now())).unwrap();
        assert_eq!(chat["type"], "chat");
        assert!(chat.get("tool_params").is_some());
        assert!(chat.get("output_schema").is_none());

        let json = serde_json::to_value(to_dataset_row(json_inference(), "ds1", now())).unwrap();
        assert_eq!(json["type"], "json");
        assert!(json.get("output_schema").is_some());
        assert!(json.get("tool_params").is_none());
        assert_eq!(json["output_schema"], json!({"type": "object"}));
    }

    #[test]
    fn test_converted_row_survives_storage() {
        let row = to_dataset_row(json_inference(), "ds1", now());
        let stored = row.encode().unwrap();
        assert_eq!(stored.kind(), DatapointKind::Json);
        let raw = serde_json::to_string(&stored).unwrap();
        let revalidated = crate::datasets::DatapointRow::validate_tagged(&raw).unwrap();
        assert_eq!(revalidated.parse(&PayloadLimits::default()).unwrap(), row);
    }

    #[test]
    fn test_to_dataset_row_with_output() {
        let row =
            to_dataset_row_with_output(chat_inference(), "ds1", OutputKind::None, now()).unwrap();
        let ParsedDatapointRow::Chat(row) = row else {
            panic!("Expected a chat row");
        };
        assert_eq!(row.output, None);

        let row = to_dataset_row_with_output(
            chat_inference(),
            "ds1",
            OutputKind::Demonstration {
                value: json!([{"type": "text", "text": "Better"}]).to_string(),
            },
            now(),
        )
        .unwrap();
        let ParsedDatapointRow::Chat(row) = row else {
            panic!("Expected a chat row");
        };
        assert_eq!(
            row.output,
            Some(vec![ContentBlockChatOutput::Text(Text {
                text: "Better".to_string()
            })])
        );

        let row = to_dataset_row_with_output(
            json_inference(),
            "ds1",
            OutputKind::Demonstration {
                value: json!({"raw": "{\"a\":2}", "parsed": {"a": 2}}).to_string(),
            },
            now(),
        )
        .unwrap();
        let ParsedDatapointRow::Json(row) = row else {
            panic!("Expected a json row");
        };
        assert_eq!(
            row.output,
            Some(JsonInferenceOutput {
                raw: Some("{\"a\":2}".to_string()),
                parsed: Some(json!({"a": 2})),
            })
        );
    }

    #[test]
    fn test_demonstration_must_fit_variant() {
        let err = to_dataset_row_with_output(
            json_inference(),
            "ds1",
            OutputKind::Demonstration {
                value: json!([{"type": "text", "text": "chat output"}]).to_string(),
            },
            now(),
        )
        .unwrap_err();
        match err.get_details() {
            ErrorDetails::ParseFailure {
                dataset_name,
                field,
                ..
            } => {
                assert_eq!(dataset_name, "ds1");
                assert_eq!(field, "output");
            }
            details => panic!("Unexpected error: {details:?}"),
        }
    }

    #[test]
    fn test_output_kind_wire_format() {
        let output: OutputKind = serde_json::from_value(json!({"type": "inherit"})).unwrap();
        assert_eq!(output, OutputKind::Inherit);
        let output: OutputKind =
            serde_json::from_value(json!({"type": "demonstration", "value": "[]"})).unwrap();
        assert_eq!(
            output,
            OutputKind::Demonstration {
                value: "[]".to_string()
            }
        );
    }
}
