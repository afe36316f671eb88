use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::inference::types::{Role, Text, Thought};
use crate::tool::{ToolCall, ToolResult};

/// The input type that we directly store alongside inferences and datapoints:
/// the conversation (or prompt context) a function was called with.
///
/// `StoredInputMessage` accepts legacy data formats from the database
/// (see `LegacyStoredInputMessage`).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct StoredInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<Value>,
    #[serde(default)]
    pub messages: Vec<StoredInputMessage>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(try_from = "LegacyStoredInputMessage")]
pub struct StoredInputMessage {
    pub role: Role,
    pub content: Vec<StoredInputMessageContent>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyStoredInputMessage {
    role: Role,
    content: Vec<Value>,
}

impl TryFrom<LegacyStoredInputMessage> for StoredInputMessage {
    type Error = String;

    fn try_from(message: LegacyStoredInputMessage) -> Result<Self, Self::Error> {
        let role = message.role;
        let content = message
            .content
            .into_iter()
            .map(|mut value| {
                // Older rows store text as `{"type": "text", "value": ...}`,
                // where the value is either the text itself or the arguments for the role's implicit template.
                if let Some(obj) = value.as_object_mut()
                    && obj.get("type").and_then(Value::as_str) == Some("text")
                    && let Some(legacy_value) = obj.remove("value")
                {
                    match legacy_value {
                        Value::String(text) => {
                            obj.insert("text".to_string(), Value::String(text));
                        }
                        Value::Object(arguments) => {
                            let mut template = Map::new();
                            template.insert(
                                "type".to_string(),
                                Value::String("template".to_string()),
                            );
                            template.insert(
                                "name".to_string(),
                                Value::String(role.implicit_template_name().to_string()),
                            );
                            template.insert("arguments".to_string(), Value::Object(arguments));
                            *obj = template;
                        }
                        _ => {
                            return Err(
                                r#"The `value` field in a `{"type": "text", "value": ... }` content block must be a string or object"#
                                    .to_string(),
                            );
                        }
                    }
                }
                serde_json::from_value(value).map_err(|e| e.to_string())
            })
            .collect::<Result<Vec<StoredInputMessageContent>, String>>()?;
        Ok(StoredInputMessage { role, content })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredInputMessageContent {
    Text(Text),
    Template(TemplateInput),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
    RawText {
        value: String,
    },
    Thought(Thought),
    Unknown {
        data: Value,
        model_provider_name: Option<String>,
    },
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TemplateInput {
    pub name: String,
    pub arguments: Map<String, Value>,
}
