use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::datasets::DatapointKind;
use crate::error::{Error, ErrorDetails};
use crate::serde_util::{UniqueKeysValue, deserialize_required_nullable, storage_timestamp};

/// A chat datapoint exactly as it is stored: payload columns are JSON-encoded strings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChatInferenceDatapointRow {
    pub dataset_name: String,
    pub function_name: String,
    pub id: Uuid,
    pub episode_id: Uuid,
    pub input: String,
    #[serde(deserialize_with = "deserialize_required_nullable")]
    pub output: Option<String>,
    pub tool_params: String,
    pub tags: HashMap<String, String>,
    pub auxiliary: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(with = "storage_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// A json datapoint exactly as it is stored: payload columns are JSON-encoded strings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JsonInferenceDatapointRow {
    pub dataset_name: String,
    pub function_name: String,
    pub id: Uuid,
    pub episode_id: Uuid,
    pub input: String,
    #[serde(deserialize_with = "deserialize_required_nullable")]
    pub output: Option<String>,
    pub output_schema: String,
    pub tags: HashMap<String, String>,
    pub auxiliary: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(with = "storage_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// A stored datapoint of either kind.
///
/// Rows are only ever attributed to a variant by the caller (`validate`) or by the
/// `type` discriminant persisted next to them (`validate_tagged`), never by trying
/// each schema in turn.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatapointRow {
    Chat(ChatInferenceDatapointRow),
    Json(JsonInferenceDatapointRow),
}

impl<'de> Deserialize<'de> for DatapointRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let UniqueKeysValue(value) = UniqueKeysValue::deserialize(deserializer)?;
        DatapointRow::validate_tagged_value(value).map_err(serde::de::Error::custom)
    }
}

impl DatapointRow {
    /// Validates a raw JSON record against the schema of `kind`.
    pub fn validate(kind: DatapointKind, raw: &str) -> Result<Self, Error> {
        Self::validate_value(kind, read_raw_record(raw)?)
    }

    /// A `type` field, if present, must agree with `kind`.
    pub fn validate_value(kind: DatapointKind, raw: Value) -> Result<Self, Error> {
        let mut record = into_record(raw)?;
        if let Some(tag) = record.remove("type") {
            let tagged = parse_discriminant(tag)?;
            if tagged != kind {
                return Err(Error::new(ErrorDetails::VariantMismatch {
                    expected: Some(kind),
                    message: format!("`type` discriminant is `{tagged}`"),
                }));
            }
        }
        Self::validate_record(kind, record)
    }

    /// Validates a raw JSON record whose variant is given by its `type` field.
    pub fn validate_tagged(raw: &str) -> Result<Self, Error> {
        Self::validate_tagged_value(read_raw_record(raw)?)
    }

    pub fn validate_tagged_value(raw: Value) -> Result<Self, Error> {
        let mut record = into_record(raw)?;
        let Some(tag) = record.remove("type") else {
            return Err(Error::new(ErrorDetails::VariantMismatch {
                expected: None,
                message: "missing `type` discriminant".to_string(),
            }));
        };
        let kind = parse_discriminant(tag)?;
        Self::validate_record(kind, record)
    }

    fn validate_record(kind: DatapointKind, record: Map<String, Value>) -> Result<Self, Error> {
        let other = kind.other();
        if record.contains_key(other.variant_field()) {
            return Err(Error::new(ErrorDetails::VariantMismatch {
                expected: Some(kind),
                message: format!(
                    "found `{}`, which only `{}` datapoints carry",
                    other.variant_field(),
                    other.as_str()
                ),
            }));
        }
        let row = match kind {
            DatapointKind::Chat => DatapointRow::Chat(deserialize_record(record)?),
            DatapointKind::Json => DatapointRow::Json(deserialize_record(record)?),
        };
        tracing::debug!(
            datapoint_id = %row.id(),
            dataset_name = row.dataset_name(),
            kind = kind.as_str(),
            "Validated datapoint row"
        );
        Ok(row)
    }

    pub fn kind(&self) -> DatapointKind {
        match self {
            DatapointRow::Chat(_) => DatapointKind::Chat,
            DatapointRow::Json(_) => DatapointKind::Json,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            DatapointRow::Chat(row) => row.id,
            DatapointRow::Json(row) => row.id,
        }
    }

    pub fn dataset_name(&self) -> &str {
        match self {
            DatapointRow::Chat(row) => &row.dataset_name,
            DatapointRow::Json(row) => &row.dataset_name,
        }
    }

    pub fn function_name(&self) -> &str {
        match self {
            DatapointRow::Chat(row) => &row.function_name,
            DatapointRow::Json(row) => &row.function_name,
        }
    }

    pub fn episode_id(&self) -> Uuid {
        match self {
            DatapointRow::Chat(row) => row.episode_id,
            DatapointRow::Json(row) => row.episode_id,
        }
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        match self {
            DatapointRow::Chat(row) => &row.tags,
            DatapointRow::Json(row) => &row.tags,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            DatapointRow::Chat(row) => row.is_deleted,
            DatapointRow::Json(row) => row.is_deleted,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            DatapointRow::Chat(row) => row.updated_at,
            DatapointRow::Json(row) => row.updated_at,
        }
    }

    /// The soft-delete write for this datapoint.
    pub fn into_tombstone(self, now: DateTime<Utc>) -> Self {
        match self {
            DatapointRow::Chat(row) => DatapointRow::Chat(ChatInferenceDatapointRow {
                is_deleted: true,
                updated_at: now,
                ..row
            }),
            DatapointRow::Json(row) => DatapointRow::Json(JsonInferenceDatapointRow {
                is_deleted: true,
                updated_at: now,
                ..row
            }),
        }
    }
}

/// Collapses an append-only history of rows into the live datapoints.
///
/// For each `(dataset_name, id)` the row with the latest `updated_at` wins, with later rows
/// winning ties. Identities whose winning row is a tombstone are dropped.
/// The result keeps the order in which each identity was first seen.
pub fn latest_datapoint_rows(rows: impl IntoIterator<Item = DatapointRow>) -> Vec<DatapointRow> {
    let mut latest: HashMap<(String, Uuid), (usize, DatapointRow)> = HashMap::new();
    for (position, row) in rows.into_iter().enumerate() {
        match latest.entry((row.dataset_name().to_string(), row.id())) {
            Entry::Vacant(entry) => {
                entry.insert((position, row));
            }
            Entry::Occupied(mut entry) => {
                let (first_seen, current) = entry.get();
                if row.updated_at() >= current.updated_at() {
                    tracing::debug!(datapoint_id = %row.id(), "Superseding older datapoint row");
                    let first_seen = *first_seen;
                    entry.insert((first_seen, row));
                }
            }
        }
    }
    latest
        .into_values()
        .filter(|(_, row)| {
            if row.is_deleted() {
                tracing::debug!(datapoint_id = %row.id(), "Dropping deleted datapoint");
            }
            !row.is_deleted()
        })
        .sorted_by_key(|(first_seen, _)| *first_seen)
        .map(|(_, row)| row)
        .collect()
}

fn read_raw_record(raw: &str) -> Result<Value, Error> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let UniqueKeysValue(value) = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| schema_violation(e.path().to_string(), e.inner().to_string()))?;
    deserializer
        .end()
        .map_err(|e| schema_violation(".".to_string(), e.to_string()))?;
    Ok(value)
}

fn parse_discriminant(tag: Value) -> Result<DatapointKind, Error> {
    serde_json::from_value::<DatapointKind>(tag.clone()).map_err(|_| {
        Error::new(ErrorDetails::VariantMismatch {
            expected: None,
            message: format!("unknown `type` discriminant {tag}"),
        })
    })
}

fn into_record(raw: Value) -> Result<Map<String, Value>, Error> {
    match raw {
        Value::Object(record) => Ok(record),
        other => Err(schema_violation(
            ".".to_string(),
            format!("expected a JSON object, found {}", json_type_name(&other)),
        )),
    }
}

fn deserialize_record<T: DeserializeOwned>(record: Map<String, Value>) -> Result<T, Error> {
    serde_path_to_error::deserialize(Value::Object(record))
        .map_err(|e| schema_violation(e.path().to_string(), e.inner().to_string()))
}

fn schema_violation(path: String, message: String) -> Error {
    Error::new(ErrorDetails::SchemaViolation { path, message })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
