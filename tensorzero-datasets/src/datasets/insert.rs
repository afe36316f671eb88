use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datasets::DatapointKind;
use crate::datasets::parsed::ParsedDatapointRow;
use crate::datasets::row::{ChatInferenceDatapointRow, DatapointRow, JsonInferenceDatapointRow};
use crate::error::Error;
use crate::serde_util::deserialize_required_nullable;

/// The fields of a chat datapoint that a caller controls when writing it.
/// `is_deleted` and `updated_at` are assigned on write.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChatInferenceDatapointInsert {
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
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JsonInferenceDatapointInsert {
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
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatapointInsert {
    Chat(ChatInferenceDatapointInsert),
    Json(JsonInferenceDatapointInsert),
}

impl DatapointInsert {
    pub fn kind(&self) -> DatapointKind {
        match self {
            DatapointInsert::Chat(_) => DatapointKind::Chat,
            DatapointInsert::Json(_) => DatapointKind::Json,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            DatapointInsert::Chat(insert) => insert.id,
            DatapointInsert::Json(insert) => insert.id,
        }
    }

    /// Builds the stored row for this insert. `now` is supplied by the writer
    /// so that every write carries the time it was actually made.
    pub fn into_row(self, now: DateTime<Utc>) -> DatapointRow {
        match self {
            DatapointInsert::Chat(insert) => DatapointRow::Chat(ChatInferenceDatapointRow {
                dataset_name: insert.dataset_name,
                function_name: insert.function_name,
                id: insert.id,
                episode_id: insert.episode_id,
                input: insert.input,
                output: insert.output,
                tool_params: insert.tool_params,
                tags: insert.tags,
                auxiliary: insert.auxiliary,
                is_deleted: false,
                updated_at: now,
            }),
            DatapointInsert::Json(insert) => DatapointRow::Json(JsonInferenceDatapointRow {
                dataset_name: insert.dataset_name,
                function_name: insert.function_name,
                id: insert.id,
                episode_id: insert.episode_id,
                input: insert.input,
                output: insert.output,
                output_schema: insert.output_schema,
                tags: insert.tags,
                auxiliary: insert.auxiliary,
                is_deleted: false,
                updated_at: now,
            }),
        }
    }
}

impl DatapointRow {
    pub fn to_insert(&self) -> DatapointInsert {
        DatapointInsert::from(self.clone())
    }
}

impl From<DatapointRow> for DatapointInsert {
    fn from(row: DatapointRow) -> Self {
        match row {
            DatapointRow::Chat(row) => DatapointInsert::Chat(ChatInferenceDatapointInsert {
                dataset_name: row.dataset_name,
                function_name: row.function_name,
                id: row.id,
                episode_id: row.episode_id,
                input: row.input,
                output: row.output,
                tool_params: row.tool_params,
                tags: row.tags,
                auxiliary: row.auxiliary,
            }),
            DatapointRow::Json(row) => DatapointInsert::Json(JsonInferenceDatapointInsert {
                dataset_name: row.dataset_name,
                function_name: row.function_name,
                id: row.id,
                episode_id: row.episode_id,
                input: row.input,
                output: row.output,
                output_schema: row.output_schema,
                tags: row.tags,
                auxiliary: row.auxiliary,
            }),
        }
    }
}

impl TryFrom<ParsedDatapointRow> for DatapointInsert {
    type Error = Error;

    fn try_from(parsed: ParsedDatapointRow) -> Result<Self, Self::Error> {
        Ok(parsed.encode()?.into())
    }
}
