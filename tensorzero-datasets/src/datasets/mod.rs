use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::table_name::TableName;

pub mod conversion;
pub mod filter;
pub mod insert;
pub mod listing;
pub mod parsed;
pub(crate) mod payload;
pub mod query;
pub mod row;

pub use conversion::{OutputKind, to_dataset_row, to_dataset_row_with_output};
pub use filter::{DatapointFilter, TagComparisonOperator, TimeComparisonOperator};
pub use insert::{ChatInferenceDatapointInsert, DatapointInsert, JsonInferenceDatapointInsert};
pub use listing::{DatasetCountInfo, DatasetDetailRow, dataset_count_infos};
pub use parsed::{
    ParsedChatInferenceDatapointRow, ParsedDatapointRow, ParsedJsonInferenceDatapointRow,
};
pub use query::{
    ComparisonOperator, DatasetOutputSource, DatasetQueryParams, MetricFilter, MetricJoinKey,
    MetricType, MetricValue, UncheckedDatasetQueryParams,
};
pub use row::{
    ChatInferenceDatapointRow, DatapointRow, JsonInferenceDatapointRow, latest_datapoint_rows,
};

/// The two structural variants of a datapoint.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DatapointKind {
    Chat,
    Json,
}

impl DatapointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DatapointKind::Chat => "chat",
            DatapointKind::Json => "json",
        }
    }

    /// The table that datapoints of this kind are stored in.
    pub fn table_name(self) -> TableName {
        match self {
            DatapointKind::Chat => TableName::ChatInferenceDatapoint,
            DatapointKind::Json => TableName::JsonInferenceDatapoint,
        }
    }

    /// The table that inferences of this kind are logged to.
    pub fn inference_table_name(self) -> TableName {
        match self {
            DatapointKind::Chat => TableName::ChatInference,
            DatapointKind::Json => TableName::JsonInference,
        }
    }

    /// The payload column that only rows of this kind carry.
    pub(crate) fn variant_field(self) -> &'static str {
        match self {
            DatapointKind::Chat => "tool_params",
            DatapointKind::Json => "output_schema",
        }
    }

    pub(crate) fn other(self) -> DatapointKind {
        match self {
            DatapointKind::Chat => DatapointKind::Json,
            DatapointKind::Json => DatapointKind::Chat,
        }
    }
}

impl std::fmt::Display for DatapointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
