use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datasets::DatapointKind;
use crate::datasets::row::{DatapointRow, latest_datapoint_rows};
use crate::serde_util::storage_timestamp;

/// Summary of a dataset for listing.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DatasetCountInfo {
    pub dataset_name: String,
    pub count: u32,
    #[serde(with = "storage_timestamp")]
    pub last_updated: DateTime<Utc>,
}

/// Summary of one member of a dataset for listing.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DatasetDetailRow {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: DatapointKind,
    pub function_name: String,
    pub episode_id: Uuid,
    #[serde(with = "storage_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl From<&DatapointRow> for DatasetDetailRow {
    fn from(row: &DatapointRow) -> Self {
        Self {
            id: row.id(),
            kind: row.kind(),
            function_name: row.function_name().to_string(),
            episode_id: row.episode_id(),
            updated_at: row.updated_at(),
        }
    }
}

/// Counts the live datapoints of each dataset in a row history.
/// Most recently updated datasets come first, ties broken by name.
pub fn dataset_count_infos(rows: impl IntoIterator<Item = DatapointRow>) -> Vec<DatasetCountInfo> {
    let mut infos: HashMap<String, DatasetCountInfo> = HashMap::new();
    for row in latest_datapoint_rows(rows) {
        let updated_at = row.updated_at();
        infos
            .entry(row.dataset_name().to_string())
            .and_modify(|info| {
                info.count += 1;
                info.last_updated = info.last_updated.max(updated_at);
            })
            .or_insert_with(|| DatasetCountInfo {
                dataset_name: row.dataset_name().to_string(),
                count: 1,
                last_updated: updated_at,
            });
    }
    let mut infos: Vec<DatasetCountInfo> = infos.into_values().collect();
    infos.sort_by(|a, b| {
        b.last_updated
            .cmp(&a.last_updated)
            .then_with(|| a.dataset_name.cmp(&b.dataset_name))
    });
    infos
}
