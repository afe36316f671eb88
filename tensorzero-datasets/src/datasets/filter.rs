use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datasets::parsed::ParsedDatapointRow;
use crate::serde_util::storage_timestamp;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum TagComparisonOperator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum TimeComparisonOperator {
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
}

/// An additional predicate on datapoints, evaluated by the query executor next to the
/// identity filters of `DatasetQueryParams`.
///
/// Leaves reference a fixed set of columns and carry typed literals, so a filter can be
/// bound as parameters by the executor without ever being spliced into query text.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum DatapointFilter {
    Tag {
        key: String,
        value: String,
        comparison_operator: TagComparisonOperator,
    },
    UpdatedAt {
        #[serde(with = "storage_timestamp")]
        time: DateTime<Utc>,
        comparison_operator: TimeComparisonOperator,
    },
    EpisodeId {
        episode_id: Uuid,
    },
    FunctionName {
        function_name: String,
    },
    And {
        children: Vec<DatapointFilter>,
    },
    Or {
        children: Vec<DatapointFilter>,
    },
    Not {
        child: Box<DatapointFilter>,
    },
}

impl DatapointFilter {
    /// Nesting depth of the tree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            DatapointFilter::And { children } | DatapointFilter::Or { children } => {
                1 + children.iter().map(Self::depth).max().unwrap_or(0)
            }
            DatapointFilter::Not { child } => 1 + child.depth(),
            _ => 1,
        }
    }

    /// Evaluates the filter against a datapoint.
    ///
    /// A tag filter only matches datapoints that carry the tag; `!=` does not match
    /// a datapoint without the key. An empty `and` is true and an empty `or` is false.
    pub fn matches(&self, row: &ParsedDatapointRow) -> bool {
        match self {
            DatapointFilter::Tag {
                key,
                value,
                comparison_operator,
            } => match row.tags().get(key) {
                Some(tag_value) => match comparison_operator {
                    TagComparisonOperator::Equal => tag_value == value,
                    TagComparisonOperator::NotEqual => tag_value != value,
                },
                None => false,
            },
            DatapointFilter::UpdatedAt {
                time,
                comparison_operator,
            } => {
                let updated_at = row.updated_at();
                match comparison_operator {
                    TimeComparisonOperator::LessThan => updated_at < *time,
                    TimeComparisonOperator::LessThanOrEqual => updated_at <= *time,
                    TimeComparisonOperator::GreaterThan => updated_at > *time,
                    TimeComparisonOperator::GreaterThanOrEqual => updated_at >= *time,
                }
            }
            DatapointFilter::EpisodeId { episode_id } => row.episode_id() == *episode_id,
            DatapointFilter::FunctionName { function_name } => row.function_name() == function_name,
            DatapointFilter::And { children } => children.iter().all(|child| child.matches(row)),
            DatapointFilter::Or { children } => children.iter().any(|child| child.matches(row)),
            DatapointFilter::Not { child } => !child.matches(row),
        }
    }
}
