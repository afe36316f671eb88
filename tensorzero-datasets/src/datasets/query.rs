use serde::{Deserialize, Serialize};

use crate::config::QueryLimits;
use crate::datasets::DatapointKind;
use crate::datasets::filter::DatapointFilter;
use crate::datasets::parsed::ParsedDatapointRow;
use crate::error::{Error, ErrorDetails};
use crate::table_name::TableName;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Boolean,
    Float,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ComparisonOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
}

/// Which identity of a datapoint the metric feedback is joined on.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricJoinKey {
    Id,
    EpisodeId,
}

/// A metric feedback value as recorded by the feedback tables.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricValue {
    Boolean(bool),
    Float(f64),
}

impl MetricValue {
    /// The numeric encoding used for threshold comparisons: `true` is 1 and `false` is 0.
    pub fn as_f64(self) -> f64 {
        match self {
            MetricValue::Boolean(true) => 1.0,
            MetricValue::Boolean(false) => 0.0,
            MetricValue::Float(value) => value,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricFilter {
    pub metric: String,
    pub metric_type: MetricType,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    pub join_on: MetricJoinKey,
}

impl MetricFilter {
    pub fn feedback_table_name(&self) -> TableName {
        match self.metric_type {
            MetricType::Boolean => TableName::BooleanMetricFeedback,
            MetricType::Float => TableName::FloatMetricFeedback,
        }
    }

    /// Whether a feedback value passes the filter. Booleans are compared as 1/0.
    pub fn accepts(&self, value: MetricValue) -> bool {
        let value = value.as_f64();
        match self.operator {
            ComparisonOperator::GreaterThan => value > self.threshold,
            ComparisonOperator::LessThan => value < self.threshold,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatasetOutputSource {
    // Don't include any output.
    None,
    // Include the original inference output.
    Inference,
    // Include any linked demonstration as output.
    Demonstration,
}

impl DatasetOutputSource {
    /// The table the output column is joined from, if any.
    pub fn table_name(self, kind: DatapointKind) -> Option<TableName> {
        match self {
            DatasetOutputSource::None => None,
            DatasetOutputSource::Inference => Some(kind.inference_table_name()),
            DatasetOutputSource::Demonstration => Some(TableName::DemonstrationFeedback),
        }
    }
}

/// The caller-facing shape of `DatasetQueryParams`, before its cross-field rules are checked.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UncheckedDatasetQueryParams {
    #[serde(alias = "inferenceType")]
    pub inference_type: DatapointKind,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub dataset_name: Option<String>,
    #[serde(default)]
    pub variant_name: Option<String>,
    #[serde(default)]
    pub extra_where: Vec<DatapointFilter>,
    #[serde(default)]
    pub metric_filter: Option<MetricFilter>,
    pub output_source: DatasetOutputSource,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// A request to select inferences or datapoints, handed to a query executor.
///
/// Every value of this type satisfies the cross-field rules checked in `new`:
/// deserializing goes through the same checks.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(try_from = "UncheckedDatasetQueryParams")]
pub struct DatasetQueryParams {
    inference_type: DatapointKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extra_where: Vec<DatapointFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metric_filter: Option<MetricFilter>,
    output_source: DatasetOutputSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u32>,
}

impl DatasetQueryParams {
    pub fn new(params: UncheckedDatasetQueryParams) -> Result<Self, Error> {
        Self::new_with_limits(params, QueryLimits::default())
    }

    pub fn new_with_limits(
        params: UncheckedDatasetQueryParams,
        limits: QueryLimits,
    ) -> Result<Self, Error> {
        if params.variant_name.is_some() && params.function_name.is_none() {
            return Err(Error::new(ErrorDetails::ConstraintViolation {
                message: "`variant_name` requires `function_name`".to_string(),
            }));
        }
        if let Some(metric_filter) = &params.metric_filter
            && !metric_filter.threshold.is_finite()
        {
            return Err(Error::new(ErrorDetails::ConstraintViolation {
                message: format!(
                    "threshold for metric `{}` must be a finite number",
                    metric_filter.metric
                ),
            }));
        }
        for (index, filter) in params.extra_where.iter().enumerate() {
            let depth = filter.depth();
            if depth > limits.max_filter_depth {
                return Err(Error::new(ErrorDetails::ConstraintViolation {
                    message: format!(
                        "`extra_where[{index}]` is nested {depth} levels deep, which exceeds the limit of {}",
                        limits.max_filter_depth
                    ),
                }));
            }
        }
        Ok(Self {
            inference_type: params.inference_type,
            function_name: params.function_name,
            dataset_name: params.dataset_name,
            variant_name: params.variant_name,
            extra_where: params.extra_where,
            metric_filter: params.metric_filter,
            output_source: params.output_source,
            limit: params.limit,
            offset: params.offset,
        })
    }

    pub fn inference_type(&self) -> DatapointKind {
        self.inference_type
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    pub fn dataset_name(&self) -> Option<&str> {
        self.dataset_name.as_deref()
    }

    pub fn variant_name(&self) -> Option<&str> {
        self.variant_name.as_deref()
    }

    pub fn extra_where(&self) -> &[DatapointFilter] {
        &self.extra_where
    }

    pub fn metric_filter(&self) -> Option<&MetricFilter> {
        self.metric_filter.as_ref()
    }

    pub fn output_source(&self) -> DatasetOutputSource {
        self.output_source
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    /// The inference table these params select from.
    pub fn source_table_name(&self) -> TableName {
        self.inference_type.inference_table_name()
    }

    pub fn output_table_name(&self) -> Option<TableName> {
        self.output_source.table_name(self.inference_type)
    }

    /// Applies the filters that only depend on the datapoint itself.
    ///
    /// `variant_name`, `metric_filter` and `output_source` need data from other tables and
    /// are left to the executor, as are `limit` and `offset`.
    pub fn matches_row(&self, row: &ParsedDatapointRow) -> bool {
        row.kind() == self.inference_type
            && self
                .function_name
                .as_deref()
                .is_none_or(|function_name| row.function_name() == function_name)
            && self
                .dataset_name
                .as_deref()
                .is_none_or(|dataset_name| row.dataset_name() == dataset_name)
            && self.extra_where.iter().all(|filter| filter.matches(row))
    }
}

impl TryFrom<UncheckedDatasetQueryParams> for DatasetQueryParams {
    type Error = Error;

    fn try_from(params: UncheckedDatasetQueryParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}
