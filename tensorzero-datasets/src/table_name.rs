/// The physical tables that the dataset query contract can point an executor at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    ChatInference,
    ChatInferenceDatapoint,
    JsonInference,
    JsonInferenceDatapoint,
    BooleanMetricFeedback,
    FloatMetricFeedback,
    DemonstrationFeedback,
}

impl TableName {
    pub fn as_str(self) -> &'static str {
        match self {
            TableName::ChatInference => "ChatInference",
            TableName::ChatInferenceDatapoint => "ChatInferenceDatapoint",
            TableName::JsonInference => "JsonInference",
            TableName::JsonInferenceDatapoint => "JsonInferenceDatapoint",
            TableName::BooleanMetricFeedback => "BooleanMetricFeedback",
            TableName::FloatMetricFeedback => "FloatMetricFeedback",
            TableName::DemonstrationFeedback => "DemonstrationFeedback",
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
