use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::datasets::DatapointKind;

#[derive(Clone, Debug, Error, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
#[error(transparent)]
// As long as the struct member is private, we force people to use the `new` method and log the error.
// We arc `ErrorDetails` per the `clippy::result_large_err` lint, as well as to make it cloneable
pub struct Error(Arc<ErrorDetails>);

impl Error {
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Arc::new(details))
    }

    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    pub fn log(&self) {
        self.0.log();
    }

    pub fn log_at_level(&self, prefix: &str, level: tracing::Level) {
        self.0.log_at_level(prefix, level);
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

#[derive(Debug, Error, Serialize)]
#[cfg_attr(test, derive(PartialEq))]
pub enum ErrorDetails {
    /// An unknown, missing, duplicated, or malformed field on a raw row or query input.
    /// `path` is the location of the offending field (`.` is the record itself).
    SchemaViolation {
        path: String,
        message: String,
    },
    /// The record could not be attributed to the requested variant.
    VariantMismatch {
        expected: Option<DatapointKind>,
        message: String,
    },
    /// A nested payload of an otherwise valid row failed to decode.
    ParseFailure {
        dataset_name: String,
        datapoint_id: Uuid,
        field: String,
        message: String,
    },
    ConstraintViolation {
        message: String,
    },
    Serialization {
        message: String,
    },
    Config {
        message: String,
    },
    Observability {
        message: String,
    },
}

impl ErrorDetails {
    /// Defines the error level for logging this error
    fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::SchemaViolation { .. } => tracing::Level::WARN,
            ErrorDetails::VariantMismatch { .. } => tracing::Level::WARN,
            ErrorDetails::ParseFailure { .. } => tracing::Level::WARN,
            ErrorDetails::ConstraintViolation { .. } => tracing::Level::WARN,
            ErrorDetails::Serialization { .. } => tracing::Level::ERROR,
            ErrorDetails::Config { .. } => tracing::Level::ERROR,
            ErrorDetails::Observability { .. } => tracing::Level::ERROR,
        }
    }

    pub fn log_at_level(&self, prefix: &str, level: tracing::Level) {
        match level {
            tracing::Level::ERROR => tracing::error!("{prefix}{self}"),
            tracing::Level::WARN => tracing::warn!("{prefix}{self}"),
            tracing::Level::INFO => tracing::info!("{prefix}{self}"),
            tracing::Level::DEBUG => tracing::debug!("{prefix}{self}"),
            tracing::Level::TRACE => tracing::trace!("{prefix}{self}"),
        }
    }

    /// Log the error using the `tracing` library
    pub fn log(&self) {
        self.log_at_level("", self.level());
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetails::SchemaViolation { path, message } => {
                write!(f, "Schema violation at `{path}`: {message}")
            }
            ErrorDetails::VariantMismatch { expected, message } => match expected {
                Some(kind) => write!(
                    f,
                    "Record does not match the `{}` datapoint variant: {message}",
                    kind.as_str()
                ),
                None => write!(f, "Record does not match any datapoint variant: {message}"),
            },
            ErrorDetails::ParseFailure {
                dataset_name,
                datapoint_id,
                field,
                message,
            } => write!(
                f,
                "Failed to parse `{field}` of datapoint `{datapoint_id}` in dataset `{dataset_name}`: {message}"
            ),
            ErrorDetails::ConstraintViolation { message } => {
                write!(f, "Invalid dataset query: {message}")
            }
            ErrorDetails::Serialization { message } => write!(f, "{message}"),
            ErrorDetails::Config { message } => write!(f, "{message}"),
            ErrorDetails::Observability { message } => write!(f, "{message}"),
        }
    }
}
