//! Dataset records and the dataset query contract.
//!
//! Raw rows read from storage are validated into [`datasets::DatapointRow`]s, parsed into
//! [`datasets::ParsedDatapointRow`]s, and projected into [`datasets::DatapointInsert`]s for writes.
//! [`datasets::DatasetQueryParams`] describes which datapoints or inferences a query executor
//! should select. Nothing in this crate performs I/O.

pub mod config;
pub mod datasets;
pub mod error;
pub mod inference;
pub mod observability;
pub mod serde_util;
pub mod stored_inference;
pub mod table_name;
pub mod tool;
