//! CLI argument definitions for the datapoint validator.

use clap::Parser;
use std::path::PathBuf;
use tensorzero_datasets::datasets::DatapointKind;
use tensorzero_datasets::observability::LogFormat;

/// Validates and parses newline-delimited datapoint rows exported from storage.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct ValidatorArgs {
    /// File with one raw row per line. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,

    /// Validate every row as this kind. When omitted, each row must carry a `type` field.
    #[arg(long)]
    #[arg(value_enum)]
    pub kind: Option<DatapointKind>,

    /// TOML file with payload and query limits.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Sets the log format used for all validator logs.
    #[arg(long)]
    #[arg(value_enum)]
    #[clap(default_value_t = LogFormat::default())]
    pub log_format: LogFormat,
}

impl ValidatorArgs {
    /// The input file, or `None` for stdin.
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|path| path.as_os_str() != "-")
    }
}
