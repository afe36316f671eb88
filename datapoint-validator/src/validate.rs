use std::io::{BufRead, Write};

use anyhow::Context;
use serde::Serialize;
use tensorzero_datasets::config::DatasetsConfig;
use tensorzero_datasets::datasets::{DatapointKind, DatapointRow, ParsedDatapointRow};
use tensorzero_datasets::error::Error;
use uuid::Uuid;

/// The result for one input line, written to stdout as a JSON object.
#[derive(Debug, Serialize)]
struct LineReport {
    line: usize,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<DatapointKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ValidationSummary {
    pub valid: usize,
    pub invalid: usize,
}

fn validate_line(
    raw: &str,
    kind: Option<DatapointKind>,
    config: &DatasetsConfig,
) -> Result<ParsedDatapointRow, Error> {
    let row = match kind {
        Some(kind) => DatapointRow::validate(kind, raw)?,
        None => DatapointRow::validate_tagged(raw)?,
    };
    row.parse(&config.payload_limits)
}

/// Validates and parses every non-empty line of `reader`, writing one report per line to `writer`.
pub fn validate_lines(
    reader: impl BufRead,
    mut writer: impl Write,
    kind: Option<DatapointKind>,
    config: &DatasetsConfig,
) -> anyhow::Result<ValidationSummary> {
    let mut summary = ValidationSummary::default();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.with_context(|| format!("Failed to read line {line_number}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let report = match validate_line(&line, kind, config) {
            Ok(parsed) => {
                summary.valid += 1;
                LineReport {
                    line: line_number,
                    ok: true,
                    id: Some(parsed.id()),
                    kind: Some(parsed.kind()),
                    error: None,
                }
            }
            Err(e) => {
                summary.invalid += 1;
                LineReport {
                    line: line_number,
                    ok: false,
                    id: None,
                    kind: None,
                    error: Some(e.to_string()),
                }
            }
        };
        serde_json::to_writer(&mut writer, &report).context("Failed to write report")?;
        writeln!(writer).context("Failed to write report")?;
    }
    writer.flush().context("Failed to flush output")?;
    Ok(summary)
}
