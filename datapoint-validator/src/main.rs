use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tensorzero_datasets::config::DatasetsConfig;
use tensorzero_datasets::observability;

mod cli;
mod validate;

use cli::ValidatorArgs;

fn load_config(path: Option<&Path>) -> anyhow::Result<DatasetsConfig> {
    let Some(path) = path else {
        return Ok(DatasetsConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file `{}`", path.display()))?;
    DatasetsConfig::from_toml_str(&raw)
        .with_context(|| format!("Invalid config file `{}`", path.display()))
}

fn run(args: ValidatorArgs) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config_file.as_deref())?;
    let reader: Box<dyn BufRead> = match args.input_path() {
        Some(path) => Box::new(BufReader::new(
            File::open(path)
                .with_context(|| format!("Failed to open input file `{}`", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let summary = validate::validate_lines(reader, io::stdout().lock(), args.kind, &config)?;
    tracing::info!(
        valid = summary.valid,
        invalid = summary.invalid,
        "Finished validating datapoints"
    );
    Ok(if summary.invalid == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> anyhow::Result<ExitCode> {
    let args = ValidatorArgs::parse();
    observability::setup_logs(args.log_format).context("Failed to set up logs")?;
    run(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tensorzero_datasets::config::PayloadLimits;

    #[test]
    fn test_load_config() {
        assert_eq!(load_config(None).unwrap(), DatasetsConfig::default());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[payload_limits]\nmax_depth = 4").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(
            config.payload_limits,
            PayloadLimits {
                max_depth: 4,
                ..PayloadLimits::default()
            }
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[payload_limits]\nmax_depth = 0").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("must be greater than 0"), "{err:#}");

        assert!(load_config(Some(Path::new("/nonexistent/datasets.toml"))).is_err());
    }
}
