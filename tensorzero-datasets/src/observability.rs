use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, ErrorDetails};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Installs the global `tracing` subscriber. Logs go to stderr so that stdout stays
/// free for command output. `RUST_LOG` takes precedence over the default filter.
pub fn setup_logs(log_format: LogFormat) -> Result<(), Error> {
    let log_level = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "warn,datapoint_validator=info,tensorzero_datasets=info".into()
    });

    let log_layer = match log_format {
        LogFormat::Pretty => {
            Box::new(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                as Box<dyn Layer<_> + Send + Sync>
        }
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        ),
    };

    tracing_subscriber::registry()
        .with(log_layer.with_filter(log_level))
        .try_init()
        .map_err(|e| {
            Error::new(ErrorDetails::Observability {
                message: format!("Failed to initialize tracing subscriber: {e}"),
            })
        })
}
