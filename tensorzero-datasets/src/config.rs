use serde::Deserialize;

use crate::error::{Error, ErrorDetails};

/// Configuration for the dataset layer, usually read from the `[datasets]`
/// portion of a TOML config file by the caller.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatasetsConfig {
    #[serde(default)]
    pub payload_limits: PayloadLimits,
    #[serde(default)]
    pub query: QueryLimits,
}

/// Bounds applied to string-encoded payloads before they are decoded.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PayloadLimits {
    /// Maximum nesting depth of arrays and objects in a single payload.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum length in bytes of a single encoded payload.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_max_depth() -> usize {
    64
}

fn default_max_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_bytes: default_max_bytes(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QueryLimits {
    /// Maximum nesting depth of a single `extra_where` predicate tree.
    #[serde(default = "default_max_filter_depth")]
    pub max_filter_depth: usize,
}

fn default_max_filter_depth() -> usize {
    16
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_filter_depth: default_max_filter_depth(),
        }
    }
}

impl DatasetsConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, Error> {
        let config: DatasetsConfig = toml::from_str(raw).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse datasets config: {e}"),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.payload_limits.max_depth == 0 {
            return Err(Error::new(ErrorDetails::Config {
                message: "`payload_limits.max_depth` must be greater than 0".to_string(),
            }));
        }
        if self.payload_limits.max_bytes == 0 {
            return Err(Error::new(ErrorDetails::Config {
                message: "`payload_limits.max_bytes` must be greater than 0".to_string(),
            }));
        }
        if self.query.max_filter_depth == 0 {
            return Err(Error::new(ErrorDetails::Config {
                message: "`query.max_filter_depth` must be greater than 0".to_string(),
            }));
        }
        Ok(())
    }
}
