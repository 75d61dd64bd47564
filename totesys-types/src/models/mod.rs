use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline configuration, loaded from a YAML file. Buckets are discovered
/// at runtime by prefix rather than configured by full name, so the same
/// config works across per-team bucket suffixes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Prefix matched against bucket names to find the extract area.
    pub extract_bucket_prefix: String,
    /// Prefix matched against bucket names to find the transform area.
    pub transform_bucket_prefix: String,
    /// Secret holding the Totesys source database credentials.
    pub source_secret: String,
    /// Secret holding the warehouse credentials.
    pub warehouse_secret: String,
    /// Schema the loader appends into.
    pub warehouse_schema: String,
    /// When set, storage and secrets are served from this directory instead
    /// of AWS; intended for local runs and integration tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_root: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config {0}: {1}")]
    Parse(PathBuf, #[source] serde_yaml::Error),
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }
}
