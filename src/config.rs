//! Pipeline configuration
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "parquet": {"compression": "snappy", "max_row_group_bytes": 134217728, "batch_rows": 8192},
//!   "failure_policy": "abort"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::output::ParquetOptions;

/// What to do with the rest of a batch when one group's artifact cannot be
/// created or finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the batch and return the write fault
    #[default]
    Abort,
    /// Record the failed group and keep emitting the others
    Continue,
}

/// Settings for a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How artifacts are encoded
    pub parquet: ParquetOptions,
    /// What a write fault on one group does to the rest of the batch
    pub failure_policy: FailurePolicy,
}

impl PipelineConfig {
    /// Parse a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Reject settings the writer cannot work with.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If `batch_rows` and `max_row_group_bytes` are non-zero
    /// * `Err(Error::Config)` - Naming the offending field otherwise
    pub fn validate(&self) -> Result<()> {
        if self.parquet.batch_rows == 0 {
            return Err(Error::Config("parquet.batch_rows must be at least 1".into()));
        }
        if self.parquet.max_row_group_bytes == 0 {
            return Err(Error::Config(
                "parquet.max_row_group_bytes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
