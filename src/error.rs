//! Crate-level error type

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

use crate::decode::DecodeError;
use crate::sample::Identity;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the pipeline.
///
/// Malformed sensor bytes never surface here: they are reported through
/// counters and logs. Only structural misuse and internal write faults do.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// The columnar container for a group could not be opened.
    #[error("unable to create parquet artifact for {identity}: {source}")]
    Create {
        identity: Identity,
        #[source]
        source: ParquetError,
    },

    /// A batch or row-group flush failed part way; the file state is unknown.
    #[error("unable to write rows to parquet artifact for {identity}: {source}")]
    Write {
        identity: Identity,
        #[source]
        source: ParquetError,
    },

    /// Footer write or resource release failed; the artifact is unusable.
    #[error("unable to finalize parquet artifact for {identity}: {source}")]
    Finalize {
        identity: Identity,
        #[source]
        source: ParquetError,
    },

    #[error("sink error for {key}: {source}")]
    Sink {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(String),
}

impl Error {
    /// True for internal write faults on an artifact (create, write or finalize).
    ///
    /// These leave no artifact behind, so re-running the whole batch is safe
    /// from the sink's point of view.
    pub fn is_write_fault(&self) -> bool {
        matches!(
            self,
            Error::Create { .. } | Error::Write { .. } | Error::Finalize { .. }
        )
    }

    /// Identity of the group the error belongs to, when there is one.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Error::Create { identity, .. }
            | Error::Write { identity, .. }
            | Error::Finalize { identity, .. } => Some(identity),
            _ => None,
        }
    }
}
