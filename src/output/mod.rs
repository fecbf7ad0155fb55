//! Output serialization and handoff for sample groups
//!
//! - Parquet emission with fixed schema, codec and row-group sizing
//! - Artifact naming and the sink boundary to durable storage

mod parquet;
mod sink;

pub use parquet::{
    emit_group, read_samples, to_parquet, ArtifactMetadata, BatchWriteError, BatchWriter,
    CompressionCodec, ParquetOptions, SampleWriter, DEFAULT_BATCH_ROWS,
    DEFAULT_MAX_ROW_GROUP_BYTES,
};
pub use sink::{
    artifact_key, Artifact, ArtifactSink, EmissionClock, LocalDirSink, MemorySink,
    ARTIFACT_EXTENSION,
};
