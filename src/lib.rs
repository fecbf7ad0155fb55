//! kine2parquet - Turn wearable sensor telemetry into per-limb Parquet files
//!
//! This crate takes short bursts of watch telemetry, decodes the fixed-width
//! binary rows, groups them by patient and limb, and writes one Parquet
//! artifact per group for durable storage.
//!
//! # Design Principles
//!
//! - **Tolerant decode**: malformed envelopes and truncated rows are counted
//!   and logged, never fatal
//! - **Batch-scoped state**: grouping lives in a value owned by one call
//! - **Arrow-native**: samples go through Arrow RecordBatches on their way to
//!   Parquet
//! - **Storage at the edge**: the durable store is an [`ArtifactSink`]
//!
//! # High-level API
//!
//! ```ignore
//! use kine2parquet::{LocalDirSink, Pipeline, PipelineConfig};
//!
//! let mut pipeline = Pipeline::new(PipelineConfig::default());
//! let mut sink = LocalDirSink::new("/var/lib/kine");
//!
//! // One JSON envelope per delivered record
//! let report = pipeline.process_records(&records, &mut sink)?;
//! println!("wrote {} artifacts", report.artifacts.len());
//! ```
//!
//! # Lower-level API
//!
//! ```ignore
//! use kine2parquet::{combine_groups, decode_samples, to_parquet, ParquetOptions};
//!
//! // Step 1: Decode binary rows
//! let decoded = decode_samples(&raw);
//!
//! // Step 2: Group by identity
//! let grouped = combine_groups(vec![(identity, decoded.samples)]);
//!
//! // Step 3: Emit one Parquet file per group
//! for group in grouped.into_groups() {
//!     let (bytes, metadata) = to_parquet(&group, &ParquetOptions::default())?;
//! }
//! ```

pub mod arrow;
pub mod config;
pub mod decode;
pub mod error;
pub mod output;
pub mod sample;

use bytes::Bytes;

pub use arrow::{
    arrow_to_samples, combine_groups, samples_to_arrow, sensor_schema, Group, GroupedSamples,
};
pub use config::{FailurePolicy, PipelineConfig};
pub use decode::{
    decode_blobs, decode_row, decode_samples, encode_samples, unwrap_envelope, unwrap_envelopes,
    wrap_envelope, DecodeError, DecodedBlobs, DecodedSamples, UnwrappedEnvelopes,
};
pub use error::{Error, Result};
pub use output::{
    artifact_key, emit_group, read_samples, to_parquet, Artifact, ArtifactMetadata, ArtifactSink,
    BatchWriteError, BatchWriter, CompressionCodec, EmissionClock, LocalDirSink, MemorySink,
    ParquetOptions, SampleWriter,
};
pub use sample::{Identity, SensorSample, SourceBlob, ROW_SIZE};

// ============================================================================
// High-level API types
// ============================================================================

/// An artifact that reached the sink.
#[derive(Debug, Clone)]
pub struct EmittedArtifact {
    /// Group the artifact holds
    pub identity: Identity,
    /// Object key it was stored under
    pub key: String,
    /// Footer facts
    pub metadata: ArtifactMetadata,
}

/// A group whose artifact could not be created or finalized.
#[derive(Debug)]
pub struct FailedGroup {
    /// Group that has no artifact
    pub identity: Identity,
    /// Create, write or finalize fault that stopped it
    pub error: Error,
}

/// Outcome of processing one delivered batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Records that were not valid envelopes
    pub envelopes_dropped: usize,
    /// Blobs that ended in a partial row
    pub truncated_blobs: usize,
    /// Distinct identities in the batch
    pub groups: usize,
    /// Samples decoded across all groups
    pub samples: usize,
    /// Artifacts handed to the sink
    pub artifacts: Vec<EmittedArtifact>,
    /// Groups that produced no artifact (only with [`FailurePolicy::Continue`])
    pub failed: Vec<FailedGroup>,
}

impl BatchReport {
    /// True when every group reached the sink.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// High-level API functions
// ============================================================================

/// Batch processor: unwrap → decode → group → emit → sink.
///
/// Holds only configuration and the emission clock, so one instance can be
/// reused across invocations without artifact keys colliding.
#[derive(Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    clock: EmissionClock,
}

impl Pipeline {
    /// Create a pipeline with its own emission clock.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            clock: EmissionClock::new(),
        }
    }

    /// Configuration every batch is processed with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a batch of delivered records, one JSON envelope each.
    ///
    /// Malformed envelopes are dropped and counted in the report.
    pub fn process_records<I, R, S>(&mut self, records: I, sink: &mut S) -> Result<BatchReport>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u8]>,
        S: ArtifactSink + ?Sized,
    {
        let unwrapped = unwrap_envelopes(records);
        let mut report = self.process_blobs(unwrapped.blobs, sink)?;
        report.envelopes_dropped = unwrapped.dropped;
        Ok(report)
    }

    /// Process already-unwrapped blobs.
    ///
    /// Returns `Err` for sink failures, and for create/write/finalize failures
    /// under [`FailurePolicy::Abort`]. Groups already handed to the sink stay
    /// there.
    pub fn process_blobs<I, S>(&mut self, blobs: I, sink: &mut S) -> Result<BatchReport>
    where
        I: IntoIterator<Item = SourceBlob>,
        S: ArtifactSink + ?Sized,
    {
        self.process_blobs_with(blobs, sink, emit_artifact)
    }

    /// Process already-unwrapped blobs, building each artifact with `emit`.
    ///
    /// # Arguments
    ///
    /// * `blobs` - Identity-tagged raw rows, in delivery order
    /// * `sink` - Destination for finalized artifacts
    /// * `emit` - Called once per group with its emission timestamp and the
    ///   configured [`ParquetOptions`]; [`emit_artifact`] in production
    ///
    /// # Returns
    ///
    /// * `Ok(BatchReport)` - Every group either reached the sink or, under
    ///   [`FailurePolicy::Continue`], is listed in `failed`
    /// * `Err(Error)` - A sink failure, or a write fault under
    ///   [`FailurePolicy::Abort`]
    pub fn process_blobs_with<I, S, F>(
        &mut self,
        blobs: I,
        sink: &mut S,
        mut emit: F,
    ) -> Result<BatchReport>
    where
        I: IntoIterator<Item = SourceBlob>,
        S: ArtifactSink + ?Sized,
        F: FnMut(&Group, u128, &ParquetOptions) -> Result<Artifact>,
    {
        let decoded = decode_blobs(blobs);
        let grouped = combine_groups(decoded.decoded);

        let mut report = BatchReport {
            truncated_blobs: decoded.truncated_blobs,
            groups: grouped.len(),
            samples: grouped.total_samples(),
            ..Default::default()
        };

        for group in grouped.into_groups() {
            let artifact = match emit(&group, self.clock.next_nanos(), &self.config.parquet) {
                Ok(artifact) => artifact,
                Err(error)
                    if error.is_write_fault()
                        && self.config.failure_policy == FailurePolicy::Continue =>
                {
                    log::error!("no artifact for {}: {}", group.identity, error);
                    report.failed.push(FailedGroup {
                        identity: group.identity,
                        error,
                    });
                    continue;
                }
                Err(error) => {
                    log::error!("aborting batch at {}: {}", group.identity, error);
                    return Err(error);
                }
            };

            sink.put(&artifact)?;
            report.artifacts.push(EmittedArtifact {
                identity: artifact.identity,
                key: artifact.key,
                metadata: artifact.metadata,
            });
        }

        log::info!(
            "processed {} samples in {} groups: {} artifacts, {} failed, {} truncated blobs",
            report.samples,
            report.groups,
            report.artifacts.len(),
            report.failed.len(),
            report.truncated_blobs
        );
        Ok(report)
    }
}

/// Emit one group as a named, finalized artifact.
///
/// The Parquet bytes are built in memory; the key follows [`artifact_key`].
pub fn emit_artifact(
    group: &Group,
    emission_nanos: u128,
    options: &ParquetOptions,
) -> Result<Artifact> {
    let (data, metadata): (Bytes, ArtifactMetadata) = to_parquet(group, options)?;
    Ok(Artifact {
        identity: group.identity.clone(),
        key: artifact_key(&group.identity, emission_nanos),
        data,
        metadata,
    })
}

// ============================================================================
// Tests
// ============================================================================
