//! Arrow layer for kine2parquet
//!
//! Provides Arrow RecordBatch construction from decoded sensor samples:
//! - Schema accessor for the fixed sensor schema
//! - RecordBatch builder for converting samples to Arrow arrays and back
//! - Identity-based grouping of samples

mod builder;
mod partition;
mod schema;

pub(crate) use builder::SampleBatchBuilder;
pub use builder::{arrow_to_samples, samples_to_arrow};
pub use partition::{combine_groups, Group, GroupedSamples};
pub use schema::sensor_schema;
