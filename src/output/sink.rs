//! Artifact naming and sink handoff
//!
//! A finalized artifact is stored under `{patient_id}/` as
//! `{patient_id}-{limb}-{emission_nanos}.parquet`. Durable storage itself is
//! behind [`ArtifactSink`]; only a local directory and an in-memory sink ship
//! with the crate.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use super::parquet::ArtifactMetadata;
use crate::error::{Error, Result};
use crate::sample::Identity;

/// File extension of emitted artifacts.
pub const ARTIFACT_EXTENSION: &str = "parquet";

/// A finalized Parquet file for one group, ready for the sink.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Group the rows belong to
    pub identity: Identity,
    /// Object key, `{patient_id}/{patient_id}-{limb}-{nanos}.parquet`
    pub key: String,
    /// Complete Parquet file bytes
    pub data: Bytes,
    /// Footer facts
    pub metadata: ArtifactMetadata,
}

impl Artifact {
    /// File name without the patient prefix.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Object key for an artifact emitted at `emission_nanos`.
///
/// The patient id is used verbatim; envelopes with ids that are not a single
/// path segment never get this far (see [`Identity::validate`]).
pub fn artifact_key(identity: &Identity, emission_nanos: u128) -> String {
    format!(
        "{}/{}-{}-{}.{}",
        identity.patient_id, identity.patient_id, identity.limb, emission_nanos, ARTIFACT_EXTENSION
    )
}

/// Source of emission timestamps that never repeats within a process.
///
/// Wall-clock nanoseconds, bumped by one whenever the clock has not moved
/// past the previous value.
#[derive(Debug, Default)]
pub struct EmissionClock {
    last: u128,
}

impl EmissionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next strictly increasing timestamp in nanoseconds since the epoch.
    pub fn next_nanos(&mut self) -> u128 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        self.last = now.max(self.last + 1);
        self.last
    }
}

/// Destination for finalized artifacts.
pub trait ArtifactSink {
    /// Transfer one artifact to storage.
    fn put(&mut self, artifact: &Artifact) -> Result<()>;
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for &mut S {
    fn put(&mut self, artifact: &Artifact) -> Result<()> {
        (**self).put(artifact)
    }
}

/// Writes artifacts below a root directory, one sub-directory per patient.
///
/// Keys must be exactly `{patient_dir}/{file}`; anything else, including
/// keys built from unvalidated patient ids, is refused with [`Error::Sink`].
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    root: PathBuf,
}

impl LocalDirSink {
    /// Sink writing below `root`. The directory is created on first put.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory every artifact key is resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path an artifact is written to.
    pub fn path_for(&self, artifact: &Artifact) -> PathBuf {
        self.root.join(&artifact.key)
    }
}

impl ArtifactSink for LocalDirSink {
    fn put(&mut self, artifact: &Artifact) -> Result<()> {
        let sink_err = |source| Error::Sink {
            key: artifact.key.clone(),
            source,
        };
        if !is_patient_relative(&artifact.key) {
            return Err(sink_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "artifact key is not a {patient}/{file} path below the sink root",
            )));
        }
        let path = self.path_for(artifact);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(sink_err)?;
        }
        fs::write(&path, &artifact.data).map_err(sink_err)?;
        log::debug!("stored {} ({} bytes)", path.display(), artifact.data.len());
        Ok(())
    }
}

/// Two plain path segments, nothing that could climb out of the root.
fn is_patient_relative(key: &str) -> bool {
    let components: Vec<Component<'_>> = Path::new(key).components().collect();
    components.len() == 2 && components.iter().all(|c| matches!(c, Component::Normal(_)))
}

/// Keeps artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub artifacts: Vec<Artifact>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactSink for MemorySink {
    fn put(&mut self, artifact: &Artifact) -> Result<()> {
        self.artifacts.push(artifact.clone());
        Ok(())
    }
}
