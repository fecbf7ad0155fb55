//! Identity-based grouping of decoded samples.
//!
//! Every blob decoded in a batch contributes its samples to the group of its
//! `(patient_id, limb)` identity. Groups are emitted independently, one
//! artifact each.

use indexmap::IndexMap;

use crate::sample::{Identity, SensorSample};

/// All samples of one identity within a batch, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Patient and limb the samples came from
    pub identity: Identity,
    /// Samples in the order their blobs were processed
    pub samples: Vec<SensorSample>,
}

impl Group {
    /// Create a group from already ordered samples.
    pub fn new(identity: Identity, samples: Vec<SensorSample>) -> Self {
        Self { identity, samples }
    }

    /// Number of samples in this group
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Groups keyed by identity, one per distinct identity.
///
/// Iteration currently follows first occurrence of each identity, but
/// callers must not depend on cross-group order.
#[derive(Debug, Clone, Default)]
pub struct GroupedSamples {
    groups: IndexMap<Identity, Vec<SensorSample>>,
}

impl GroupedSamples {
    /// Create an empty grouping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `samples` to the group for `identity`, creating it if needed.
    pub fn extend(&mut self, identity: Identity, samples: Vec<SensorSample>) {
        match self.groups.get_mut(&identity) {
            Some(existing) => existing.extend(samples),
            None => {
                self.groups.insert(identity, samples);
            }
        }
    }

    /// Samples collected for `identity`, if any blob carried it
    pub fn get(&self, identity: &Identity) -> Option<&[SensorSample]> {
        self.groups.get(identity).map(Vec::as_slice)
    }

    /// Number of distinct identities
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total sample count across all groups
    pub fn total_samples(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Iterate over (identity, samples) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&Identity, &[SensorSample])> {
        self.groups.iter().map(|(id, samples)| (id, samples.as_slice()))
    }

    /// Consume and iterate over groups
    pub fn into_groups(self) -> impl Iterator<Item = Group> {
        self.groups
            .into_iter()
            .map(|(identity, samples)| Group::new(identity, samples))
    }
}

/// Combine per-blob sample sequences into one group per identity.
///
/// Samples sharing an identity are concatenated in input order. Nothing is
/// dropped, reordered, or validated.
pub fn combine_groups<I>(inputs: I) -> GroupedSamples
where
    I: IntoIterator<Item = (Identity, Vec<SensorSample>)>,
{
    let mut grouped = GroupedSamples::new();
    for (identity, samples) in inputs {
        grouped.extend(identity, samples);
    }
    grouped
}
