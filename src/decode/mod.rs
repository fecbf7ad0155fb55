//! Decode layer - transforms delivered records into typed sensor samples
//!
//! Two steps, both tolerant of bad input:
//!
//! - [`unwrap_envelopes`] turns the transport's JSON envelopes into
//!   [`SourceBlob`](crate::SourceBlob)s, dropping malformed records.
//! - [`decode_samples`] turns a blob's fixed-width binary rows into
//!   [`SensorSample`](crate::SensorSample)s, dropping a partial trailing row.
//!
//! # Usage
//!
//! ```ignore
//! use kine2parquet::decode::{decode_samples, unwrap_envelopes};
//!
//! let unwrapped = unwrap_envelopes(&records);
//! for blob in unwrapped.blobs {
//!     let decoded = decode_samples(&blob.raw);
//! }
//! ```

mod common;
mod envelope;
mod rows;

pub use common::DecodeError;
pub use envelope::{unwrap_envelope, unwrap_envelopes, wrap_envelope, UnwrappedEnvelopes};
pub use rows::{decode_row, decode_samples, encode_samples, DecodedSamples};

use crate::sample::{Identity, SensorSample, SourceBlob};

/// Samples decoded from a batch of blobs, still one entry per blob.
#[derive(Debug, Clone, Default)]
pub struct DecodedBlobs {
    /// `(identity, samples)` in blob order
    pub decoded: Vec<(Identity, Vec<SensorSample>)>,
    /// Number of blobs that ended in a partial row
    pub truncated_blobs: usize,
}

/// Decode every blob, keeping blob order.
pub fn decode_blobs<I>(blobs: I) -> DecodedBlobs
where
    I: IntoIterator<Item = SourceBlob>,
{
    let mut out = DecodedBlobs::default();
    for blob in blobs {
        let decoded = decode_samples(&blob.raw);
        if decoded.is_truncated() {
            log::warn!(
                "last row for {} may be corrupted: dropped {} trailing bytes, kept {} rows",
                blob.identity,
                decoded.trailing_bytes,
                decoded.len()
            );
            out.truncated_blobs += 1;
        }
        out.decoded.push((blob.identity, decoded.samples));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::MEASUREMENT_COUNT;

    #[test]
    fn test_decode_blobs_counts_truncation() {
        let row = SensorSample::new(1, [1.0; MEASUREMENT_COUNT]).to_le_bytes();
        let mut truncated = row.to_vec();
        truncated.push(0);

        let blobs = vec![
            SourceBlob::new(Identity::new("a", 1), row.to_vec()),
            SourceBlob::new(Identity::new("b", 2), truncated),
            SourceBlob::new(Identity::new("c", 3), Vec::new()),
        ];

        let decoded = decode_blobs(blobs);

        assert_eq!(decoded.truncated_blobs, 1);
        assert_eq!(decoded.decoded.len(), 3);
        assert_eq!(decoded.decoded[0].1.len(), 1);
        assert_eq!(decoded.decoded[1].1.len(), 1);
        assert!(decoded.decoded[2].1.is_empty());
        assert_eq!(decoded.decoded[1].0, Identity::new("b", 2));
    }
}
