//! Fixed-width binary row decoding
//!
//! Each row is 88 bytes: a little-endian u64 timestamp followed by ten
//! little-endian IEEE-754 doubles. A blob is a plain concatenation of rows.

use super::common::{read_f64_le, read_u64_le, DecodeError};
use crate::sample::{SensorSample, FIELD_BYTES, MEASUREMENT_COUNT, ROW_SIZE};

/// Result of decoding one raw blob.
///
/// `trailing_bytes` is non-zero when the blob ended in a partial row; those
/// bytes were discarded and every complete leading row is in `samples`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSamples {
    /// Decoded rows, in wire order
    pub samples: Vec<SensorSample>,
    /// Bytes left over after the last complete row
    pub trailing_bytes: usize,
}

impl DecodedSamples {
    /// Returns true if the input ended in a partial (corrupted) row.
    pub fn is_truncated(&self) -> bool {
        self.trailing_bytes > 0
    }

    /// Number of complete rows decoded.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode a raw blob into sensor samples.
///
/// Never fails: a partial trailing row is dropped and reported through
/// [`DecodedSamples::trailing_bytes`]. Empty input yields no samples.
pub fn decode_samples(raw: &[u8]) -> DecodedSamples {
    let chunks = raw.chunks_exact(ROW_SIZE);
    let trailing_bytes = chunks.remainder().len();

    // Callers that know the identity report the anomaly at warn level.
    if trailing_bytes > 0 {
        log::debug!(
            "last row of binary data may be corrupted: {} trailing bytes after {} complete rows",
            trailing_bytes,
            raw.len() / ROW_SIZE
        );
    }

    let samples = chunks.map(decode_complete_row).collect();

    DecodedSamples {
        samples,
        trailing_bytes,
    }
}

/// Decode exactly one row.
///
/// Unlike [`decode_samples`], a slice of the wrong width is structurally
/// invalid and is rejected with [`DecodeError::RowLength`].
pub fn decode_row(row: &[u8]) -> Result<SensorSample, DecodeError> {
    if row.len() != ROW_SIZE {
        return Err(DecodeError::RowLength {
            expected: ROW_SIZE,
            actual: row.len(),
        });
    }
    Ok(decode_complete_row(row))
}

/// Encode samples into the binary row format.
pub fn encode_samples(samples: &[SensorSample]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * ROW_SIZE);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

// Length already checked by the caller.
fn decode_complete_row(row: &[u8]) -> SensorSample {
    let timestamp = read_u64_le(row, 0);
    let mut values = [0f64; MEASUREMENT_COUNT];
    for (idx, value) in values.iter_mut().enumerate() {
        *value = read_f64_le(row, (idx + 1) * FIELD_BYTES);
    }
    SensorSample::new(timestamp, values)
}
