//! Common utilities shared across the sensor decoders

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur while decoding envelopes and sensor rows
#[derive(Debug)]
pub enum DecodeError {
    /// Envelope JSON deserialization failed
    Json(serde_json::Error),
    /// Envelope payload was not valid base64
    Base64(base64::DecodeError),
    /// A single row slice did not have the fixed row width
    RowLength { expected: usize, actual: usize },
    /// A sample was built from the wrong number of measurement values
    FieldCount { expected: usize, actual: usize },
    /// Patient id cannot be used as a storage path segment
    InvalidPatientId(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "envelope JSON decode error: {}", e),
            DecodeError::Base64(e) => write!(f, "envelope payload base64 error: {}", e),
            DecodeError::RowLength { expected, actual } => write!(
                f,
                "row must be exactly {} bytes, got {}",
                expected, actual
            ),
            DecodeError::FieldCount { expected, actual } => write!(
                f,
                "sample needs exactly {} measurement values, got {}",
                expected, actual
            ),
            DecodeError::InvalidPatientId(id) => {
                write!(f, "patient id {:?} is not a valid path segment", id)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Json(e) => Some(e),
            DecodeError::Base64(e) => Some(e),
            DecodeError::RowLength { .. } => None,
            DecodeError::FieldCount { .. } => None,
            DecodeError::InvalidPatientId(_) => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

impl From<base64::DecodeError> for DecodeError {
    fn from(e: base64::DecodeError) -> Self {
        DecodeError::Base64(e)
    }
}

// ============================================================================
// Byte helpers
// ============================================================================

/// Read a little-endian u64 at `offset`.
///
/// Callers guarantee `offset + 8 <= bytes.len()`.
#[inline]
pub fn read_u64_le(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(word)
}

/// Read a little-endian IEEE-754 double at `offset` by reinterpreting its bits.
#[inline]
pub fn read_f64_le(bytes: &[u8], offset: usize) -> f64 {
    f64::from_bits(read_u64_le(bytes, offset))
}

/// Decode a standard base64 payload (the encoding JSON producers use for byte arrays).
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(BASE64.decode(encoded.trim().as_bytes())?)
}

/// Encode bytes as standard base64.
pub fn encode_base64(raw: &[u8]) -> String {
    BASE64.encode(raw)
}
