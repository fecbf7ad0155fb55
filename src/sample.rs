//! Core sensor data model shared by the decode, arrow and output layers.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::decode::DecodeError;

/// Width in bytes of every field in a binary row.
pub const FIELD_BYTES: usize = 8;

/// Fields per row: the timestamp plus ten measurements.
pub const FIELD_COUNT: usize = 11;

/// Measurement values per row (everything except the timestamp).
pub const MEASUREMENT_COUNT: usize = FIELD_COUNT - 1;

/// Width in bytes of one binary row.
pub const ROW_SIZE: usize = FIELD_BYTES * FIELD_COUNT;

/// Parquet column names in wire order. Index 0 is the timestamp.
///
/// These are the short names readers of the stored artifacts expect:
/// timestamp, rotation x/y/z, rotation level, pitch, yaw, acceleration x/y/z
/// and heart rate.
pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "ts", "rx", "ry", "rz", "rl", "pt", "yw", "ax", "ay", "az", "hr",
];

/// One decoded sensor row.
///
/// Field order matches the binary wire format.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSample {
    timestamp: u64,
    rotation_x: f64,
    rotation_y: f64,
    rotation_z: f64,
    rotation_level: f64,
    pitch: f64,
    yaw: f64,
    accel_x: f64,
    accel_y: f64,
    accel_z: f64,
    heart_rate: f64,
}

impl SensorSample {
    /// Build a sample from a timestamp and the ten measurements in wire order.
    pub fn new(timestamp: u64, values: [f64; MEASUREMENT_COUNT]) -> Self {
        let [
            rotation_x,
            rotation_y,
            rotation_z,
            rotation_level,
            pitch,
            yaw,
            accel_x,
            accel_y,
            accel_z,
            heart_rate,
        ] = values;
        Self {
            timestamp,
            rotation_x,
            rotation_y,
            rotation_z,
            rotation_level,
            pitch,
            yaw,
            accel_x,
            accel_y,
            accel_z,
            heart_rate,
        }
    }

    /// Build a sample from a slice of measurements.
    ///
    /// Returns [`DecodeError::FieldCount`] unless the slice holds exactly ten values.
    pub fn from_values(timestamp: u64, values: &[f64]) -> Result<Self, DecodeError> {
        let values: [f64; MEASUREMENT_COUNT] =
            values.try_into().map_err(|_| DecodeError::FieldCount {
                expected: MEASUREMENT_COUNT,
                actual: values.len(),
            })?;
        Ok(Self::new(timestamp, values))
    }

    /// Device timestamp (column `ts`).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Rotation rate around the x axis (column `rx`).
    pub fn rotation_x(&self) -> f64 {
        self.rotation_x
    }

    /// Rotation rate around the y axis (column `ry`).
    pub fn rotation_y(&self) -> f64 {
        self.rotation_y
    }

    /// Rotation rate around the z axis (column `rz`).
    pub fn rotation_z(&self) -> f64 {
        self.rotation_z
    }

    /// Rotation magnitude (column `rl`).
    pub fn rotation_level(&self) -> f64 {
        self.rotation_level
    }

    /// Pitch (column `pt`).
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Yaw (column `yw`).
    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// Acceleration along x (column `ax`).
    pub fn accel_x(&self) -> f64 {
        self.accel_x
    }

    /// Acceleration along y (column `ay`).
    pub fn accel_y(&self) -> f64 {
        self.accel_y
    }

    /// Acceleration along z (column `az`).
    pub fn accel_z(&self) -> f64 {
        self.accel_z
    }

    /// Heart rate (column `hr`).
    pub fn heart_rate(&self) -> f64 {
        self.heart_rate
    }

    /// The ten measurements in wire order.
    pub fn values(&self) -> [f64; MEASUREMENT_COUNT] {
        [
            self.rotation_x,
            self.rotation_y,
            self.rotation_z,
            self.rotation_level,
            self.pitch,
            self.yaw,
            self.accel_x,
            self.accel_y,
            self.accel_z,
            self.heart_rate,
        ]
    }

    /// Encode this sample as one little-endian binary row.
    pub fn to_le_bytes(&self) -> [u8; ROW_SIZE] {
        let mut row = [0u8; ROW_SIZE];
        row[..FIELD_BYTES].copy_from_slice(&self.timestamp.to_le_bytes());
        for (idx, value) in self.values().iter().enumerate() {
            let offset = (idx + 1) * FIELD_BYTES;
            row[offset..offset + FIELD_BYTES].copy_from_slice(&value.to_bits().to_le_bytes());
        }
        row
    }

    /// Bitwise equality, so NaN payloads compare equal to themselves.
    pub fn bits_eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self
                .values()
                .iter()
                .zip(other.values().iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

/// Which patient and limb a blob of samples came from.
///
/// The patient id becomes a directory and file name prefix in artifact keys,
/// so it must be a single path segment (see [`Identity::validate`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    /// Patient the watch is assigned to
    #[serde(rename = "patientId", alias = "PatientID")]
    pub patient_id: String,
    /// Limb the watch is worn on
    #[serde(alias = "Limb")]
    pub limb: u8,
}

impl Identity {
    /// Create an identity. No validation happens here; see [`Identity::validate`].
    pub fn new(patient_id: impl Into<String>, limb: u8) -> Self {
        Self {
            patient_id: patient_id.into(),
            limb,
        }
    }

    /// Check that the patient id is safe to use as one path segment.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the id is non-empty and holds no `/`, `\\`, NUL or `..`
    /// * `Err(DecodeError::InvalidPatientId)` - Otherwise
    pub fn validate(&self) -> Result<(), DecodeError> {
        let id = self.patient_id.as_str();
        let unsafe_id = id.is_empty() || id.contains(['/', '\\', '\0']) || id.contains("..");
        if unsafe_id {
            return Err(DecodeError::InvalidPatientId(id.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.patient_id, self.limb)
    }
}

/// An identity paired with the raw, still-encoded rows delivered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlob {
    pub identity: Identity,
    pub raw: Bytes,
}

impl SourceBlob {
    pub fn new(identity: Identity, raw: impl Into<Bytes>) -> Self {
        Self {
            identity,
            raw: raw.into(),
        }
    }
}
