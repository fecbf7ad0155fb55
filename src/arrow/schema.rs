//! Arrow schema accessors
//!
//! The sensor schema mirrors the binary row layout: one `UInt64` timestamp
//! column followed by ten `Float64` measurement columns, none nullable.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use once_cell::sync::Lazy;

use crate::sample::FIELD_NAMES;

static SENSOR_SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    let fields: Vec<Field> = FIELD_NAMES
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let data_type = if idx == 0 {
                DataType::UInt64
            } else {
                DataType::Float64
            };
            Field::new(*name, data_type, false)
        })
        .collect();
    Arc::new(Schema::new(fields))
});

/// Returns the Arrow schema for sensor samples.
///
/// Schema fields:
/// - timestamp: UInt64 (required)
/// - rotation_x: Float64 (required)
/// - rotation_y: Float64 (required)
/// - rotation_z: Float64 (required)
/// - rotation_level: Float64 (required)
/// - pitch: Float64 (required)
/// - yaw: Float64 (required)
/// - accel_x: Float64 (required)
/// - accel_y: Float64 (required)
/// - accel_z: Float64 (required)
/// - heart_rate: Float64 (required)
pub fn sensor_schema() -> SchemaRef {
    Arc::clone(&SENSOR_SCHEMA)
}
