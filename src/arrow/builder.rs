//! Arrow RecordBatch builder
//!
//! Converts sensor samples to Arrow RecordBatches and back.

use arrow::array::{Array, ArrayRef, AsArray, Float64Builder, UInt64Builder};
use arrow::datatypes::{Float64Type, UInt64Type};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use super::schema::sensor_schema;
use crate::sample::{SensorSample, FIELD_COUNT, FIELD_NAMES, MEASUREMENT_COUNT};

/// Converts a slice of samples to an Arrow RecordBatch with [`sensor_schema`].
///
/// Row order is preserved.
///
/// # Example
///
/// ```ignore
/// use kine2parquet::{samples_to_arrow, SensorSample};
///
/// let samples = vec![SensorSample::new(1, [0.0; 10])];
/// let batch = samples_to_arrow(&samples)?;
/// assert_eq!(batch.num_rows(), 1);
/// ```
pub fn samples_to_arrow(samples: &[SensorSample]) -> Result<RecordBatch, ArrowError> {
    let mut builder = SampleBatchBuilder::with_capacity(samples.len());
    for sample in samples {
        builder.append(sample);
    }
    builder.finish()
}

/// Converts a RecordBatch with the sensor schema back into samples.
///
/// Columns are looked up by name, so extra columns are ignored.
pub fn arrow_to_samples(batch: &RecordBatch) -> Result<Vec<SensorSample>, ArrowError> {
    let timestamps = batch
        .column_by_name(FIELD_NAMES[0])
        .ok_or_else(|| missing_column(FIELD_NAMES[0]))?
        .as_primitive_opt::<UInt64Type>()
        .ok_or_else(|| wrong_type(FIELD_NAMES[0], "UInt64"))?;

    let mut measurements = Vec::with_capacity(MEASUREMENT_COUNT);
    for name in &FIELD_NAMES[1..] {
        let column = batch
            .column_by_name(name)
            .ok_or_else(|| missing_column(name))?
            .as_primitive_opt::<Float64Type>()
            .ok_or_else(|| wrong_type(name, "Float64"))?;
        measurements.push(column);
    }

    let mut samples = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if timestamps.is_null(row) {
            return Err(ArrowError::InvalidArgumentError(format!(
                "null timestamp at row {row}"
            )));
        }
        let mut values = [0f64; MEASUREMENT_COUNT];
        for (value, column) in values.iter_mut().zip(measurements.iter()) {
            *value = column.value(row);
        }
        samples.push(SensorSample::new(timestamps.value(row), values));
    }

    Ok(samples)
}

/// Incremental column builder for sensor samples.
///
/// One typed builder per column; `finish` resets the builders so the same
/// instance can produce consecutive batches.
pub(crate) struct SampleBatchBuilder {
    timestamp: UInt64Builder,
    measurements: Vec<Float64Builder>,
    rows: usize,
}

impl SampleBatchBuilder {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            timestamp: UInt64Builder::with_capacity(capacity),
            measurements: (0..MEASUREMENT_COUNT)
                .map(|_| Float64Builder::with_capacity(capacity))
                .collect(),
            rows: 0,
        }
    }

    pub(crate) fn append(&mut self, sample: &SensorSample) {
        self.timestamp.append_value(sample.timestamp());
        for (builder, value) in self.measurements.iter_mut().zip(sample.values()) {
            builder.append_value(value);
        }
        self.rows += 1;
    }

    pub(crate) fn len(&self) -> usize {
        self.rows
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub(crate) fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(FIELD_COUNT);
        arrays.push(Arc::new(self.timestamp.finish()));
        for builder in &mut self.measurements {
            arrays.push(Arc::new(builder.finish()));
        }
        self.rows = 0;
        RecordBatch::try_new(sensor_schema(), arrays)
    }
}

fn missing_column(name: &str) -> ArrowError {
    ArrowError::SchemaError(format!("missing column '{name}'"))
}

fn wrong_type(name: &str, expected: &str) -> ArrowError {
    ArrowError::SchemaError(format!("column '{name}' is not {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, UInt64Array};
    use arrow::datatypes::{DataType, Field, Schema};

    fn samples(n: u64) -> Vec<SensorSample> {
        (0..n)
            .map(|i| {
                let mut values = [i as f64; MEASUREMENT_COUNT];
                values[MEASUREMENT_COUNT - 1] += 0.5;
                SensorSample::new(i, values)
            })
            .collect()
    }

    #[test]
    fn test_samples_to_arrow_columns() {
        let batch = samples_to_arrow(&samples(3)).unwrap();

        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 11);

        let ts = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap();
        assert_eq!(ts.values().to_vec(), vec![0, 1, 2]);

        let hr = batch
            .column_by_name("hr")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(hr.value(2), 2.5);
    }

    #[test]
    fn test_samples_to_arrow_empty() {
        let batch = samples_to_arrow(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.schema(), sensor_schema());
    }

    #[test]
    fn test_arrow_to_samples_roundtrip() {
        let input = samples(5);
        let batch = samples_to_arrow(&input).unwrap();
        assert_eq!(arrow_to_samples(&batch).unwrap(), input);
    }

    #[test]
    fn test_arrow_to_samples_missing_column() {
        let schema = Arc::new(Schema::new(vec![Field::new("ts", DataType::UInt64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(UInt64Array::from(vec![1u64]))]).unwrap();

        let err = arrow_to_samples(&batch).unwrap_err();
        assert!(err.to_string().contains("rx"));
    }

    #[test]
    fn test_builder_reuse() {
        let mut builder = SampleBatchBuilder::with_capacity(2);
        for s in samples(2) {
            builder.append(&s);
        }
        assert_eq!(builder.len(), 2);
        let first = builder.finish().unwrap();
        assert!(builder.is_empty());

        builder.append(&samples(1)[0]);
        let second = builder.finish().unwrap();

        assert_eq!(first.num_rows(), 2);
        assert_eq!(second.num_rows(), 1);
    }
}
