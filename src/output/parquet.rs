//! Parquet output serialization
//!
//! Serializes one sample group into a self-contained Parquet file with the
//! fixed sensor schema. Rows are encoded in chunks; a chunk the file refuses
//! cleanly is retried row by row so a single bad row costs only itself. A
//! failure that may have left the file half-written abandons the artifact.

use std::io::{Cursor, Write};

use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::format::{FileMetaData, KeyValue};
use serde::{Deserialize, Serialize};

use crate::arrow::{arrow_to_samples, sensor_schema, Group, SampleBatchBuilder};
use crate::error::{Error, Result};
use crate::sample::{Identity, SensorSample};

/// Default row-group threshold: 128 MiB of buffered, encoded data.
pub const DEFAULT_MAX_ROW_GROUP_BYTES: usize = 128 * 1024 * 1024;

/// Default number of rows encoded per Arrow batch.
pub const DEFAULT_BATCH_ROWS: usize = 8192;

/// Compression codec applied to every column chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Lz4,
    Zstd,
}

impl CompressionCodec {
    fn to_parquet(self) -> Compression {
        match self {
            CompressionCodec::Uncompressed => Compression::UNCOMPRESSED,
            CompressionCodec::Snappy => Compression::SNAPPY,
            CompressionCodec::Gzip => Compression::GZIP(GzipLevel::default()),
            CompressionCodec::Lz4 => Compression::LZ4_RAW,
            CompressionCodec::Zstd => Compression::ZSTD(ZstdLevel::default()),
        }
    }

    /// Lowercase codec name, as used in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionCodec::Uncompressed => "uncompressed",
            CompressionCodec::Snappy => "snappy",
            CompressionCodec::Gzip => "gzip",
            CompressionCodec::Lz4 => "lz4",
            CompressionCodec::Zstd => "zstd",
        }
    }
}

/// Encoding parameters for emitted artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParquetOptions {
    /// Column chunk compression
    pub compression: CompressionCodec,
    /// Flush a row group once its buffered size reaches this many bytes
    pub max_row_group_bytes: usize,
    /// Rows per encoded Arrow batch
    pub batch_rows: usize,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            compression: CompressionCodec::default(),
            max_row_group_bytes: DEFAULT_MAX_ROW_GROUP_BYTES,
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

impl ParquetOptions {
    fn writer_properties(&self, identity: &Identity) -> WriterProperties {
        let metadata = vec![
            KeyValue {
                key: "patient_id".to_string(),
                value: Some(identity.patient_id.clone()),
            },
            KeyValue {
                key: "limb".to_string(),
                value: Some(identity.limb.to_string()),
            },
        ];
        // Row groups are cut by size in `SampleWriter`, not by row count.
        WriterProperties::builder()
            .set_compression(self.compression.to_parquet())
            .set_max_row_group_size(usize::MAX)
            .set_key_value_metadata(Some(metadata))
            .build()
    }
}

/// Footer facts about a finalized artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    /// Rows recorded in the footer
    pub num_rows: usize,
    /// Rows per row group, in file order
    pub row_groups: Vec<usize>,
    /// Codec the column chunks were written with
    pub compression: CompressionCodec,
    /// Rows that failed to write and were left out
    pub rows_skipped: usize,
}

/// Why a batch did not reach the file.
#[derive(Debug)]
pub enum BatchWriteError {
    /// Refused before any column buffered it; the rows may be retried
    Rejected(ParquetError),
    /// Failed after buffering started; the in-progress row group is unusable
    Poisoned(ParquetError),
}

/// Columnar file that a [`SampleWriter`] appends batches to.
///
/// [`ArrowWriter`] is the production implementation.
pub trait BatchWriter {
    /// Append a batch to the in-progress row group.
    ///
    /// A [`BatchWriteError::Rejected`] batch must leave every column
    /// untouched.
    fn write_batch(&mut self, batch: &RecordBatch) -> std::result::Result<(), BatchWriteError>;

    /// Estimated bytes buffered for the in-progress row group.
    fn in_progress_size(&self) -> usize;

    /// Rows buffered for the in-progress row group.
    fn in_progress_rows(&self) -> usize;

    /// Close the in-progress row group.
    fn flush_row_group(&mut self) -> std::result::Result<(), ParquetError>;

    /// Write the footer and return it.
    fn close(self) -> std::result::Result<FileMetaData, ParquetError>;
}

impl<W: Write + Send> BatchWriter for ArrowWriter<W> {
    fn write_batch(&mut self, batch: &RecordBatch) -> std::result::Result<(), BatchWriteError> {
        // Columns are encoded one after another and cannot be rolled back, so
        // a failure here may leave some columns holding the batch.
        self.write(batch).map_err(BatchWriteError::Poisoned)
    }

    fn in_progress_size(&self) -> usize {
        ArrowWriter::in_progress_size(self)
    }

    fn in_progress_rows(&self) -> usize {
        ArrowWriter::in_progress_rows(self)
    }

    fn flush_row_group(&mut self) -> std::result::Result<(), ParquetError> {
        self.flush()
    }

    fn close(self) -> std::result::Result<FileMetaData, ParquetError> {
        ArrowWriter::close(self)
    }
}

/// Streaming writer for one group's artifact.
///
/// Created per group, fed rows, then consumed by [`SampleWriter::finish`];
/// a finished writer cannot be written to again.
pub struct SampleWriter<B: BatchWriter> {
    identity: Identity,
    writer: B,
    builder: SampleBatchBuilder,
    options: ParquetOptions,
    rows_skipped: usize,
}

impl<W: Write + Send> SampleWriter<ArrowWriter<W>> {
    /// Open a Parquet container with the sensor schema on `target`.
    ///
    /// # Arguments
    ///
    /// * `identity` - Group the file holds, recorded in the footer metadata
    /// * `target` - Any type implementing `std::io::Write + Send`
    /// * `options` - Codec, row-group threshold and chunk size
    ///
    /// # Returns
    ///
    /// * `Ok(SampleWriter)` - Ready to accept rows
    /// * `Err(Error::Create)` - If the container could not be opened
    pub fn try_new(identity: Identity, target: W, options: &ParquetOptions) -> Result<Self> {
        let props = options.writer_properties(&identity);
        match ArrowWriter::try_new(target, sensor_schema(), Some(props)) {
            Ok(writer) => Ok(Self::from_writer(identity, writer, options)),
            Err(source) => Err(Error::Create { identity, source }),
        }
    }
}

impl<B: BatchWriter> SampleWriter<B> {
    /// Wrap an already opened batch writer.
    pub fn from_writer(identity: Identity, writer: B, options: &ParquetOptions) -> Self {
        Self {
            builder: SampleBatchBuilder::with_capacity(options.batch_rows.max(1)),
            identity,
            writer,
            options: options.clone(),
            rows_skipped: 0,
        }
    }

    /// Append rows in order.
    ///
    /// A chunk the writer refuses is retried row by row; rows refused again
    /// are logged and counted, never returned. Returns `Err(Error::Write)`
    /// only when the file itself can no longer be trusted.
    pub fn write_rows(&mut self, samples: &[SensorSample]) -> Result<()> {
        for chunk in samples.chunks(self.options.batch_rows.max(1)) {
            self.write_chunk(chunk)?;
            self.maybe_flush_row_group()?;
        }
        Ok(())
    }

    /// Rows refused so far.
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// Write the footer and release the target.
    ///
    /// Runs even when rows were skipped. Any failure here is fatal for the
    /// artifact.
    pub fn finish(self) -> Result<ArtifactMetadata> {
        let SampleWriter {
            identity,
            writer,
            options,
            rows_skipped,
            ..
        } = self;
        let footer = match writer.close() {
            Ok(footer) => footer,
            Err(source) => return Err(Error::Finalize { identity, source }),
        };
        Ok(metadata_from_footer(&footer, options.compression, rows_skipped))
    }

    fn write_chunk(&mut self, chunk: &[SensorSample]) -> Result<()> {
        let Some(reason) = self.try_write(chunk)? else {
            return Ok(());
        };
        log::warn!(
            "error writing {} rows for {}, retrying row by row: {}",
            chunk.len(),
            self.identity,
            reason
        );
        for (idx, sample) in chunk.iter().enumerate() {
            if let Some(reason) = self.try_write(std::slice::from_ref(sample))? {
                log::warn!(
                    "skipping row {} for {}: {} ({:?})",
                    idx,
                    self.identity,
                    reason,
                    sample
                );
                self.rows_skipped += 1;
            }
        }
        Ok(())
    }

    /// `Ok(Some(reason))` when the rows were refused without reaching the file.
    fn try_write(&mut self, rows: &[SensorSample]) -> Result<Option<ParquetError>> {
        let batch = match self.encode(rows) {
            Ok(batch) => batch,
            Err(e) => return Ok(Some(ParquetError::General(e.to_string()))),
        };
        match self.writer.write_batch(&batch) {
            Ok(()) => Ok(None),
            Err(BatchWriteError::Rejected(reason)) => Ok(Some(reason)),
            Err(BatchWriteError::Poisoned(source)) => Err(Error::Write {
                identity: self.identity.clone(),
                source,
            }),
        }
    }

    fn encode(&mut self, rows: &[SensorSample]) -> std::result::Result<RecordBatch, ArrowError> {
        debug_assert!(self.builder.is_empty());
        for sample in rows {
            self.builder.append(sample);
        }
        debug_assert_eq!(self.builder.len(), rows.len());
        self.builder.finish()
    }

    fn maybe_flush_row_group(&mut self) -> Result<()> {
        if self.writer.in_progress_size() < self.options.max_row_group_bytes {
            return Ok(());
        }
        let buffered = self.writer.in_progress_rows();
        self.writer.flush_row_group().map_err(|source| {
            log::error!(
                "error flushing row group of {} rows for {}: {}",
                buffered,
                self.identity,
                source
            );
            Error::Write {
                identity: self.identity.clone(),
                source,
            }
        })
    }
}

fn metadata_from_footer(
    footer: &FileMetaData,
    compression: CompressionCodec,
    rows_skipped: usize,
) -> ArtifactMetadata {
    ArtifactMetadata {
        num_rows: usize::try_from(footer.num_rows).unwrap_or_default(),
        row_groups: footer
            .row_groups
            .iter()
            .map(|rg| usize::try_from(rg.num_rows).unwrap_or_default())
            .collect(),
        compression,
        rows_skipped,
    }
}

/// Write one group to `target` as a finalized Parquet file.
///
/// The target is flushed after the footer; a flush failure counts as a
/// finalize failure.
///
/// # Example
///
/// ```ignore
/// use kine2parquet::output::{emit_group, ParquetOptions};
/// use std::fs::File;
///
/// let mut file = File::create("/tmp/uuid1-1.parquet")?;
/// let metadata = emit_group(&group, &mut file, &ParquetOptions::default())?;
/// println!("wrote {} rows", metadata.num_rows);
/// ```
pub fn emit_group<W: Write + Send>(
    group: &Group,
    target: &mut W,
    options: &ParquetOptions,
) -> Result<ArtifactMetadata> {
    let mut writer = SampleWriter::try_new(group.identity.clone(), &mut *target, options)?;
    writer.write_rows(&group.samples)?;
    let metadata = writer.finish()?;

    target.flush().map_err(|e| Error::Finalize {
        identity: group.identity.clone(),
        source: ParquetError::External(Box::new(e)),
    })?;

    log::debug!(
        "emitted {} rows for {} in {} row groups",
        metadata.num_rows,
        group.identity,
        metadata.row_groups.len()
    );
    Ok(metadata)
}

/// Serialize a group to Parquet in memory.
///
/// The buffer lives only for the duration of the call and is handed back as
/// `Bytes` once finalized.
pub fn to_parquet(group: &Group, options: &ParquetOptions) -> Result<(Bytes, ArtifactMetadata)> {
    let mut buffer = Cursor::new(Vec::new());
    let metadata = emit_group(group, &mut buffer, options)?;
    Ok((Bytes::from(buffer.into_inner()), metadata))
}

/// Read every sample back out of a Parquet artifact, in file order.
pub fn read_samples(data: Bytes) -> Result<Vec<SensorSample>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;
    let mut samples = Vec::new();
    for batch in reader {
        samples.extend(arrow_to_samples(&batch?)?);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::MEASUREMENT_COUNT;
    use rand::Rng;
    use std::io;

    fn random_group(identity: Identity, rows: usize) -> Group {
        let mut rng = rand::thread_rng();
        let samples = (0..rows)
            .map(|_| {
                let mut values = [0f64; MEASUREMENT_COUNT];
                for v in values.iter_mut() {
                    *v = rng.gen();
                }
                SensorSample::new(rng.gen(), values)
            })
            .collect();
        Group::new(identity, samples)
    }

    /// Accepts `limit` bytes, then fails every write. Flushing always fails.
    struct FailingWriter {
        written: usize,
        limit: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn test_to_parquet_basic() {
        let group = random_group(Identity::new("uuid1", 1), 10);
        let (data, metadata) = to_parquet(&group, &ParquetOptions::default()).unwrap();

        // Parquet files start and end with "PAR1"
        assert_eq!(&data[0..4], b"PAR1");
        assert_eq!(&data[data.len() - 4..], b"PAR1");
        assert_eq!(metadata.num_rows, 10);
        assert_eq!(metadata.row_groups, vec![10]);
        assert_eq!(metadata.compression, CompressionCodec::Snappy);
        assert_eq!(metadata.rows_skipped, 0);
    }

    #[test]
    fn test_to_parquet_roundtrip() {
        let group = random_group(Identity::new("uuid1", 1), 25);
        let (data, _) = to_parquet(&group, &ParquetOptions::default()).unwrap();

        let samples = read_samples(data).unwrap();
        assert_eq!(samples, group.samples);
    }

    #[test]
    fn test_to_parquet_empty_group() {
        let group = Group::new(Identity::new("a", 2), Vec::new());
        let (data, metadata) = to_parquet(&group, &ParquetOptions::default()).unwrap();

        assert_eq!(&data[0..4], b"PAR1");
        assert_eq!(metadata.num_rows, 0);
        assert!(read_samples(data).unwrap().is_empty());
    }

    #[test]
    fn test_footer_schema_and_codec() {
        let group = random_group(Identity::new("uuid1", 1), 3);
        let options = ParquetOptions {
            compression: CompressionCodec::Zstd,
            ..Default::default()
        };
        let (data, metadata) = to_parquet(&group, &options).unwrap();
        assert_eq!(metadata.compression, CompressionCodec::Zstd);

        let builder = ParquetRecordBatchReaderBuilder::try_new(data).unwrap();
        assert_eq!(builder.schema().fields().len(), 11);
        assert_eq!(
            builder.schema().field(0).data_type(),
            &arrow::datatypes::DataType::UInt64
        );

        let file_metadata = builder.metadata();
        let column = file_metadata.row_group(0).column(1);
        assert!(matches!(column.compression(), Compression::ZSTD(_)));

        let kv = file_metadata.file_metadata().key_value_metadata().unwrap();
        assert!(kv
            .iter()
            .any(|entry| entry.key == "patient_id" && entry.value.as_deref() == Some("uuid1")));
    }

    #[test]
    fn test_row_groups_split_by_size() {
        let group = random_group(Identity::new("uuid1", 1), 10);
        let options = ParquetOptions {
            compression: CompressionCodec::Uncompressed,
            max_row_group_bytes: 1,
            batch_rows: 4,
        };
        let (data, metadata) = to_parquet(&group, &options).unwrap();

        assert_eq!(metadata.row_groups, vec![4, 4, 2]);
        assert_eq!(metadata.num_rows, 10);

        let builder = ParquetRecordBatchReaderBuilder::try_new(data.clone()).unwrap();
        assert_eq!(builder.metadata().num_row_groups(), 3);
        assert_eq!(read_samples(data).unwrap(), group.samples);
    }

    #[test]
    fn test_emit_group_to_writer() {
        let group = random_group(Identity::new("b", 1), 7);
        let mut buffer = Cursor::new(Vec::new());

        let metadata = emit_group(&group, &mut buffer, &ParquetOptions::default()).unwrap();

        assert_eq!(metadata.num_rows, 7);
        let samples = read_samples(Bytes::from(buffer.into_inner())).unwrap();
        assert_eq!(samples, group.samples);
    }

    #[test]
    fn test_finalize_failure_is_fatal() {
        let group = random_group(Identity::new("uuid1", 1), 10);
        let mut target = FailingWriter {
            written: 0,
            limit: 4,
        };

        let err = emit_group(&group, &mut target, &ParquetOptions::default()).unwrap_err();

        assert!(err.is_write_fault());
        assert_eq!(err.identity(), Some(&Identity::new("uuid1", 1)));
    }

    /// Refuses, before buffering, any batch holding the `refused` timestamp.
    struct RefusingWriter<W: Write + Send> {
        inner: ArrowWriter<W>,
        refused: u64,
    }

    impl<W: Write + Send> BatchWriter for RefusingWriter<W> {
        fn write_batch(&mut self, batch: &RecordBatch) -> std::result::Result<(), BatchWriteError> {
            let rows = arrow_to_samples(batch)
                .map_err(|e| BatchWriteError::Rejected(ParquetError::General(e.to_string())))?;
            if rows.iter().any(|s| s.timestamp() == self.refused) {
                return Err(BatchWriteError::Rejected(ParquetError::General(
                    "value out of range".into(),
                )));
            }
            self.inner.write_batch(batch)
        }

        fn in_progress_size(&self) -> usize {
            BatchWriter::in_progress_size(&self.inner)
        }

        fn in_progress_rows(&self) -> usize {
            BatchWriter::in_progress_rows(&self.inner)
        }

        fn flush_row_group(&mut self) -> std::result::Result<(), ParquetError> {
            self.inner.flush_row_group()
        }

        fn close(self) -> std::result::Result<FileMetaData, ParquetError> {
            BatchWriter::close(self.inner)
        }
    }

    /// Fails every batch after partially buffering it.
    struct TornWriter;

    impl BatchWriter for TornWriter {
        fn write_batch(&mut self, _: &RecordBatch) -> std::result::Result<(), BatchWriteError> {
            Err(BatchWriteError::Poisoned(ParquetError::General("short write".into())))
        }

        fn in_progress_size(&self) -> usize {
            0
        }

        fn in_progress_rows(&self) -> usize {
            0
        }

        fn flush_row_group(&mut self) -> std::result::Result<(), ParquetError> {
            Ok(())
        }

        fn close(self) -> std::result::Result<FileMetaData, ParquetError> {
            Err(ParquetError::General("unreachable".into()))
        }
    }

    fn sequential_samples(n: u64) -> Vec<SensorSample> {
        (0..n)
            .map(|i| SensorSample::new(i, [i as f64; MEASUREMENT_COUNT]))
            .collect()
    }

    #[test]
    fn test_refused_row_is_skipped_and_file_finalized() {
        let samples = sequential_samples(10);
        let identity = Identity::new("uuid1", 1);
        let options = ParquetOptions {
            batch_rows: 4,
            ..Default::default()
        };
        let mut buffer = Vec::new();
        let inner = ArrowWriter::try_new(
            &mut buffer,
            sensor_schema(),
            Some(options.writer_properties(&identity)),
        )
        .unwrap();
        let refusing = RefusingWriter { inner, refused: 5 };
        let mut writer = SampleWriter::from_writer(identity, refusing, &options);

        writer.write_rows(&samples).unwrap();
        assert_eq!(writer.rows_skipped(), 1);
        let metadata = writer.finish().unwrap();

        assert_eq!(metadata.rows_skipped, 1);
        assert_eq!(metadata.num_rows, 9);
        assert_eq!(&buffer[buffer.len() - 4..], b"PAR1");

        let expected: Vec<SensorSample> = samples
            .iter()
            .copied()
            .filter(|s| s.timestamp() != 5)
            .collect();
        assert_eq!(read_samples(Bytes::from(buffer)).unwrap(), expected);
    }

    #[test]
    fn test_half_written_batch_is_not_retried() {
        let options = ParquetOptions::default();
        let mut writer = SampleWriter::from_writer(Identity::new("a", 2), TornWriter, &options);

        let err = writer.write_rows(&sequential_samples(3)).unwrap_err();

        assert!(matches!(err, Error::Write { .. }));
        assert!(err.is_write_fault());
        assert_eq!(writer.rows_skipped(), 0);
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(CompressionCodec::default().as_str(), "snappy");
        let codec: CompressionCodec = serde_json::from_str("\"zstd\"").unwrap();
        assert_eq!(codec, CompressionCodec::Zstd);
    }
}
