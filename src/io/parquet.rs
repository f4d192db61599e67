//! Parquet batch reading.
//!
//! This module provides:
//! - [`BatchReader`]: opens a [`Source`], parses the footer once and owns the
//!   source until [`BatchReader::close`].
//! - [`BatchStream`]: a lazy, single-pass iterator of [`Batch`]es that stops
//!   after the first error.
//! - [`Batch`]: a decoded Arrow `RecordBatch` with its memory reservation.
//!
//! # Design notes
//! - Opening is two steps. If the footer cannot be parsed the source is handed
//!   back untouched in [`OpenError::source`]; if the decoder settings are
//!   rejected afterwards the reader closes the source itself and joins both
//!   errors.
//! - With `parallel` set, row groups are decoded in windows on the rayon pool
//!   and re-emitted in file order, so the stream looks the same to the sink.
//!   Batches are charged to the [`MemoryPool`] when decoded, so a window
//!   waiting in the queue shows up in the pool's peak.

use crate::cancel::CancelToken;
use crate::error::{ReadError, join_error};
use crate::io::source::{Source, SourceReader};
use crate::memory::{MemoryPool, Reservation};
use crate::options::{ColumnOptions, ReadOptions, Selection};
use anyhow::{Context, Result, anyhow};
use arrow::datatypes::{DataType, FieldRef, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{
    ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReaderBuilder,
};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

type BatchIter = Box<dyn Iterator<Item = Result<Batch>> + Send>;

/// One decoded row-batch.
///
/// Read it through [`record`](Self::record); nothing in this crate mutates it.
/// [`release`](Self::release) frees its memory early and marks it released.
pub struct Batch {
    record: RecordBatch,
    reservation: Reservation,
    released: Arc<AtomicBool>,
}

impl Batch {
    fn reserve(record: RecordBatch, pool: &MemoryPool) -> Self {
        let reservation = pool.reserve(record.get_array_memory_size());
        Self {
            record,
            reservation,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn record(&self) -> &RecordBatch {
        &self.record
    }

    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.record.schema()
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.record.num_rows()
    }

    /// Bytes accounted to this batch in its pool.
    #[must_use]
    pub fn reserved_bytes(&self) -> usize {
        self.reservation.bytes()
    }

    /// A handle that outlives the batch and reports whether it was released.
    #[must_use]
    pub fn probe(&self) -> ReleaseProbe {
        ReleaseProbe(Arc::clone(&self.released))
    }

    /// Drop the columns now and return their bytes to the pool.
    pub fn release(self) {
        let Self {
            record,
            reservation,
            released,
        } = self;
        drop(record);
        reservation.release();
        released.store(true, Ordering::SeqCst);
    }

    /// Keep the columns and stop accounting for them.
    #[must_use]
    pub fn into_record(self) -> RecordBatch {
        self.record
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("rows", &self.record.num_rows())
            .field("columns", &self.record.num_columns())
            .field("reserved_bytes", &self.reservation.bytes())
            .finish()
    }
}

/// Observes whether a [`Batch`] was explicitly released.
#[derive(Debug, Clone)]
pub struct ReleaseProbe(Arc<AtomicBool>);

impl ReleaseProbe {
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Failure to open a [`BatchReader`].
///
/// `source` is `Some` when the reader never took ownership of it; the caller
/// is then responsible for closing it.
pub struct OpenError<S> {
    pub error: anyhow::Error,
    pub source: Option<S>,
}

impl<S> fmt::Debug for OpenError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenError")
            .field("error", &self.error)
            .field("source_returned", &self.source.is_some())
            .finish()
    }
}

impl<S> fmt::Display for OpenError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

/// An open Parquet file.
///
/// Must be closed with [`close`](Self::close); closing consumes the reader,
/// so it happens at most once. Streams created by [`records`](Self::records)
/// may outlive it and fail on their next pull.
pub struct BatchReader<S: Source> {
    input: SourceReader<S>,
    metadata: ArrowReaderMetadata,
    batch_size: usize,
    parallel: bool,
    pool: MemoryPool,
}

impl<S: Source> BatchReader<S> {
    /// Open `source` with a fresh [`MemoryPool`].
    ///
    /// # Errors
    /// See [`open_in`](Self::open_in).
    pub fn open(source: S, options: &ReadOptions) -> Result<Self, OpenError<S>> {
        Self::open_in(source, options, MemoryPool::default())
    }

    /// Parse the footer of `source` and prepare the decoder.
    ///
    /// # Errors
    /// - Unreadable or malformed metadata: `source` is returned in the error.
    /// - Rejected decoder settings (e.g. a non-positive batch size): the
    ///   source is closed and any close failure is joined to the error.
    pub fn open_in(
        source: S,
        options: &ReadOptions,
        pool: MemoryPool,
    ) -> Result<Self, OpenError<S>> {
        let input = SourceReader::new(source).map_err(|(e, source)| OpenError {
            error: anyhow::Error::new(e).context("measure parquet source"),
            source: Some(source),
        })?;

        let metadata = match ArrowReaderMetadata::load(&input, ArrowReaderOptions::new()) {
            Ok(m) => m,
            Err(e) => {
                return Err(OpenError {
                    error: anyhow::Error::new(e).context("read parquet metadata"),
                    source: input.into_inner(),
                });
            }
        };

        let (metadata, batch_size) = match decoder_settings(metadata, options) {
            Ok(settings) => settings,
            Err(e) => {
                let closed = input.close().context("close parquet source");
                return Err(OpenError {
                    error: join_error(e, closed),
                    source: None,
                });
            }
        };

        let reader = Self {
            input,
            metadata,
            batch_size,
            parallel: options.parallel(),
            pool,
        };
        debug!(
            rows = reader.num_rows(),
            row_groups = reader.num_row_groups(),
            columns = reader.schema().fields().len(),
            batch_size,
            parallel = reader.parallel,
            "opened parquet file"
        );
        Ok(reader)
    }

    /// Arrow schema of the file, after column overrides.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(self.metadata.schema())
    }

    #[must_use]
    pub fn num_rows(&self) -> i64 {
        self.metadata.metadata().file_metadata().num_rows()
    }

    #[must_use]
    pub fn num_row_groups(&self) -> usize {
        self.metadata.metadata().num_row_groups()
    }

    #[must_use]
    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    /// Start a lazy pass over `selection`.
    ///
    /// Problems with the selection itself are reported as the stream's only
    /// element rather than here.
    #[must_use]
    pub fn records(&self, ctx: &CancelToken, selection: Selection) -> BatchStream {
        match self.plan(selection) {
            Ok((schema, inner)) => BatchStream {
                schema,
                ctx: ctx.clone(),
                delivered: 0,
                state: StreamState::Running(inner),
            },
            Err(e) => BatchStream {
                schema: self.schema(),
                ctx: ctx.clone(),
                delivered: 0,
                state: StreamState::Failed(e),
            },
        }
    }

    /// Close the source.
    ///
    /// # Errors
    /// Returns the source's close error.
    pub fn close(self) -> Result<()> {
        debug!("closing parquet file");
        self.input.close().context("close parquet source")
    }

    fn plan(&self, selection: Selection) -> Result<(SchemaRef, BatchIter)> {
        let num_row_groups = self.num_row_groups();
        let row_groups = match selection.row_groups {
            Some(groups) => {
                if let Some(bad) = groups.iter().find(|&&g| g >= num_row_groups) {
                    return Err(anyhow!(
                        "row group {bad} out of range: file has {num_row_groups} row groups"
                    ));
                }
                groups
            }
            None => (0..num_row_groups).collect(),
        };

        let (schema, mask) = match selection.columns {
            Some(mut columns) => {
                columns.sort_unstable();
                columns.dedup();
                let projected = self
                    .metadata
                    .schema()
                    .project(&columns)
                    .context("project columns")?;
                let mask = ProjectionMask::roots(self.metadata.parquet_schema(), columns);
                (Arc::new(projected), Some(mask))
            }
            None => (self.schema(), None),
        };

        let decoder = Decoder {
            input: self.input.clone(),
            metadata: self.metadata.clone(),
            mask,
            batch_size: self.batch_size,
            pool: self.pool.clone(),
        };

        Ok((schema, decoder.start(row_groups, self.parallel)?))
    }
}

/// Everything needed to build a decoder for some row groups.
///
/// Batches are accounted in `pool` as soon as they are decoded.
struct Decoder<S: Source> {
    input: SourceReader<S>,
    metadata: ArrowReaderMetadata,
    mask: Option<ProjectionMask>,
    batch_size: usize,
    pool: MemoryPool,
}

impl<S: Source> Decoder<S> {
    fn builder(&self, row_groups: Vec<usize>) -> ParquetRecordBatchReaderBuilder<SourceReader<S>> {
        let builder =
            ParquetRecordBatchReaderBuilder::new_with_metadata(self.input.clone(), self.metadata.clone())
                .with_batch_size(self.batch_size)
                .with_row_groups(row_groups);
        match &self.mask {
            Some(mask) => builder.with_projection(mask.clone()),
            None => builder,
        }
    }

    fn serial(self, row_groups: Vec<usize>) -> Result<BatchIter> {
        let reader = self
            .builder(row_groups)
            .build()
            .context("build parquet record batch reader")?;
        let pool = self.pool;
        Ok(Box::new(reader.map(move |item| {
            let record = item.context("decode record batch")?;
            Ok(Batch::reserve(record, &pool))
        })))
    }

    #[cfg(feature = "parallel-io")]
    fn start(self, row_groups: Vec<usize>, parallel: bool) -> Result<BatchIter> {
        if parallel {
            let width = num_cpus::get().max(1);
            return Ok(Box::new(parallel::RowGroupWindows::new(self, row_groups, width)));
        }
        self.serial(row_groups)
    }

    #[cfg(not(feature = "parallel-io"))]
    fn start(self, row_groups: Vec<usize>, parallel: bool) -> Result<BatchIter> {
        if parallel {
            debug!("parallel decode requested without `parallel-io`; decoding serially");
        }
        self.serial(row_groups)
    }

    /// Decode a whole row group, stopping at its first error.
    #[cfg(feature = "parallel-io")]
    fn row_group(&self, row_group: usize) -> Vec<Result<RecordBatch>> {
        let reader = match self.builder(vec![row_group]).build() {
            Ok(reader) => reader,
            Err(e) => {
                return vec![Err(anyhow::Error::new(e)
                    .context(format!("build decoder for row group {row_group}")))];
            }
        };
        let mut out = Vec::new();
        for item in reader {
            let failed = item.is_err();
            out.push(item.with_context(|| format!("decode row group {row_group}")));
            if failed {
                break;
            }
        }
        out
    }
}

#[cfg(feature = "parallel-io")]
mod parallel {
    use super::{Batch, Decoder};
    use crate::io::source::Source;
    use anyhow::Result;
    use arrow::record_batch::RecordBatch;
    use rayon::prelude::*;
    use std::collections::VecDeque;

    /// Decodes `width` row groups at a time on the rayon pool and yields
    /// their batches in file order.
    ///
    /// Queued batches hold their reservations while they wait, so the pool
    /// sees a whole window at once.
    pub(super) struct RowGroupWindows<S: Source> {
        decoder: Decoder<S>,
        pending: VecDeque<usize>,
        width: usize,
        ready: VecDeque<Result<Batch>>,
    }

    impl<S: Source> RowGroupWindows<S> {
        pub(super) fn new(decoder: Decoder<S>, row_groups: Vec<usize>, width: usize) -> Self {
            Self {
                decoder,
                pending: row_groups.into(),
                width: width.max(1),
                ready: VecDeque::new(),
            }
        }

        fn fill(&mut self) {
            let width = self.width;
            let window: Vec<usize> = (0..width).map_while(|_| self.pending.pop_front()).collect();
            let decoder = &self.decoder;
            let decoded: Vec<Vec<Result<RecordBatch>>> = window
                .into_par_iter()
                .map(|row_group| decoder.row_group(row_group))
                .collect();
            let pool = &self.decoder.pool;
            self.ready.extend(
                decoded
                    .into_iter()
                    .flatten()
                    .map(|item| item.map(|record| Batch::reserve(record, pool))),
            );
        }
    }

    impl<S: Source> Iterator for RowGroupWindows<S> {
        type Item = Result<Batch>;

        fn next(&mut self) -> Option<Self::Item> {
            while self.ready.is_empty() && !self.pending.is_empty() {
                self.fill();
            }
            self.ready.pop_front()
        }
    }
}

enum StreamState {
    Running(BatchIter),
    Failed(anyhow::Error),
    Done,
}

/// Lazy, single-pass sequence of batches.
///
/// Yields `Ok(batch)` in file order, then either ends or yields exactly one
/// `Err` and ends. The [`CancelToken`] is checked before every pull.
pub struct BatchStream {
    schema: SchemaRef,
    ctx: CancelToken,
    delivered: usize,
    state: StreamState,
}

impl BatchStream {
    /// Schema shared by every batch of this stream.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Batches handed out so far.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl Iterator for BatchStream {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.state, StreamState::Done) {
            StreamState::Done => None,
            StreamState::Failed(e) => Some(Err(e)),
            StreamState::Running(mut inner) => {
                if let Err(cancelled) = self.ctx.check() {
                    debug!(delivered = self.delivered, "batch stream cancelled");
                    return Some(Err(cancelled.into()));
                }
                match inner.next()? {
                    Ok(batch) => {
                        self.state = StreamState::Running(inner);
                        self.delivered += 1;
                        Some(Ok(batch))
                    }
                    Err(e) => {
                        debug!(delivered = self.delivered, error = %e, "batch stream failed");
                        Some(Err(e))
                    }
                }
            }
        }
    }
}

impl std::iter::FusedIterator for BatchStream {}

/// Validate the batch size and fold column overrides into the metadata.
fn decoder_settings(
    metadata: ArrowReaderMetadata,
    options: &ReadOptions,
) -> Result<(ArrowReaderMetadata, usize)> {
    let batch_size = usize::try_from(options.batch_size())
        .ok()
        .filter(|&n| n > 0)
        .ok_or(ReadError::InvalidBatchSize(options.batch_size()))?;

    let Some(hint) = schema_hint(metadata.schema(), options) else {
        return Ok((metadata, batch_size));
    };
    let metadata = ArrowReaderMetadata::try_new(
        Arc::clone(metadata.metadata()),
        ArrowReaderOptions::new().with_schema(hint),
    )
    .context("apply column overrides")?;
    Ok((metadata, batch_size))
}

/// Schema with column overrides applied, or `None` if nothing changes.
fn schema_hint(schema: &SchemaRef, options: &ReadOptions) -> Option<SchemaRef> {
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    let mut changed = false;
    for (index, column) in options.column_overrides() {
        let Some(field) = fields.get_mut(index) else {
            warn!(
                column = index,
                columns = schema.fields().len(),
                "ignoring override for missing column"
            );
            continue;
        };
        let data_type = override_type(field.data_type(), column);
        if &data_type != field.data_type() {
            *field = Arc::new(field.as_ref().clone().with_data_type(data_type));
            changed = true;
        }
    }
    changed.then(|| Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())))
}

fn override_type(data_type: &DataType, column: ColumnOptions) -> DataType {
    let base = match data_type {
        DataType::Utf8 if column.force_large => DataType::LargeUtf8,
        DataType::Binary if column.force_large => DataType::LargeBinary,
        DataType::List(item) if column.force_large => DataType::LargeList(Arc::clone(item)),
        other => other.clone(),
    };
    let dictionary_capable = matches!(
        base,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Binary | DataType::LargeBinary
    );
    if column.read_dict && dictionary_capable {
        DataType::Dictionary(Box::new(DataType::Int32), Box::new(base))
    } else {
        base
    }
}
