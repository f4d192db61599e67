//! Sinks: consumers of a [`BatchStream`].
//!
//! A sink is handed the stream exactly once and either drains it or stops
//! early; the driver closes the reader either way. Any
//! `FnOnce(&CancelToken, BatchStream) -> anyhow::Result<()>` is a sink.
//!
//! Two reference sinks live here:
//! - [`Discard`] drains the stream and keeps nothing.
//! - [`Count`] adds up row counts into a caller-owned counter.
//!
//! The CSV writer lives in [`crate::io::csv`].

use crate::cancel::CancelToken;
use crate::io::parquet::BatchStream;
use anyhow::Result;

/// Consumer of a batch stream.
///
/// Implementations must stop pulling after the first `Err` element and
/// return an error for it.
pub trait Sink {
    /// Consume `records`.
    ///
    /// # Errors
    /// Returns the first stream error, or the sink's own failure.
    fn consume(self, ctx: &CancelToken, records: BatchStream) -> Result<()>;
}

impl<F> Sink for F
where
    F: FnOnce(&CancelToken, BatchStream) -> Result<()>,
{
    fn consume(self, ctx: &CancelToken, records: BatchStream) -> Result<()> {
        self(ctx, records)
    }
}

/// Options shared by the reference sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkOptions {
    release_records: bool,
}

impl SinkOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Release each batch as soon as it has been observed.
    #[must_use]
    pub fn with_release_records(mut self, release: bool) -> Self {
        self.release_records = release;
        self
    }

    #[must_use]
    pub fn release_records(&self) -> bool {
        self.release_records
    }
}

/// Drains every batch and keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard {
    options: SinkOptions,
}

impl Discard {
    #[must_use]
    pub fn new(options: SinkOptions) -> Self {
        Self { options }
    }
}

impl Sink for Discard {
    fn consume(self, _ctx: &CancelToken, records: BatchStream) -> Result<()> {
        for batch in records {
            let batch = batch?;
            if self.options.release_records {
                batch.release();
            }
        }
        Ok(())
    }
}

/// Adds the row count of every batch to a counter.
///
/// The counter is only added to, never reset, so one counter can span
/// several conversions.
#[derive(Debug)]
pub struct Count<'a> {
    counter: &'a mut usize,
    options: SinkOptions,
}

impl<'a> Count<'a> {
    #[must_use]
    pub fn new(counter: &'a mut usize, options: SinkOptions) -> Self {
        Self { counter, options }
    }
}

impl Sink for Count<'_> {
    fn consume(self, _ctx: &CancelToken, records: BatchStream) -> Result<()> {
        for batch in records {
            let batch = batch?;
            *self.counter += batch.num_rows();
            if self.options.release_records {
                batch.release();
            }
        }
        Ok(())
    }
}
