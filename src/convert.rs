//! The conversion driver: open → stream → close.
//!
//! Whatever happens, the source is closed exactly once per call:
//!
//! | stage that failed | who closes the source | returned error |
//! |---|---|---|
//! | footer parse | the driver | open error joined with close error |
//! | decoder settings | the reader, inside `open` | open error joined with close error |
//! | a batch / the sink | the driver, via the reader | sink error joined with close error |
//! | nothing | the driver, via the reader | close error, if any |

use crate::cancel::CancelToken;
use crate::error::join;
use crate::io::parquet::{BatchReader, OpenError};
use crate::io::source::Source;
use crate::memory::MemoryPool;
use crate::options::{ReadOptions, Selection};
use crate::sink::Sink;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing::debug;

impl ReadOptions {
    /// Stream `source` through `sink` with these options.
    ///
    /// # Errors
    /// Returns every failure of open, sink and close; when more than one
    /// happened they come back as a [`JoinedError`](crate::error::JoinedError).
    pub fn convert<S, K>(&self, ctx: &CancelToken, source: S, sink: K) -> Result<()>
    where
        S: Source,
        K: Sink,
    {
        self.convert_in(ctx, source, sink, MemoryPool::default())
    }

    /// Like [`convert`](Self::convert), accounting batch memory in `pool`.
    ///
    /// # Errors
    /// See [`convert`](Self::convert).
    pub fn convert_in<S, K>(
        &self,
        ctx: &CancelToken,
        source: S,
        sink: K,
        pool: MemoryPool,
    ) -> Result<()>
    where
        S: Source,
        K: Sink,
    {
        let reader = match BatchReader::open_in(source, self, pool) {
            Ok(reader) => reader,
            Err(OpenError {
                error,
                source: Some(mut source),
            }) => {
                let closed = source.close().context("close parquet source");
                return join([Err(error), closed]);
            }
            Err(OpenError {
                error,
                source: None,
            }) => return Err(error),
        };

        let records = reader.records(ctx, Selection::all());
        let consumed = sink.consume(ctx, records);
        if let Err(e) = &consumed {
            debug!(error = %e, "sink stopped with an error");
        }
        join([consumed, reader.close()])
    }
}

/// Stream `source` through `sink` with default [`ReadOptions`].
///
/// # Errors
/// See [`ReadOptions::convert`].
pub fn convert<S, K>(ctx: &CancelToken, source: S, sink: K) -> Result<()>
where
    S: Source,
    K: Sink,
{
    ReadOptions::new().convert(ctx, source, sink)
}

/// Open the file at `path` and convert it.
///
/// # Errors
/// Fails if the file cannot be opened, otherwise see [`ReadOptions::convert`].
pub fn convert_path<K: Sink>(
    options: &ReadOptions,
    ctx: &CancelToken,
    path: impl AsRef<Path>,
    sink: K,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    options
        .convert(ctx, file, sink)
        .with_context(|| format!("convert {}", path.display()))
}
