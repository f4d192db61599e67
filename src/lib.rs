//! # parquet2csv
//!
//! Stream a **Parquet** file into **CSV**, one Arrow record batch at a time.
//!
//! The crate is built around a small pipeline:
//!
//! 1. a [`Source`] (any `Read + Seek` handle that can be closed) is handed to a
//!    [`BatchReader`], which parses the file footer once;
//! 2. the reader produces a lazy [`BatchStream`] of [`Batch`]es;
//! 3. a [`Sink`] consumes the stream, e.g. [`CsvSink`](io::csv::CsvSink),
//!    [`Count`] or [`Discard`];
//! 4. the reader is closed, which closes the source.
//!
//! [`ReadOptions::convert`] drives all four steps and guarantees the source is
//! closed exactly once, whichever step fails. Failures from different steps
//! are never dropped: they come back together as a [`JoinedError`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use parquet2csv::*;
//! use parquet2csv::io::csv::{CsvOptions, CsvSink};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let file = std::fs::File::open("data.parquet")?;
//! let sink = CsvSink::new(std::io::stdout(), CsvOptions::new().with_delimiter(b';'));
//!
//! ReadOptions::new()
//!     .with_batch_size(4096)
//!     .convert(&CancelToken::new(), file, sink)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Counting rows
//!
//! ```no_run
//! use parquet2csv::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let mut rows = 0usize;
//! let file = std::fs::File::open("data.parquet")?;
//! convert(&CancelToken::new(), file, Count::new(&mut rows, SinkOptions::new()))?;
//! println!("{rows} rows");
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom sinks
//!
//! Any `FnOnce(&CancelToken, BatchStream) -> anyhow::Result<()>` is a sink.
//! A sink must stop at the first `Err` element and may stop earlier; the
//! driver closes the reader either way.
//!
//! ## Feature Flags
//!
//! - `io-csv` - CSV output ([`io::csv`]) and the `parquet2csv` binary
//! - `parallel-io` - decode row groups on the rayon pool when
//!   [`ReadOptions::with_parallel`] is set
//!
//! ## Module Overview
//!
//! - [`options`] - read configuration ([`ReadOptions`], [`Selection`])
//! - [`io`] - byte sources, the Parquet batch reader and CSV output
//! - [`sink`] - the sink contract and reference sinks
//! - [`convert`] - the conversion driver
//! - [`error`] - error joining and inspection
//! - [`cancel`] - advisory cancellation
//! - [`memory`] - batch memory accounting
//! - [`testing`] - fixtures and mock sources for tests

pub mod cancel;
pub mod convert;
pub mod error;
pub mod io;
pub mod memory;
pub mod options;
pub mod sink;
pub mod testing;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod cli;

// General re-exports
pub use cancel::{CancelToken, Cancelled};
pub use convert::{convert, convert_path};
pub use error::{JoinedError, ReadError};
pub use io::parquet::{Batch, BatchReader, BatchStream, OpenError, ReleaseProbe};
pub use io::source::{Source, SourceReader};
pub use memory::{MemoryPool, PoolStats};
pub use options::{ColumnOptions, DEFAULT_BATCH_SIZE, ReadOptions, Selection};
pub use sink::{Count, Discard, Sink, SinkOptions};

// Gated re-exports
#[cfg(feature = "io-csv")]
pub use io::csv::{CsvOptions, CsvSink};
