//! Testing utilities for conversions.
//!
//! This module provides what the crate's own tests use, and what callers
//! need to test their own sinks:
//!
//! - **Fixtures**: in-memory Parquet files with known contents
//! - **Mock I/O**: sources that count `close` calls or fail on demand, and
//!   self-deleting temporary files
//! - **Assertions**: close-count checks and a CSV parser for round trips
//!
//! # Quick Start
//!
//! ```
//! use parquet2csv::*;
//! use parquet2csv::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = MockSource::new(sample_parquet_bytes()?);
//! let closes = source.closes();
//!
//! let mut rows = 0;
//! convert(&CancelToken::new(), source, Count::new(&mut rows, SinkOptions::new()))?;
//!
//! assert_eq!(rows, 3);
//! assert_closed_once(&closes);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock_io;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
pub use mock_io::*;
