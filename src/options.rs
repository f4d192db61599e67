//! Read configuration.
//!
//! [`ReadOptions`] is a plain value: every `with_*` method consumes the current
//! options and returns new ones with exactly one field changed, so a configured
//! value can be cloned and specialised without affecting the original.
//!
//! ```
//! use parquet2csv::ReadOptions;
//!
//! let base = ReadOptions::new();
//! let tuned = base.clone().with_batch_size(4096).with_read_dict(1, true);
//!
//! assert_eq!(base.batch_size(), 1024);
//! assert_eq!(tuned.batch_size(), 4096);
//! assert!(tuned.read_dict(1));
//! ```

use std::collections::BTreeMap;

/// Rows per decoded batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: i64 = 1024;

/// Per-column decode overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnOptions {
    /// Decode into 64-bit offset types (`LargeUtf8`, `LargeBinary`, `LargeList`).
    pub force_large: bool,
    /// Decode string/binary columns dictionary-encoded.
    pub read_dict: bool,
}

/// Options controlling how a Parquet file is decoded into record batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    batch_size: i64,
    parallel: bool,
    columns: BTreeMap<usize, ColumnOptions>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: false,
            columns: BTreeMap::new(),
        }
    }
}

impl ReadOptions {
    /// Batch size 1024, serial decode, no column overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows per batch.
    ///
    /// Any value is accepted here; the reader rejects non-positive sizes when
    /// it builds the decoder.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Decode row groups on the rayon pool ahead of consumption.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn with_force_large(mut self, column: usize, force_large: bool) -> Self {
        self.columns.entry(column).or_default().force_large = force_large;
        self
    }

    #[must_use]
    pub fn with_read_dict(mut self, column: usize, read_dict: bool) -> Self {
        self.columns.entry(column).or_default().read_dict = read_dict;
        self
    }

    #[must_use]
    pub fn batch_size(&self) -> i64 {
        self.batch_size
    }

    #[must_use]
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    #[must_use]
    pub fn force_large(&self, column: usize) -> bool {
        self.columns.get(&column).is_some_and(|c| c.force_large)
    }

    #[must_use]
    pub fn read_dict(&self, column: usize) -> bool {
        self.columns.get(&column).is_some_and(|c| c.read_dict)
    }

    /// Columns with at least one override switched on, by index.
    pub fn column_overrides(&self) -> impl Iterator<Item = (usize, ColumnOptions)> + '_ {
        self.columns
            .iter()
            .filter(|(_, c)| c.force_large || c.read_dict)
            .map(|(&i, &c)| (i, c))
    }
}

/// Which part of a file a [`BatchStream`](crate::io::parquet::BatchStream) covers.
///
/// `None` means "everything" for both fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Top-level column indexes to project, in file order.
    pub columns: Option<Vec<usize>>,
    /// Row-group indexes to read, in the given order.
    pub row_groups: Option<Vec<usize>>,
}

impl Selection {
    /// Every column of every row group.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Vec<usize>) -> Self {
        self.columns = Some(columns);
        self
    }

    #[must_use]
    pub fn with_row_groups(mut self, row_groups: Vec<usize>) -> Self {
        self.row_groups = Some(row_groups);
        self
    }
}
