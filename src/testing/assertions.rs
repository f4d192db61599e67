//! Assertion functions for conversion tests.

use super::mock_io::CloseCounter;

/// Assert that a source was closed exactly once.
///
/// # Panics
///
/// Panics if the close count is anything but one.
///
/// # Example
///
/// ```
/// use parquet2csv::Source;
/// use parquet2csv::testing::{MockSource, assert_closed_once};
///
/// let mut source = MockSource::new(Vec::new());
/// let closes = source.closes();
/// source.close().unwrap();
/// assert_closed_once(&closes);
/// ```
pub fn assert_closed_once(closes: &CloseCounter) {
    assert_eq!(
        closes.count(),
        1,
        "Source close count mismatch:\n  Expected: 1\n  Actual: {}",
        closes.count()
    );
}

/// Parse delimited text back into rows of cells, header included.
///
/// # Panics
///
/// Panics if `text` is not valid delimited text.
///
/// # Example
///
/// ```
/// use parquet2csv::testing::parse_csv;
///
/// let rows = parse_csv("a;b\n\"x;y\";2\n", b';');
/// assert_eq!(rows, vec![vec!["a", "b"], vec!["x;y", "2"]]);
/// ```
#[cfg(feature = "io-csv")]
#[must_use]
pub fn parse_csv(text: &str, delimiter: u8) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader
        .records()
        .map(|record| {
            record
                .expect("valid delimited text")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect()
}
