//! CSV output for record batches.
//!
//! [`CsvSink`] is the terminal [`Sink`] used by the command line tool. It
//! writes the stream's schema once as a header row, then one line per row.
//!
//! # Design notes
//! - Cells are rendered with Arrow's display formatters, so every Arrow type
//!   the reader can produce (including dictionary and large types) prints the
//!   same way.
//! - Quoting and escaping are left to the `csv` crate: a cell containing the
//!   delimiter, a quote or a line break is quoted.
//! - Nothing is rolled back on failure; rows written before an error stay
//!   written.

use crate::cancel::CancelToken;
use crate::io::parquet::BatchStream;
use crate::sink::Sink;
use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use csv::{Terminator, WriterBuilder};
use std::io::Write;

/// Delimiter byte was not representable in a single byte.
#[derive(Debug, thiserror::Error)]
#[error("delimiter {0:?} must be a single-byte character")]
pub struct DelimiterError(pub char);

/// How rows are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    delimiter: u8,
    crlf: bool,
    header: bool,
    null: String,
    release_records: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            crlf: false,
            header: true,
            null: String::new(),
            release_records: false,
        }
    }
}

impl CsvOptions {
    /// `,` delimited, `\n` terminated, with a header and nulls as empty cells.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Use the first character of `comma` as delimiter; `,` if it is empty.
    ///
    /// # Errors
    /// Fails if that character does not fit in one byte.
    pub fn with_delimiter_str(self, comma: &str) -> Result<Self, DelimiterError> {
        let Some(c) = comma.chars().next() else {
            return Ok(self.with_delimiter(b','));
        };
        let byte = u8::try_from(c).map_err(|_| DelimiterError(c))?;
        if !byte.is_ascii() {
            return Err(DelimiterError(c));
        }
        Ok(self.with_delimiter(byte))
    }

    /// Terminate lines with `\r\n` instead of `\n`.
    #[must_use]
    pub fn with_crlf(mut self, crlf: bool) -> Self {
        self.crlf = crlf;
        self
    }

    #[must_use]
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    /// Text written for null cells.
    #[must_use]
    pub fn with_null(mut self, null: impl Into<String>) -> Self {
        self.null = null.into();
        self
    }

    /// Release each batch once its rows are written.
    #[must_use]
    pub fn with_release_records(mut self, release: bool) -> Self {
        self.release_records = release;
        self
    }

    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    #[must_use]
    pub fn crlf(&self) -> bool {
        self.crlf
    }

    #[must_use]
    pub fn header(&self) -> bool {
        self.header
    }

    #[must_use]
    pub fn null(&self) -> &str {
        &self.null
    }
}

/// Writes a batch stream as delimited text to `W`.
pub struct CsvSink<W: Write> {
    out: W,
    options: CsvOptions,
}

impl<W: Write> CsvSink<W> {
    #[must_use]
    pub fn new(out: W, options: CsvOptions) -> Self {
        Self { out, options }
    }
}

impl<W: Write> Sink for CsvSink<W> {
    fn consume(self, _ctx: &CancelToken, records: BatchStream) -> Result<()> {
        let Self { out, options } = self;
        let terminator = if options.crlf {
            Terminator::CRLF
        } else {
            Terminator::Any(b'\n')
        };
        let mut wtr = WriterBuilder::new()
            .delimiter(options.delimiter)
            .terminator(terminator)
            .has_headers(false)
            .from_writer(out);

        if options.header {
            let schema = records.schema();
            wtr.write_record(schema.fields().iter().map(|f| f.name().as_str()))
                .context("write CSV header")?;
        }

        let format = FormatOptions::default().with_null(&options.null);
        let mut rows = 0usize;
        for batch in records {
            let batch = batch?;
            write_batch(&mut wtr, batch.record(), &format)
                .with_context(|| format!("write CSV rows after row {rows}"))?;
            rows += batch.num_rows();
            if options.release_records {
                batch.release();
            }
        }
        wtr.flush().context("flush CSV output")?;
        Ok(())
    }
}

fn write_batch<W: Write>(
    wtr: &mut csv::Writer<W>,
    record: &RecordBatch,
    format: &FormatOptions<'_>,
) -> Result<()> {
    let formatters = record
        .columns()
        .iter()
        .map(|column| ArrayFormatter::try_new(column.as_ref(), format))
        .collect::<Result<Vec<_>, _>>()
        .context("prepare cell formatters")?;
    for row in 0..record.num_rows() {
        wtr.write_record(formatters.iter().map(|f| f.value(row).to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_from_flag_text() {
        assert_eq!(CsvOptions::new().with_delimiter_str("").unwrap().delimiter(), b',');
        assert_eq!(CsvOptions::new().with_delimiter_str("\t").unwrap().delimiter(), b'\t');
        assert_eq!(CsvOptions::new().with_delimiter_str(";x").unwrap().delimiter(), b';');
        assert!(CsvOptions::new().with_delimiter_str("é").is_err());
    }
}
