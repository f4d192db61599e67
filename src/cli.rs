//! Command line surface of the `parquet2csv` binary.
//!
//! Flags map onto [`ReadOptions`] and [`CsvOptions`]; [`run`] converts each
//! file in order and stops at the first failure.

use crate::cancel::CancelToken;
use crate::convert::convert_path;
use crate::io::csv::{CsvOptions, CsvSink};
use crate::options::{DEFAULT_BATCH_SIZE, ReadOptions};
use anyhow::Result;
use clap::{ArgAction, Parser};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("missing parquet filename")]
    MissingFiles,
}

#[derive(Debug, Parser)]
#[command(name = "parquet2csv")]
#[command(about = "Convert Parquet files to CSV on stdout", long_about = None)]
pub struct Cli {
    /// Rows per decoded record batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, allow_negative_numbers = true)]
    pub batch_size: i64,

    /// Decode row groups in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Terminate lines with CRLF.
    #[arg(long)]
    pub crlf: bool,

    /// Field delimiter (first character is used).
    #[arg(long, default_value = ",")]
    pub comma: String,

    /// Write a header row.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub header: bool,

    /// Text written for null values.
    #[arg(long = "null", default_value = "")]
    pub null: String,

    /// More logging on stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Parquet files to convert, in order.
    pub files: Vec<PathBuf>,
}

impl Cli {
    #[must_use]
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions::new()
            .with_batch_size(self.batch_size)
            .with_parallel(self.parallel)
    }

    /// # Errors
    /// Fails if `--comma` does not start with a single-byte character.
    pub fn csv_options(&self) -> Result<CsvOptions> {
        Ok(CsvOptions::new()
            .with_delimiter_str(&self.comma)?
            .with_crlf(self.crlf)
            .with_header(self.header)
            .with_null(self.null.as_str())
            .with_release_records(true))
    }

    /// Default log filter for the verbosity flag.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "parquet2csv=warn",
            1 => "parquet2csv=info",
            _ => "parquet2csv=debug",
        }
    }
}

/// Convert every file in `cli.files` to `out`, one after the other.
///
/// Each file gets its own header row when headers are on.
///
/// # Errors
/// Fails before converting anything if no file was given or the CSV options
/// are invalid; otherwise returns the first file's failure.
pub fn run<W: Write>(cli: &Cli, ctx: &CancelToken, out: &mut W) -> Result<()> {
    if cli.files.is_empty() {
        return Err(CliError::MissingFiles.into());
    }
    let read = cli.read_options();
    let csv = cli.csv_options()?;

    for path in &cli.files {
        let sink = CsvSink::new(&mut *out, csv.clone());
        convert_path(&read, ctx, path, sink)?;
        info!(file = %path.display(), "converted");
    }
    out.flush()?;
    Ok(())
}
