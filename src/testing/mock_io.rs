//! Mock I/O helpers for testing without real files.
//!
//! [`MockSource`] is an in-memory [`Source`] that counts `close` calls and can
//! be told to fail at specific points. [`TempFilePath`] is for tests that do
//! need a path on disk.

use crate::io::source::Source;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tempfile::NamedTempFile;

/// Shared count of [`Source::close`] calls.
#[derive(Debug, Clone, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared count of bytes read from a [`MockSource`].
#[derive(Debug, Clone, Default)]
pub struct ReadCounter(Arc<AtomicU64>);

impl ReadCounter {
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Error kind raised by [`MockSource`] for injected failures.
#[derive(Debug, thiserror::Error)]
pub enum InjectedFailure {
    #[error("injected seek failure")]
    Seek,
    #[error("injected read failure at offset {0}")]
    Read(u64),
    #[error("injected close failure")]
    Close,
}

/// In-memory source with a close counter and optional failures.
///
/// # Example
///
/// ```
/// use parquet2csv::testing::MockSource;
/// use parquet2csv::Source;
///
/// let mut source = MockSource::new(b"PAR1".to_vec()).fail_close();
/// let closes = source.closes();
/// assert!(source.close().is_err());
/// assert_eq!(closes.count(), 1);
/// ```
#[derive(Debug)]
pub struct MockSource {
    inner: Cursor<Vec<u8>>,
    closes: CloseCounter,
    reads: ReadCounter,
    fail_reads_below: Option<u64>,
    fail_seek: bool,
    fail_close: bool,
}

impl MockSource {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(bytes),
            closes: CloseCounter::default(),
            reads: ReadCounter::default(),
            fail_reads_below: None,
            fail_seek: false,
            fail_close: false,
        }
    }

    /// Handle for checking close calls after the source was moved away.
    #[must_use]
    pub fn closes(&self) -> CloseCounter {
        self.closes.clone()
    }

    /// Handle for checking how many bytes were read.
    #[must_use]
    pub fn reads(&self) -> ReadCounter {
        self.reads.clone()
    }

    /// Fail every read that starts before `offset`.
    ///
    /// Parquet footers live at the end of the file, so a small offset lets
    /// metadata parse and makes the first column chunk unreadable.
    #[must_use]
    pub fn fail_reads_below(mut self, offset: u64) -> Self {
        self.fail_reads_below = Some(offset);
        self
    }

    /// Fail every seek.
    #[must_use]
    pub fn fail_seek(mut self) -> Self {
        self.fail_seek = true;
        self
    }

    /// Count the close, then report it as failed.
    #[must_use]
    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Read for MockSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let position = self.inner.position();
        if let Some(limit) = self.fail_reads_below
            && position < limit
        {
            return Err(io::Error::other(InjectedFailure::Read(position)));
        }
        let n = self.inner.read(buf)?;
        self.reads.0.fetch_add(n as u64, Ordering::SeqCst);
        Ok(n)
    }
}

impl Seek for MockSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.fail_seek {
            return Err(io::Error::other(InjectedFailure::Seek));
        }
        self.inner.seek(pos)
    }
}

impl Source for MockSource {
    fn close(&mut self) -> io::Result<()> {
        self.closes.bump();
        if self.fail_close {
            return Err(io::Error::other(InjectedFailure::Close));
        }
        Ok(())
    }
}

/// A temporary file that is automatically deleted when dropped.
pub struct TempFilePath {
    #[allow(dead_code)]
    temp_file: NamedTempFile,
    path: PathBuf,
}

impl TempFilePath {
    /// Create a new temporary file with a specific extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn with_extension(extension: &str) -> io::Result<Self> {
        let temp_file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self { temp_file, path })
    }

    /// Get the path to the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write `bytes` to a temporary `.parquet` file.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written.
pub fn mock_parquet_file(bytes: &[u8]) -> io::Result<TempFilePath> {
    let temp = TempFilePath::with_extension("parquet")?;
    std::fs::write(temp.path(), bytes)?;
    Ok(temp)
}
