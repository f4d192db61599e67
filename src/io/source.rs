//! Byte sources for the Parquet reader.
//!
//! A [`Source`] is anything that can be read at an offset and explicitly
//! closed. [`SourceReader`] shares one source between the metadata parser and
//! the row-group decoders and implements Parquet's [`ChunkReader`] on top of
//! it, so the reader never needs a path, only the handle it was given.

use crate::error::ReadError;
use bytes::Bytes;
use parquet::errors::ParquetError;
use parquet::file::reader::{ChunkReader, Length};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

/// A seekable, closeable input.
///
/// `close` is called exactly once by whoever owns the source at the time:
/// the caller before [`BatchReader::open`](crate::io::parquet::BatchReader::open)
/// succeeds, the reader afterwards.
pub trait Source: Read + Seek + Send + 'static {
    /// Release the underlying resource and report any failure doing so.
    ///
    /// # Errors
    /// Returns the I/O error raised while releasing the resource.
    fn close(&mut self) -> io::Result<()>;
}

impl Source for File {
    // The descriptor itself is closed on drop; nothing is buffered on reads.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Source for Cursor<Vec<u8>> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Source for Cursor<Bytes> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Shared, closeable handle implementing [`ChunkReader`].
///
/// Clones share the same source. After [`close`](Self::close) every read
/// fails with [`ReadError::SourceClosed`].
pub struct SourceReader<S> {
    inner: Arc<Mutex<Option<S>>>,
    len: u64,
}

impl<S> Clone for SourceReader<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            len: self.len,
        }
    }
}

impl<S: Source> SourceReader<S> {
    /// Take ownership of `source` and measure its length.
    ///
    /// # Errors
    /// On a failed seek the source is handed back alongside the error.
    pub fn new(mut source: S) -> Result<Self, (io::Error, S)> {
        let len = match source.seek(SeekFrom::End(0)) {
            Ok(len) => len,
            Err(e) => return Err((e, source)),
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(source))),
            len,
        })
    }

    /// Hand the source back without closing it.
    ///
    /// Returns `None` if it was already closed or taken.
    #[must_use]
    pub fn into_inner(self) -> Option<S> {
        lock(&self.inner).take()
    }

    /// Close the source. Later calls, and later reads through any clone,
    /// see it as closed; only the first call reaches [`Source::close`].
    ///
    /// # Errors
    /// Returns the error raised by [`Source::close`].
    pub fn close(&self) -> io::Result<()> {
        let taken = lock(&self.inner).take();
        match taken {
            Some(mut source) => source.close(),
            None => Ok(()),
        }
    }

    fn read_range(&self, start: u64, length: usize) -> io::Result<Bytes> {
        let mut guard = lock(&self.inner);
        let source = guard
            .as_mut()
            .ok_or_else(|| io::Error::other(ReadError::SourceClosed))?;
        source.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity(length);
        let read = source.by_ref().take(length as u64).read_to_end(&mut buf)?;
        if read != length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {length} bytes at {start}, read {read}"),
            ));
        }
        Ok(Bytes::from(buf))
    }

    /// Read at most `buf.len()` bytes at `start`, stopping at the end.
    fn read_at(&self, start: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = lock(&self.inner);
        let source = guard
            .as_mut()
            .ok_or_else(|| io::Error::other(ReadError::SourceClosed))?;
        source.seek(SeekFrom::Start(start))?;
        source.read(buf)
    }
}

// A panic while holding the lock leaves the source in an unknown position,
// but every read seeks first, so the poisoned value is still usable.
fn lock<S>(inner: &Mutex<Option<S>>) -> MutexGuard<'_, Option<S>> {
    inner
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Buffer size for [`ChunkReader::get_read`], which Parquet only uses for
/// page headers and the footer.
const HEADER_BUFFER: usize = 1024;

/// Sequential reader over a [`SourceReader`] starting at an offset.
///
/// Each `read` seeks the shared source to its own position, so several
/// readers can be interleaved.
pub struct SourceRead<S> {
    source: SourceReader<S>,
    position: u64,
}

impl<S: Source> Read for SourceRead<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.source.len.saturating_sub(self.position);
        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        if want == 0 {
            return Ok(0);
        }
        let n = self.source.read_at(self.position, &mut buf[..want])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<S> Length for SourceReader<S> {
    fn len(&self) -> u64 {
        self.len
    }
}

impl<S: Source> ChunkReader for SourceReader<S> {
    type T = BufReader<SourceRead<S>>;

    fn get_read(&self, start: u64) -> parquet::errors::Result<Self::T> {
        if start > self.len {
            return Err(ParquetError::EOF(format!(
                "read at {start} past end of {} byte source",
                self.len
            )));
        }
        Ok(BufReader::with_capacity(
            HEADER_BUFFER,
            SourceRead {
                source: self.clone(),
                position: start,
            },
        ))
    }

    fn get_bytes(&self, start: u64, length: usize) -> parquet::errors::Result<Bytes> {
        let end = u64::try_from(length).ok().and_then(|n| start.checked_add(n));
        if end.is_none_or(|end| end > self.len) {
            return Err(ParquetError::EOF(format!(
                "range of {length} bytes at {start} past end of {} byte source",
                self.len
            )));
        }
        self.read_range(start, length).map_err(ParquetError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ranges_and_refuses_after_close() {
        let reader = SourceReader::new(Cursor::new(b"PAR1hello".to_vec()))
            .map_err(|(e, _)| e)
            .expect("cursor seeks");
        assert_eq!(reader.len(), 9);
        assert_eq!(reader.get_bytes(4, 5).expect("in range"), Bytes::from_static(b"hello"));

        let clone = reader.clone();
        reader.close().expect("close");
        assert!(clone.get_bytes(0, 4).is_err());
        assert!(clone.into_inner().is_none());
    }

    #[test]
    fn get_read_past_end_is_an_error() {
        let reader = SourceReader::new(Cursor::new(vec![0u8; 4]))
            .map_err(|(e, _)| e)
            .expect("cursor seeks");
        assert!(reader.get_read(5).is_err());
    }

    #[test]
    fn oversized_ranges_fail_before_reading() {
        let reader = SourceReader::new(Cursor::new(vec![0u8; 16]))
            .map_err(|(e, _)| e)
            .expect("cursor seeks");
        assert!(matches!(reader.get_bytes(8, usize::MAX / 2), Err(ParquetError::EOF(_))));
        assert!(matches!(reader.get_bytes(u64::MAX, 1), Err(ParquetError::EOF(_))));
        assert!(matches!(reader.get_bytes(8, 9), Err(ParquetError::EOF(_))));
        assert_eq!(reader.get_bytes(8, 8).expect("last eight bytes").len(), 8);
    }

    #[test]
    fn get_read_reads_lazily_up_to_the_end() {
        let reader = SourceReader::new(Cursor::new(b"PAR1hello".to_vec()))
            .map_err(|(e, _)| e)
            .expect("cursor seeks");
        let mut tail = String::new();
        reader
            .get_read(4)
            .expect("in range")
            .read_to_string(&mut tail)
            .expect("read tail");
        assert_eq!(tail, "hello");

        let mut at_end = Vec::new();
        reader.get_read(9).expect("at end").read_to_end(&mut at_end).expect("read");
        assert!(at_end.is_empty());
    }
}
