use super::byte_source::ByteSource;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Stateful `Read + Seek` view of a shared [`ByteSource`].
///
/// Lets `zip::ZipArchive` read the central directory from any source.
pub struct ByteSourceCursor {
    inner: Arc<dyn ByteSource>,
    position: u64,
}

impl ByteSourceCursor {
    pub fn new(inner: Arc<dyn ByteSource>) -> Self {
        Self { inner, position: 0 }
    }
}

impl Read for ByteSourceCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let total_len = self.inner.len();
        if self.position >= total_len {
            return Ok(0);
        }
        let max_read = (total_len - self.position).min(buf.len() as u64) as usize;

        let read = self
            .inner
            .read_at_into(self.position, &mut buf[..max_read])?;
        self.position += read as u64;
        Ok(read)
    }
}

impl Seek for ByteSourceCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(p) => self.inner.len().checked_add_signed(p),
            SeekFrom::Current(p) => self.position.checked_add_signed(p),
        };
        let Some(new_pos) = new_pos else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before 0"));
        };
        self.position = new_pos;
        Ok(self.position)
    }
}

/// Sequential reader over the window `[start, start + len)` of a source.
///
/// Reads are chunked so that an HTTP-backed source issues bounded range
/// requests.
pub struct RangeReader {
    inner: Arc<dyn ByteSource>,
    position: u64,
    end: u64,
}

/// Largest single read issued against the underlying source.
const MAX_CHUNK: usize = 64 * 1024;

impl RangeReader {
    pub fn new(inner: Arc<dyn ByteSource>, start: u64, len: u64) -> Self {
        let end = start.saturating_add(len).min(inner.len());
        Self {
            inner,
            position: start.min(end),
            end,
        }
    }

    /// Bytes left in the window.
    pub fn remaining(&self) -> u64 {
        self.end - self.position
    }
}

impl Read for RangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = self.remaining().min(buf.len().min(MAX_CHUNK) as u64) as usize;
        if want == 0 {
            return Ok(0);
        }
        let read = self.inner.read_at_into(self.position, &mut buf[..want])?;
        self.position += read as u64;
        Ok(read)
    }
}
