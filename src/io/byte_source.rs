use std::fs::File;
use std::io;
#[cfg(all(not(unix), not(windows)))]
use std::io::{Read, Seek, SeekFrom};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};

/// A thread-safe, random-access source of bytes.
///
/// Reads never move a shared cursor, so concurrent requests for different
/// resources of one publication can share a source.
pub trait ByteSource: Send + Sync {
    /// Returns the total length of the source.
    fn len(&self) -> u64;

    /// Returns true if the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills `buf` with the bytes starting at `offset`.
    /// Returns `buf.len()` or an error; short reads are errors.
    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Reads exactly `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let read = self.read_at_into(offset, &mut buf)?;
        if read != len {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough data"));
        }
        Ok(buf)
    }
}

// --- Local File ---

pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn new(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> io::Result<Self> {
        Self::new(File::open(path)?)
    }
}

#[cfg(unix)]
impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)?;
        Ok(buf.len())
    }
}

#[cfg(windows)]
impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        let mut filled = 0;
        while filled < buf.len() {
            let read = self
                .file
                .seek_read(&mut buf[filled..], offset + filled as u64)?;
            if read == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough data"));
            }
            filled += read;
        }
        Ok(filled)
    }
}

#[cfg(all(not(unix), not(windows)))]
impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(buf.len())
    }
}

// --- In-Memory ---

/// An in-memory source backed by a `Vec<u8>`.
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let slice = usize::try_from(offset)
            .ok()
            .and_then(|start| self.data.get(start..start.checked_add(buf.len())?))
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "not enough data"))?;
        buf.copy_from_slice(slice);
        Ok(buf.len())
    }
}

// --- Remote (HTTP ranges) ---

/// A remote file read through HTTP `Range` requests.
///
/// The length is discovered once at construction. Each read issues one
/// `GET` with `Range: bytes=a-b`; servers answering `200` with the full body
/// are tolerated by slicing.
pub struct HttpSource {
    client: Client,
    url: String,
    len: u64,
}

impl HttpSource {
    pub fn open(client: Client, url: impl Into<String>) -> io::Result<Self> {
        let url = url.into();
        let len = Self::probe_length(&client, &url)?;
        log::debug!("remote source {url}: {len} bytes");
        Ok(Self { client, url, len })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn probe_length(client: &Client, url: &str) -> io::Result<u64> {
        let head = client.head(url).send().map_err(to_io)?;
        check_status(head.status(), url)?;
        if let Some(len) = header_u64(head.headers().get(CONTENT_LENGTH)) {
            return Ok(len);
        }

        // Some servers omit Content-Length on HEAD; ask for one byte instead.
        let probe = client.get(url).header(RANGE, "bytes=0-0").send().map_err(to_io)?;
        check_status(probe.status(), url)?;
        probe
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|total| total.trim().parse().ok())
            .ok_or_else(|| io::Error::other(format!("cannot determine length of {url}")))
    }
}

fn to_io(e: reqwest::Error) -> io::Error {
    if e.is_timeout() {
        io::Error::new(io::ErrorKind::TimedOut, e)
    } else if e.is_connect() {
        io::Error::new(io::ErrorKind::ConnectionRefused, e)
    } else {
        io::Error::other(e)
    }
}

fn check_status(status: StatusCode, url: &str) -> io::Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{url}: {status}"),
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{url}: {status}"),
        )),
        _ => Err(io::Error::other(format!("{url}: {status}"))),
    }
}

fn header_u64(value: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    value?.to_str().ok()?.trim().parse().ok()
}

impl ByteSource for HttpSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at_into(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let last = offset + buf.len() as u64 - 1;
        if last >= self.len {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough data"));
        }

        let response = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={offset}-{last}"))
            .send()
            .map_err(to_io)?;
        let status = response.status();
        check_status(status, &self.url)?;
        let body = response.bytes().map_err(to_io)?;

        let data = if status == StatusCode::PARTIAL_CONTENT {
            &body[..]
        } else {
            let start = offset as usize;
            body.get(start..).unwrap_or_default()
        };
        if data.len() < buf.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short range response"));
        }
        buf.copy_from_slice(&data[..buf.len()]);
        Ok(buf.len())
    }
}
