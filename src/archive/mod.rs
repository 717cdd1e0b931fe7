//! Containers holding publication resources: ZIP files (local or remote) and
//! plain directories.
//!
//! An [`Archive`] only deals in entry paths. Paths never start with `/`; the
//! fetcher layer adds the leading slash when it turns entries into links.

mod exploded;
mod zip_archive;

pub use exploded::ExplodedArchive;
pub use zip_archive::ZipArchive;

use std::io::Read;
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ResourceError, ResourceResult, Result};
use crate::fetcher::clamp_range;
use crate::io::{FileSource, HttpSource};

/// How an entry is stored inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Other(u16),
}

/// Attributes of a single container entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    /// Uncompressed length.
    pub length: u64,
    /// Length on disk, when it differs from `length`.
    pub compressed_length: Option<u64>,
    pub compression: CompressionMethod,
}

/// Random access to the entries of a container.
///
/// Implementations are shared behind `Arc` between the publication and every
/// in-flight resource, so readers must not rely on a shared cursor.
pub trait Archive: Send + Sync {
    /// All entries, in container order.
    fn entries(&self) -> &[ArchiveEntry];

    /// Look up an entry by its exact path.
    fn entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries().iter().find(|e| e.path == path)
    }

    /// Sequential reader over the uncompressed bytes of `path`, starting at
    /// `offset`.
    fn reader_at(&self, path: &str, offset: u64) -> ResourceResult<Box<dyn Read + Send>>;

    /// Reader over the raw deflate stream of `path`.
    ///
    /// Fails unless the entry is stored with [`CompressionMethod::Deflate`].
    fn compressed_reader(&self, path: &str) -> ResourceResult<Box<dyn Read + Send>> {
        Err(ResourceError::Other(format!("{path} is not stored compressed")))
    }

    /// Read an inclusive byte range of `path`, or the whole entry. Ranges are
    /// clamped to the entry length.
    fn read(&self, path: &str, range: Option<RangeInclusive<u64>>) -> ResourceResult<Vec<u8>> {
        let entry = self
            .entry(path)
            .ok_or_else(|| ResourceError::NotFound(path.to_string()))?;
        let (start, len) = clamp_range(range, entry.length);
        if len == 0 {
            return Ok(Vec::new());
        }
        // Entry sizes come from the central directory and are not trusted.
        let mut out = Vec::with_capacity(len.min(MAX_PREALLOCATION) as usize);
        self.reader_at(path, start)?.take(len).read_to_end(&mut out)?;
        Ok(out)
    }

    /// Raw deflate bytes of `path`.
    fn read_compressed(&self, path: &str) -> ResourceResult<Vec<u8>> {
        let mut out = Vec::new();
        self.compressed_reader(path)?.read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Largest buffer reserved up front for an entry read.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Opens archives from local paths or URLs.
pub struct ArchiveFactory;

impl ArchiveFactory {
    /// Open a directory as an exploded archive, or a file as a ZIP.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<dyn Archive>> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(Arc::new(ExplodedArchive::open(path)?));
        }
        let source = Arc::new(FileSource::open(path)?);
        Ok(Arc::new(ZipArchive::from_source(source)?))
    }

    /// Open a remote ZIP through HTTP range requests.
    pub fn open_remote(url: &str, client: reqwest::blocking::Client) -> Result<Arc<dyn Archive>> {
        let source = Arc::new(HttpSource::open(client, url)?);
        Ok(Arc::new(ZipArchive::from_source(source)?))
    }
}
