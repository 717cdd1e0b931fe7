use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use zip::result::ZipError;

use super::{Archive, ArchiveEntry, CompressionMethod};
use crate::error::{ResourceError, ResourceResult};
use crate::io::{ByteSource, ByteSourceCursor, MemorySource, RangeReader};

/// A ZIP container read through positional reads on a [`ByteSource`].
///
/// The central directory is scanned once; entry data is then located by its
/// offset so concurrent readers never share a seekable handle.
pub struct ZipArchive {
    source: Arc<dyn ByteSource>,
    entries: Vec<ArchiveEntry>,
    locations: HashMap<String, EntryLoc>,
}

#[derive(Clone, Copy)]
struct EntryLoc {
    /// Index into `entries`.
    index: usize,
    /// Offset to the entry data within the ZIP file.
    data_offset: u64,
    /// Size of the data as stored.
    stored_size: u64,
}

impl ZipArchive {
    /// Scan the central directory of `source`.
    pub fn from_source(source: Arc<dyn ByteSource>) -> zip::result::ZipResult<Self> {
        let cursor = ByteSourceCursor::new(source.clone());
        let mut archive = zip::ZipArchive::new(cursor)?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut locations = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            if file.is_dir() {
                continue;
            }
            let path = file.name().trim_start_matches('/').to_string();
            let compression = match file.compression() {
                zip::CompressionMethod::Stored => CompressionMethod::Stored,
                zip::CompressionMethod::Deflated => CompressionMethod::Deflate,
                #[allow(deprecated)]
                other => CompressionMethod::Other(other.to_u16()),
            };
            let compressed_length =
                (compression != CompressionMethod::Stored).then(|| file.compressed_size());
            let data_offset = file
                .data_start()
                .ok_or(ZipError::InvalidArchive("entry data offset is unknown".into()))?;

            locations.insert(
                path.clone(),
                EntryLoc {
                    index: entries.len(),
                    data_offset,
                    stored_size: file.compressed_size(),
                },
            );
            entries.push(ArchiveEntry {
                path,
                length: file.size(),
                compressed_length,
                compression,
            });
        }

        log::debug!("zip archive: {} entries", entries.len());
        Ok(Self {
            source,
            entries,
            locations,
        })
    }

    /// Build an archive over an in-memory ZIP.
    pub fn from_bytes(data: Vec<u8>) -> zip::result::ZipResult<Self> {
        Self::from_source(Arc::new(MemorySource::new(data)))
    }

    fn locate(&self, path: &str) -> ResourceResult<(EntryLoc, &ArchiveEntry)> {
        let loc = self
            .locations
            .get(path)
            .copied()
            .ok_or_else(|| ResourceError::NotFound(format!("{path} not found in archive")))?;
        Ok((loc, &self.entries[loc.index]))
    }

    fn raw_reader(&self, loc: EntryLoc) -> RangeReader {
        RangeReader::new(self.source.clone(), loc.data_offset, loc.stored_size)
    }
}

impl Archive for ZipArchive {
    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    fn entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.locations.get(path).map(|loc| &self.entries[loc.index])
    }

    fn reader_at(&self, path: &str, offset: u64) -> ResourceResult<Box<dyn Read + Send>> {
        let (loc, entry) = self.locate(path)?;
        match entry.compression {
            CompressionMethod::Stored => {
                let skip = offset.min(loc.stored_size);
                Ok(Box::new(RangeReader::new(
                    self.source.clone(),
                    loc.data_offset + skip,
                    loc.stored_size - skip,
                )))
            }
            CompressionMethod::Deflate => {
                // Deflate has no random access: inflate from the start and
                // discard everything before `offset`.
                let mut decoder = DeflateDecoder::new(self.raw_reader(loc));
                io::copy(&mut (&mut decoder).take(offset), &mut io::sink())?;
                Ok(Box::new(decoder))
            }
            CompressionMethod::Other(method) => Err(ResourceError::Other(format!(
                "unsupported compression method {method} for {path}"
            ))),
        }
    }

    fn compressed_reader(&self, path: &str) -> ResourceResult<Box<dyn Read + Send>> {
        let (loc, entry) = self.locate(path)?;
        if entry.compression != CompressionMethod::Deflate {
            return Err(ResourceError::Other(format!("{path} is not stored compressed")));
        }
        Ok(Box::new(self.raw_reader(loc)))
    }
}
