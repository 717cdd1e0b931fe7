use std::io::{self, Read, Write};
use std::ops::RangeInclusive;
use std::sync::{Arc, RwLock};

use super::{FailureResource, Fetcher, Resource, clamp_range, href_to_path};
use crate::archive::{Archive, ArchiveEntry, CompressionMethod};
use crate::error::{ResourceError, ResourceResult};
use crate::manifest::Link;
use crate::mediatype;

/// Serves the entries of an [`Archive`].
///
/// Entry `a/b.xhtml` is the link `/a/b.xhtml`. Resources share the archive
/// handle, so closing the fetcher only stops new lookups.
pub struct ArchiveFetcher {
    archive: RwLock<Option<Arc<dyn Archive>>>,
}

impl ArchiveFetcher {
    pub fn new(archive: Arc<dyn Archive>) -> Self {
        Self {
            archive: RwLock::new(Some(archive)),
        }
    }

    fn archive(&self) -> Option<Arc<dyn Archive>> {
        self.archive.read().ok()?.clone()
    }
}

impl Fetcher for ArchiveFetcher {
    fn links(&self) -> Vec<Link> {
        let Some(archive) = self.archive() else {
            return Vec::new();
        };
        archive
            .entries()
            .iter()
            .filter(|e| !e.path.ends_with('/'))
            .map(|e| {
                let href = format!("/{}", e.path);
                let mut link = Link::new(href);
                link.media_type = mediatype::of_href(&e.path).map(str::to_string);
                link
            })
            .collect()
    }

    fn get(&self, link: &Link) -> Box<dyn Resource> {
        let Some(archive) = self.archive() else {
            return Box::new(FailureResource::new(
                link.clone(),
                ResourceError::Unavailable("publication is closed".into()),
            ));
        };
        let path = href_to_path(&link.href);
        match archive.entry(path) {
            Some(entry) => Box::new(ArchiveResource {
                link: link.clone(),
                entry: entry.clone(),
                archive,
            }),
            None => Box::new(FailureResource::not_found(link.clone())),
        }
    }

    fn close(&self) {
        if let Ok(mut archive) = self.archive.write()
            && archive.take().is_some()
        {
            log::debug!("archive fetcher closed");
        }
    }
}

/// One archive entry.
pub struct ArchiveResource {
    link: Link,
    entry: ArchiveEntry,
    archive: Arc<dyn Archive>,
}

impl ArchiveResource {
    pub fn entry(&self) -> &ArchiveEntry {
        &self.entry
    }
}

impl Resource for ArchiveResource {
    fn link(&self) -> &Link {
        &self.link
    }

    fn length(&self) -> ResourceResult<u64> {
        Ok(self.entry.length)
    }

    fn read(&self, range: Option<RangeInclusive<u64>>) -> ResourceResult<Vec<u8>> {
        self.archive.read(&self.entry.path, range)
    }

    fn stream(&self, sink: &mut dyn Write, range: Option<RangeInclusive<u64>>) -> ResourceResult<u64> {
        let (start, len) = clamp_range(range, self.entry.length);
        if len == 0 {
            return Ok(0);
        }
        let reader = self.archive.reader_at(&self.entry.path, start)?;
        Ok(io::copy(&mut reader.take(len), sink)?)
    }

    fn compressed_as(&self, method: CompressionMethod) -> bool {
        self.entry.compression == method && method == CompressionMethod::Deflate
    }

    fn compressed_length(&self) -> Option<u64> {
        self.entry.compressed_length
    }

    fn stream_compressed(&self, sink: &mut dyn Write) -> ResourceResult<u64> {
        let mut reader = self.archive.compressed_reader(&self.entry.path)?;
        Ok(io::copy(&mut reader, sink)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ZipArchive;
    use std::io::Cursor;
    use zip::write::SimpleFileOptions;

    fn fixture() -> Arc<dyn Archive> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        zip.add_directory("OPS/", stored).unwrap();
        zip.start_file("OPS/chapter.xhtml", deflated).unwrap();
        zip.write_all("<p>text</p>".repeat(100).as_bytes()).unwrap();
        let data = zip.finish().unwrap().into_inner();
        Arc::new(ZipArchive::from_bytes(data).unwrap())
    }

    #[test]
    fn test_links_skip_directories() {
        let fetcher = ArchiveFetcher::new(fixture());
        let links = fetcher.links();
        let hrefs: Vec<&str> = links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, ["/mimetype", "/OPS/chapter.xhtml"]);
        assert_eq!(links[1].media_type.as_deref(), Some(mediatype::XHTML));
    }

    #[test]
    fn test_read_and_stream() {
        let fetcher = ArchiveFetcher::new(fixture());
        let res = fetcher.get(&Link::new("/OPS/chapter.xhtml#frag"));
        assert_eq!(res.length().unwrap(), 1100);
        assert_eq!(res.read(Some(3..=6)).unwrap(), b"text");

        let mut sink = Vec::new();
        assert_eq!(res.stream(&mut sink, Some(11..=21)).unwrap(), 11);
        assert_eq!(sink, b"<p>text</p>");
    }

    #[test]
    fn test_compressed_passthrough() {
        let fetcher = ArchiveFetcher::new(fixture());
        let res = fetcher.get(&Link::new("/OPS/chapter.xhtml"));
        assert!(res.compressed_as(CompressionMethod::Deflate));
        let mut raw = Vec::new();
        let n = res.stream_compressed(&mut raw).unwrap();
        assert_eq!(Some(n), res.compressed_length());

        let mut inflated = Vec::new();
        flate2::read::DeflateDecoder::new(&raw[..])
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, res.read(None).unwrap());

        let stored = fetcher.get(&Link::new("/mimetype"));
        assert!(!stored.compressed_as(CompressionMethod::Deflate));
    }

    #[test]
    fn test_missing_and_closed() {
        let fetcher = ArchiveFetcher::new(fixture());
        let kept = fetcher.get(&Link::new("/mimetype"));
        assert_eq!(fetcher.get(&Link::new("/nope")).read(None).unwrap_err().status(), 404);

        fetcher.close();
        assert_eq!(kept.read(None).unwrap(), b"application/epub+zip");
        assert_eq!(fetcher.get(&Link::new("/mimetype")).read(None).unwrap_err().status(), 503);
        assert!(fetcher.links().is_empty());
    }
}
