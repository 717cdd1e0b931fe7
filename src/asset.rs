//! Publication assets: where a publication comes from before it is parsed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use reqwest::blocking::Client;

use crate::archive::{Archive, ArchiveFactory};
use crate::error::Result;
use crate::fetcher::{ArchiveFetcher, FileFetcher, Fetcher, HttpFetcher};
use crate::manifest::Link;
use crate::mediatype::{self, MediaType, SnifferContext};
use crate::util::href_directory;

/// A digital medium offering access to a publication.
pub trait PublicationAsset: Send + Sync {
    /// Name of the asset, e.g. its file name.
    fn name(&self) -> String;

    /// Media type of the asset; `application/octet-stream` when unknown.
    fn media_type(&self) -> MediaType;

    /// Fetcher over the asset's content.
    fn create_fetcher(&self) -> Result<Box<dyn Fetcher>>;
}

fn binary() -> MediaType {
    MediaType::parse(mediatype::BINARY).unwrap_or_else(|| MediaType {
        ty: "application".into(),
        subtype: "octet-stream".into(),
        parameters: Default::default(),
    })
}

/// A publication stored as a file or directory on the local file system.
pub struct FileAsset {
    path: PathBuf,
    known_media_type: Option<MediaType>,
    hint: Option<String>,
    sniffed: OnceLock<(MediaType, Option<Arc<dyn Archive>>)>,
}

impl FileAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            known_media_type: None,
            hint: None,
            sniffed: OnceLock::new(),
        }
    }

    /// Asset whose media type is already known.
    pub fn with_media_type(path: impl Into<PathBuf>, media_type: MediaType) -> Self {
        Self {
            known_media_type: Some(media_type),
            ..Self::new(path)
        }
    }

    /// Asset with a media type hint, checked first while sniffing.
    pub fn with_hint(path: impl Into<PathBuf>, hint: impl Into<String>) -> Self {
        Self {
            hint: Some(hint.into()),
            ..Self::new(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sniffed(&self) -> &(MediaType, Option<Arc<dyn Archive>>) {
        self.sniffed.get_or_init(|| {
            let ctx = SnifferContext::for_path(&self.path).unwrap_or_else(|e| {
                log::debug!("cannot sniff content of {}: {e}", self.path.display());
                let ext = self.path.extension().map(|e| e.to_string_lossy().into_owned());
                SnifferContext::new().with_extension(ext.as_deref().unwrap_or_default())
            });
            let ctx = match &self.hint {
                Some(hint) => ctx.with_media_type(hint),
                None => ctx,
            };
            let media_type = self
                .known_media_type
                .clone()
                .or_else(|| mediatype::sniff(&ctx))
                .unwrap_or_else(binary);
            (media_type, ctx.archive())
        })
    }
}

impl PublicationAsset for FileAsset {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn media_type(&self) -> MediaType {
        self.sniffed().0.clone()
    }

    fn create_fetcher(&self) -> Result<Box<dyn Fetcher>> {
        if let Some(archive) = &self.sniffed().1 {
            return Ok(Box::new(ArchiveFetcher::new(Arc::clone(archive))));
        }
        if self.path.is_dir() {
            return Ok(Box::new(ArchiveFetcher::new(ArchiveFactory::open(&self.path)?)));
        }
        std::fs::metadata(&self.path)?;
        Ok(Box::new(FileFetcher::single(format!("/{}", self.name()), &self.path)))
    }
}

/// A publication reachable over HTTP: a remote ZIP read through range
/// requests, or a standalone resource such as a manifest.
pub struct RemoteAsset {
    url: String,
    media_type: MediaType,
    client: Client,
}

impl RemoteAsset {
    /// The media type comes from `media_type` when given, otherwise from the
    /// URL's extension.
    pub fn new(url: impl Into<String>, media_type: Option<MediaType>, client: Client) -> Self {
        let url = url.into();
        let media_type = media_type
            .or_else(|| mediatype::of_href(&url).and_then(MediaType::parse))
            .unwrap_or_else(binary);
        Self {
            url,
            media_type,
            client,
        }
    }
}

impl PublicationAsset for RemoteAsset {
    fn name(&self) -> String {
        let path = crate::util::href_without_suffix(&self.url);
        path.rsplit('/').next().unwrap_or(path).to_string()
    }

    fn media_type(&self) -> MediaType {
        self.media_type.clone()
    }

    fn create_fetcher(&self) -> Result<Box<dyn Fetcher>> {
        if self.media_type.is_zip() {
            let archive = ArchiveFactory::open_remote(&self.url, self.client.clone())?;
            return Ok(Box::new(ArchiveFetcher::new(archive)));
        }
        let link = Link::new(self.url.clone()).with_type(self.media_type.to_string());
        let fetcher = HttpFetcher::new(self.client.clone(), Some(href_directory(&self.url)));
        Ok(Box::new(fetcher.with_links(vec![link])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_single_file_asset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mp3");
        fs::write(&path, b"ID3\x03\x00rest").unwrap();

        let asset = FileAsset::new(&path);
        assert_eq!(asset.name(), "track.mp3");
        assert_eq!(asset.media_type().essence(), mediatype::MP3);

        let fetcher = asset.create_fetcher().unwrap();
        let links = fetcher.links();
        assert_eq!(links[0].href, "/track.mp3");
        assert_eq!(fetcher.get(&links[0]).read(Some(0..=2)).unwrap(), b"ID3");
    }

    #[test]
    fn test_known_media_type_skips_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.bin");
        fs::write(&path, b"whatever").unwrap();
        let asset = FileAsset::with_media_type(&path, MediaType::parse(mediatype::PDF).unwrap());
        assert_eq!(asset.media_type().essence(), mediatype::PDF);
    }

    #[test]
    fn test_missing_file() {
        let asset = FileAsset::new("/nonexistent/book.epub");
        assert_eq!(asset.media_type().essence(), mediatype::EPUB);
        assert!(asset.create_fetcher().is_err());
    }

    #[test]
    fn test_remote_asset_media_type() {
        let asset = RemoteAsset::new("https://example.com/pub/manifest.json?x=1", None, Client::new());
        assert_eq!(asset.name(), "manifest.json");
        assert_eq!(asset.media_type().essence(), mediatype::JSON);
    }
}
