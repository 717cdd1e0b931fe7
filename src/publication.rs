//! An opened publication: its manifest and the fetcher serving its resources.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::decoder::{self, lcp::LcpKeys};
use crate::error::Result;
use crate::fetcher::{Fetcher, Resource, TransformingFetcher};
use crate::manifest::{Link, Manifest};
use crate::util::is_absolute_url;

/// The kind of container a publication was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerKind {
    Epub,
    WebPub,
    Audiobook,
    Divina,
    Pdf,
    #[default]
    Other,
}

/// Media overlay documents per reading-order item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaOverlays {
    by_href: BTreeMap<String, Vec<String>>,
}

impl MediaOverlays {
    pub fn insert(&mut self, href: impl Into<String>, smil: impl Into<String>) {
        self.by_href.entry(href.into()).or_default().push(smil.into());
    }

    /// SMIL documents synchronized with the resource at `href`.
    pub fn get(&self, href: &str) -> &[String] {
        self.by_href.get(href).map_or(&[], Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.by_href.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.by_href.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Everything a parser produced, before decoders are attached.
pub struct PublicationBuilder {
    pub manifest: Manifest,
    pub fetcher: Box<dyn Fetcher>,
    pub container: ContainerKind,
    pub lcp: Option<Arc<LcpKeys>>,
    pub media_overlays: MediaOverlays,
}

impl PublicationBuilder {
    pub fn new(manifest: Manifest, fetcher: Box<dyn Fetcher>) -> Self {
        Self {
            manifest,
            fetcher,
            container: ContainerKind::Other,
            lcp: None,
            media_overlays: MediaOverlays::default(),
        }
    }

    pub fn with_container(mut self, container: ContainerKind) -> Self {
        self.container = container;
        self
    }

    pub fn with_lcp(mut self, keys: LcpKeys) -> Self {
        self.lcp = Some(Arc::new(keys));
        self
    }

    pub fn with_media_overlays(mut self, media_overlays: MediaOverlays) -> Self {
        self.media_overlays = media_overlays;
        self
    }

    /// Wrap the fetcher with the decoders the manifest calls for.
    pub fn build(self) -> Publication {
        let transformers = decoder::transformers(
            self.manifest.metadata.identifier.as_deref(),
            self.lcp.clone(),
        );
        let fetcher: Box<dyn Fetcher> = if transformers.is_empty() {
            self.fetcher
        } else {
            Box::new(TransformingFetcher::new(self.fetcher, transformers))
        };
        Publication {
            manifest: self.manifest,
            fetcher,
            container: self.container,
            lcp: self.lcp,
            media_overlays: self.media_overlays,
            closed: AtomicBool::new(false),
        }
    }
}

/// A publication ready to be served. Dropping it closes its fetcher.
pub struct Publication {
    manifest: Manifest,
    fetcher: Box<dyn Fetcher>,
    container: ContainerKind,
    lcp: Option<Arc<LcpKeys>>,
    media_overlays: MediaOverlays,
    closed: AtomicBool,
}

impl Publication {
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn container(&self) -> ContainerKind {
        self.container
    }

    pub fn lcp(&self) -> Option<&LcpKeys> {
        self.lcp.as_deref()
    }

    pub fn media_overlays(&self) -> &MediaOverlays {
        &self.media_overlays
    }

    /// Manifest link for `href`. Relative hrefs are taken from the
    /// publication root.
    pub fn find(&self, href: &str) -> Option<Link> {
        if is_absolute_url(href) || href.starts_with('/') {
            return self.manifest.link_with_href(href).cloned();
        }
        self.manifest.link_with_href(&format!("/{href}")).cloned()
    }

    /// Resource behind `link`, decoded if the link declares an encryption.
    pub fn get(&self, link: &Link) -> Box<dyn Resource> {
        self.fetcher.get(link)
    }

    /// Unlock LCP-protected resources with the user's passphrase.
    pub fn unlock_with_passphrase(&self, passphrase: &str) -> Result<()> {
        match &self.lcp {
            Some(keys) => keys.unlock_with_passphrase(passphrase),
            None => Err(crate::Error::Lcp("publication is not LCP protected".into())),
        }
    }

    /// Unlock LCP-protected resources with the SHA-256 of the passphrase.
    pub fn unlock_with_hash_passphrase(&self, hash: &[u8]) -> Result<()> {
        match &self.lcp {
            Some(keys) => keys.unlock_with_hash_passphrase(hash),
            None => Err(crate::Error::Lcp("publication is not LCP protected".into())),
        }
    }

    /// Release the container's handles. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::debug!("closing publication {:?}", self.manifest.metadata.title());
            self.fetcher.close();
        }
    }
}

impl Drop for Publication {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Publication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publication")
            .field("title", &self.manifest.metadata.title())
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}
