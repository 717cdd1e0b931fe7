//! Readium Web Publications: a standalone manifest, or a ZIP package with
//! `manifest.json` at its root.

use std::sync::Arc;

use log::{debug, warn};
use reqwest::blocking::Client;

use crate::asset::PublicationAsset;
use crate::decoder::lcp::{LcpKeys, LcpLicense};
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, HttpFetcher, Route, RoutingFetcher};
use crate::manifest::{Link, Manifest, profile};
use crate::mediatype::{self, MediaType};
use crate::publication::{ContainerKind, PublicationBuilder};
use crate::util::is_http_url;

use super::PublicationParser;

const MANIFEST_PATH: &str = "/manifest.json";
const LICENSE_PATH: &str = "/license.lcpl";

const WEBPUB_TYPES: [&str; 8] = [
    mediatype::READIUM_WEBPUB,
    mediatype::READIUM_WEBPUB_MANIFEST,
    mediatype::READIUM_AUDIOBOOK,
    mediatype::READIUM_AUDIOBOOK_MANIFEST,
    mediatype::LCP_PROTECTED_AUDIOBOOK,
    mediatype::DIVINA,
    mediatype::DIVINA_MANIFEST,
    mediatype::LCP_PROTECTED_PDF,
];

/// Parses RWPM manifests and packages.
///
/// Resources of a standalone manifest are served over HTTP with `client`,
/// or a default client created when needed.
#[derive(Default, Clone)]
pub struct WebPubParser {
    client: Option<Client>,
}

impl WebPubParser {
    pub fn new(client: Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    fn client(&self) -> Result<Client> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => Client::builder()
                .build()
                .map_err(|e| Error::Resource(crate::error::ResourceError::other(e))),
        }
    }
}

impl PublicationParser for WebPubParser {
    fn parse(
        &self,
        asset: &dyn PublicationAsset,
        fetcher: &Arc<dyn Fetcher>,
    ) -> Result<Option<PublicationBuilder>> {
        let media_type = asset.media_type();
        if !media_type.matches_any(&WEBPUB_TYPES) {
            return Ok(None);
        }
        let packaged = !media_type.is_rwpm();

        let json = if packaged {
            fetcher.get(&Link::new(MANIFEST_PATH)).read_as_json()?
        } else {
            // A standalone manifest is the only link of its fetcher.
            let link = fetcher
                .links()
                .into_iter()
                .next()
                .ok_or_else(|| Error::InvalidManifest("no manifest to read".into()))?;
            fetcher.get(&link).read_as_json()?
        };
        let manifest = Manifest::from_json(json, packaged)
            .map_err(|e| Error::InvalidManifest(format!("failed parsing RWPM manifest: {e}")))?;

        if media_type.matches_any(&[mediatype::LCP_PROTECTED_PDF])
            && (manifest.reading_order.is_empty()
                || !manifest
                    .reading_order
                    .iter()
                    .all(|l| l.media_type().is_some_and(|mt| mt.is_pdf())))
        {
            return Err(Error::InvalidManifest("invalid LCP protected PDF".into()));
        }

        let fetcher: Box<dyn Fetcher> = if packaged {
            Box::new(Arc::clone(fetcher))
        } else {
            // Absolute resources of a standalone manifest live on the web.
            Box::new(RoutingFetcher::new(vec![
                Route::new(Box::new(HttpFetcher::new(self.client()?, None)), |link: &Link| {
                    is_http_url(&link.href)
                }),
                Route::fallback(Box::new(Arc::clone(fetcher))),
            ]))
        };

        let container = container_kind(&manifest, &media_type);
        let mut builder = PublicationBuilder::new(manifest, fetcher).with_container(container);
        if packaged && let Some(keys) = read_license(builder.fetcher.as_ref()) {
            builder = builder.with_lcp(keys);
        }
        Ok(Some(builder))
    }
}

fn container_kind(manifest: &Manifest, media_type: &MediaType) -> ContainerKind {
    if manifest.conforms_to(profile::AUDIOBOOK)
        || media_type.matches_any(&[
            mediatype::READIUM_AUDIOBOOK,
            mediatype::READIUM_AUDIOBOOK_MANIFEST,
            mediatype::LCP_PROTECTED_AUDIOBOOK,
        ])
    {
        ContainerKind::Audiobook
    } else if manifest.conforms_to(profile::DIVINA)
        || media_type.matches_any(&[mediatype::DIVINA, mediatype::DIVINA_MANIFEST])
    {
        ContainerKind::Divina
    } else if manifest.conforms_to(profile::PDF) || media_type.matches_any(&[mediatype::LCP_PROTECTED_PDF]) {
        ContainerKind::Pdf
    } else {
        ContainerKind::WebPub
    }
}

fn read_license(fetcher: &dyn Fetcher) -> Option<LcpKeys> {
    let bytes = fetcher.get(&Link::new(LICENSE_PATH)).read(None).ok()?;
    match LcpLicense::from_json(&bytes) {
        Ok(license) => {
            debug!("Package is protected by LCP license {}", license.id);
            Some(LcpKeys::new(license))
        }
        Err(e) => {
            warn!("Skipping malformed LCP license: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{BytesResource, FailureResource, Resource};

    struct PackageFetcher(Vec<(&'static str, String)>);

    impl Fetcher for PackageFetcher {
        fn links(&self) -> Vec<Link> {
            self.0.iter().map(|(href, _)| Link::new(*href)).collect()
        }

        fn get(&self, link: &Link) -> Box<dyn Resource> {
            match self.0.iter().find(|(href, _)| *href == link.href) {
                Some((_, body)) => Box::new(BytesResource::new(link.clone(), body.clone().into_bytes())),
                None => Box::new(FailureResource::not_found(link.clone())),
            }
        }
    }

    struct Asset(&'static str);

    impl PublicationAsset for Asset {
        fn name(&self) -> String {
            "publication".into()
        }

        fn media_type(&self) -> MediaType {
            MediaType::parse(self.0).unwrap()
        }

        fn create_fetcher(&self) -> Result<Box<dyn Fetcher>> {
            unreachable!()
        }
    }

    fn manifest(conforms_to: &str, reading_order_type: &str) -> String {
        serde_json::json!({
            "metadata": {"title": "Title", "conformsTo": conforms_to},
            "links": [{"rel": "self", "href": "https://example.com/manifest.json", "type": "application/webpub+json"}],
            "readingOrder": [{"href": "chapter.file", "type": reading_order_type}]
        })
        .to_string()
    }

    fn parse(media_type: &'static str, files: Vec<(&'static str, String)>) -> Result<Option<PublicationBuilder>> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(PackageFetcher(files));
        WebPubParser::default().parse(&Asset(media_type), &fetcher)
    }

    #[test]
    fn test_ignores_other_formats() {
        assert!(parse(mediatype::EPUB, Vec::new()).unwrap().is_none());
    }

    #[test]
    fn test_packaged_manifest() {
        let builder = parse(
            mediatype::READIUM_AUDIOBOOK,
            vec![(MANIFEST_PATH, manifest(profile::AUDIOBOOK, "audio/mpeg"))],
        )
        .unwrap()
        .unwrap();
        assert_eq!(builder.container, ContainerKind::Audiobook);
        assert_eq!(builder.manifest.metadata.title(), "Title");
        // The self link no longer describes a packaged manifest.
        assert!(builder.manifest.link_with_rel("self").is_none());
        assert!(builder.manifest.link_with_rel("alternate").is_some());
        assert_eq!(builder.manifest.reading_order[0].href, "/chapter.file");
    }

    #[test]
    fn test_missing_package_manifest() {
        assert!(parse(mediatype::READIUM_WEBPUB, Vec::new()).is_err());
    }

    #[test]
    fn test_lcp_pdf_requires_pdf_reading_order() {
        let result = parse(
            mediatype::LCP_PROTECTED_PDF,
            vec![(MANIFEST_PATH, manifest(profile::PDF, "text/html"))],
        );
        assert!(matches!(result, Err(Error::InvalidManifest(_))));

        let builder = parse(
            mediatype::LCP_PROTECTED_PDF,
            vec![(MANIFEST_PATH, manifest(profile::PDF, "application/pdf"))],
        )
        .unwrap()
        .unwrap();
        assert_eq!(builder.container, ContainerKind::Pdf);
    }
}
