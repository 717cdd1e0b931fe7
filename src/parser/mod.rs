//! Format parsers turning an asset into a [`PublicationBuilder`].
//!
//! Parsers are tried in order by the [`Streamer`](crate::streamer::Streamer).
//! A parser answers `Ok(None)` for assets it does not handle, so only real
//! failures are reported as errors.

pub mod audio;
pub mod epub;
pub mod image;
pub mod webpub;

use std::sync::Arc;

use reqwest::blocking::Client;

use crate::asset::PublicationAsset;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::manifest::Link;
use crate::mediatype::MediaType;
use crate::publication::PublicationBuilder;

pub use audio::AudioParser;
pub use epub::EpubParser;
pub use image::ImageParser;
pub use webpub::WebPubParser;

/// Builds a publication from an asset of a format it knows.
pub trait PublicationParser: Send + Sync {
    /// Parse `asset`, reading its content through `fetcher`.
    ///
    /// Returns `Ok(None)` when the asset is not of this parser's format.
    fn parse(
        &self,
        asset: &dyn PublicationAsset,
        fetcher: &Arc<dyn Fetcher>,
    ) -> Result<Option<PublicationBuilder>>;
}

/// Parsers used when the configuration does not replace them. `client`
/// serves the resources of standalone manifests.
pub fn default_parsers(client: Option<Client>) -> Vec<Box<dyn PublicationParser>> {
    let webpub = client.map(WebPubParser::new).unwrap_or_default();
    vec![
        Box::new(EpubParser),
        Box::new(webpub),
        Box::new(AudioParser),
        Box::new(ImageParser),
    ]
}

/// Links of `fetcher` accepted by `keep`, sorted by href, skipping hidden
/// files and archive metadata.
pub(crate) fn content_links(fetcher: &dyn Fetcher, keep: impl Fn(&MediaType) -> bool) -> Vec<Link> {
    let mut links: Vec<Link> = fetcher
        .links()
        .into_iter()
        .filter(|link| !is_ignored(&link.href))
        .filter(|link| link.media_type().is_some_and(|mt| keep(&mt)))
        .collect();
    links.sort_by(|a, b| a.href.cmp(&b.href));
    links
}

/// Hidden files and archive metadata.
pub(crate) fn is_ignored(href: &str) -> bool {
    href.trim_start_matches('/').split('/').any(|segment| {
        segment.starts_with('.') || segment == "__MACOSX" || segment.eq_ignore_ascii_case("Thumbs.db")
    })
}

/// Publication title guessed from a single top-level directory holding
/// every entry, as in `Title/01.mp3`, `Title/02.mp3`.
pub(crate) fn title_from_structure(links: &[Link]) -> Option<String> {
    let mut common: Option<&str> = None;
    for link in links {
        let (first, _) = link.href.trim_start_matches('/').split_once('/')?;
        match common {
            Some(c) if c != first => return None,
            _ => common = Some(first),
        }
    }
    common.filter(|c| !c.is_empty()).map(str::to_string)
}

/// Lowercased extension of `href`, without the dot.
pub(crate) fn extension_of(href: &str) -> String {
    let name = href.rsplit('/').next().unwrap_or(href);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Asset name without its extension, used as a fallback title.
pub(crate) fn title_from_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::fetcher::{BytesResource, Resource};

    /// Lists hrefs typed from their extension; every resource is empty.
    pub struct ListFetcher(pub Vec<&'static str>);

    impl Fetcher for ListFetcher {
        fn links(&self) -> Vec<Link> {
            self.0
                .iter()
                .map(|href| {
                    let link = Link::new(*href);
                    match crate::mediatype::of_href(href) {
                        Some(mt) => link.with_type(mt),
                        None => link,
                    }
                })
                .collect()
        }

        fn get(&self, link: &Link) -> Box<dyn Resource> {
            Box::new(BytesResource::new(link.clone(), Vec::new()))
        }
    }

    pub struct NamedAsset {
        pub name: &'static str,
        pub media_type: &'static str,
    }

    impl PublicationAsset for NamedAsset {
        fn name(&self) -> String {
            self.name.to_string()
        }

        fn media_type(&self) -> MediaType {
            MediaType::parse(self.media_type).unwrap()
        }

        fn create_fetcher(&self) -> Result<Box<dyn Fetcher>> {
            unreachable!()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ListFetcher;
    use super::*;

    #[test]
    fn test_content_links_sorted_and_filtered() {
        let fetcher = ListFetcher(vec![
            "/b.png",
            "/__MACOSX/._a.png",
            "/.hidden.png",
            "/a.jpg",
            "/notes.txt",
            "/Thumbs.db",
        ]);
        let links = content_links(&fetcher, MediaType::is_bitmap);
        let hrefs: Vec<_> = links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, ["/a.jpg", "/b.png"]);
    }

    #[test]
    fn test_title_from_structure() {
        let links = |hrefs: &[&str]| hrefs.iter().map(|h| Link::new(*h)).collect::<Vec<_>>();
        assert_eq!(
            title_from_structure(&links(&["/Book/01.mp3", "/Book/02.mp3"])).as_deref(),
            Some("Book")
        );
        assert_eq!(title_from_structure(&links(&["/Book/01.mp3", "/Other/02.mp3"])), None);
        assert_eq!(title_from_structure(&links(&["/01.mp3"])), None);
        assert_eq!(extension_of("/Book/Track.01.MP3"), "mp3");
        assert_eq!(extension_of("/dir.d/README"), "");
    }

    #[test]
    fn test_title_from_name() {
        assert_eq!(title_from_name("Moby Dick.cbz"), "Moby Dick");
        assert_eq!(title_from_name("no-extension"), "no-extension");
        assert_eq!(title_from_name(".hidden"), ".hidden");
    }
}
