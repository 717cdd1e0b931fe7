//! Audiobooks from an unstructured archive of audio files (ZAB, plain ZIP)
//! or a single audio file.

use std::sync::Arc;

use crate::asset::PublicationAsset;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::manifest::{LocalizedString, Manifest, Metadata, WEBPUB_CONTEXT, profile};
use crate::mediatype;
use crate::publication::{ContainerKind, PublicationBuilder};

use super::{PublicationParser, extension_of, is_ignored, title_from_name, title_from_structure};

const AUDIO_EXTENSIONS: [&str; 13] = [
    "aac", "aiff", "alac", "flac", "m4a", "m4b", "mp3", "ogg", "oga", "mogg", "opus", "wav", "webm",
];

/// Playlists and side files tolerated next to the audio tracks.
const EXTRA_EXTENSIONS: [&str; 12] = [
    "asx", "bio", "m3u", "m3u8", "pla", "pls", "smil", "txt", "vlc", "wpl", "xspf", "zpl",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct AudioParser;

impl AudioParser {
    fn accepts(asset: &dyn PublicationAsset, fetcher: &dyn Fetcher) -> bool {
        if asset.media_type().matches_any(&[mediatype::ZAB]) {
            return true;
        }
        let mut has_audio = false;
        for link in fetcher.links() {
            if is_ignored(&link.href) || link.media_type().is_some_and(|mt| mt.is_bitmap()) {
                continue;
            }
            let ext = extension_of(&link.href);
            if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
                has_audio = true;
            } else if !EXTRA_EXTENSIONS.contains(&ext.as_str()) {
                return false;
            }
        }
        has_audio
    }
}

impl PublicationParser for AudioParser {
    fn parse(
        &self,
        asset: &dyn PublicationAsset,
        fetcher: &Arc<dyn Fetcher>,
    ) -> Result<Option<PublicationBuilder>> {
        if !Self::accepts(asset, fetcher.as_ref()) {
            return Ok(None);
        }

        let mut reading_order: Vec<_> = fetcher
            .links()
            .into_iter()
            .filter(|link| {
                !is_ignored(&link.href)
                    && AUDIO_EXTENSIONS.contains(&extension_of(&link.href).as_str())
            })
            .collect();
        if reading_order.is_empty() {
            return Err(Error::UnsupportedFormat(
                "no audio file found in the publication".into(),
            ));
        }
        reading_order.sort_by(|a, b| a.href.cmp(&b.href));

        let title = title_from_structure(&reading_order)
            .unwrap_or_else(|| title_from_name(&asset.name()));
        let manifest = Manifest {
            context: vec![WEBPUB_CONTEXT.to_string()],
            metadata: Metadata {
                title: LocalizedString::new(title),
                conforms_to: vec![profile::AUDIOBOOK.to_string()],
                ..Default::default()
            },
            reading_order,
            ..Default::default()
        };

        Ok(Some(
            PublicationBuilder::new(manifest, Box::new(Arc::clone(fetcher)))
                .with_container(ContainerKind::Audiobook),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::{ListFetcher, NamedAsset};

    fn parse(media_type: &'static str, hrefs: Vec<&'static str>) -> Option<PublicationBuilder> {
        let asset = NamedAsset {
            name: "Moby Dick.zab",
            media_type,
        };
        let fetcher: Arc<dyn Fetcher> = Arc::new(ListFetcher(hrefs));
        AudioParser.parse(&asset, &fetcher).unwrap()
    }

    #[test]
    fn test_zab_reading_order() {
        let builder = parse(
            mediatype::ZAB,
            vec!["/02.mp3", "/cover.jpg", "/01.mp3", "/playlist.m3u", "/.DS_Store"],
        )
        .unwrap();
        let manifest = &builder.manifest;
        let hrefs: Vec<_> = manifest.reading_order.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, ["/01.mp3", "/02.mp3"]);
        assert_eq!(manifest.metadata.title(), "Moby Dick");
        assert_eq!(manifest.metadata.conforms_to, [profile::AUDIOBOOK]);
        assert_eq!(builder.container, ContainerKind::Audiobook);
    }

    #[test]
    fn test_title_from_directory() {
        let builder = parse(mediatype::ZIP, vec!["/Book/1.ogg", "/Book/2.ogg"]).unwrap();
        assert_eq!(builder.manifest.metadata.title(), "Book");
    }

    #[test]
    fn test_single_audio_file() {
        let builder = parse(mediatype::MP3, vec!["/track.mp3"]).unwrap();
        assert_eq!(builder.manifest.reading_order.len(), 1);
    }

    #[test]
    fn test_rejects_other_content() {
        assert!(parse(mediatype::ZIP, vec!["/01.mp3", "/chapter.xhtml"]).is_none());
        assert!(parse(mediatype::CBZ, vec!["/01.png"]).is_none());
    }

    #[test]
    fn test_zab_without_audio_is_an_error() {
        let asset = NamedAsset {
            name: "empty.zab",
            media_type: mediatype::ZAB,
        };
        let fetcher: Arc<dyn Fetcher> = Arc::new(ListFetcher(vec!["/notes.txt"]));
        assert!(AudioParser.parse(&asset, &fetcher).is_err());
    }
}
