//! Comics and image sequences from an unstructured archive of bitmaps
//! (CBZ, plain ZIP) or a single bitmap.

use std::sync::Arc;

use crate::asset::PublicationAsset;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::manifest::{LocalizedString, Manifest, Metadata, WEBPUB_CONTEXT, profile};
use crate::mediatype::{self, MediaType};
use crate::publication::{ContainerKind, PublicationBuilder};

use super::{
    PublicationParser, content_links, extension_of, is_ignored, title_from_name,
    title_from_structure,
};

/// Comic metadata files tolerated next to the pages.
const EXTRA_EXTENSIONS: [&str; 3] = ["acbf", "xml", "txt"];

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageParser;

impl ImageParser {
    fn accepts(asset: &dyn PublicationAsset, fetcher: &dyn Fetcher) -> bool {
        if asset.media_type().matches_any(&[mediatype::CBZ]) {
            return true;
        }
        let mut has_bitmap = false;
        for link in fetcher.links() {
            if is_ignored(&link.href) {
                continue;
            }
            if link.media_type().is_some_and(|mt| mt.is_bitmap()) {
                has_bitmap = true;
            } else if !EXTRA_EXTENSIONS.contains(&extension_of(&link.href).as_str()) {
                return false;
            }
        }
        has_bitmap
    }
}

impl PublicationParser for ImageParser {
    fn parse(
        &self,
        asset: &dyn PublicationAsset,
        fetcher: &Arc<dyn Fetcher>,
    ) -> Result<Option<PublicationBuilder>> {
        if !Self::accepts(asset, fetcher.as_ref()) {
            return Ok(None);
        }

        let mut reading_order = content_links(fetcher.as_ref(), MediaType::is_bitmap);
        let Some(cover) = reading_order.first_mut() else {
            return Err(Error::UnsupportedFormat(
                "no bitmap found in the publication".into(),
            ));
        };
        cover.rels = vec!["cover".to_string()];

        let title = title_from_structure(&reading_order)
            .unwrap_or_else(|| title_from_name(&asset.name()));
        let manifest = Manifest {
            context: vec![WEBPUB_CONTEXT.to_string()],
            metadata: Metadata {
                title: LocalizedString::new(title),
                conforms_to: vec![profile::DIVINA.to_string()],
                ..Default::default()
            },
            reading_order,
            ..Default::default()
        };

        Ok(Some(
            PublicationBuilder::new(manifest, Box::new(Arc::clone(fetcher)))
                .with_container(ContainerKind::Divina),
        ))
    }
}
