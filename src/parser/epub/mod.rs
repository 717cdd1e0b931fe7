//! EPUB 2 and 3 publications.

mod clock;
mod encryption;
mod metadata;
mod navigation;
mod package;
pub mod vocab;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};

use crate::asset::PublicationAsset;
use crate::decoder::lcp::{LICENSE_PATH, LcpKeys, LcpLicense};
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::manifest::{Encryption, Link, Manifest, PublicationCollection, WEBPUB_CONTEXT};
use crate::mediatype::{self, MediaType};
use crate::publication::{ContainerKind, MediaOverlays, PublicationBuilder};
use crate::xml::{NS_CONTAINER, XmlElement};

pub use clock::parse_clock_value;
use metadata::{EpubMetadata, MetadataContext, build_metadata, publication_links};
use navigation::{Navigation, guide_landmarks, parse_nav_doc, parse_ncx};
use package::{Item, ItemRef, PackageDocument};
use vocab::{ITEM, ITEMREF, RENDITION};

const CONTAINER_PATH: &str = "/META-INF/container.xml";
const ENCRYPTION_PATH: &str = "/META-INF/encryption.xml";
const DISPLAY_OPTIONS_PATHS: [&str; 2] = [
    "/META-INF/com.apple.ibooks.display-options.xml",
    "/META-INF/com.kobobooks.display-options.xml",
];

/// Parses EPUB packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpubParser;

impl crate::parser::PublicationParser for EpubParser {
    fn parse(
        &self,
        asset: &dyn PublicationAsset,
        fetcher: &Arc<dyn Fetcher>,
    ) -> Result<Option<PublicationBuilder>> {
        if !asset.media_type().matches_any(&[mediatype::EPUB]) {
            return Ok(None);
        }

        let opf_path = root_file_path(fetcher.as_ref())?;
        let opf = read_xml(fetcher.as_ref(), &opf_path)
            .map_err(|e| Error::InvalidEpub(format!("invalid OPF file: {e}")))?;
        let package = PackageDocument::parse(&opf, &opf_path)?;

        let navigation = parse_navigation(&package, fetcher.as_ref());
        let encryption = parse_encryption_data(fetcher.as_ref());
        let display_options = parse_display_options(fetcher.as_ref());

        let factory = ManifestFactory {
            fallback_title: asset.name(),
            package: &package,
            navigation,
            encryption,
            display_options,
        };
        let (manifest, media_overlays) = factory.create();

        let mut builder = PublicationBuilder::new(manifest, Box::new(Arc::clone(fetcher)))
            .with_container(ContainerKind::Epub)
            .with_media_overlays(media_overlays);
        if let Some(keys) = read_license(fetcher.as_ref()) {
            builder = builder.with_lcp(keys);
        }
        Ok(Some(builder))
    }
}

fn read_xml(fetcher: &dyn Fetcher, href: &str) -> Result<XmlElement> {
    Ok(fetcher.get(&Link::new(href)).read_as_xml()?)
}

/// Path of the package document, from `META-INF/container.xml`.
fn root_file_path(fetcher: &dyn Fetcher) -> Result<String> {
    let container = read_xml(fetcher, CONTAINER_PATH)
        .map_err(|e| Error::InvalidEpub(format!("failed loading container.xml: {e}")))?;
    let path = container
        .child(NS_CONTAINER, "rootfiles")
        .and_then(|r| r.child(NS_CONTAINER, "rootfile"))
        .ok_or_else(|| Error::MissingElement("rootfile in container.xml".into()))?
        .attr("full-path")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::InvalidEpub("no full-path in rootfile".into()))?;
    Ok(if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    })
}

/// Nav document when the package declares one, NCX otherwise.
fn parse_navigation(package: &PackageDocument, fetcher: &dyn Fetcher) -> Navigation {
    let nav_property = format!("{ITEM}nav");
    if let Some(item) = package.items.iter().find(|i| i.has_property(&nav_property)) {
        match read_xml(fetcher, &item.href) {
            Ok(doc) => return parse_nav_doc(&doc, &item.href),
            Err(e) => warn!("Skipping navigation document {}: {e}", item.href),
        }
    }

    let ncx = package
        .spine
        .toc
        .as_deref()
        .and_then(|id| package.item(id))
        .or_else(|| {
            package.items.iter().find(|i| {
                i.media_type
                    .as_deref()
                    .and_then(MediaType::parse)
                    .is_some_and(|mt| mt.matches_any(&[mediatype::NCX]))
            })
        });
    match ncx {
        Some(item) => match read_xml(fetcher, &item.href) {
            Ok(doc) => parse_ncx(&doc, &item.href),
            Err(e) => {
                warn!("Skipping NCX {}: {e}", item.href);
                Navigation::new()
            }
        },
        None => Navigation::new(),
    }
}

fn parse_encryption_data(fetcher: &dyn Fetcher) -> HashMap<String, Encryption> {
    match read_xml(fetcher, ENCRYPTION_PATH) {
        Ok(doc) => encryption::parse_encryption(&doc),
        Err(Error::Resource(e)) if e.status() == 404 => HashMap::new(),
        Err(e) => {
            warn!("Skipping malformed encryption.xml: {e}");
            HashMap::new()
        }
    }
}

/// Options of the first iBooks or Kobo display options file found.
fn parse_display_options(fetcher: &dyn Fetcher) -> HashMap<String, String> {
    let Some(doc) = DISPLAY_OPTIONS_PATHS
        .iter()
        .find_map(|path| read_xml(fetcher, path).ok())
    else {
        return HashMap::new();
    };
    let platform = if doc.local == "platform" {
        Some(&doc)
    } else {
        doc.elements()
            .find(|e| e.local == "platform")
            .or_else(|| doc.elements().flat_map(|e| e.elements()).find(|e| e.local == "platform"))
    };
    platform
        .into_iter()
        .flat_map(|p| p.elements().filter(|e| e.local == "option"))
        .filter_map(|option| {
            let name = option.attr("name").filter(|n| !n.is_empty())?;
            let value = option.text().trim().to_string();
            (!value.is_empty()).then(|| (name.to_string(), value))
        })
        .collect()
}

fn read_license(fetcher: &dyn Fetcher) -> Option<LcpKeys> {
    let bytes = match fetcher.get(&Link::new(format!("/{LICENSE_PATH}"))).read(None) {
        Ok(bytes) => bytes,
        Err(e) => {
            if e.status() != 404 {
                warn!("Cannot read LCP license: {e}");
            }
            return None;
        }
    };
    match LcpLicense::from_json(&bytes) {
        Ok(license) => {
            debug!("Publication is protected by LCP license {}", license.id);
            Some(LcpKeys::new(license))
        }
        Err(e) => {
            warn!("Skipping malformed LCP license: {e}");
            None
        }
    }
}

/// Maps a package document onto a manifest.
struct ManifestFactory<'a> {
    fallback_title: String,
    package: &'a PackageDocument,
    navigation: Navigation,
    encryption: HashMap<String, Encryption>,
    display_options: HashMap<String, String>,
}

impl ManifestFactory<'_> {
    fn create(self) -> (Manifest, MediaOverlays) {
        let package = self.package;
        let links = LinkFactory::new(package, &self.encryption);

        let metadata = build_metadata(
            &package.metadata,
            &MetadataContext {
                version: package.version,
                fallback_title: &self.fallback_title,
                unique_identifier: package.unique_identifier.as_deref(),
                reading_progression: package.spine.direction,
                display_options: &self.display_options,
            },
        );

        let linear: Vec<&str> = package
            .spine
            .itemrefs
            .iter()
            .filter(|r| r.linear)
            .map(|r| r.idref.as_str())
            .collect();
        let reading_order: Vec<Link> = linear
            .iter()
            .filter_map(|id| package.item(id))
            .map(|item| links.link(item))
            .collect();

        let in_reading_order = links.ids_with_fallbacks(&linear);
        let resources: Vec<Link> = package
            .items
            .iter()
            .filter(|item| !in_reading_order.contains(item.id.as_str()))
            .map(|item| links.link(item))
            .collect();

        let mut media_overlays = MediaOverlays::default();
        for link in &reading_order {
            if let Some(smil) = link.properties.media_overlay() {
                media_overlays.insert(link.href.clone(), smil);
            }
        }

        let mut navigation = self.navigation;
        let toc = navigation.remove("toc").unwrap_or_default();
        if !navigation.contains_key("landmarks") && !package.guide.is_empty() {
            navigation.insert("landmarks".into(), guide_landmarks(&package.guide));
        }
        let subcollections = navigation
            .into_iter()
            .map(|(kind, links)| {
                let key = if kind == "page-list" { "pageList".to_string() } else { kind };
                (key, vec![PublicationCollection::new(links)])
            })
            .collect();

        let manifest = Manifest {
            context: vec![WEBPUB_CONTEXT.to_string()],
            metadata,
            links: publication_links(&package.metadata),
            reading_order,
            resources,
            toc,
            subcollections,
        };
        (manifest, media_overlays)
    }
}

/// Builds publication links for manifest items.
struct LinkFactory<'a> {
    items: HashMap<&'a str, &'a Item>,
    itemrefs: HashMap<&'a str, &'a ItemRef>,
    metadata: &'a EpubMetadata,
    encryption: &'a HashMap<String, Encryption>,
    cover_id: Option<&'a str>,
}

impl<'a> LinkFactory<'a> {
    fn new(package: &'a PackageDocument, encryption: &'a HashMap<String, Encryption>) -> Self {
        Self {
            items: package.items.iter().map(|i| (i.id.as_str(), i)).collect(),
            itemrefs: package
                .spine
                .itemrefs
                .iter()
                .map(|r| (r.idref.as_str(), r))
                .collect(),
            metadata: &package.metadata,
            encryption,
            cover_id: package.metadata.cover_id(),
        }
    }

    /// Ids of `ids` and of every item in their fallback chains.
    fn ids_with_fallbacks(&self, ids: &[&'a str]) -> HashSet<&'a str> {
        let mut out = HashSet::new();
        for &id in ids {
            let mut next = Some(id);
            while let Some(id) = next {
                let Some(item) = self.items.get(id) else { break };
                if !out.insert(item.id.as_str()) {
                    break;
                }
                next = item.fallback.as_deref();
            }
        }
        out
    }

    fn link(&self, item: &Item) -> Link {
        self.link_in_chain(item, &mut vec![item.id.clone()])
    }

    /// `chain` holds the ids already on the current fallback path.
    fn link_in_chain(&self, item: &Item, chain: &mut Vec<String>) -> Link {
        let mut link = Link::new(item.href.clone());
        link.media_type = item.media_type.clone();
        link.duration = self.metadata.item_duration(&item.id);

        let mut contains = Vec::new();
        for property in &item.properties {
            match property.strip_prefix(ITEM).unwrap_or_default() {
                "scripted" => contains.push("js"),
                "mathml" => contains.push("mathml"),
                "svg" => contains.push("svg"),
                "xmp-record" => contains.push("xmp"),
                "remote-resources" => contains.push("remote-resources"),
                "nav" => link.add_rel("contents"),
                "cover-image" => link.add_rel("cover"),
                _ => {}
            }
        }
        if !contains.is_empty() {
            link.properties.set("contains", contains);
        }
        if self.cover_id == Some(item.id.as_str()) {
            link.add_rel("cover");
        }
        if let Some(itemref) = self.itemrefs.get(item.id.as_str()) {
            for (key, value) in itemref.properties.iter().filter_map(|p| itemref_property(p)) {
                link.properties.set(key, value);
            }
        }
        if let Some(encryption) = self.encryption.get(&item.href) {
            link.properties.set_encryption(encryption);
        }

        if let Some(fallback) = item.fallback.as_deref()
            && !chain.iter().any(|id| id == fallback)
            && let Some(alternate) = self.items.get(fallback)
        {
            chain.push(alternate.id.clone());
            let alternate = self.link_in_chain(alternate, chain);
            link.alternates.push(alternate);
        }
        if let Some(overlay) = item.media_overlay.as_deref()
            && !chain.iter().any(|id| id == overlay)
            && let Some(smil) = self.items.get(overlay)
        {
            link.properties.set("mediaOverlay", smil.href.clone());
            let mut overlay_chain = vec![smil.id.clone()];
            link.alternates.push(self.link_in_chain(smil, &mut overlay_chain));
        }
        link
    }
}

/// Link property set by a spine `itemref` property.
fn itemref_property(property: &str) -> Option<(&'static str, &'static str)> {
    let rendition = property.strip_prefix(RENDITION);
    let itemref = property.strip_prefix(ITEMREF);
    Some(match (rendition, itemref) {
        (Some("page-spread-center"), _) => ("page", "center"),
        (Some("page-spread-left"), _) | (_, Some("page-spread-left")) => ("page", "left"),
        (Some("page-spread-right"), _) | (_, Some("page-spread-right")) => ("page", "right"),
        (Some("spread-none"), _) => ("spread", "none"),
        (Some("spread-auto"), _) => ("spread", "auto"),
        (Some("spread-landscape"), _) => ("spread", "landscape"),
        (Some("spread-portrait" | "spread-both"), _) => ("spread", "both"),
        (Some("layout-reflowable"), _) => ("layout", "reflowable"),
        (Some("layout-pre-paginated"), _) => ("layout", "fixed"),
        (Some("orientation-auto"), _) => ("orientation", "auto"),
        (Some("orientation-landscape"), _) => ("orientation", "landscape"),
        (Some("orientation-portrait"), _) => ("orientation", "portrait"),
        (Some("flow-auto"), _) => ("overflow", "auto"),
        (Some("flow-paginated"), _) => ("overflow", "paginated"),
        (Some("flow-scrolled-continuous" | "flow-scrolled-doc"), _) => ("overflow", "scrolled"),
        _ => return None,
    })
}
