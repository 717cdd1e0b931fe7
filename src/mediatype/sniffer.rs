//! Media type detection from declared types, file extensions and content.
//!
//! Sniffers run in three passes of increasing cost: declared media types
//! only, then file extensions, then the content itself (magic bytes, XML
//! root, JSON keys, archive entries).

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use super::*;
use crate::archive::{Archive, ArchiveFactory};
use crate::util::{decode_text, extract_xml_encoding, href_extension, strip_bom};
use crate::xml::{NS_XHTML, XmlElement};

/// Largest file read into memory for content sniffing.
const MAX_READ_SIZE: u64 = 5 * 1024 * 1024;

const CBZ_EXTENSIONS: &[&str] = &[
    "bmp", "dib", "gif", "jif", "jfi", "jfif", "jpg", "jpeg", "png", "tif", "tiff", "webp",
    "acbf", "xml",
];

const ZAB_EXTENSIONS: &[&str] = &[
    "aac", "aiff", "alac", "flac", "m4a", "m4b", "mp3", "ogg", "oga", "mogg", "opus", "wav",
    "webm", "asx", "bio", "m3u", "m3u8", "pla", "pls", "smil", "vlc", "wpl", "xspf", "zpl",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Pass {
    MediaTypes,
    Extensions,
    Content,
}

/// Everything known about an asset while guessing its media type.
#[derive(Default)]
pub struct SnifferContext {
    media_types: Vec<MediaType>,
    extensions: Vec<String>,
    content: Option<Vec<u8>>,
    archive: Option<Arc<dyn Archive>>,
}

impl SnifferContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared media type hint. Unparseable strings are ignored.
    pub fn with_media_type(mut self, media_type: &str) -> Self {
        if let Some(mt) = MediaType::parse(media_type) {
            self.media_types.push(mt);
        }
        self
    }

    /// File extension hint, with or without the leading dot.
    pub fn with_extension(mut self, ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() {
            self.extensions.push(ext);
        }
        self
    }

    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_archive(mut self, archive: Arc<dyn Archive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Build a context for a local file or directory: its extension, its
    /// content when small enough, and its entries when it is a container.
    pub fn for_path(path: &Path) -> io::Result<Self> {
        let mut ctx = Self::new();
        if let Some(ext) = path.extension() {
            ctx = ctx.with_extension(&ext.to_string_lossy());
        }

        let meta = fs::metadata(path)?;
        if meta.is_dir() {
            let archive = ArchiveFactory::open(path).map_err(io::Error::other)?;
            return Ok(ctx.with_archive(archive));
        }

        let mut head = Vec::new();
        fs::File::open(path)?
            .take(MAX_READ_SIZE)
            .read_to_end(&mut head)?;
        if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
            match ArchiveFactory::open(path) {
                Ok(archive) => ctx = ctx.with_archive(archive),
                Err(e) => log::debug!("{} looks like a ZIP but cannot be opened: {e}", path.display()),
            }
        }
        if meta.len() <= MAX_READ_SIZE {
            ctx = ctx.with_content(head);
        } else {
            head.truncate(1024);
            ctx = ctx.with_content(head);
        }
        Ok(ctx)
    }

    /// The archive opened while sniffing, if the asset is a container.
    pub fn archive(&self) -> Option<Arc<dyn Archive>> {
        self.archive.clone()
    }

    fn has_media_type(&self, _pass: Pass, candidates: &[&str]) -> bool {
        candidates
            .iter()
            .filter_map(|c| MediaType::parse(c))
            .any(|c| self.media_types.iter().any(|mt| c.contains(mt)))
    }

    fn has_extension(&self, pass: Pass, candidates: &[&str]) -> bool {
        pass >= Pass::Extensions && self.extensions.iter().any(|e| candidates.contains(&e.as_str()))
    }

    fn bytes(&self, pass: Pass) -> Option<&[u8]> {
        if pass < Pass::Content {
            return None;
        }
        self.content.as_deref()
    }

    fn text(&self, pass: Pass) -> Option<String> {
        let bytes = strip_bom(self.bytes(pass)?);
        Some(decode_text(bytes, extract_xml_encoding(bytes)).into_owned())
    }

    fn xml_root(&self, pass: Pass) -> Option<XmlElement> {
        let text = self.text(pass)?;
        if !text.trim_start().starts_with('<') {
            return None;
        }
        XmlElement::parse(&text).ok()
    }

    fn json(&self, pass: Pass) -> Option<serde_json::Map<String, serde_json::Value>> {
        let bytes = strip_bom(self.bytes(pass)?);
        match serde_json::from_slice(bytes).ok()? {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        }
    }

    fn contains_json_keys(&self, pass: Pass, keys: &[&str]) -> bool {
        self.json(pass)
            .is_some_and(|map| keys.iter().all(|k| map.contains_key(*k)))
    }

    fn archive_for(&self, pass: Pass) -> Option<&dyn Archive> {
        if pass < Pass::Content {
            return None;
        }
        self.archive.as_deref()
    }

    fn read_entry(&self, pass: Pass, path: &str) -> Option<Vec<u8>> {
        self.archive_for(pass)?.read(path, None).ok()
    }

    fn contains_entry(&self, pass: Pass, path: &str) -> bool {
        self.archive_for(pass)
            .is_some_and(|a| a.entry(path).is_some())
    }

    /// Whether every non-ignored entry has one of `extensions`.
    fn entries_all_have(&self, pass: Pass, extensions: &[&str]) -> bool {
        let Some(archive) = self.archive_for(pass) else {
            return false;
        };
        let mut relevant = archive.entries().iter().filter(|e| !is_ignored(&e.path)).peekable();
        relevant.peek().is_some()
            && relevant.all(|e| {
                href_extension(&e.path).is_some_and(|ext| extensions.contains(&ext.as_str()))
            })
    }
}

fn is_ignored(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    path.starts_with('.') || name.starts_with('.') || path.starts_with("__MACOSX") || name == "Thumbs.db"
}

type Sniffer = fn(&SnifferContext, Pass) -> Option<&'static str>;

const SNIFFERS: &[Sniffer] = &[
    sniff_epub,
    sniff_lpf,
    sniff_archive,
    sniff_pdf,
    sniff_xhtml,
    sniff_html,
    sniff_bitmap,
    sniff_audio,
    sniff_opds,
    sniff_lcp_license,
    sniff_w3c_wpub,
    sniff_webpub,
];

/// Guess the media type of an asset.
///
/// Falls back to the first declared type, then to the extension table.
pub fn sniff(ctx: &SnifferContext) -> Option<MediaType> {
    for pass in [Pass::MediaTypes, Pass::Extensions, Pass::Content] {
        if pass == Pass::MediaTypes && ctx.media_types.is_empty() {
            continue;
        }
        if let Some(mt) = SNIFFERS.iter().find_map(|s| s(ctx, pass)) {
            return MediaType::parse(mt);
        }
    }

    if let Some(mt) = ctx.media_types.first() {
        return Some(mt.clone());
    }
    ctx.extensions
        .iter()
        .find_map(|e| from_extension(e))
        .and_then(MediaType::parse)
}

/// Sniff a local file or directory.
pub fn sniff_path(path: &Path) -> io::Result<Option<MediaType>> {
    Ok(sniff(&SnifferContext::for_path(path)?))
}

// ============================================================================
// Sniffers
// ============================================================================

fn sniff_epub(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    if ctx.has_extension(pass, &["epub"]) || ctx.has_media_type(pass, &[EPUB]) {
        return Some(EPUB);
    }
    let mimetype = ctx.read_entry(pass, "mimetype")?;
    (String::from_utf8_lossy(&mimetype).trim() == EPUB).then_some(EPUB)
}

fn sniff_lpf(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    if ctx.has_extension(pass, &["lpf"]) || ctx.has_media_type(pass, &[LPF]) {
        return Some(LPF);
    }
    if ctx.contains_entry(pass, "index.html") {
        return Some(LPF);
    }
    let entry = ctx.read_entry(pass, "publication.json")?;
    let json: serde_json::Value = serde_json::from_slice(strip_bom(&entry)).ok()?;
    context_contains(&json, "https://www.w3.org/ns/pub-context").then_some(LPF)
}

fn sniff_archive(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    if ctx.has_extension(pass, &["cbz"])
        || ctx.has_media_type(
            pass,
            &[CBZ, "application/x-cbz", "application/x-cbr"],
        )
    {
        return Some(CBZ);
    }
    if ctx.has_extension(pass, &["zab"]) {
        return Some(ZAB);
    }
    if ctx.entries_all_have(pass, CBZ_EXTENSIONS) {
        return Some(CBZ);
    }
    if ctx.entries_all_have(pass, ZAB_EXTENSIONS) {
        return Some(ZAB);
    }
    None
}

fn sniff_pdf(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    if ctx.has_extension(pass, &["pdf"]) || ctx.has_media_type(pass, &[PDF]) {
        return Some(PDF);
    }
    ctx.bytes(pass)?.starts_with(b"%PDF-").then_some(PDF)
}

fn sniff_xhtml(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    if ctx.has_extension(pass, &["xht", "xhtml"]) || ctx.has_media_type(pass, &[XHTML]) {
        return Some(XHTML);
    }
    ctx.xml_root(pass)?.is(NS_XHTML, "html").then_some(XHTML)
}

fn sniff_html(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    if ctx.has_extension(pass, &["htm", "html"]) || ctx.has_media_type(pass, &[HTML]) {
        return Some(HTML);
    }
    if ctx.xml_root(pass).is_some_and(|root| root.local == "html") {
        return Some(HTML);
    }
    let text = ctx.text(pass)?;
    let head: String = text.trim_start().chars().take(15).collect();
    head.eq_ignore_ascii_case("<!doctype html>").then_some(HTML)
}

fn sniff_bitmap(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    let table: &[(&[&str], &[&str], &'static str)] = &[
        (&["avif"], &[AVIF], AVIF),
        (&["bmp", "dib"], &[BMP, "image/x-bmp"], BMP),
        (&["gif"], &[GIF], GIF),
        (&["jpg", "jpeg", "jpe", "jif", "jfif", "jfi"], &[JPEG], JPEG),
        (&["jxl"], &[JXL], JXL),
        (&["png"], &[PNG], PNG),
        (&["tiff", "tif"], &[TIFF, "image/tiff-fx"], TIFF),
        (&["webp"], &[WEBP], WEBP),
    ];
    if let Some((_, _, mt)) = table
        .iter()
        .find(|(exts, types, _)| ctx.has_extension(pass, exts) || ctx.has_media_type(pass, types))
    {
        return Some(*mt);
    }

    let bytes = ctx.bytes(pass)?;
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some(PNG)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(JPEG)
    } else if bytes.starts_with(b"GIF8") {
        Some(GIF)
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(WEBP)
    } else if bytes.starts_with(b"BM") && bytes.len() > 14 {
        Some(BMP)
    } else {
        None
    }
}

fn sniff_audio(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    let table: &[(&[&str], &[&str], &'static str)] = &[
        (&["aac"], &[AAC], AAC),
        (&["aiff", "aif"], &[AIFF], AIFF),
        (&["flac"], &[FLAC], FLAC),
        (&["mp3"], &[MP3], MP3),
        (&["m4a", "m4b", "mp4", "alac"], &[MP4], MP4),
        (&["ogg", "oga", "mogg"], &[OGG], OGG),
        (&["opus"], &[OPUS], OPUS),
        (&["wav"], &[WAV, "audio/x-wav"], WAV),
        (&["webm"], &[WEBM_AUDIO], WEBM_AUDIO),
    ];
    table
        .iter()
        .find(|(exts, types, _)| ctx.has_extension(pass, exts) || ctx.has_media_type(pass, types))
        .map(|(_, _, mt)| *mt)
}

fn sniff_opds(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    for mt in [OPDS1, OPDS1_ENTRY, OPDS2, OPDS2_PUBLICATION, OPDS_AUTHENTICATION] {
        if ctx.has_media_type(pass, &[mt]) {
            return Some(mt);
        }
    }
    if ctx.has_media_type(pass, &["application/vnd.opds.authentication.v1.0+json"]) {
        return Some(OPDS_AUTHENTICATION);
    }
    if let Some(root) = ctx.xml_root(pass) {
        const ATOM: &str = "http://www.w3.org/2005/Atom";
        if root.is(ATOM, "feed") {
            return Some(OPDS1);
        }
        if root.is(ATOM, "entry") {
            return Some(OPDS1_ENTRY);
        }
    }
    ctx.contains_json_keys(pass, &["id", "title", "authentication"])
        .then_some(OPDS_AUTHENTICATION)
}

fn sniff_lcp_license(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    if ctx.has_extension(pass, &["lcpl"]) || ctx.has_media_type(pass, &[LCP_LICENSE_DOCUMENT]) {
        return Some(LCP_LICENSE_DOCUMENT);
    }
    ctx.contains_json_keys(pass, &["id", "issued", "provider", "encryption"])
        .then_some(LCP_LICENSE_DOCUMENT)
}

fn sniff_w3c_wpub(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    let json = serde_json::Value::Object(ctx.json(pass)?);
    context_contains(&json, "https://www.w3.org/ns/wp-context").then_some(W3C_WPUB_MANIFEST)
}

fn sniff_webpub(ctx: &SnifferContext, pass: Pass) -> Option<&'static str> {
    let table: &[(&[&str], &'static str)] = &[
        (&["audiobook"], READIUM_AUDIOBOOK),
        (&[], READIUM_AUDIOBOOK_MANIFEST),
        (&["divina"], DIVINA),
        (&[], DIVINA_MANIFEST),
        (&["webpub"], READIUM_WEBPUB),
        (&[], READIUM_WEBPUB_MANIFEST),
        (&["lcpa"], LCP_PROTECTED_AUDIOBOOK),
        (&["lcpdf"], LCP_PROTECTED_PDF),
    ];
    if let Some((_, mt)) = table
        .iter()
        .find(|(exts, mt)| ctx.has_extension(pass, exts) || ctx.has_media_type(pass, &[*mt]))
    {
        return Some(*mt);
    }

    // A standalone manifest, or a package carrying one.
    if let Some(json) = ctx.json(pass) {
        return rwpm_kind(&json).map(|(manifest, _)| manifest);
    }
    let entry = ctx.read_entry(pass, "manifest.json")?;
    match serde_json::from_slice(strip_bom(&entry)).ok()? {
        serde_json::Value::Object(json) => rwpm_kind(&json).map(|(_, package)| package),
        _ => None,
    }
}

/// The (manifest, package) media types for an RWPM document, from its
/// declared profiles or self link.
fn rwpm_kind(
    json: &serde_json::Map<String, serde_json::Value>,
) -> Option<(&'static str, &'static str)> {
    let metadata = json.get("metadata")?.as_object()?;
    if !json.contains_key("readingOrder") && !json.contains_key("spine") {
        return None;
    }

    let declared: Vec<&str> = match metadata.get("conformsTo") {
        Some(serde_json::Value::String(s)) => vec![s.as_str()],
        Some(serde_json::Value::Array(a)) => a.iter().filter_map(|v| v.as_str()).collect(),
        _ => Vec::new(),
    };
    let self_type = json
        .get("links")
        .and_then(|l| l.as_array())
        .into_iter()
        .flatten()
        .find(|l| match l.get("rel") {
            Some(serde_json::Value::String(r)) => r == "self",
            Some(serde_json::Value::Array(a)) => a.iter().any(|r| r == "self"),
            _ => false,
        })
        .and_then(|l| l.get("type"))
        .and_then(|t| t.as_str())
        .unwrap_or_default();

    let is = |profile: &str, manifest: &str| {
        declared.contains(&profile) || self_type.starts_with(manifest)
    };
    if is("https://readium.org/webpub-manifest/profiles/audiobook", READIUM_AUDIOBOOK_MANIFEST) {
        Some((READIUM_AUDIOBOOK_MANIFEST, READIUM_AUDIOBOOK))
    } else if is("https://readium.org/webpub-manifest/profiles/divina", DIVINA_MANIFEST) {
        Some((DIVINA_MANIFEST, DIVINA))
    } else {
        Some((READIUM_WEBPUB_MANIFEST, READIUM_WEBPUB))
    }
}

fn context_contains(json: &serde_json::Value, uri: &str) -> bool {
    match json.get("@context") {
        Some(serde_json::Value::String(s)) => s == uri,
        Some(serde_json::Value::Array(a)) => a.iter().any(|v| v == uri),
        _ => false,
    }
}
