//! IANA media types: parsing, comparison and the well-known publication
//! formats.

mod sniffer;

pub use sniffer::{SnifferContext, sniff, sniff_path};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Well-known media types
// ============================================================================

pub const AAC: &str = "audio/aac";
pub const AIFF: &str = "audio/aiff";
pub const AVIF: &str = "image/avif";
pub const BINARY: &str = "application/octet-stream";
pub const BMP: &str = "image/bmp";
pub const CBZ: &str = "application/vnd.comicbook+zip";
pub const CSS: &str = "text/css";
pub const DIVINA: &str = "application/divina+zip";
pub const DIVINA_MANIFEST: &str = "application/divina+json";
pub const EPUB: &str = "application/epub+zip";
pub const FLAC: &str = "audio/flac";
pub const GIF: &str = "image/gif";
pub const HTML: &str = "text/html";
pub const JAVASCRIPT: &str = "text/javascript";
pub const JPEG: &str = "image/jpeg";
pub const JSON: &str = "application/json";
pub const JXL: &str = "image/jxl";
pub const LCP_LICENSE_DOCUMENT: &str = "application/vnd.readium.lcp.license.v1.0+json";
pub const LCP_PROTECTED_AUDIOBOOK: &str = "application/audiobook+lcp";
pub const LCP_PROTECTED_PDF: &str = "application/pdf+lcp";
pub const LCP_STATUS_DOCUMENT: &str = "application/vnd.readium.license.status.v1.0+json";
pub const LPF: &str = "application/lpf+zip";
pub const MP3: &str = "audio/mpeg";
pub const MP4: &str = "audio/mp4";
pub const NCX: &str = "application/x-dtbncx+xml";
pub const OGG: &str = "audio/ogg";
pub const OPDS1: &str = "application/atom+xml;profile=opds-catalog";
pub const OPDS1_ENTRY: &str = "application/atom+xml;type=entry;profile=opds-catalog";
pub const OPDS2: &str = "application/opds+json";
pub const OPDS2_PUBLICATION: &str = "application/opds-publication+json";
pub const OPDS_AUTHENTICATION: &str = "application/opds-authentication+json";
pub const OPF: &str = "application/oebps-package+xml";
pub const OPUS: &str = "audio/opus";
pub const OTF: &str = "font/otf";
pub const PDF: &str = "application/pdf";
pub const PNG: &str = "image/png";
pub const READIUM_AUDIOBOOK: &str = "application/audiobook+zip";
pub const READIUM_AUDIOBOOK_MANIFEST: &str = "application/audiobook+json";
pub const READIUM_WEBPUB: &str = "application/webpub+zip";
pub const READIUM_WEBPUB_MANIFEST: &str = "application/webpub+json";
pub const SMIL: &str = "application/smil+xml";
pub const SVG: &str = "image/svg+xml";
pub const TEXT: &str = "text/plain";
pub const TIFF: &str = "image/tiff";
pub const TTF: &str = "font/ttf";
pub const W3C_WPUB_MANIFEST: &str = "application/x.readium.w3c.wpub+json";
pub const WAV: &str = "audio/wav";
pub const WEBM_AUDIO: &str = "audio/webm";
pub const WEBM_VIDEO: &str = "video/webm";
pub const WEBP: &str = "image/webp";
pub const WOFF: &str = "font/woff";
pub const WOFF2: &str = "font/woff2";
pub const XHTML: &str = "application/xhtml+xml";
pub const XML: &str = "application/xml";
pub const ZAB: &str = "application/x.readium.zab+zip";
pub const ZIP: &str = "application/zip";

/// Media type commonly associated with a lowercase file extension.
pub fn from_extension(ext: &str) -> Option<&'static str> {
    let mt = match ext {
        "aac" => AAC,
        "aif" | "aiff" => AIFF,
        "audiobook" => READIUM_AUDIOBOOK,
        "avif" => AVIF,
        "bmp" | "dib" => BMP,
        "cbz" => CBZ,
        "css" => CSS,
        "divina" => DIVINA,
        "epub" => EPUB,
        "flac" => FLAC,
        "gif" => GIF,
        "htm" | "html" => HTML,
        "jpg" | "jpeg" | "jpe" | "jif" | "jfif" | "jfi" => JPEG,
        "js" | "mjs" => JAVASCRIPT,
        "json" => JSON,
        "jxl" => JXL,
        "lcpa" => LCP_PROTECTED_AUDIOBOOK,
        "lcpdf" => LCP_PROTECTED_PDF,
        "lcpl" => LCP_LICENSE_DOCUMENT,
        "lpf" => LPF,
        "m4a" | "m4b" | "mp4" | "alac" => MP4,
        "mp3" => MP3,
        "ncx" => NCX,
        "ogg" | "oga" | "mogg" => OGG,
        "opf" => OPF,
        "opus" => OPUS,
        "otf" => OTF,
        "pdf" => PDF,
        "png" => PNG,
        "smil" => SMIL,
        "svg" => SVG,
        "tif" | "tiff" => TIFF,
        "ttf" => TTF,
        "txt" => TEXT,
        "wav" => WAV,
        "webm" => WEBM_AUDIO,
        "webp" => WEBP,
        "webpub" => READIUM_WEBPUB,
        "woff" => WOFF,
        "woff2" => WOFF2,
        "xht" | "xhtml" => XHTML,
        "xml" => XML,
        "zab" => ZAB,
        "zip" => ZIP,
        _ => return None,
    };
    Some(mt)
}

/// Media type of an href, inferred from its extension.
pub fn of_href(href: &str) -> Option<&'static str> {
    crate::util::href_extension(href).and_then(|ext| from_extension(&ext))
}

// ============================================================================
// MediaType
// ============================================================================

/// A parsed media type such as `text/html; charset=UTF-8`.
///
/// Type, subtype and parameter names are lowercased; the `charset` value is
/// uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    pub ty: String,
    pub subtype: String,
    pub parameters: BTreeMap<String, String>,
}

impl MediaType {
    /// Parse a media type string. Returns `None` unless it has a
    /// `type/subtype` part.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(';');
        let (ty, subtype) = parts.next()?.trim().split_once('/')?;
        let (ty, subtype) = (ty.trim(), subtype.trim());
        if ty.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut parameters = BTreeMap::new();
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let mut value = value.trim().trim_matches('"').to_string();
            if key == "charset" {
                value.make_ascii_uppercase();
            }
            parameters.insert(key, value);
        }

        Some(Self {
            ty: ty.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parameters,
        })
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.ty, self.subtype)
    }

    /// The `+suffix` of the subtype, e.g. `+zip` for `application/epub+zip`.
    pub fn structured_syntax_suffix(&self) -> Option<&str> {
        self.subtype.rfind('+').map(|i| &self.subtype[i..])
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Whether `other` is included in this type: wildcards match anything and
    /// every parameter of `self` must be present in `other`.
    pub fn contains(&self, other: &MediaType) -> bool {
        (self.ty == "*" || self.ty == other.ty)
            && (self.subtype == "*" || self.subtype == other.subtype)
            && self
                .parameters
                .iter()
                .all(|(k, v)| other.parameters.get(k) == Some(v))
    }

    /// Whether either type contains the other.
    pub fn matches(&self, other: &MediaType) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// [`matches`](Self::matches) against any of the given strings.
    pub fn matches_any(&self, others: &[&str]) -> bool {
        others
            .iter()
            .filter_map(|o| MediaType::parse(o))
            .any(|o| self.matches(&o))
    }

    pub fn is_zip(&self) -> bool {
        self.matches_any(&[ZIP, LCP_PROTECTED_AUDIOBOOK, LCP_PROTECTED_PDF])
            || self.structured_syntax_suffix() == Some("+zip")
    }

    pub fn is_json(&self) -> bool {
        self.matches_any(&[JSON]) || self.structured_syntax_suffix() == Some("+json")
    }

    pub fn is_html(&self) -> bool {
        self.matches_any(&[HTML, XHTML])
    }

    pub fn is_bitmap(&self) -> bool {
        self.matches_any(&[BMP, GIF, JPEG, PNG, TIFF, WEBP, AVIF, JXL])
    }

    pub fn is_image(&self) -> bool {
        self.ty == "image"
    }

    pub fn is_audio(&self) -> bool {
        self.ty == "audio"
    }

    pub fn is_video(&self) -> bool {
        self.ty == "video"
    }

    pub fn is_pdf(&self) -> bool {
        self.matches_any(&[PDF])
    }

    pub fn is_opds(&self) -> bool {
        self.matches_any(&[OPDS1, OPDS1_ENTRY, OPDS2, OPDS2_PUBLICATION, OPDS_AUTHENTICATION])
    }

    pub fn is_rwpm(&self) -> bool {
        self.matches_any(&[
            READIUM_AUDIOBOOK_MANIFEST,
            DIVINA_MANIFEST,
            READIUM_WEBPUB_MANIFEST,
        ])
    }

    pub fn is_publication(&self) -> bool {
        self.matches_any(&[
            READIUM_AUDIOBOOK,
            READIUM_AUDIOBOOK_MANIFEST,
            CBZ,
            DIVINA,
            DIVINA_MANIFEST,
            EPUB,
            LCP_PROTECTED_AUDIOBOOK,
            LCP_PROTECTED_PDF,
            LPF,
            PDF,
            W3C_WPUB_MANIFEST,
            READIUM_WEBPUB,
            READIUM_WEBPUB_MANIFEST,
            ZAB,
        ])
    }
}

impl FromStr for MediaType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        MediaType::parse(s)
            .ok_or_else(|| crate::Error::UnsupportedFormat(format!("invalid media type {s:?}")))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ty, self.subtype)?;
        for (k, v) in &self.parameters {
            write!(f, "; {k}={v}")?;
        }
        Ok(())
    }
}
