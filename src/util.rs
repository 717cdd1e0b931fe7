//! Small helpers shared across layers: time seeds, text decoding, XML
//! entities and href arithmetic.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use percent_encoding::percent_decode_str;

/// Get a time-based seed value for pseudo-random number generation.
pub fn time_seed_nanos() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(12345)
}

// ============================================================================
// Text Decoding
// ============================================================================

/// Decode bytes to a string, handling various encodings.
///
/// UTF-8 is tried first (a BOM is honored). On malformed input the hint
/// encoding (usually from an XML declaration) is used, then Windows-1252.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the encoding name from an `<?xml ... encoding="..."?>` declaration.
///
/// Only the first 100 bytes are inspected.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(100)];

    let xml_start = memchr::memmem::find(prefix, b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = memchr::memchr(quote, &after_enc[1..])? + 1;
    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

/// Strip a UTF-8 byte order mark.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Resolve the predefined XML entities and numeric character references.
pub fn resolve_entity(entity: &str) -> Option<String> {
    let resolved = match entity {
        "apos" => "'",
        "quot" => "\"",
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "nbsp" => "\u{a0}",
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            return char::from_u32(code).map(String::from);
        }
    };
    Some(resolved.to_string())
}

// ============================================================================
// Hrefs
// ============================================================================

/// Percent-decode `s`, leaving it untouched when it is not valid UTF-8 once
/// decoded.
pub fn percent_decode(s: &str) -> Cow<'_, str> {
    match percent_decode_str(s).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(s),
    }
}

/// Length of a URI scheme prefix including the colon, if `s` has one.
fn scheme_len(s: &str) -> Option<usize> {
    let colon = s.find(':')?;
    let scheme = &s[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some(colon + 1)
}

/// Whether `href` is an absolute URL (has a scheme).
pub fn is_absolute_url(href: &str) -> bool {
    scheme_len(href).is_some()
}

/// Whether `href` is an `http` or `https` URL.
pub fn is_http_url(href: &str) -> bool {
    let lower = href.get(..8).unwrap_or(href).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Split `s` into its path and the `?query#fragment` suffix.
fn split_suffix(s: &str) -> (&str, &str) {
    match s.find(['?', '#']) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

/// Remove `.` and `..` segments from an absolute path. `..` never climbs above
/// the root.
pub fn remove_dot_segments(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    for (i, seg) in segments.iter().enumerate() {
        match *seg {
            "." => {
                if i == last {
                    out.push("");
                }
            }
            ".." => {
                if out.len() > 1 {
                    out.pop();
                }
                if i == last {
                    out.push("");
                }
            }
            s => out.push(s),
        }
    }
    let joined = out.join("/");
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{joined}")
    }
}

/// Lexically clean a path: collapse repeated separators, drop `.` segments and
/// resolve `..`. The result never has a trailing slash (except the root).
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            s => out.push(s),
        }
    }
    let joined = out.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Resolve `href` against `base`, producing a percent-decoded href.
///
/// Relative results are rooted at `/`; an empty `base` means `/`. Absolute
/// URLs are returned as is, and `http(s)` bases keep their origin.
pub fn resolve_href(href: &str, base: &str) -> String {
    let base = if base.is_empty() { "/" } else { base };
    let base = percent_decode(base);
    let href = percent_decode(href);

    if href.trim().is_empty() || href.starts_with('#') {
        return format!("{base}{href}");
    }
    if is_absolute_url(&href) {
        return href.into_owned();
    }

    // Keep an absolute base's origin aside and resolve against its path.
    let (origin, base_path) = match scheme_len(&base) {
        Some(n) if base[n..].starts_with("//") => {
            let rest = &base[n + 2..];
            let path_start = rest.find(['/', '?', '#']).unwrap_or(rest.len());
            (&base[..n + 2 + path_start], &rest[path_start..])
        }
        Some(n) => (&base[..n], &base[n..]),
        None => ("", &base[..]),
    };
    let (base_path, _) = split_suffix(base_path);
    let (href_path, suffix) = split_suffix(&href);

    let merged = if href_path.is_empty() {
        base_path.to_string()
    } else if href_path.starts_with('/') {
        href_path.to_string()
    } else {
        let dir = match base_path.rfind('/') {
            Some(i) => &base_path[..=i],
            None => "/",
        };
        format!("{dir}{href_path}")
    };

    format!("{origin}{}{suffix}", remove_dot_segments(&merged))
}

/// Directory portion of an href, with a trailing slash.
pub fn href_directory(href: &str) -> String {
    let (path, _) = split_suffix(href);
    match path.rfind('/') {
        Some(i) => path[..=i].to_string(),
        None => "/".to_string(),
    }
}

/// Strip the `#fragment` and `?query` parts of an href.
pub fn href_without_suffix(href: &str) -> &str {
    split_suffix(href).0
}

/// Lowercased extension of the last path segment, without the dot.
pub fn href_extension(href: &str) -> Option<String> {
    let path = href_without_suffix(href);
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

// ============================================================================
// Publication Ids
// ============================================================================

/// Encode a relative filesystem path as a URL-safe publication id.
pub fn encode_id(path: &str) -> String {
    URL_SAFE_NO_PAD.encode(path.as_bytes())
}

/// Decode a publication id produced by [`encode_id`].
pub fn decode_id(id: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(id.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()
}

// ============================================================================
// Tests
// ============================================================================
