use std::io::{self, BufWriter, Write};
use std::ops::RangeInclusive;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode, Version, header};
use axum::response::{IntoResponse, Response};
use log::{debug, error, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use xxhash_rust::xxh3::xxh3_64;

use super::AppState;
use super::store::PublicationStore;
use crate::archive::CompressionMethod;
use crate::error::{Error, Result};
use crate::fetcher::Resource;
use crate::manifest::{Link, Manifest, profile, to_json_indented};
use crate::mediatype;
use crate::publication::Publication;
use crate::util::clean_path;

const MANIFEST_CACHE_CONTROL: &str = "private, must-revalidate";
const ASSET_CACHE_CONTROL: &str = "private, max-age=86400, immutable";

/// Media types browsers handle better under another name.
const MEDIA_TYPE_SUBSTITUTIONS: [(&str, &str); 1] = [("application/vnd.ms-opentype", mediatype::OTF)];

/// Response types worth compressing on the fly.
const COMPRESSIBLE_MEDIA_TYPES: &[&str] = &[
    "application/javascript",
    "application/x-javascript",
    "image/x-icon",
    mediatype::CSS,
    mediatype::HTML,
    mediatype::XHTML,
    mediatype::READIUM_WEBPUB_MANIFEST,
    mediatype::DIVINA_MANIFEST,
    mediatype::READIUM_AUDIOBOOK_MANIFEST,
    mediatype::TTF,
    "application/ttf",
    "application/x-ttf",
    "application/x-font-ttf",
    mediatype::OTF,
    "application/otf",
    "application/x-otf",
    "application/vnd.ms-opentype",
    "font/opentype",
    "application/opentype",
    "application/x-opentype",
    "application/truetype",
    "application/font-woff",
    "font/x-woff",
    "application/vnd.ms-fontobject",
];

/// Size of the chunks sent to the client while streaming a resource.
const CHUNK_SIZE: usize = 64 * 1024;
const CHANNEL_CAPACITY: usize = 4;

/// An error response, logged when it is turned into a [`Response`].
#[derive(Debug)]
pub(crate) struct Failure {
    status: StatusCode,
    message: String,
    headers: HeaderMap,
}

impl Failure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            headers: HeaderMap::new(),
        }
    }
}

impl From<&Error> for Failure {
    fn from(e: &Error) -> Self {
        let status = match e {
            Error::Resource(r) => {
                StatusCode::from_u16(r.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Failure::new(status, e.to_string())
    }
}

impl From<Error> for Failure {
    fn from(e: Error) -> Self {
        Failure::from(&e)
    }
}

impl From<Arc<Error>> for Failure {
    fn from(e: Arc<Error>) -> Self {
        Failure::from(e.as_ref())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}: {}", self.status, self.message);
        } else {
            warn!("{}: {}", self.status, self.message);
        }
        let mut response = (self.status, self.message).into_response();
        response.headers_mut().extend(self.headers);
        set_header(response.headers_mut(), header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
        response
    }
}

type HandlerResult<T> = std::result::Result<T, Failure>;

/// Run blocking publication I/O off the async workers.
async fn blocking<T: Send + 'static>(
    f: impl FnOnce() -> HandlerResult<T> + Send + 'static,
) -> HandlerResult<T> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Failure::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!("Dropping invalid {name} header value {value:?}"),
    }
}

fn request_header<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn json_text(value: &impl Serialize, indent: Option<&str>) -> Result<String> {
    match indent {
        Some(indent) => to_json_indented(value, indent),
        None => Ok(serde_json::to_string(value)?),
    }
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn list(State(state): State<AppState>) -> Response {
    let result = blocking(move || {
        let entries = state.store.list()?;
        Ok(json_text(&entries, state.config.json_indent.as_deref())?)
    })
    .await;
    match result {
        Ok(body) => {
            let mut response = body.into_response();
            let headers = response.headers_mut();
            set_header(headers, header::CONTENT_TYPE, mediatype::JSON);
            set_header(headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
            response
        }
        Err(failure) => failure.into_response(),
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// Media type of the `self` link, from the profile the manifest conforms to.
fn manifest_media_type(manifest: &Manifest) -> &'static str {
    if manifest.conforms_to(profile::DIVINA) {
        mediatype::DIVINA_MANIFEST
    } else if manifest.conforms_to(profile::AUDIOBOOK) {
        mediatype::READIUM_AUDIOBOOK_MANIFEST
    } else {
        mediatype::READIUM_WEBPUB_MANIFEST
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut digits = Vec::new();
    loop {
        digits.push(char::from(DIGITS[(n % 36) as usize]));
        n /= 36;
        if n == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}

/// Strong validator of a manifest body.
pub(crate) fn etag(body: &str) -> String {
    format!("\"{}\"", base36(xxh3_64(body.as_bytes())))
}

/// URL the manifest is requested from, as seen by the client.
fn self_href(request: &HeaderMap, fallback_host: &str, id: &str) -> String {
    let https = request_header(request, &HeaderName::from_static("x-forwarded-proto"))
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("https"));
    let scheme = if https { "https" } else { "http" };
    let host = request_header(request, &header::HOST).unwrap_or(fallback_host);
    format!("{scheme}://{host}/{id}/manifest.json")
}

pub async fn manifest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: HeaderMap,
) -> Response {
    let href = self_href(&request, &state.config.bind_address.to_string(), &id);
    let result = blocking(move || {
        let publication = state.store.get(&id)?;
        let manifest = publication.manifest().with_relative_hrefs();
        let media_type = manifest_media_type(&manifest);
        let self_link = Link::new(href).with_type(media_type).with_rel("self");
        let body = match state.config.json_indent.as_deref() {
            Some(indent) => manifest.to_json_pretty(Some(&self_link), indent)?,
            None => manifest.to_json(Some(&self_link))?,
        };
        Ok((body, media_type))
    })
    .await;

    let (body, media_type) = match result {
        Ok(ok) => ok,
        Err(failure) => return failure.into_response(),
    };

    let etag = etag(&body);
    let not_modified = request_header(&request, &header::IF_NONE_MATCH)
        .is_some_and(|candidates| candidates.contains(&etag));
    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        body.into_response()
    };
    let headers = response.headers_mut();
    set_header(headers, header::ETAG, &etag);
    set_header(headers, header::CACHE_CONTROL, MANIFEST_CACHE_CONTROL);
    set_header(headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    if !not_modified {
        set_header(headers, header::CONTENT_TYPE, &format!("{media_type}; charset=utf-8"));
    }
    response
}

// ============================================================================
// Assets
// ============================================================================

/// A parsed `Range` request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeRequest {
    /// No range: the whole resource.
    Full,
    Single(RangeInclusive<u64>),
    Multiple,
    /// Malformed or unsatisfiable.
    Invalid,
}

fn parse_range_spec(spec: &str, length: u64) -> Option<RangeInclusive<u64>> {
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() {
        let suffix: u64 = end.parse().ok()?;
        if suffix == 0 || length == 0 {
            return None;
        }
        return Some(length - suffix.min(length)..=length - 1);
    }
    let start: u64 = start.parse().ok()?;
    if start >= length {
        return None;
    }
    let end = if end.is_empty() {
        length - 1
    } else {
        end.parse::<u64>().ok()?.min(length - 1)
    };
    (start <= end).then_some(start..=end)
}

/// Parse a `Range` header against a resource of `length` bytes.
///
/// Ranges are clamped to the resource: `bytes=10-` and `bytes=-10` are
/// resolved to absolute offsets, and an end past the last byte is moved
/// back to it.
pub fn parse_range(header: &str, length: u64) -> RangeRequest {
    let Some(specs) = header.trim().strip_prefix("bytes=") else {
        return RangeRequest::Invalid;
    };
    let mut ranges = Vec::new();
    for spec in specs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match parse_range_spec(spec, length) {
            Some(range) => ranges.push(range),
            None => return RangeRequest::Invalid,
        }
    }
    match ranges.len() {
        0 => RangeRequest::Invalid,
        1 => RangeRequest::Single(ranges.remove(0)),
        _ => RangeRequest::Multiple,
    }
}

/// Whether `Accept-Encoding` lists `deflate`.
pub(crate) fn accepts_deflate(request: &HeaderMap) -> bool {
    request
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|coding| coding.split(';').next().unwrap_or_default().trim())
        .any(|coding| coding.eq_ignore_ascii_case("deflate"))
}

/// Whether a full response of a compressible media type may be compressed.
pub(crate) fn compressible(
    status: StatusCode,
    _version: Version,
    headers: &HeaderMap,
    _extensions: &Extensions,
) -> bool {
    if status != StatusCode::OK || headers.contains_key(header::CONTENT_ENCODING) {
        return false;
    }
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .is_some_and(|essence| {
            COMPRESSIBLE_MEDIA_TYPES
                .iter()
                .any(|m| m.eq_ignore_ascii_case(essence))
        })
}

fn content_type(link: &Link) -> &str {
    let media_type = link.media_type.as_deref().unwrap_or(mediatype::BINARY);
    MEDIA_TYPE_SUBSTITUTIONS
        .iter()
        .find(|(from, _)| *from == media_type)
        .map_or(media_type, |(_, to)| *to)
}

enum Payload {
    Full,
    Range(RangeInclusive<u64>),
    /// The stored deflate stream, as is.
    Compressed,
}

/// Everything needed to answer an asset request, computed off the async
/// workers.
struct AssetResponse {
    status: StatusCode,
    headers: HeaderMap,
    /// Keeps the publication open while its resource is streamed.
    publication: Arc<Publication>,
    resource: Box<dyn Resource>,
    payload: Payload,
}

fn prepare_asset(
    store: &PublicationStore,
    id: &str,
    asset: &str,
    request: &HeaderMap,
) -> HandlerResult<AssetResponse> {
    let publication = store.get(id)?;
    let href = clean_path(asset);
    let link = publication
        .find(&href)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, format!("{href} not found")))?;
    let resource = publication.get(&link);
    let length = resource.length().map_err(Error::from)?;

    let mut headers = HeaderMap::new();
    set_header(&mut headers, header::CONTENT_TYPE, content_type(&link));
    set_header(&mut headers, header::CACHE_CONTROL, ASSET_CACHE_CONTROL);
    set_header(&mut headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    set_header(&mut headers, header::ACCEPT_RANGES, "bytes");

    let range = match request_header(request, &header::RANGE) {
        Some(value) => parse_range(value, length),
        None => RangeRequest::Full,
    };
    let (status, payload, content_length) = match range {
        RangeRequest::Full => {
            let passthrough =
                accepts_deflate(request) && resource.compressed_as(CompressionMethod::Deflate);
            match resource.compressed_length().filter(|_| passthrough) {
                Some(compressed_length) => {
                    set_header(&mut headers, header::CONTENT_ENCODING, "deflate");
                    (StatusCode::OK, Payload::Compressed, compressed_length)
                }
                None => (StatusCode::OK, Payload::Full, length),
            }
        }
        RangeRequest::Single(range) => {
            set_header(
                &mut headers,
                header::CONTENT_RANGE,
                &format!("bytes {}-{}/{length}", range.start(), range.end()),
            );
            let count = range.end() - range.start() + 1;
            (StatusCode::PARTIAL_CONTENT, Payload::Range(range), count)
        }
        RangeRequest::Multiple => {
            return Err(Failure::new(
                StatusCode::NOT_IMPLEMENTED,
                "multiple ranges are not supported",
            ));
        }
        RangeRequest::Invalid => {
            let mut failure = Failure::new(
                StatusCode::RANGE_NOT_SATISFIABLE,
                format!("invalid range for {href}"),
            );
            set_header(&mut failure.headers, header::CONTENT_RANGE, &format!("bytes */{length}"));
            return Err(failure);
        }
    };
    set_header(&mut headers, header::CONTENT_LENGTH, &content_length.to_string());

    Ok(AssetResponse {
        status,
        headers,
        publication,
        resource,
        payload,
    })
}

/// Forwards written bytes to the response body.
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stream the payload from a blocking task. A client going away ends the
/// stream silently.
fn stream_body(asset: AssetResponse) -> Body {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let AssetResponse {
        publication,
        resource,
        payload,
        ..
    } = asset;
    tokio::task::spawn_blocking(move || {
        let href = &resource.link().href;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, ChannelWriter { tx: tx.clone() });
        let result = match payload {
            Payload::Full => resource.stream(&mut writer, None),
            Payload::Range(range) => resource.stream(&mut writer, Some(range)),
            Payload::Compressed => resource.stream_compressed(&mut writer),
        }
        .and_then(|n| {
            writer.flush()?;
            Ok(n)
        });
        match result {
            Ok(n) => debug!("Streamed {n} bytes of {href}"),
            Err(_) if tx.is_closed() => debug!("Client went away while streaming {href}"),
            Err(e) => {
                error!("Streaming {href} failed: {e}");
                let _ = tx.blocking_send(Err(io::Error::other(e.to_string())));
            }
        }
        drop(publication);
    });
    Body::from_stream(ReceiverStream::new(rx))
}

pub async fn asset(
    State(state): State<AppState>,
    Path((id, asset)): Path<(String, String)>,
    request: HeaderMap,
) -> Response {
    let prepared = blocking(move || prepare_asset(&state.store, &id, &asset, &request)).await;
    match prepared {
        Ok(mut asset) => {
            let status = asset.status;
            let headers = std::mem::take(&mut asset.headers);
            let mut response = Response::new(stream_body(asset));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(failure) => failure.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=0-9", 100), RangeRequest::Single(0..=9));
        assert_eq!(parse_range("bytes=0-0", 100), RangeRequest::Single(0..=0));
        assert_eq!(parse_range("bytes=90-", 100), RangeRequest::Single(90..=99));
        assert_eq!(parse_range("bytes=-10", 100), RangeRequest::Single(90..=99));
        assert_eq!(parse_range("bytes=-500", 100), RangeRequest::Single(0..=99));
        assert_eq!(parse_range("bytes=50-500", 100), RangeRequest::Single(50..=99));
        assert_eq!(parse_range("bytes=0-1, 5-6", 100), RangeRequest::Multiple);
    }

    #[test]
    fn test_compressible() {
        let headers = |pairs: &[(HeaderName, &'static str)]| {
            let mut map = HeaderMap::new();
            for (name, value) in pairs {
                map.insert(name.clone(), HeaderValue::from_static(value));
            }
            map
        };
        let check = |status, map: &HeaderMap| {
            compressible(status, Version::HTTP_11, map, &Extensions::new())
        };

        let manifest = headers(&[(header::CONTENT_TYPE, "application/webpub+json; charset=utf-8")]);
        assert!(check(StatusCode::OK, &manifest));
        assert!(!check(StatusCode::PARTIAL_CONTENT, &manifest));
        assert!(!check(StatusCode::NOT_MODIFIED, &manifest));

        let font = headers(&[(header::CONTENT_TYPE, "font/otf")]);
        assert!(check(StatusCode::OK, &font));

        let deflated = headers(&[
            (header::CONTENT_TYPE, "application/xhtml+xml"),
            (header::CONTENT_ENCODING, "deflate"),
        ]);
        assert!(!check(StatusCode::OK, &deflated));

        let image = headers(&[(header::CONTENT_TYPE, "image/png")]);
        assert!(!check(StatusCode::OK, &image));
        assert!(!check(StatusCode::OK, &HeaderMap::new()));
    }

    #[test]
    fn test_parse_invalid_range() {
        for header in ["bytes=100-", "bytes=9-5", "bytes=-0", "bytes=a-b", "items=0-1", "bytes="] {
            assert_eq!(parse_range(header, 100), RangeRequest::Invalid, "{header}");
        }
        assert_eq!(parse_range("bytes=0-", 0), RangeRequest::Invalid);
        assert_eq!(parse_range("bytes=0-1, x", 100), RangeRequest::Invalid);
    }

    #[test]
    fn test_accepts_deflate() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_deflate(&headers));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, DEFLATE;q=0.5"));
        assert!(accepts_deflate(&headers));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"));
        assert!(!accepts_deflate(&headers));
    }

    #[test]
    fn test_etag() {
        let tag = etag("{}");
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        assert_eq!(tag, etag("{}"));
        assert_ne!(tag, etag("{ }"));
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
    }

    #[test]
    fn test_self_href() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            self_href(&headers, "127.0.0.1:15080", "abc"),
            "http://127.0.0.1:15080/abc/manifest.json"
        );
        headers.insert(header::HOST, HeaderValue::from_static("books.example"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(
            self_href(&headers, "127.0.0.1:15080", "abc"),
            "https://books.example/abc/manifest.json"
        );
    }

    #[test]
    fn test_content_type_substitution() {
        let font = Link::new("/f.otf").with_type("application/vnd.ms-opentype");
        assert_eq!(content_type(&font), "font/otf");
        assert_eq!(content_type(&Link::new("/x")), mediatype::BINARY);
        assert_eq!(content_type(&Link::new("/a.css").with_type("text/css")), "text/css");
    }
}
