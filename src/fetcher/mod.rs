//! Uniform access to publication resources.
//!
//! A [`Fetcher`] turns a [`Link`] into a [`Resource`]. Lookup never fails:
//! a missing resource is a [`FailureResource`] whose operations return the
//! error, so callers handle every failure at the point they read.

mod archive;
mod file;
mod http;
mod resource;
mod routing;
mod transforming;

pub use archive::{ArchiveFetcher, ArchiveResource};
pub use file::{FileFetcher, FileResource};
pub use http::{HttpFetcher, HttpResource};
pub use resource::{BytesResource, FailureResource};
pub use routing::{Route, RoutingFetcher};
pub use transforming::{ResourceTransformer, TransformingFetcher, TransformingResource};

use std::io::Write;
use std::ops::RangeInclusive;
use std::sync::Arc;

use serde_json::Value;

use crate::archive::CompressionMethod;
use crate::error::{ResourceError, ResourceResult};
use crate::manifest::Link;
use crate::util::decode_text;
use crate::xml::XmlElement;

/// Clamp an inclusive byte range to a resource of `length` bytes.
///
/// Returns the start offset and the number of bytes to read. `None` means the
/// whole resource; a start past the end yields an empty read.
pub fn clamp_range(range: Option<RangeInclusive<u64>>, length: u64) -> (u64, u64) {
    match range {
        None => (0, length),
        Some(range) => {
            let (start, end) = range.into_inner();
            if start >= length || end < start {
                return (start.min(length), 0);
            }
            let end = end.min(length - 1);
            (start, end - start + 1)
        }
    }
}

/// A publication resource, readable whole or by range.
pub trait Resource: Send {
    /// The link this resource was opened from, possibly augmented with
    /// properties computed while opening it.
    fn link(&self) -> &Link;

    /// Length in bytes of the (decoded) content.
    fn length(&self) -> ResourceResult<u64>;

    /// Read an inclusive byte range, or everything when `range` is `None`.
    fn read(&self, range: Option<RangeInclusive<u64>>) -> ResourceResult<Vec<u8>>;

    /// Copy an inclusive byte range to `sink`, returning the byte count.
    fn stream(&self, sink: &mut dyn Write, range: Option<RangeInclusive<u64>>) -> ResourceResult<u64> {
        let data = self.read(range)?;
        sink.write_all(&data)?;
        Ok(data.len() as u64)
    }

    /// Whether the raw stored bytes are compressed with `method`, so that
    /// [`Resource::stream_compressed`] can pass them through.
    fn compressed_as(&self, _method: CompressionMethod) -> bool {
        false
    }

    /// Length of the raw compressed bytes.
    fn compressed_length(&self) -> Option<u64> {
        None
    }

    /// Copy the raw compressed bytes to `sink`.
    fn stream_compressed(&self, _sink: &mut dyn Write) -> ResourceResult<u64> {
        Err(ResourceError::Other(format!(
            "{} cannot be streamed compressed",
            self.link().href
        )))
    }

    /// Whole content decoded as text. The charset of the link's media type
    /// is used as a hint; a BOM or XML declaration wins over it.
    fn read_as_string(&self) -> ResourceResult<String> {
        let data = self.read(None)?;
        let hint = self
            .link()
            .media_type()
            .and_then(|mt| mt.charset().map(str::to_string));
        Ok(decode_text(&data, hint.as_deref()).into_owned())
    }

    fn read_as_json(&self) -> ResourceResult<Value> {
        let data = self.read(None)?;
        serde_json::from_slice(&data).map_err(ResourceError::other)
    }

    fn read_as_xml(&self) -> ResourceResult<XmlElement> {
        let data = self.read(None)?;
        XmlElement::parse_bytes(&data).map_err(ResourceError::other)
    }
}

/// Provides access to resources by link.
pub trait Fetcher: Send + Sync {
    /// Links of every resource known to this fetcher, when it can list them.
    fn links(&self) -> Vec<Link>;

    /// Resource for `link`. Never fails; see [`FailureResource`].
    fn get(&self, link: &Link) -> Box<dyn Resource>;

    /// Release the handles held by the fetcher. Resources already handed out
    /// stay readable.
    fn close(&self) {}
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn links(&self) -> Vec<Link> {
        (**self).links()
    }

    fn get(&self, link: &Link) -> Box<dyn Resource> {
        (**self).get(link)
    }

    fn close(&self) {
        (**self).close()
    }
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn links(&self) -> Vec<Link> {
        (**self).links()
    }

    fn get(&self, link: &Link) -> Box<dyn Resource> {
        (**self).get(link)
    }

    fn close(&self) {
        (**self).close()
    }
}

/// A fetcher that knows nothing.
pub struct EmptyFetcher;

impl Fetcher for EmptyFetcher {
    fn links(&self) -> Vec<Link> {
        Vec::new()
    }

    fn get(&self, link: &Link) -> Box<dyn Resource> {
        Box::new(FailureResource::not_found(link.clone()))
    }
}

/// Archive entry path for an href: leading slash, query and fragment removed.
pub(crate) fn href_to_path(href: &str) -> &str {
    crate::util::href_without_suffix(href).trim_start_matches('/')
}
