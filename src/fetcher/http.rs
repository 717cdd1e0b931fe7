use std::io::{self, Write};
use std::ops::RangeInclusive;
use std::sync::OnceLock;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_LENGTH, RANGE};

use super::{Fetcher, Resource};
use crate::error::{ResourceError, ResourceResult};
use crate::manifest::Link;
use crate::util::{is_http_url, resolve_href};

/// Fetches resources over HTTP. Relative hrefs are resolved against the base
/// URL; without one, only absolute `http(s)` hrefs can be fetched.
pub struct HttpFetcher {
    client: Client,
    base_url: Option<String>,
    links: Vec<Link>,
}

impl HttpFetcher {
    pub fn new(client: Client, base_url: Option<String>) -> Self {
        Self {
            client,
            base_url,
            links: Vec::new(),
        }
    }

    /// Links reported by [`Fetcher::links`], since a remote server cannot be
    /// listed.
    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    fn url_of(&self, href: &str) -> ResourceResult<String> {
        if is_http_url(href) {
            return Ok(href.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(resolve_href(href, base)),
            None => Err(ResourceError::BadRequest(format!("{href} is not an HTTP URL"))),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn links(&self) -> Vec<Link> {
        self.links.clone()
    }

    fn get(&self, link: &Link) -> Box<dyn Resource> {
        match self.url_of(&link.href) {
            Ok(url) => Box::new(HttpResource {
                link: link.clone(),
                url,
                client: self.client.clone(),
                length: OnceLock::new(),
            }),
            Err(e) => Box::new(super::FailureResource::new(link.clone(), e)),
        }
    }
}

/// A remote resource. The length comes from `Content-Length` when the server
/// sends one, otherwise from a full read.
pub struct HttpResource {
    link: Link,
    url: String,
    client: Client,
    length: OnceLock<u64>,
}

impl HttpResource {
    pub fn url(&self) -> &str {
        &self.url
    }

    fn send(&self, range: Option<&RangeInclusive<u64>>) -> ResourceResult<Response> {
        let mut request = self.client.get(&self.url);
        if let Some(range) = range {
            request = request.header(RANGE, format!("bytes={}-{}", range.start(), range.end()));
        }
        let response = request.send().map_err(request_error)?;
        status_error(response.status(), &self.url)?;
        Ok(response)
    }
}

fn request_error(e: reqwest::Error) -> ResourceError {
    if e.is_timeout() || e.is_connect() {
        ResourceError::Unavailable(e.to_string())
    } else {
        ResourceError::other(e)
    }
}

fn status_error(status: StatusCode, url: &str) -> ResourceResult<()> {
    if status.is_success() {
        return Ok(());
    }
    let message = format!("{url}: {status}");
    Err(match status {
        StatusCode::BAD_REQUEST => ResourceError::BadRequest(message),
        StatusCode::UNAUTHORIZED => ResourceError::Unauthorized(message),
        StatusCode::FORBIDDEN => ResourceError::Forbidden(message),
        StatusCode::NOT_FOUND | StatusCode::GONE => ResourceError::NotFound(message),
        StatusCode::METHOD_NOT_ALLOWED => ResourceError::MethodNotAllowed,
        StatusCode::RANGE_NOT_SATISFIABLE => ResourceError::RangeNotSatisfiable,
        StatusCode::SERVICE_UNAVAILABLE => ResourceError::Unavailable(message),
        _ => ResourceError::Other(message),
    })
}

impl Resource for HttpResource {
    fn link(&self) -> &Link {
        &self.link
    }

    fn length(&self) -> ResourceResult<u64> {
        if let Some(len) = self.length.get() {
            return Ok(*len);
        }
        let head = self
            .client
            .head(&self.url)
            .send()
            .map_err(request_error)?;
        status_error(head.status(), &self.url)?;
        let declared = head
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let len = match declared {
            Some(len) => len,
            None => self.read(None)?.len() as u64,
        };
        Ok(*self.length.get_or_init(|| len))
    }

    fn read(&self, range: Option<RangeInclusive<u64>>) -> ResourceResult<Vec<u8>> {
        let mut out = Vec::new();
        self.stream(&mut out, range)?;
        Ok(out)
    }

    fn stream(&self, sink: &mut dyn Write, range: Option<RangeInclusive<u64>>) -> ResourceResult<u64> {
        let mut response = self.send(range.as_ref())?;
        let partial = response.status() == StatusCode::PARTIAL_CONTENT;
        match range {
            // Servers ignoring `Range` answer 200 with the whole body.
            Some(range) if !partial => {
                let (start, end) = range.into_inner();
                let mut body = io::Cursor::new(response.bytes().map_err(request_error)?);
                body.set_position(start);
                let mut part = io::Read::take(body, end.saturating_sub(start) + 1);
                Ok(io::copy(&mut part, sink)?)
            }
            _ => Ok(response.copy_to(sink).map_err(request_error)?),
        }
    }
}
