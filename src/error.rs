//! Error types for publication opening and resource access.

use std::io;

use thiserror::Error;

/// Errors that can occur while opening or parsing a publication.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("LCP error: {0}")]
    Lcp(String),

    #[error("decoding error: {0}")]
    Decode(String),

    #[error("invalid CSS selector: {0}")]
    InvalidSelector(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(quick_xml::Error::from(e))
    }
}

impl From<quick_xml::encoding::EncodingError> for Error {
    fn from(e: quick_xml::encoding::EncodingError) -> Self {
        Error::Xml(quick_xml::Error::from(e))
    }
}

/// Errors surfaced by [`Resource`](crate::fetcher::Resource) operations.
///
/// Each variant maps to an HTTP status through [`ResourceError::status`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("range not satisfiable")]
    RangeNotSatisfiable,

    #[error("out of memory")]
    OutOfMemory,

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type ResourceResult<T> = std::result::Result<T, ResourceError>;

impl ResourceError {
    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ResourceError::BadRequest(_) => 400,
            ResourceError::Unauthorized(_) => 401,
            ResourceError::Forbidden(_) => 403,
            ResourceError::NotFound(_) => 404,
            ResourceError::MethodNotAllowed => 405,
            ResourceError::RangeNotSatisfiable => 416,
            ResourceError::OutOfMemory => 507,
            ResourceError::Unavailable(_) => 503,
            ResourceError::Cancelled => 499,
            ResourceError::Other(_) => 500,
        }
    }

    pub fn other(e: impl std::fmt::Display) -> Self {
        ResourceError::Other(e.to_string())
    }
}

impl From<io::Error> for ResourceError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => ResourceError::NotFound(e.to_string()),
            io::ErrorKind::PermissionDenied => ResourceError::Forbidden(e.to_string()),
            io::ErrorKind::OutOfMemory => ResourceError::OutOfMemory,
            io::ErrorKind::Interrupted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => ResourceError::Cancelled,
            io::ErrorKind::TimedOut | io::ErrorKind::ConnectionRefused => {
                ResourceError::Unavailable(e.to_string())
            }
            _ => ResourceError::Other(e.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for ResourceError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::FileNotFound => ResourceError::NotFound(e.to_string()),
            zip::result::ZipError::Io(io) => io.into(),
            other => ResourceError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ResourceError::BadRequest(String::new()).status(), 400);
        assert_eq!(ResourceError::Unauthorized(String::new()).status(), 401);
        assert_eq!(ResourceError::Forbidden(String::new()).status(), 403);
        assert_eq!(ResourceError::NotFound(String::new()).status(), 404);
        assert_eq!(ResourceError::MethodNotAllowed.status(), 405);
        assert_eq!(ResourceError::RangeNotSatisfiable.status(), 416);
        assert_eq!(ResourceError::OutOfMemory.status(), 507);
        assert_eq!(ResourceError::Unavailable(String::new()).status(), 503);
        assert_eq!(ResourceError::Cancelled.status(), 499);
        assert_eq!(ResourceError::Other(String::new()).status(), 500);
    }

    #[test]
    fn test_io_error_kinds() {
        let e: ResourceError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(e, ResourceError::NotFound(_)));

        let e: ResourceError = io::Error::new(io::ErrorKind::BrokenPipe, "closed").into();
        assert_eq!(e, ResourceError::Cancelled);

        let e: ResourceError = io::Error::other("boom").into();
        assert_eq!(e.status(), 500);
    }
}
