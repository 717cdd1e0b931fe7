use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, OnceLock};

use super::{Resource, clamp_range};
use crate::error::{ResourceError, ResourceResult};
use crate::manifest::Link;

type Producer = Box<dyn FnOnce() -> ResourceResult<Vec<u8>> + Send>;

/// An in-memory resource. The bytes may be produced lazily on first access.
pub struct BytesResource {
    link: Link,
    producer: Mutex<Option<Producer>>,
    bytes: OnceLock<ResourceResult<Arc<[u8]>>>,
}

impl BytesResource {
    pub fn new(link: Link, bytes: Vec<u8>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Ok(Arc::from(bytes)));
        Self {
            link,
            producer: Mutex::new(None),
            bytes: cell,
        }
    }

    /// Resource whose bytes come from `producer`, called at most once.
    pub fn lazy(
        link: Link,
        producer: impl FnOnce() -> ResourceResult<Vec<u8>> + Send + 'static,
    ) -> Self {
        Self {
            link,
            producer: Mutex::new(Some(Box::new(producer))),
            bytes: OnceLock::new(),
        }
    }

    fn bytes(&self) -> ResourceResult<Arc<[u8]>> {
        self.bytes
            .get_or_init(|| {
                let producer = self.producer.lock().ok().and_then(|mut p| p.take());
                match producer {
                    Some(produce) => produce().map(Arc::from),
                    None => Err(ResourceError::Other("resource producer was lost".into())),
                }
            })
            .clone()
    }
}

impl Resource for BytesResource {
    fn link(&self) -> &Link {
        &self.link
    }

    fn length(&self) -> ResourceResult<u64> {
        Ok(self.bytes()?.len() as u64)
    }

    fn read(&self, range: Option<RangeInclusive<u64>>) -> ResourceResult<Vec<u8>> {
        let bytes = self.bytes()?;
        let (start, len) = clamp_range(range, bytes.len() as u64);
        let start = start as usize;
        Ok(bytes[start..start + len as usize].to_vec())
    }
}

/// A resource whose every operation fails with the same error.
pub struct FailureResource {
    link: Link,
    error: ResourceError,
}

impl FailureResource {
    pub fn new(link: Link, error: ResourceError) -> Self {
        Self { link, error }
    }

    pub fn not_found(link: Link) -> Self {
        let error = ResourceError::NotFound(link.href.clone());
        Self { link, error }
    }
}

impl Resource for FailureResource {
    fn link(&self) -> &Link {
        &self.link
    }

    fn length(&self) -> ResourceResult<u64> {
        Err(self.error.clone())
    }

    fn read(&self, _range: Option<RangeInclusive<u64>>) -> ResourceResult<Vec<u8>> {
        Err(self.error.clone())
    }
}
