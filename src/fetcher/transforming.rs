use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, OnceLock};

use super::{Fetcher, Resource, clamp_range};
use crate::error::{ResourceError, ResourceResult};
use crate::manifest::Link;

/// Turns a resource into another, e.g. a decrypting view of it. Transformers
/// that do not apply return the resource unchanged.
pub type ResourceTransformer = Arc<dyn Fn(Box<dyn Resource>) -> Box<dyn Resource> + Send + Sync>;

/// Applies transformers, left to right, to every resource of a fetcher.
pub struct TransformingFetcher {
    fetcher: Box<dyn Fetcher>,
    transformers: Vec<ResourceTransformer>,
}

impl TransformingFetcher {
    pub fn new(fetcher: Box<dyn Fetcher>, transformers: Vec<ResourceTransformer>) -> Self {
        Self {
            fetcher,
            transformers,
        }
    }
}

impl Fetcher for TransformingFetcher {
    fn links(&self) -> Vec<Link> {
        self.fetcher.links()
    }

    fn get(&self, link: &Link) -> Box<dyn Resource> {
        self.transformers
            .iter()
            .fold(self.fetcher.get(link), |resource, transform| transform(resource))
    }

    fn close(&self) {
        self.fetcher.close();
    }
}

type ByteTransform = Box<dyn FnOnce(Vec<u8>) -> ResourceResult<Vec<u8>> + Send>;

/// A resource whose content is a function of its child's full content.
///
/// The child is read and transformed once, on first access. The result is
/// served from memory, so compressed passthrough is never offered.
pub struct TransformingResource {
    child: Box<dyn Resource>,
    link: Link,
    transform: Mutex<Option<ByteTransform>>,
    data: OnceLock<ResourceResult<Arc<[u8]>>>,
}

impl TransformingResource {
    pub fn new(
        child: Box<dyn Resource>,
        transform: impl FnOnce(Vec<u8>) -> ResourceResult<Vec<u8>> + Send + 'static,
    ) -> Self {
        let link = child.link().clone();
        Self {
            child,
            link,
            transform: Mutex::new(Some(Box::new(transform))),
            data: OnceLock::new(),
        }
    }

    /// Expose a different link than the child's, e.g. with the decoded
    /// length recorded.
    pub fn with_link(mut self, link: Link) -> Self {
        self.link = link;
        self
    }

    fn data(&self) -> ResourceResult<Arc<[u8]>> {
        self.data
            .get_or_init(|| {
                let transform = self.transform.lock().ok().and_then(|mut t| t.take());
                let Some(transform) = transform else {
                    return Err(ResourceError::Other("resource transform was lost".into()));
                };
                transform(self.child.read(None)?).map(Arc::from)
            })
            .clone()
    }
}

impl Resource for TransformingResource {
    fn link(&self) -> &Link {
        &self.link
    }

    fn length(&self) -> ResourceResult<u64> {
        Ok(self.data()?.len() as u64)
    }

    fn read(&self, range: Option<RangeInclusive<u64>>) -> ResourceResult<Vec<u8>> {
        let data = self.data()?;
        let (start, len) = clamp_range(range, data.len() as u64);
        let start = start as usize;
        Ok(data[start..start + len as usize].to_vec())
    }
}
