//! Publications of the served directory, opened on demand and cached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use log::{debug, info};
use serde::Serialize;

use super::ServerConfig;
use super::cache::TinyLfu;
use crate::asset::FileAsset;
use crate::error::{Error, ResourceError, Result};
use crate::publication::Publication;
use crate::streamer::{Streamer, StreamerConfig};
use crate::util::{clean_path, decode_id, encode_id};

/// Outcome of opening a publication, shared by every request waiting on it.
pub type OpenResult = std::result::Result<Arc<Publication>, Arc<Error>>;

type Flight = Arc<OnceLock<OpenResult>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entry of `/list.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub filename: String,
    pub path: String,
}

pub struct PublicationStore {
    base_directory: PathBuf,
    streamer: Streamer,
    cache: Mutex<TinyLfu<Publication>>,
    in_flight: Mutex<HashMap<String, Flight>>,
}

impl PublicationStore {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_streamer(
            config,
            Streamer::new(StreamerConfig {
                infer_a11y: config.infer_a11y,
                ..Default::default()
            }),
        )
    }

    pub fn with_streamer(config: &ServerConfig, streamer: Streamer) -> Self {
        Self {
            base_directory: config.base_directory.clone(),
            streamer,
            cache: Mutex::new(TinyLfu::new(config.cache_capacity, config.cache_ttl)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Publication identified by `id`, the base64url form of its path
    /// relative to the base directory.
    ///
    /// Concurrent requests for a publication that is not cached yet wait for
    /// a single open.
    pub fn get(&self, id: &str) -> OpenResult {
        let key = publication_key(id).map_err(Arc::new)?;
        if let Some(publication) = self.cached(&key) {
            return Ok(publication);
        }

        let flight = Arc::clone(lock(&self.in_flight).entry(key.clone()).or_default());
        let result = flight
            .get_or_init(|| match self.cached(&key) {
                Some(publication) => Ok(publication),
                None => self.open(&key).map_err(Arc::new),
            })
            .clone();

        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(&key).is_some_and(|f| Arc::ptr_eq(f, &flight)) {
            in_flight.remove(&key);
        }
        result
    }

    fn cached(&self, key: &str) -> Option<Arc<Publication>> {
        let (publication, evicted) = {
            let mut cache = lock(&self.cache);
            let publication = cache.get(key, Instant::now());
            (publication, cache.take_evicted())
        };
        close_evicted(evicted);
        publication
    }

    fn open(&self, key: &str) -> Result<Arc<Publication>> {
        let path = self.base_directory.join(key);
        if !path.exists() {
            return Err(ResourceError::NotFound(key.to_string()).into());
        }
        let publication = Arc::new(self.streamer.open(&FileAsset::new(path))?);
        info!("Opened {key}");

        let evicted = {
            let mut cache = lock(&self.cache);
            cache.insert(key.to_string(), Arc::clone(&publication), Instant::now());
            cache.take_evicted()
        };
        close_evicted(evicted);
        Ok(publication)
    }

    /// Entries of the base directory, sorted by file name.
    pub fn list(&self) -> Result<Vec<ListEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.base_directory)? {
            let filename = entry?.file_name().to_string_lossy().into_owned();
            entries.push(ListEntry {
                path: encode_id(&filename),
                filename,
            });
        }
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(entries)
    }
}

/// Cache key for a publication id: a clean path that stays inside the base
/// directory.
fn publication_key(id: &str) -> Result<String> {
    let path = decode_id(id)
        .ok_or_else(|| ResourceError::BadRequest(format!("invalid publication id {id:?}")))?;
    let key = clean_path(path.trim_start_matches('/'));
    if key == "." || key == ".." || key.starts_with("../") {
        return Err(ResourceError::NotFound(path).into());
    }
    Ok(key)
}

/// Release publications dropped from the cache. Requests still holding one
/// keep it alive until they finish.
fn close_evicted(evicted: Vec<(String, Arc<Publication>)>) {
    for (key, publication) in evicted {
        debug!("Evicting {key}");
        if let Ok(publication) = Arc::try_unwrap(publication) {
            publication.close();
        }
    }
}
