use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use super::{FailureResource, Fetcher, Resource, clamp_range};
use crate::error::ResourceResult;
use crate::manifest::Link;
use crate::mediatype;
use crate::util::{clean_path, href_without_suffix};

/// Serves local files and directories under href prefixes.
///
/// A route `("/audio", dir)` maps `/audio/a/b.mp3` to `dir/a/b.mp3`; a route
/// to a file only matches its exact href. Paths resolving outside the routed
/// directory are not found.
pub struct FileFetcher {
    routes: Vec<(String, PathBuf)>,
}

impl FileFetcher {
    pub fn new(routes: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(href, path)| (clean_path(&format!("/{}", href.trim_start_matches('/'))), path))
            .collect();
        Self { routes }
    }

    /// A fetcher serving a single file at `href`.
    pub fn single(href: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new([(href.into(), path.into())])
    }

    fn resolve(&self, href: &str) -> Option<PathBuf> {
        let href = clean_path(&format!("/{}", href_without_suffix(href).trim_start_matches('/')));
        for (prefix, root) in &self.routes {
            if href == *prefix {
                return Some(root.clone());
            }
            let rest = if prefix == "/" {
                href.strip_prefix('/')
            } else {
                href.strip_prefix(prefix.as_str()).and_then(|r| r.strip_prefix('/'))
            };
            let Some(rest) = rest else { continue };
            if rest.split('/').any(|seg| seg == "..") {
                continue;
            }
            let path = rest.split('/').fold(root.clone(), |p, seg| p.join(seg));
            if path.starts_with(root) {
                return Some(path);
            }
        }
        None
    }
}

fn walk(dir: &Path, href: &str, out: &mut Vec<Link>) -> io::Result<()> {
    let mut items: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    items.sort_by_key(|item| item.file_name());
    for item in items {
        let name = item.file_name().to_string_lossy().into_owned();
        let child = format!("{}/{name}", href.trim_end_matches('/'));
        if item.file_type()?.is_dir() {
            walk(&item.path(), &child, out)?;
        } else {
            out.push(file_link(child));
        }
    }
    Ok(())
}

fn file_link(href: String) -> Link {
    let media_type = mediatype::of_href(&href).map(str::to_string);
    let mut link = Link::new(href);
    link.media_type = media_type;
    link
}

impl Fetcher for FileFetcher {
    fn links(&self) -> Vec<Link> {
        let mut out = Vec::new();
        for (href, path) in &self.routes {
            if path.is_dir() {
                if let Err(e) = walk(path, href, &mut out) {
                    log::warn!("cannot list {}: {e}", path.display());
                }
            } else {
                out.push(file_link(href.clone()));
            }
        }
        out
    }

    fn get(&self, link: &Link) -> Box<dyn Resource> {
        match self.resolve(&link.href) {
            Some(path) if path.is_file() => Box::new(FileResource::new(link.clone(), path)),
            _ => Box::new(FailureResource::not_found(link.clone())),
        }
    }
}

/// A file on disk, opened anew for every read.
pub struct FileResource {
    link: Link,
    path: PathBuf,
}

impl FileResource {
    pub fn new(link: Link, path: PathBuf) -> Self {
        Self { link, path }
    }

    fn open_at(&self, range: Option<RangeInclusive<u64>>) -> ResourceResult<io::Take<File>> {
        let mut file = File::open(&self.path)?;
        let (start, len) = clamp_range(range, file.metadata()?.len());
        file.seek(SeekFrom::Start(start))?;
        Ok(file.take(len))
    }
}

impl Resource for FileResource {
    fn link(&self) -> &Link {
        &self.link
    }

    fn length(&self) -> ResourceResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn read(&self, range: Option<RangeInclusive<u64>>) -> ResourceResult<Vec<u8>> {
        let mut reader = self.open_at(range)?;
        let mut out = Vec::with_capacity(reader.limit() as usize);
        reader.read_to_end(&mut out)?;
        Ok(out)
    }

    fn stream(&self, sink: &mut dyn Write, range: Option<RangeInclusive<u64>>) -> ResourceResult<u64> {
        let mut reader = self.open_at(range)?;
        Ok(io::copy(&mut reader, sink)?)
    }
}
