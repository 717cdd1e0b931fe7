use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{Archive, ArchiveEntry, CompressionMethod};
use crate::error::{ResourceError, ResourceResult};
use crate::util::clean_path;

/// A directory on disk presented as an archive. Every entry is `Stored`.
///
/// The tree is walked once at open; only the files found then can be read,
/// so requests can never escape the root.
pub struct ExplodedArchive {
    root: PathBuf,
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl ExplodedArchive {
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut entries = Vec::new();
        walk(&root, "", &mut entries)?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path.clone(), i))
            .collect();
        Ok(Self {
            root,
            entries,
            index,
        })
    }

    fn file_path(&self, path: &str) -> ResourceResult<PathBuf> {
        let cleaned = clean_path(path);
        if !self.index.contains_key(&cleaned) {
            return Err(ResourceError::NotFound(format!("{path} not found in directory")));
        }
        Ok(cleaned.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }
}

fn walk(dir: &Path, prefix: &str, out: &mut Vec<ArchiveEntry>) -> io::Result<()> {
    for item in fs::read_dir(dir)? {
        let item = item?;
        let name = item.file_name().to_string_lossy().into_owned();
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        let meta = item.metadata()?;
        if meta.is_dir() {
            walk(&item.path(), &path, out)?;
        } else if meta.is_file() {
            out.push(ArchiveEntry {
                path,
                length: meta.len(),
                compressed_length: None,
                compression: CompressionMethod::Stored,
            });
        }
    }
    Ok(())
}

impl Archive for ExplodedArchive {
    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    fn entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.index.get(&clean_path(path)).map(|&i| &self.entries[i])
    }

    fn reader_at(&self, path: &str, offset: u64) -> ResourceResult<Box<dyn Read + Send>> {
        let mut file = File::open(self.file_path(path)?)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(file))
    }
}
