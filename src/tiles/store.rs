//! Persistent byte tier of the tile cache.
//!
//! One entry per quadkey holding the raw fetched bytes plus a last-access time
//! used by the age-based purge.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::core::constants::CACHE_FILE_SUFFIX;
use crate::prelude::{HashMap, SystemTime};
use crate::{Result, TileError};

/// Size of the persistent tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub bytes: u64,
    pub entries: usize,
}

/// Byte store keyed by quadkey.
///
/// Implementations are shared between the owner and background fetches and
/// must synchronise internally.
pub trait PersistentStore: Send + Sync {
    /// Returns the stored bytes and refreshes the entry's access time.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    fn contains(&self, key: &str) -> bool;

    fn remove_all(&self) -> Result<()>;

    /// Drops entries last accessed before `cutoff`; returns how many went.
    fn remove_older_than(&self, cutoff: SystemTime) -> Result<usize>;

    /// Every stored key, without the file suffix.
    fn keys(&self) -> Result<Vec<String>>;

    fn usage(&self) -> Result<DiskUsage>;
}

/// Directory of `{quadkey}.jpg` files; the file mtime is the access time.
#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
    write_seq: AtomicU64,
}

impl DiskStore {
    /// Opens (creating if needed) the cache directory of service `identifier` under `root`.
    pub fn open(root: &Path, identifier: &str) -> Result<Self> {
        let dir = root.join(sanitize(identifier));
        fs::create_dir_all(&dir)?;
        log::debug!("tile store at {}", dir.display());
        Ok(Self {
            dir,
            write_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(TileError::InvalidKey(format!("store key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}{CACHE_FILE_SUFFIX}")))
    }

    fn entries(&self) -> Result<Vec<(PathBuf, fs::Metadata)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_tile = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(CACHE_FILE_SUFFIX) && !n.starts_with('.'));
            if !is_tile {
                continue;
            }
            match entry.metadata() {
                Ok(meta) if meta.is_file() => out.push((path, meta)),
                Ok(_) => {}
                // removed by a concurrent purge
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(out)
    }
}

impl PersistentStore for DiskStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let touched = fs::File::options()
            .write(true)
            .open(&path)
            .and_then(|file| file.set_modified(SystemTime::now()));
        if let Err(e) = touched {
            log::debug!("could not refresh access time of {}: {}", path.display(), e);
        }
        Ok(Some(bytes))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let staging = self.dir.join(format!(".{key}.{}.{seq}.tmp", std::process::id()));
        fs::write(&staging, bytes)?;
        if let Err(e) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.path_for(key).map_or(false, |p| p.is_file())
    }

    fn remove_all(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn remove_older_than(&self, cutoff: SystemTime) -> Result<usize> {
        let mut removed = 0;
        for (path, meta) in self.entries()? {
            let Ok(modified) = meta.modified() else {
                continue;
            };
            if modified < cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter_map(|(path, _)| {
                let name = path.file_name()?.to_str()?;
                name.strip_suffix(CACHE_FILE_SUFFIX).map(str::to_string)
            })
            .collect())
    }

    fn usage(&self) -> Result<DiskUsage> {
        let entries = self.entries()?;
        Ok(DiskUsage {
            bytes: entries.iter().map(|(_, meta)| meta.len()).sum(),
            entries: entries.len(),
        })
    }
}

fn sanitize(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// In-process stand-in for [`DiskStore`], used when no cache directory is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Vec<u8>, SystemTime)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` with an explicit access time.
    pub fn put_at(&self, key: &str, bytes: &[u8], accessed: SystemTime) -> Result<()> {
        self.lock()?
            .insert(key.to_string(), (bytes.to_vec(), accessed));
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, SystemTime)>>> {
        self.entries
            .lock()
            .map_err(|_| TileError::Runtime("memory store lock poisoned".into()))
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.lock()?;
        Ok(entries.get_mut(key).map(|(bytes, accessed)| {
            *accessed = SystemTime::now();
            bytes.clone()
        }))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.put_at(key, bytes, SystemTime::now())
    }

    fn contains(&self, key: &str) -> bool {
        self.lock().map_or(false, |entries| entries.contains_key(key))
    }

    fn remove_all(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn remove_older_than(&self, cutoff: SystemTime) -> Result<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, (_, accessed)| *accessed >= cutoff);
        Ok(before - entries.len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn usage(&self) -> Result<DiskUsage> {
        let entries = self.lock()?;
        Ok(DiskUsage {
            bytes: entries.values().map(|(bytes, _)| bytes.len() as u64).sum(),
            entries: entries.len(),
        })
    }
}
