//! Two-tier tile cache: decoded images in memory, raw bytes persisted.

use lru::LruCache;

use crate::prelude::{Arc, SystemTime};
use crate::runtime::{AsyncHandle, AsyncSpawner};
use crate::tiles::{
    decode::TileDecoder,
    loader::TileFetcher,
    store::{DiskUsage, PersistentStore},
};
use crate::{Result, TileError};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, MutexGuard,
};

/// Synchronous answer of [`TileCache::get_or_fetch`]
#[derive(Debug)]
pub enum CacheLookup<I> {
    /// Decoded image available right now
    Hit(Arc<I>),
    /// Persisted payload exists but carries no image data
    Absent,
    /// A fetch was started; the completion callback will fire later
    Pending,
    /// No fetch could be started
    Failed(TileError),
}

/// Result delivered to the completion callback of a fetch
#[derive(Debug)]
pub enum FetchOutcome<I> {
    Loaded(Arc<I>),
    /// Empty payload or placeholder image
    Absent,
    Failed(TileError),
}

impl<I> FetchOutcome<I> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FetchOutcome::Loaded(_))
    }
}

/// Least-recently-used decoded images under an approximate byte budget
struct MemoryTier<I> {
    entries: LruCache<String, (Arc<I>, usize)>,
    bytes: usize,
    budget: usize,
}

impl<I> MemoryTier<I> {
    fn new(budget: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            bytes: 0,
            budget,
        }
    }

    fn get(&mut self, key: &str) -> Option<Arc<I>> {
        self.entries.get(key).map(|(image, _)| Arc::clone(image))
    }

    fn insert(&mut self, key: String, image: Arc<I>, cost: usize) {
        if let Some((_, old_cost)) = self.entries.put(key, (image, cost)) {
            self.bytes -= old_cost;
        }
        self.bytes += cost;
        // the newest entry always stays, even when it alone exceeds the budget
        while self.bytes > self.budget && self.entries.len() > 1 {
            match self.entries.pop_lru() {
                Some((_, (_, evicted))) => self.bytes -= evicted,
                None => break,
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.bytes = 0;
    }
}

/// Content-addressed cache keyed by quadkey.
///
/// The memory tier is shared with background fetches behind its own mutex, so
/// completions may land on any thread without involving the pyramid owner.
pub struct TileCache<I> {
    identifier: String,
    memory: Arc<Mutex<MemoryTier<I>>>,
    /// Bumped by every full purge; fetches started before it are not cached
    purges: Arc<AtomicU64>,
    store: Arc<dyn PersistentStore>,
    fetcher: Arc<dyn TileFetcher>,
    spawner: Arc<dyn AsyncSpawner>,
}

impl<I: Send + Sync + 'static> TileCache<I> {
    pub fn new(
        identifier: impl Into<String>,
        memory_budget: usize,
        store: Arc<dyn PersistentStore>,
        fetcher: Arc<dyn TileFetcher>,
        spawner: Arc<dyn AsyncSpawner>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            memory: Arc::new(Mutex::new(MemoryTier::new(memory_budget))),
            purges: Arc::new(AtomicU64::new(0)),
            store,
            fetcher,
            spawner,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    /// Resolves `key` through memory, then the persistent store, then the network.
    ///
    /// `url` is only evaluated when a fetch is needed. `on_complete` fires
    /// exactly once if and only if [`CacheLookup::Pending`] is returned; with a
    /// blocking spawner that happens before this call returns.
    pub fn get_or_fetch<D, U, F>(
        &self,
        key: &str,
        url: U,
        decoder: &Arc<D>,
        on_complete: F,
    ) -> CacheLookup<I>
    where
        D: TileDecoder<Image = I>,
        U: FnOnce() -> Result<String>,
        F: FnOnce(FetchOutcome<I>) + Send + 'static,
    {
        if let Some(image) = self.memory().get(key) {
            return CacheLookup::Hit(image);
        }

        match self.store.get(key) {
            Ok(Some(bytes)) => return self.promote(key, &bytes, decoder),
            Ok(None) => {}
            Err(e) => log::warn!("[{}] reading {} from store: {}", self.identifier, key, e),
        }

        let url = match url() {
            Ok(url) => url,
            Err(e) => return CacheLookup::Failed(e),
        };

        let key = key.to_string();
        let memory = Arc::clone(&self.memory);
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let decoder = Arc::clone(decoder);
        let identifier = self.identifier.clone();
        let purges = Arc::clone(&self.purges);
        let started_after = purges.load(Ordering::SeqCst);
        self.spawner.spawn(async move {
            let outcome = match fetcher.fetch(&url).await {
                Ok(bytes) => {
                    let keep = purges.load(Ordering::SeqCst) == started_after;
                    if !keep {
                        log::debug!("[{}] {} arrived after a purge; not cached", identifier, key);
                    } else if let Err(e) = store.put(&key, &bytes) {
                        // placeholders are persisted too so they are not fetched again
                        log::warn!("[{}] persisting {}: {}", identifier, key, e);
                    }
                    match decoder.decode(&bytes) {
                        Ok(Some(image)) => {
                            let cost = decoder.cost(&image);
                            let image = Arc::new(image);
                            if keep {
                                memory
                                    .lock()
                                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                                    .insert(key.clone(), Arc::clone(&image), cost);
                            }
                            FetchOutcome::Loaded(image)
                        }
                        Ok(None) => FetchOutcome::Absent,
                        Err(e) => FetchOutcome::Failed(e),
                    }
                }
                Err(e) => FetchOutcome::Failed(e),
            };
            on_complete(outcome);
        });
        CacheLookup::Pending
    }

    fn promote<D>(&self, key: &str, bytes: &[u8], decoder: &Arc<D>) -> CacheLookup<I>
    where
        D: TileDecoder<Image = I>,
    {
        match decoder.decode(bytes) {
            Ok(Some(image)) => {
                let cost = decoder.cost(&image);
                let image = Arc::new(image);
                self.memory()
                    .insert(key.to_string(), Arc::clone(&image), cost);
                CacheLookup::Hit(image)
            }
            Ok(None) => CacheLookup::Absent,
            Err(e) => {
                log::warn!("[{}] persisted {} does not decode: {}", self.identifier, key, e);
                CacheLookup::Absent
            }
        }
    }

    /// Memory-tier lookup only.
    pub fn cached(&self, key: &str) -> Option<Arc<I>> {
        self.memory().get(key)
    }

    pub fn is_persisted(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Clears both tiers. Fetches still in flight deliver their result but
    /// leave both tiers alone.
    pub fn remove_all_objects(&self) -> Result<()> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        self.memory().clear();
        self.store.remove_all()?;
        log::info!("[{}] cache cleared", self.identifier);
        Ok(())
    }

    /// Purges persisted entries last used before `cutoff` on a background task.
    ///
    /// The memory tier is left alone.
    pub fn remove_objects_older_than(&self, cutoff: SystemTime) -> Box<dyn AsyncHandle> {
        let store = Arc::clone(&self.store);
        let identifier = self.identifier.clone();
        self.spawner.spawn(async move {
            match store.remove_older_than(cutoff) {
                Ok(0) => {}
                Ok(count) => log::info!("[{}] purged {} stale tiles", identifier, count),
                Err(e) => log::warn!("[{}] stale tile purge failed: {}", identifier, e),
            }
        })
    }

    /// Every persisted quadkey.
    pub fn all_keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    pub fn disk_usage(&self) -> Result<DiskUsage> {
        self.store.usage()
    }

    /// Entry count and approximate bytes held by the memory tier.
    pub fn memory_usage(&self) -> (usize, usize) {
        let tier = self.memory();
        (tier.entries.len(), tier.bytes)
    }

    fn memory(&self) -> MutexGuard<'_, MemoryTier<I>> {
        // a panic while holding the lock cannot leave the LRU half-updated
        self.memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
