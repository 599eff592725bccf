//! The pyramid manager: owner of the resident tile set.
//!
//! All resident-state mutation happens on whichever thread owns the manager.
//! Background fetches only ever send a [`Completion`] over a channel; the owner
//! picks those up in [`PyramidManager::layout_pass`] or
//! [`PyramidManager::process_completions`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::core::{
    config::{PyramidConfig, PyramidProfile, ServiceDescriptor},
    constants::MAX_METADATA_ZOOM,
    observer::{Subscription, TransformObservers},
    projection::inverse_mercator,
    viewport::Viewport,
};
use crate::layers::pyramid::{
    layout::{self, rounded_zoom},
    prune::{select_prunable, PruneCandidate},
    types::{Effects, ResidentTile, TileState},
};
use crate::prelude::{Arc, HashMap, HashSet, SystemTime};
use crate::runtime::AsyncSpawner;
use crate::tiles::{
    address::{decode_quadkey, TileAddress, TileKey},
    cache::{CacheLookup, FetchOutcome, TileCache},
    decode::{PlaceholderFilter, TileDecoder},
    loader::TileFetcher,
    source::{TemplateSource, TileSource},
    store::{DiskStore, DiskUsage, MemoryStore, PersistentStore},
};
use crate::traits::TileRenderer;
use crate::{Result, TileError};

/// Opens the persistent store of a service, given its identifier
pub type StoreFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn PersistentStore>> + Send + Sync>;

/// Receives per-tile errors after each applied batch of effects
pub type ErrorHandler = Box<dyn FnMut(&TileError) + Send>;

/// Fetch result marshalled back to the owner
struct Completion<I> {
    epoch: u64,
    cache_key: String,
    outcome: FetchOutcome<I>,
}

/// A slot waiting on an in-flight fetch, and the request chain it belongs to
#[derive(Debug, Clone, Copy)]
struct Waiter {
    slot: TileKey,
    generation: u64,
    origin: TileKey,
    min_zoom: u8,
}

/// Layout flags shared with transform observers
#[derive(Default)]
struct LayoutState {
    needs_layout: AtomicBool,
    laying_out: AtomicBool,
}

impl LayoutState {
    /// Requests made while a pass is running are dropped.
    fn request(&self) {
        if !self.laying_out.load(Ordering::SeqCst) {
            self.needs_layout.store(true, Ordering::SeqCst);
        }
    }
}

struct LayoutGuard(Arc<LayoutState>);

impl LayoutGuard {
    fn enter(state: Arc<LayoutState>) -> Self {
        state.laying_out.store(true, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for LayoutGuard {
    fn drop(&mut self) {
        self.0.laying_out.store(false, Ordering::SeqCst);
    }
}

/// Builder for creating and configuring a [`PyramidManager`]
pub struct PyramidManagerBuilder<D: TileDecoder> {
    service: ServiceDescriptor,
    decoder: Arc<D>,
    config: PyramidConfig,
    fetcher: Option<Arc<dyn TileFetcher>>,
    spawner: Option<Arc<dyn AsyncSpawner>>,
    store_factory: Option<StoreFactory>,
    error_handler: Option<ErrorHandler>,
}

impl<D: TileDecoder> PyramidManagerBuilder<D> {
    pub fn new(service: ServiceDescriptor, decoder: D) -> Self {
        Self {
            service,
            decoder: Arc::new(decoder),
            config: PyramidConfig::default(),
            fetcher: None,
            spawner: None,
            store_factory: None,
            error_handler: None,
        }
    }

    pub fn with_config(mut self, config: PyramidConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_profile(mut self, profile: PyramidProfile) -> Self {
        self.config = profile.resolve();
        self
    }

    /// Defaults to an `HttpFetcher`, which needs the `tokio-runtime` feature.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn TileFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Defaults to a tokio spawner for the current runtime.
    pub fn with_spawner(mut self, spawner: Arc<dyn AsyncSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Overrides how persistent stores are opened; the default follows
    /// `PyramidConfig::cache_dir`.
    pub fn with_store_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn PersistentStore>> + Send + Sync + 'static,
    {
        self.store_factory = Some(Arc::new(factory));
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&TileError) + Send + 'static,
    {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Result<PyramidManager<D>> {
        self.service.validate()?;

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => default_fetcher()?,
        };
        let spawner = match self.spawner {
            Some(spawner) => spawner,
            None => default_spawner()?,
        };
        let store_factory = self
            .store_factory
            .unwrap_or_else(|| default_store_factory(self.config.cache_dir.clone()));

        let (completions_tx, completions_rx) = unbounded();
        let manager = PyramidManager {
            source: Arc::new(TemplateSource::new(
                self.service.clone(),
                self.config.display_scale,
            )),
            decoder: Arc::new(PlaceholderFilter::new(
                Arc::clone(&self.decoder),
                self.service.placeholder_image.clone(),
            )),
            cache: open_cache(&self.service, &self.config, &store_factory, &fetcher, &spawner)?,
            service: self.service,
            raw_decoder: self.decoder,
            config: self.config,
            fetcher,
            spawner,
            store_factory,
            resident: HashMap::default(),
            in_flight: HashMap::default(),
            completions_tx,
            completions_rx,
            epoch: 0,
            next_generation: 0,
            layout_state: Arc::new(LayoutState::default()),
            subscription: None,
            error_handler: self.error_handler,
            current_zoom: None,
            last_viewport: None,
        };
        manager.purge_stale();
        manager.set_needs_layout();
        Ok(manager)
    }
}

#[cfg(feature = "tokio-runtime")]
fn default_fetcher() -> Result<Arc<dyn TileFetcher>> {
    Ok(Arc::new(crate::tiles::loader::HttpFetcher::default()))
}

/// reqwest cannot run without a tokio reactor.
#[cfg(not(feature = "tokio-runtime"))]
fn default_fetcher() -> Result<Arc<dyn TileFetcher>> {
    Err(TileError::Runtime(
        "no default HTTP fetcher without the tokio-runtime feature; inject one with with_fetcher".into(),
    ))
}

#[cfg(feature = "tokio-runtime")]
fn default_spawner() -> Result<Arc<dyn AsyncSpawner>> {
    Ok(Arc::new(crate::runtime::TokioSpawner::current()?))
}

#[cfg(not(feature = "tokio-runtime"))]
fn default_spawner() -> Result<Arc<dyn AsyncSpawner>> {
    Ok(Arc::new(crate::runtime::BlockingSpawner))
}

/// Disk stores under `cache_dir` when set, in-memory stores otherwise.
pub fn default_store_factory(cache_dir: Option<PathBuf>) -> StoreFactory {
    Arc::new(move |identifier: &str| -> Result<Arc<dyn PersistentStore>> {
        let Some(root) = cache_dir.as_deref() else {
            return Ok(Arc::new(MemoryStore::new()));
        };
        match DiskStore::open(root, identifier) {
            Ok(store) => Ok(Arc::new(store)),
            Err(e) => {
                log::warn!(
                    "no disk cache for {} under {}: {}; keeping tiles in memory",
                    identifier,
                    root.display(),
                    e
                );
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    })
}

fn open_cache<I: Send + Sync + 'static>(
    service: &ServiceDescriptor,
    config: &PyramidConfig,
    store_factory: &StoreFactory,
    fetcher: &Arc<dyn TileFetcher>,
    spawner: &Arc<dyn AsyncSpawner>,
) -> Result<TileCache<I>> {
    let store = store_factory(&service.identifier)?;
    Ok(TileCache::new(
        service.identifier.clone(),
        config.memory_budget,
        store,
        Arc::clone(fetcher),
        Arc::clone(spawner),
    ))
}

/// Computes, fetches, falls back and prunes the tiles of one imagery service.
pub struct PyramidManager<D: TileDecoder> {
    service: ServiceDescriptor,
    config: PyramidConfig,
    source: Arc<TemplateSource>,
    raw_decoder: Arc<D>,
    decoder: Arc<PlaceholderFilter<D>>,
    cache: TileCache<D::Image>,
    fetcher: Arc<dyn TileFetcher>,
    spawner: Arc<dyn AsyncSpawner>,
    store_factory: StoreFactory,
    resident: HashMap<TileKey, ResidentTile<D::Image>>,
    /// Waiters per cache key with a fetch outstanding
    in_flight: HashMap<String, Vec<Waiter>>,
    completions_tx: Sender<Completion<D::Image>>,
    completions_rx: Receiver<Completion<D::Image>>,
    /// Bumped whenever the cache is reset; older completions are dropped
    epoch: u64,
    next_generation: u64,
    layout_state: Arc<LayoutState>,
    subscription: Option<Subscription>,
    error_handler: Option<ErrorHandler>,
    current_zoom: Option<u8>,
    last_viewport: Option<Viewport>,
}

impl<D: TileDecoder> PyramidManager<D> {
    pub fn builder(service: ServiceDescriptor, decoder: D) -> PyramidManagerBuilder<D> {
        PyramidManagerBuilder::new(service, decoder)
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    pub fn cache(&self) -> &TileCache<D::Image> {
        &self.cache
    }

    /// Tile zoom of the last accepted layout pass.
    pub fn current_zoom(&self) -> Option<u8> {
        self.current_zoom
    }

    pub fn resident_tiles(&self) -> impl Iterator<Item = &ResidentTile<D::Image>> {
        self.resident.values()
    }

    pub fn resident_tile(&self, key: &TileKey) -> Option<&ResidentTile<D::Image>> {
        self.resident.get(key)
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Number of cache keys with a fetch outstanding.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn set_error_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&TileError) + Send + 'static,
    {
        self.error_handler = Some(Box::new(handler));
    }

    pub fn needs_layout(&self) -> bool {
        self.layout_state.needs_layout.load(Ordering::SeqCst)
    }

    /// Marks the manager dirty unless a layout pass is running.
    pub fn set_needs_layout(&self) {
        self.layout_state.request();
    }

    /// Relayouts on every change `observers` report until [`Self::unobserve`]
    /// or drop.
    pub fn observe(&mut self, observers: &TransformObservers) {
        let state = Arc::clone(&self.layout_state);
        self.subscription = Some(observers.register(move || state.request()));
    }

    pub fn unobserve(&mut self) {
        self.subscription = None;
    }

    /// Runs a pass for the renderer's viewport and applies the result.
    ///
    /// A malformed transform leaves both the manager and the renderer untouched.
    pub fn layout<R>(&mut self, renderer: &mut R) -> Result<()>
    where
        R: TileRenderer<Image = D::Image>,
    {
        let viewport = renderer.current_viewport();
        let effects = self.layout_pass(&viewport)?;
        self.apply(effects, renderer);
        Ok(())
    }

    /// Like [`Self::layout`], but only when something asked for a relayout.
    /// Returns whether a pass ran.
    pub fn layout_if_needed<R>(&mut self, renderer: &mut R) -> Result<bool>
    where
        R: TileRenderer<Image = D::Image>,
    {
        if !self.layout_state.needs_layout.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.layout(renderer)?;
        Ok(true)
    }

    /// Decides everything one layout pass over `viewport` needs.
    ///
    /// Starts the fetches it needs, applies completions already queued, then
    /// prunes. Nothing is changed when the viewport is rejected.
    pub fn layout_pass(&mut self, viewport: &Viewport) -> Result<Effects<D::Image>> {
        let _guard = LayoutGuard::enter(Arc::clone(&self.layout_state));

        let plan = match layout::plan_layout(viewport, &self.service, &self.config) {
            Ok(plan) => plan,
            Err(e) => {
                log::warn!("layout pass skipped: {}", e);
                return Err(e);
            }
        };
        self.layout_state.needs_layout.store(false, Ordering::SeqCst);
        self.current_zoom = Some(plan.zoom);
        self.last_viewport = Some(*viewport);

        let mut effects = Effects::default();
        for address in plan.tiles {
            let origin = address.key();
            if self.resident.contains_key(&origin) {
                continue;
            }
            self.request(origin, address, plan.min_zoom, &mut effects);
        }

        self.drain_completions(&mut effects);
        self.prune(viewport, plan.zoom, &mut effects);

        effects.placements = self
            .resident
            .keys()
            .map(|key| (*key, viewport.tile_placement(key.address())))
            .collect();
        Ok(effects)
    }

    /// Applies completions delivered since the last pass.
    ///
    /// Anything that changed marks the manager for relayout so the next pass
    /// can prune around the new tiles.
    pub fn process_completions(&mut self) -> Effects<D::Image> {
        let mut effects = Effects::default();
        if self.drain_completions(&mut effects) > 0 {
            self.set_needs_layout();
        }
        effects
    }

    /// [`Self::process_completions`] followed by [`Self::apply`].
    pub fn deliver_completions<R>(&mut self, renderer: &mut R)
    where
        R: TileRenderer<Image = D::Image>,
    {
        let effects = self.process_completions();
        self.apply(effects, renderer);
    }

    /// Hands `effects` to the renderer: hides, then shows, then placements.
    /// Errors go to the error handler last.
    pub fn apply<R>(&mut self, effects: Effects<D::Image>, renderer: &mut R)
    where
        R: TileRenderer<Image = D::Image>,
    {
        for key in &effects.to_hide {
            renderer.hide(key);
        }
        for tile in effects.to_show {
            renderer.show(&tile.key, tile.image, tile.z_order);
        }
        for (key, placement) in &effects.placements {
            renderer.place(key, placement);
        }
        for error in &effects.errors {
            match self.error_handler.as_mut() {
                Some(handler) => handler(error),
                None => log::debug!("unhandled tile error: {}", error),
            }
        }
    }

    /// Walks the request chain starting at `address` until it shows a tile,
    /// waits on a fetch, or runs out of zoom levels.
    fn request(
        &mut self,
        origin: TileKey,
        mut address: TileAddress,
        min_zoom: u8,
        effects: &mut Effects<D::Image>,
    ) {
        loop {
            let key = address.key();
            let step_down = match self.resident.get(&key) {
                Some(tile) => match tile.state {
                    TileState::Loaded(_) => false,
                    TileState::Pending => {
                        let waiter = Waiter {
                            slot: key,
                            generation: tile.generation,
                            origin,
                            min_zoom,
                        };
                        self.in_flight
                            .entry(address.quadkey())
                            .or_default()
                            .push(waiter);
                        false
                    }
                    TileState::Hidden => true,
                },
                None => self.start_tile(key, address, origin, min_zoom, effects),
            };
            if !step_down {
                return;
            }
            match coarser(address, min_zoom) {
                Some(parent) => address = parent,
                None => {
                    report_exhausted(origin, effects);
                    return;
                }
            }
        }
    }

    /// Creates slot `key` and resolves it through the cache. Returns true when
    /// the chain has to continue one zoom coarser.
    fn start_tile(
        &mut self,
        key: TileKey,
        address: TileAddress,
        origin: TileKey,
        min_zoom: u8,
        effects: &mut Effects<D::Image>,
    ) -> bool {
        let generation = self.next_generation;
        self.next_generation += 1;
        let tile = ResidentTile::new(key, generation);
        let z_order = tile.z_order();
        self.resident.insert(key, tile);

        let waiter = Waiter {
            slot: key,
            generation,
            origin,
            min_zoom,
        };
        let cache_key = address.quadkey();
        if let Some(waiters) = self.in_flight.get_mut(&cache_key) {
            log::debug!("{} joins fetch of {}", key, cache_key);
            waiters.push(waiter);
            return false;
        }

        let source = Arc::clone(&self.source);
        let tx = self.completions_tx.clone();
        let epoch = self.epoch;
        let completion_key = cache_key.clone();
        let lookup = self.cache.get_or_fetch(
            &cache_key,
            move || source.url(address),
            &self.decoder,
            move |outcome| {
                // the receiver only goes away with the manager
                let _ = tx.send(Completion {
                    epoch,
                    cache_key: completion_key,
                    outcome,
                });
            },
        );

        match lookup {
            CacheLookup::Hit(image) => {
                self.set_state(&key, TileState::Loaded(Arc::clone(&image)));
                effects.show(key, image, z_order);
                false
            }
            CacheLookup::Absent => {
                self.set_state(&key, TileState::Hidden);
                effects.hide(key);
                true
            }
            CacheLookup::Pending => {
                self.in_flight.insert(cache_key, vec![waiter]);
                effects.to_fetch.push(key);
                false
            }
            CacheLookup::Failed(e) => {
                debug_assert!(
                    !matches!(e, TileError::InvalidKey(_)),
                    "internal tile address {} rejected: {}",
                    key,
                    e
                );
                log::warn!("no request for {}: {}", key, e);
                self.resident.remove(&key);
                effects.errors.push(e);
                false
            }
        }
    }

    fn set_state(&mut self, key: &TileKey, state: TileState<D::Image>) {
        if let Some(tile) = self.resident.get_mut(key) {
            tile.state = state;
        }
    }

    /// Applies every queued completion; returns how many were taken.
    fn drain_completions(&mut self, effects: &mut Effects<D::Image>) -> usize {
        let mut taken = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            taken += 1;
            self.handle_completion(completion, effects);
        }
        taken
    }

    fn handle_completion(&mut self, completion: Completion<D::Image>, effects: &mut Effects<D::Image>) {
        if completion.epoch != self.epoch {
            log::debug!("dropping {} from a previous cache", completion.cache_key);
            return;
        }
        let Some(waiters) = self.in_flight.remove(&completion.cache_key) else {
            log::debug!("no waiters left for {}", completion.cache_key);
            return;
        };

        for waiter in waiters {
            let Some(tile) = self.resident.get_mut(&waiter.slot) else {
                log::debug!("{} was pruned before its fetch finished", waiter.slot);
                continue;
            };
            if tile.generation != waiter.generation {
                log::debug!("stale completion for {}", waiter.slot);
                continue;
            }

            match &completion.outcome {
                FetchOutcome::Loaded(image) => {
                    if !tile.is_loaded() {
                        tile.state = TileState::Loaded(Arc::clone(image));
                        effects.show(waiter.slot, Arc::clone(image), tile.z_order());
                        if let Some(viewport) = &self.last_viewport {
                            let placement = viewport.tile_placement(waiter.slot.address());
                            effects.placements.push((waiter.slot, placement));
                        }
                    }
                }
                FetchOutcome::Absent | FetchOutcome::Failed(_) => {
                    if matches!(tile.state, TileState::Pending) {
                        tile.state = TileState::Hidden;
                        effects.hide(waiter.slot);
                        if let FetchOutcome::Failed(e) = &completion.outcome {
                            log::warn!("tile {} failed: {}", waiter.slot, e);
                        }
                    }
                    match coarser(waiter.slot.address(), waiter.min_zoom) {
                        Some(parent) => self.request(waiter.origin, parent, waiter.min_zoom, effects),
                        None => report_exhausted(waiter.origin, effects),
                    }
                }
            }
        }
    }

    fn prune(&mut self, viewport: &Viewport, zoom: u8, effects: &mut Effects<D::Image>) {
        let candidates: Vec<PruneCandidate> = self
            .resident
            .values()
            .map(|tile| PruneCandidate {
                key: tile.key,
                transparent: tile.is_transparent(),
            })
            .collect();
        let pruned = select_prunable(&candidates, zoom, |key| {
            viewport.tile_overlaps_screen(key.address())
        });
        for key in pruned {
            log::trace!("prune {}", key);
            self.resident.remove(&key);
            effects.hide(key);
        }
    }

    /// Forgets every resident slot and outstanding fetch.
    fn reset(&mut self) -> Effects<D::Image> {
        let mut effects = Effects::default();
        for key in self.resident.keys() {
            effects.hide(*key);
        }
        self.resident.clear();
        self.in_flight.clear();
        self.epoch += 1;
        effects
    }

    fn purge_stale(&self) {
        match SystemTime::now().checked_sub(self.config.purge_age) {
            Some(cutoff) => {
                self.cache.remove_objects_older_than(cutoff);
            }
            None => log::debug!("purge age reaches before the epoch; nothing to purge"),
        }
    }

    /// Swaps the imagery service.
    ///
    /// Every resident tile is hidden, outstanding fetches are forgotten, and a
    /// fresh cache is opened for the new identifier. Stale persisted tiles of
    /// the new service are purged in the background.
    pub fn set_service(&mut self, service: ServiceDescriptor) -> Result<Effects<D::Image>> {
        service.validate()?;
        let cache = open_cache(
            &service,
            &self.config,
            &self.store_factory,
            &self.fetcher,
            &self.spawner,
        )?;

        let effects = self.reset();
        log::info!("switching imagery from {} to {}", self.service.identifier, service.identifier);
        self.source = Arc::new(TemplateSource::new(service.clone(), self.config.display_scale));
        self.decoder = Arc::new(PlaceholderFilter::new(
            Arc::clone(&self.raw_decoder),
            service.placeholder_image.clone(),
        ));
        self.cache = cache;
        self.service = service;
        self.current_zoom = None;
        self.purge_stale();
        self.set_needs_layout();
        Ok(effects)
    }

    /// Empties both cache tiers and every resident slot.
    pub fn purge_tile_cache(&mut self) -> Result<Effects<D::Image>> {
        self.cache.remove_all_objects()?;
        let effects = self.reset();
        log::info!("purged tile cache of {}", self.service.identifier);
        self.set_needs_layout();
        Ok(effects)
    }

    pub fn disk_usage(&self) -> Result<DiskUsage> {
        self.cache.disk_usage()
    }

    /// Metadata URL for the centre of `viewport`, if the service has one.
    pub fn metadata_url(&self, viewport: &Viewport) -> Result<Option<String>> {
        let zoom = rounded_zoom(viewport.zoom(), self.service.round_zoom_up)?
            .clamp(0, i64::from(MAX_METADATA_ZOOM)) as u8;
        let center = viewport.map_rect.center().ensure_finite()?;
        Ok(self.source.metadata_url(inverse_mercator(center), zoom))
    }

    /// Fetches the service metadata for `viewport` in the background.
    ///
    /// `callback` receives the raw bytes, or `None` when the service has no
    /// metadata template.
    pub fn metadata<F>(&self, viewport: &Viewport, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Option<Vec<u8>>>) + Send + 'static,
    {
        let Some(url) = self.metadata_url(viewport)? else {
            callback(Ok(None));
            return Ok(());
        };
        let fetcher = Arc::clone(&self.fetcher);
        self.spawner.spawn(async move {
            callback(fetcher.fetch(&url).await.map(Some));
        });
        Ok(())
    }

    /// Quadkeys a bulk download would still need for `viewport`.
    pub fn needed_tile_keys(&self, viewport: &Viewport) -> Result<Vec<String>> {
        let persisted: HashSet<String> = self.cache.all_keys()?.into_iter().collect();
        layout::needed_tile_keys(viewport, &self.service, &self.config, &persisted)
    }

    /// Brings one quadkey into the cache without touching resident slots.
    ///
    /// `on_complete` only fires when the lookup is [`CacheLookup::Pending`].
    pub fn download_tile<F>(&self, quadkey: &str, on_complete: F) -> Result<CacheLookup<D::Image>>
    where
        F: FnOnce(FetchOutcome<D::Image>) + Send + 'static,
    {
        let address = decode_quadkey(quadkey)?;
        let source = Arc::clone(&self.source);
        Ok(self
            .cache
            .get_or_fetch(quadkey, move || source.url(address), &self.decoder, on_complete))
    }
}

/// Next address of a fallback chain, if the chain may go on.
fn coarser(address: TileAddress, min_zoom: u8) -> Option<TileAddress> {
    if address.zoom <= min_zoom {
        None
    } else {
        address.parent()
    }
}

fn report_exhausted<I>(origin: TileKey, effects: &mut Effects<I>) {
    log::error!("no image data for {} at any zoom", origin);
    effects.errors.push(TileError::NoImageData { key: origin });
}
