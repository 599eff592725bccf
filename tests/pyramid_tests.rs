use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tilepyramid::prelude::*;

/// Layout, fallback and pruning scenarios driven through a recording renderer
#[cfg(test)]
mod pyramid_tests {
    use super::*;

    type Responder = Box<dyn Fn(u8) -> Option<Vec<u8>> + Send + Sync>;

    /// Answers by tile zoom and remembers every URL it was asked for
    struct MockFetcher {
        requests: Mutex<Vec<String>>,
        respond: Responder,
    }

    impl MockFetcher {
        fn new<F>(respond: F) -> Arc<Self>
        where
            F: Fn(u8) -> Option<Vec<u8>> + Send + Sync + 'static,
        {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn serving() -> Arc<Self> {
            Self::new(|_| Some(b"tile".to_vec()))
        }

        fn count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn zooms(&self) -> Vec<u8> {
            self.requests.lock().unwrap().iter().map(|u| zoom_of(u)).collect()
        }
    }

    /// `https://tiles.test/{z}/{x}/{y}.png` -> z
    fn zoom_of(url: &str) -> u8 {
        url.trim_start_matches("https://tiles.test/")
            .split('/')
            .next()
            .and_then(|z| z.parse().ok())
            .unwrap()
    }

    #[async_trait]
    impl TileFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(url.to_string());
            (self.respond)(zoom_of(url)).ok_or_else(|| TileError::FetchFailed {
                key: url.to_string(),
                reason: "HTTP 404".into(),
            })
        }
    }

    /// Queues futures until the test decides to run them
    #[derive(Default)]
    struct DeferredSpawner {
        queue: Mutex<Vec<BoxFuture>>,
    }

    impl DeferredSpawner {
        fn run_all(&self) -> usize {
            let jobs: Vec<BoxFuture> = self.queue.lock().unwrap().drain(..).collect();
            let ran = jobs.len();
            for job in jobs {
                futures::executor::block_on(job);
            }
            ran
        }
    }

    struct QueuedHandle;

    impl AsyncHandle for QueuedHandle {
        fn is_finished(&self) -> bool {
            false
        }

        fn cancel(&self) {}
    }

    impl AsyncSpawner for DeferredSpawner {
        fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle> {
            self.queue.lock().unwrap().push(future);
            Box::new(QueuedHandle)
        }
    }

    struct RecordingRenderer {
        viewport: Viewport,
        shown: HashMap<TileKey, f64>,
        /// every show call, in order
        show_log: Vec<TileKey>,
        hidden: Vec<TileKey>,
        placed: usize,
    }

    impl RecordingRenderer {
        fn new(viewport: Viewport) -> Self {
            Self {
                viewport,
                shown: HashMap::default(),
                show_log: Vec::new(),
                hidden: Vec::new(),
                placed: 0,
            }
        }
    }

    impl TileRenderer for RecordingRenderer {
        type Image = Vec<u8>;

        fn show(&mut self, key: &TileKey, _image: Arc<Vec<u8>>, z_order: f64) {
            self.shown.insert(*key, z_order);
            self.show_log.push(*key);
        }

        fn hide(&mut self, key: &TileKey) {
            self.shown.remove(key);
            self.hidden.push(*key);
        }

        fn current_viewport(&self) -> Viewport {
            self.viewport
        }

        fn place(&mut self, _key: &TileKey, _placement: &TilePlacement) {
            self.placed += 1;
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn service(max_zoom: u8) -> ServiceDescriptor {
        ServiceDescriptor::new("test", "https://tiles.test/{z}/{x}/{y}.png", max_zoom)
    }

    fn viewport(scale: f64, tx: f64, width: f64, height: f64) -> Viewport {
        Viewport::from_transform(
            ScreenTransform::new(scale, 0.0, MapPoint::new(tx, 0.0)),
            width,
            height,
        )
        .unwrap()
    }

    fn key(zoom: u8, x: i64, y: i64) -> TileKey {
        TileAddress::new(zoom, x, y).key()
    }

    fn manager(
        max_zoom: u8,
        fetcher: Arc<MockFetcher>,
        spawner: Arc<dyn AsyncSpawner>,
        errors: Arc<Mutex<Vec<String>>>,
    ) -> PyramidManager<BytesDecoder> {
        PyramidManager::builder(service(max_zoom), BytesDecoder)
            .with_config(PyramidConfig::for_testing())
            .with_fetcher(fetcher)
            .with_spawner(spawner)
            .with_error_handler(move |e| errors.lock().unwrap().push(e.to_string()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_fallback_exhausts_at_min_zoom() {
        init_logging();
        let fetcher = MockFetcher::new(|_| None);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let mut m = manager(10, Arc::clone(&fetcher), Arc::new(BlockingSpawner), Arc::clone(&errors));
        let mut renderer = RecordingRenderer::new(viewport(1024.0, 0.0, 100.0, 100.0));

        m.layout(&mut renderer).unwrap();

        // zoom 10 down to max(10 - 8, 1) = 2
        assert_eq!(fetcher.zooms(), (2..=10).rev().collect::<Vec<u8>>());
        assert_eq!(*errors.lock().unwrap(), vec!["no image data for tile 10,0,0".to_string()]);
        assert!(renderer.shown.is_empty());
        assert_eq!(m.resident_count(), 9);
        assert!(m.resident_tiles().all(|t| matches!(t.state, TileState::Hidden)));

        // slots remember the failure; nothing is refetched
        m.layout(&mut renderer).unwrap();
        assert_eq!(fetcher.count(), 9);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_fallback_shows_first_coarser_tile() {
        init_logging();
        let fetcher = MockFetcher::new(|z| (z <= 8).then(|| b"coarse".to_vec()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let mut m = manager(10, Arc::clone(&fetcher), Arc::new(BlockingSpawner), Arc::clone(&errors));
        let mut renderer = RecordingRenderer::new(viewport(1024.0, 0.0, 100.0, 100.0));

        m.layout(&mut renderer).unwrap();

        assert_eq!(fetcher.zooms(), vec![10, 9, 8]);
        assert_eq!(renderer.shown.len(), 1);
        let z_order = renderer.shown[&key(8, 0, 0)];
        assert!((z_order + 0.17).abs() < 1e-9);
        assert!(errors.lock().unwrap().is_empty());
        assert!(matches!(m.resident_tile(&key(10, 0, 0)).unwrap().state, TileState::Hidden));
        assert!(m.resident_tile(&key(8, 0, 0)).unwrap().is_loaded());
    }

    #[test]
    fn test_runaway_pass_touches_nothing() {
        init_logging();
        let fetcher = MockFetcher::serving();
        let mut m = manager(18, Arc::clone(&fetcher), Arc::new(BlockingSpawner), Default::default());
        let mut renderer = RecordingRenderer::new(viewport(1024.0, 0.0, 100_000.0, 100_000.0));

        let result = m.layout(&mut renderer);

        assert!(matches!(result, Err(TileError::MalformedTransform(_))));
        assert_eq!(fetcher.count(), 0);
        assert_eq!(m.resident_count(), 0);
        assert!(renderer.shown.is_empty() && renderer.hidden.is_empty());
        assert_eq!(renderer.placed, 0);
    }

    #[test]
    fn test_world_copies_share_one_fetch() {
        init_logging();
        let fetcher = MockFetcher::serving();
        let mut m = manager(18, Arc::clone(&fetcher), Arc::new(BlockingSpawner), Default::default());
        // zoom 1, map x from -128 to 256: columns -1, 0 and 1
        let mut renderer = RecordingRenderer::new(viewport(2.0, 256.0, 768.0, 256.0));

        m.layout(&mut renderer).unwrap();

        assert_eq!(m.resident_count(), 3);
        assert_eq!(renderer.shown.len(), 3);
        assert!(renderer.shown.contains_key(&key(1, -1, 0)));
        assert_eq!(fetcher.count(), 2);
        assert_eq!(renderer.placed, 3);
    }

    #[test]
    fn test_zoom_in_prunes_covered_level() {
        init_logging();
        let fetcher = MockFetcher::serving();
        let mut m = manager(18, Arc::clone(&fetcher), Arc::new(BlockingSpawner), Default::default());
        let mut renderer = RecordingRenderer::new(viewport(8.0, 0.0, 100.0, 100.0));

        m.layout(&mut renderer).unwrap();
        assert!(renderer.shown.contains_key(&key(3, 0, 0)));

        renderer.viewport = viewport(16.0, 0.0, 100.0, 100.0);
        m.layout(&mut renderer).unwrap();

        assert_eq!(m.current_zoom(), Some(4));
        assert!(renderer.shown.contains_key(&key(4, 0, 0)));
        assert!(!renderer.shown.contains_key(&key(3, 0, 0)));
        assert!(m.resident_tile(&key(3, 0, 0)).is_none());
    }

    #[test]
    fn test_zoom_out_keeps_finer_tiles_until_loaded() {
        init_logging();
        let fetcher = MockFetcher::serving();
        let spawner = Arc::new(DeferredSpawner::default());
        let mut m = manager(18, Arc::clone(&fetcher), Arc::clone(&spawner) as Arc<dyn AsyncSpawner>, Default::default());
        spawner.run_all(); // startup purge
        let mut renderer = RecordingRenderer::new(viewport(16.0, 0.0, 100.0, 100.0));

        m.layout(&mut renderer).unwrap();
        assert_eq!(m.in_flight_count(), 1);
        assert_eq!(spawner.run_all(), 1);
        m.deliver_completions(&mut renderer);
        assert!(renderer.shown.contains_key(&key(4, 0, 0)));
        assert!(m.needs_layout());

        renderer.viewport = viewport(8.0, 0.0, 100.0, 100.0);
        m.layout(&mut renderer).unwrap();
        // zoom 3 is still pending, so zoom 4 stays visible
        assert!(renderer.shown.contains_key(&key(4, 0, 0)));
        assert!(matches!(m.resident_tile(&key(3, 0, 0)).unwrap().state, TileState::Pending));

        spawner.run_all();
        m.deliver_completions(&mut renderer);
        assert!(renderer.shown.contains_key(&key(3, 0, 0)));
        assert!(m.layout_if_needed(&mut renderer).unwrap());
        assert!(!renderer.shown.contains_key(&key(4, 0, 0)));
        assert_eq!(m.resident_count(), 1);
    }

    #[test]
    fn test_completion_after_purge_is_dropped() {
        init_logging();
        let fetcher = MockFetcher::serving();
        let spawner = Arc::new(DeferredSpawner::default());
        let mut m = manager(10, Arc::clone(&fetcher), Arc::clone(&spawner) as Arc<dyn AsyncSpawner>, Default::default());
        spawner.run_all();
        let mut renderer = RecordingRenderer::new(viewport(1024.0, 0.0, 100.0, 100.0));

        m.layout(&mut renderer).unwrap();
        let effects = m.purge_tile_cache().unwrap();
        m.apply(effects, &mut renderer);
        assert_eq!(m.resident_count(), 0);
        assert_eq!(m.in_flight_count(), 0);

        spawner.run_all();
        let effects = m.process_completions();
        assert!(effects.to_show.is_empty());
        assert_eq!(m.resident_count(), 0);
        assert!(renderer.shown.is_empty());
    }

    #[test]
    fn test_recreated_slot_ignores_older_waiter() {
        init_logging();
        let fetcher = MockFetcher::serving();
        let spawner = Arc::new(DeferredSpawner::default());
        let mut m = manager(18, Arc::clone(&fetcher), Arc::clone(&spawner) as Arc<dyn AsyncSpawner>, Default::default());
        spawner.run_all();
        let mut renderer = RecordingRenderer::new(viewport(8.0, 0.0, 100.0, 100.0));

        m.layout(&mut renderer).unwrap();
        assert!(matches!(m.resident_tile(&key(3, 0, 0)).unwrap().state, TileState::Pending));

        // pan east: map x 64..76.5 needs column 2, column 0 goes off screen
        renderer.viewport = viewport(8.0, -512.0, 100.0, 100.0);
        m.layout(&mut renderer).unwrap();
        assert!(m.resident_tile(&key(3, 0, 0)).is_none());
        assert!(m.resident_tile(&key(3, 2, 0)).is_some());

        // pan back before the first fetch finished: the new slot joins it
        renderer.viewport = viewport(8.0, 0.0, 100.0, 100.0);
        let effects = m.layout_pass(&renderer.viewport).unwrap();
        assert!(effects.to_fetch.is_empty());
        m.apply(effects, &mut renderer);
        assert!(m.resident_tile(&key(3, 2, 0)).is_none());

        assert_eq!(spawner.run_all(), 2);
        m.deliver_completions(&mut renderer);

        assert_eq!(fetcher.count(), 2);
        assert_eq!(renderer.show_log, vec![key(3, 0, 0)]);
        assert!(m.resident_tile(&key(3, 0, 0)).unwrap().is_loaded());
        assert_eq!(m.resident_count(), 1);
        assert_eq!(m.in_flight_count(), 0);
    }

    #[test]
    fn test_set_service_hides_everything() {
        init_logging();
        let fetcher = MockFetcher::serving();
        let mut m = manager(18, Arc::clone(&fetcher), Arc::new(BlockingSpawner), Default::default());
        let mut renderer = RecordingRenderer::new(viewport(8.0, 0.0, 100.0, 100.0));
        m.layout(&mut renderer).unwrap();
        assert_eq!(renderer.shown.len(), 1);

        let effects = m
            .set_service(ServiceDescriptor::new("other", "https://tiles.test/{z}/{x}/{y}.png", 18))
            .unwrap();
        m.apply(effects, &mut renderer);
        assert!(renderer.shown.is_empty());
        assert_eq!(m.service().identifier, "other");
        assert!(m.needs_layout());

        // new identifier, new cache: the tile is fetched again
        assert!(m.layout_if_needed(&mut renderer).unwrap());
        assert_eq!(fetcher.count(), 2);
        assert_eq!(renderer.shown.len(), 1);
    }

    #[test]
    fn test_invalid_service_is_rejected() {
        let fetcher = MockFetcher::serving();
        let mut m = manager(18, fetcher, Arc::new(BlockingSpawner), Default::default());
        let result = m.set_service(ServiceDescriptor::new("", "https://x/{z}", 18));
        assert!(matches!(result, Err(TileError::InvalidService(_))));
        assert_eq!(m.service().identifier, "test");
    }

    #[test]
    fn test_placeholder_payload_falls_back() {
        init_logging();
        let fetcher = MockFetcher::new(|z| Some(if z == 10 { b"blank".to_vec() } else { b"real".to_vec() }));
        let mut m = PyramidManager::builder(
            service(10).with_placeholder_image(b"blank".to_vec()),
            BytesDecoder,
        )
        .with_config(PyramidConfig::for_testing())
        .with_fetcher(Arc::clone(&fetcher) as Arc<dyn TileFetcher>)
        .with_spawner(Arc::new(BlockingSpawner))
        .build()
        .unwrap();
        let mut renderer = RecordingRenderer::new(viewport(1024.0, 0.0, 100.0, 100.0));

        m.layout(&mut renderer).unwrap();
        assert_eq!(fetcher.zooms(), vec![10, 9]);
        assert!(renderer.shown.contains_key(&key(9, 0, 0)));
    }

    #[test]
    fn test_transform_changes_request_layout() {
        let observers = TransformObservers::new();
        let fetcher = MockFetcher::serving();
        let mut m = manager(18, fetcher, Arc::new(BlockingSpawner), Default::default());
        let mut renderer = RecordingRenderer::new(viewport(8.0, 0.0, 100.0, 100.0));
        m.observe(&observers);

        assert!(m.layout_if_needed(&mut renderer).unwrap());
        assert!(!m.layout_if_needed(&mut renderer).unwrap());

        observers.notify();
        assert!(m.needs_layout());
        assert!(m.layout_if_needed(&mut renderer).unwrap());

        m.unobserve();
        observers.notify();
        assert!(!m.needs_layout());
        assert!(observers.is_empty());
    }

    #[test]
    fn test_notify_during_pass_is_ignored() {
        struct NotifyingFetcher(TransformObservers);

        #[async_trait]
        impl TileFetcher for NotifyingFetcher {
            async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
                self.0.notify();
                Ok(b"tile".to_vec())
            }
        }

        let observers = TransformObservers::new();
        let mut m = PyramidManager::builder(service(18), BytesDecoder)
            .with_config(PyramidConfig::for_testing())
            .with_fetcher(Arc::new(NotifyingFetcher(observers.clone())))
            .with_spawner(Arc::new(BlockingSpawner))
            .build()
            .unwrap();
        m.observe(&observers);
        let mut renderer = RecordingRenderer::new(viewport(8.0, 0.0, 100.0, 100.0));

        m.layout(&mut renderer).unwrap();
        assert_eq!(renderer.shown.len(), 1);
        assert!(!m.needs_layout());
    }

    #[test]
    fn test_needed_keys_and_download() {
        init_logging();
        let fetcher = MockFetcher::serving();
        let m = manager(18, Arc::clone(&fetcher), Arc::new(BlockingSpawner), Default::default());
        // zoom 1 over the whole world
        let vp = viewport(2.0, 0.0, 512.0, 512.0);

        let keys = m.needed_tile_keys(&vp).unwrap();
        assert_eq!(keys.len(), 4 + 16 + 64);

        let done = Arc::new(Mutex::new(0));
        for quadkey in &keys[..4] {
            let done = Arc::clone(&done);
            let lookup = m
                .download_tile(quadkey, move |outcome| {
                    assert!(outcome.is_loaded());
                    *done.lock().unwrap() += 1;
                })
                .unwrap();
            assert!(matches!(lookup, CacheLookup::Pending));
        }
        assert_eq!(*done.lock().unwrap(), 4);
        assert_eq!(m.needed_tile_keys(&vp).unwrap().len(), 16 + 64);
        assert_eq!(m.disk_usage().unwrap().entries, 4);

        assert!(matches!(m.download_tile("0123", |_| {}).unwrap(), CacheLookup::Pending));
        assert!(matches!(m.download_tile("0123", |_| {}).unwrap(), CacheLookup::Hit(_)));
        assert!(matches!(m.download_tile("x", |_| {}), Err(TileError::InvalidKey(_))));
    }

    #[test]
    fn test_disk_backed_manager_reuses_persisted_tiles() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let config = PyramidConfig::for_testing().with_cache_dir(Some(dir.path().to_path_buf()));
        let fetcher = MockFetcher::serving();

        for _ in 0..2 {
            let mut m = PyramidManager::builder(service(18), BytesDecoder)
                .with_config(config.clone())
                .with_fetcher(Arc::clone(&fetcher) as Arc<dyn TileFetcher>)
                .with_spawner(Arc::new(BlockingSpawner))
                .build()
                .unwrap();
            let mut renderer = RecordingRenderer::new(viewport(8.0, 0.0, 100.0, 100.0));
            m.layout(&mut renderer).unwrap();
            assert_eq!(renderer.shown.len(), 1);
        }

        // the second manager found the tile on disk
        assert_eq!(fetcher.count(), 1);
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tokio_fetches_complete_in_background() {
        init_logging();
        let fetcher = MockFetcher::serving();
        // no spawner given: the current tokio runtime is used
        let mut m = PyramidManager::builder(service(18), BytesDecoder)
            .with_config(PyramidConfig::for_testing())
            .with_fetcher(Arc::clone(&fetcher) as Arc<dyn TileFetcher>)
            .build()
            .unwrap();
        let mut renderer = RecordingRenderer::new(viewport(8.0, 0.0, 100.0, 100.0));

        m.layout(&mut renderer).unwrap();
        for _ in 0..200 {
            m.deliver_completions(&mut renderer);
            if !renderer.shown.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(renderer.shown.contains_key(&key(3, 0, 0)));
        assert_eq!(m.in_flight_count(), 0);
        assert_eq!(fetcher.count(), 1);
    }
}
