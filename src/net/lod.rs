//! Image level-of-detail controller.
//!
//! Two cadences over the same node pool:
//!
//! - **scan** (every `scan_interval` seconds): visible nodes pick a tier
//!   from their on-screen size; nodes whose loaded tier differs get a task,
//!   prioritized by distance to the viewport center.
//! - **process** (every frame): pop up to `max_loads_per_frame` tasks,
//!   re-validate each against the current camera, then dispatch.
//!
//! Completions are drained by **poll** on the render thread. A failed load
//! never blanks a node; the previous image stays.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, warn};
use rayon::prelude::*;

use crate::error::ImageError;
use crate::events::{ListenerId, Observers};
use crate::item::{CatalogItem, ResolutionTier};
use crate::net::cache::{FailureTracker, ImageCache};
use crate::net::image::{ImageData, ImageFetcher, ImageLoader, LoadOutcome, LoadRequest};
use crate::net::resolve::{cache_bust, ImageResolver};
use crate::render::animator::{LayoutNode, NodeId, NodePool};
use crate::view::ViewState;

#[derive(Debug, Clone)]
pub struct LodConfig {
    /// Seconds between scans.
    pub scan_interval: f64,
    /// On-screen size (px, longest side) at which the high tier is used.
    pub high_res_threshold: f32,
    pub max_loads_per_frame: usize,
    /// Failures per URL inside one cooldown window before suppression.
    pub max_retries: u32,
    pub cooldown_secs: f64,
    /// Allow replacing a high-res image with a low-res one when zooming out.
    pub allow_downgrade: bool,
    /// Decoded images kept in memory.
    pub cache_capacity: usize,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            scan_interval: 2.0,
            high_res_threshold: 180.0,
            max_loads_per_frame: 4,
            max_retries: 3,
            cooldown_secs: 30.0,
            allow_downgrade: false,
            cache_capacity: 512,
        }
    }
}

impl LodConfig {
    pub fn with_scan_interval(mut self, secs: f64) -> Self {
        self.scan_interval = secs.max(0.0);
        self
    }

    pub fn with_max_loads_per_frame(mut self, n: usize) -> Self {
        self.max_loads_per_frame = n;
        self
    }

    pub fn with_retry_policy(mut self, max_retries: u32, cooldown_secs: f64) -> Self {
        self.max_retries = max_retries;
        self.cooldown_secs = cooldown_secs;
        self
    }

    pub fn with_high_res_threshold(mut self, px: f32) -> Self {
        self.high_res_threshold = px;
        self
    }

    pub fn tier_for(&self, on_screen: f32) -> ResolutionTier {
        if on_screen >= self.high_res_threshold {
            ResolutionTier::High
        } else {
            ResolutionTier::Low
        }
    }

    /// Whether a node still wants `tier` given what it already requested.
    fn wants(&self, requested: Option<ResolutionTier>, tier: ResolutionTier) -> bool {
        match requested {
            None => true,
            Some(r) if r == tier => false,
            Some(r) => tier > r || self.allow_downgrade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageLoadTask {
    pub node: NodeId,
    pub tier: ResolutionTier,
    /// Distance to the viewport center; lower loads first.
    pub priority: f32,
    /// Warm-up task: skips the visibility check.
    pub prefetch: bool,
}

/// Published on the render thread as loads finish.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageEvent {
    Loaded {
        item_id: String,
        tier: ResolutionTier,
        url: String,
    },
    Failed {
        item_id: String,
        tier: ResolutionTier,
        url: String,
        error: ImageError,
    },
    /// Too many failures; the URL is skipped until the cooldown elapses.
    Suppressed { url: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LodStats {
    pub dispatched: u64,
    pub cache_hits: u64,
    pub dropped_stale: u64,
    pub suppressed: u64,
}

pub struct LodController {
    config: LodConfig,
    resolver: ImageResolver,
    loader: ImageLoader,
    cache: ImageCache,
    failures: FailureTracker,
    queue: VecDeque<ImageLoadTask>,
    last_scan: Option<f64>,
    observers: Observers<ImageEvent>,
    stats: LodStats,
}

impl LodController {
    pub fn new(config: LodConfig, resolver: ImageResolver, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            cache: ImageCache::new(config.cache_capacity),
            failures: FailureTracker::new(config.max_retries, config.cooldown_secs),
            loader: ImageLoader::new(fetcher),
            resolver,
            queue: VecDeque::new(),
            last_scan: None,
            observers: Observers::new(),
            stats: LodStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    pub fn stats(&self) -> LodStats {
        self.stats
    }

    pub fn queue(&self) -> &VecDeque<ImageLoadTask> {
        &self.queue
    }

    pub fn in_flight(&self) -> usize {
        self.loader.pending_count()
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ImageEvent) + Send + 'static) -> ListenerId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Tier for an on-screen size in pixels.
    pub fn required_tier(&self, on_screen: f32) -> ResolutionTier {
        self.config.tier_for(on_screen)
    }

    fn on_screen<T>(node: &LayoutNode<T>, view: &ViewState) -> f32 {
        node.width.current.max(node.height.current) * view.scale
    }

    fn is_visible<T>(node: &LayoutNode<T>, view: &ViewState) -> bool {
        node.opacity.target > 0.0 && node.current_rect().intersects(&view.visible)
    }

    fn is_queued(&self, node: NodeId, tier: ResolutionTier) -> bool {
        self.queue.iter().any(|t| t.node == node && t.tier == tier)
    }

    fn enqueue(&mut self, tasks: Vec<ImageLoadTask>) -> usize {
        let mut added = 0;
        for task in tasks {
            if !self.is_queued(task.node, task.tier) {
                self.queue.push_back(task);
                added += 1;
            }
        }
        if added > 0 {
            self.queue
                .make_contiguous()
                .sort_by(|a, b| a.priority.total_cmp(&b.priority));
        }
        added
    }

    /// Queue tier changes for visible nodes. Runs at most once per
    /// `scan_interval` unless `force` is set. Returns the number of new tasks.
    pub fn scan<T: CatalogItem>(
        &mut self,
        pool: &NodePool<T>,
        view: &ViewState,
        now: f64,
        force: bool,
    ) -> usize {
        if !force {
            if let Some(last) = self.last_scan {
                if now - last < self.config.scan_interval {
                    return 0;
                }
            }
        }
        self.last_scan = Some(now);
        self.failures.prune(now);
        if view.visible.width <= 0.0 || view.visible.height <= 0.0 {
            return 0;
        }

        let center = view.visible.center();
        let config = &self.config;
        let nodes: Vec<(NodeId, &LayoutNode<T>)> = pool.iter().collect();
        let tasks: Vec<ImageLoadTask> = nodes
            .par_iter()
            .filter_map(|(handle, node)| {
                if !Self::is_visible(node, view) || node.item.image().is_none() {
                    return None;
                }
                let tier = config.tier_for(Self::on_screen(node, view));
                if !config.wants(node.requested_tier, tier) {
                    return None;
                }
                Some(ImageLoadTask {
                    node: *handle,
                    tier,
                    priority: node.current_rect().center().distance(center),
                    prefetch: false,
                })
            })
            .collect();

        let added = self.enqueue(tasks);
        if added > 0 {
            debug!("lod scan: {added} new tasks, {} queued", self.queue.len());
        }
        added
    }

    /// Queue low-tier loads for every node that has nothing yet, visible or
    /// not. These run after all visible work.
    pub fn warm_up<T: CatalogItem>(&mut self, pool: &NodePool<T>) -> usize {
        let tasks: Vec<ImageLoadTask> = pool
            .iter()
            .filter(|(_, node)| node.requested_tier.is_none() && node.item.image().is_some())
            .map(|(handle, _)| ImageLoadTask {
                node: handle,
                tier: ResolutionTier::Low,
                priority: f32::MAX,
                prefetch: true,
            })
            .collect();
        self.enqueue(tasks)
    }

    /// Dispatch up to `max_loads_per_frame` queued loads. Stale tasks are
    /// dropped silently. Returns the number of network dispatches.
    pub fn process<T: CatalogItem>(&mut self, pool: &mut NodePool<T>, view: &ViewState, now: f64) -> usize {
        let mut dispatched = 0;
        while dispatched < self.config.max_loads_per_frame {
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            let Some(url) = self.validate(pool, view, &task) else {
                self.stats.dropped_stale += 1;
                continue;
            };
            if self.failures.is_suppressed(&url, now) {
                continue;
            }
            let Some(node) = pool.get_mut(task.node) else {
                continue;
            };
            // Optimistic: a second scan must not queue the same tier again.
            node.requested_tier = Some(task.tier);

            if let Some(data) = self.cache.get(&url) {
                node.image = Some(data);
                node.image_tier = Some(task.tier);
                self.stats.cache_hits += 1;
                let event = ImageEvent::Loaded {
                    item_id: node.id.clone(),
                    tier: task.tier,
                    url,
                };
                self.observers.notify(&event);
                continue;
            }

            debug!("lod dispatch {} ({}) priority {:.1}", url, task.tier, task.priority);
            self.loader.request(LoadRequest {
                url: url.clone(),
                key: url,
                node: task.node,
                tier: task.tier,
                max_edge: self.resolver.max_edge(task.tier),
                attempt: 0,
            });
            self.stats.dispatched += 1;
            dispatched += 1;
        }
        dispatched
    }

    /// URL to load for `task`, or `None` if the task went stale.
    fn validate<T: CatalogItem>(&self, pool: &NodePool<T>, view: &ViewState, task: &ImageLoadTask) -> Option<String> {
        let node = pool.get(task.node)?;
        if !task.prefetch {
            if !Self::is_visible(node, view) {
                return None;
            }
            if self.required_tier(Self::on_screen(node, view)) != task.tier {
                return None;
            }
        }
        if !self.config.wants(node.requested_tier, task.tier) {
            return None;
        }
        let desc = node.item.image()?;
        self.resolver.resolve(&desc, task.tier)
    }

    /// Apply finished loads. Call once per frame on the render thread.
    /// Returns the number of node images swapped.
    ///
    /// Nodes sharing one download share its outcome: a failed download
    /// counts once against its URL however many nodes waited on it.
    pub fn poll<T: CatalogItem>(&mut self, pool: &mut NodePool<T>, now: f64) -> usize {
        let mut applied = 0;
        for LoadOutcome { url, result, waiters } in self.loader.poll() {
            let result = result.and_then(|data| {
                if data.is_empty() {
                    Err(ImageError::Corrupt)
                } else {
                    Ok(data)
                }
            });
            match result {
                Ok(data) => {
                    for request in waiters {
                        if self.apply(pool, request, &data) {
                            applied += 1;
                        }
                    }
                }
                Err(err) => {
                    let (retry, failed): (Vec<LoadRequest>, Vec<LoadRequest>) = waiters
                        .into_iter()
                        .partition(|r| err.is_corrupt() && r.attempt == 0);
                    if !retry.is_empty() {
                        debug!("corrupt image from {url}, retrying once");
                    }
                    for request in retry {
                        // Same busted URL for every waiter, so they share one download.
                        self.loader.request(LoadRequest {
                            url: cache_bust(&request.key, 1),
                            attempt: 1,
                            ..request
                        });
                    }
                    if !failed.is_empty() {
                        self.fail(pool, failed, err, now);
                    }
                }
            }
        }
        applied
    }

    fn apply<T: CatalogItem>(&mut self, pool: &mut NodePool<T>, request: LoadRequest, data: &Arc<ImageData>) -> bool {
        self.cache.put(request.key.clone(), Arc::clone(data));
        self.failures.clear(&request.key);
        let Some(node) = pool.get_mut(request.node) else {
            return false;
        };
        if node.requested_tier != Some(request.tier) {
            // Superseded while in flight; the cache keeps it.
            return false;
        }
        node.image = Some(Arc::clone(data));
        node.image_tier = Some(request.tier);
        let event = ImageEvent::Loaded {
            item_id: node.id.clone(),
            tier: request.tier,
            url: request.key,
        };
        self.observers.notify(&event);
        true
    }

    /// One failed download: one failure per distinct URL, then every
    /// waiting node falls back to the tier it already shows.
    fn fail<T: CatalogItem>(&mut self, pool: &mut NodePool<T>, requests: Vec<LoadRequest>, err: ImageError, now: f64) {
        let mut keys: Vec<&str> = requests.iter().map(|r| r.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        let mut suppressed = Vec::new();
        for key in keys {
            warn!("image load failed for {key}: {err}");
            if self.failures.record(key, now) {
                suppressed.push(key.to_string());
            }
        }

        for request in requests {
            let Some(node) = pool.get_mut(request.node) else {
                continue;
            };
            if node.requested_tier == Some(request.tier) {
                // Keep the previous image; allow a later scan to retry.
                node.requested_tier = node.image_tier;
            }
            let event = ImageEvent::Failed {
                item_id: node.id.clone(),
                tier: request.tier,
                url: request.key,
                error: err.clone(),
            };
            self.observers.notify(&event);
        }

        for url in suppressed {
            warn!(
                "suppressing {} for {:.0}s after {} failures",
                url, self.config.cooldown_secs, self.config.max_retries
            );
            self.stats.suppressed += 1;
            self.observers.notify(&ImageEvent::Suppressed { url });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{LayoutBox, Point, Size};
    use crate::item::ImageDescriptor;
    use crate::net::resolve::ImageResolverConfig;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone)]
    struct Pic {
        id: String,
        storage: Option<u64>,
    }

    impl CatalogItem for Pic {
        fn id(&self) -> &str {
            &self.id
        }
        fn group_key(&self) -> Option<String> {
            None
        }
        fn weight(&self) -> Option<f32> {
            None
        }
        fn label(&self) -> &str {
            &self.id
        }
        fn price_text(&self) -> Option<String> {
            None
        }
        fn image(&self) -> Option<ImageDescriptor> {
            self.storage.map(|id| ImageDescriptor::Storage { id })
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Ok,
        Fail,
        Corrupt,
    }

    struct StubFetcher {
        mode: Mutex<Mode>,
        urls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode: Mutex::new(mode),
                urls: Mutex::new(Vec::new()),
            })
        }

        fn fetched(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    impl ImageFetcher for StubFetcher {
        fn fetch(&self, url: &str, _max_edge: u32) -> Result<ImageData, ImageError> {
            self.urls.lock().unwrap().push(url.to_string());
            match *self.mode.lock().unwrap() {
                Mode::Ok => Ok(ImageData {
                    key: url.to_string(),
                    width: 2,
                    height: 2,
                    rgba: vec![255; 16],
                }),
                Mode::Fail => Err(ImageError::Status(500)),
                Mode::Corrupt => Ok(ImageData {
                    key: url.to_string(),
                    width: 0,
                    height: 0,
                    rgba: Vec::new(),
                }),
            }
        }
    }

    /// `n` nodes, 100px squares in a row, each with its own storage image.
    fn pool(n: usize) -> NodePool<Pic> {
        let mut pool = NodePool::new();
        pool.sync(
            (0..n)
                .map(|i| Pic {
                    id: format!("p{i}"),
                    storage: Some(i as u64 + 1),
                })
                .collect(),
        );
        let handles: Vec<NodeId> = pool.order().to_vec();
        for (i, h) in handles.into_iter().enumerate() {
            pool.set_targets(h, Point::new(i as f32 * 110.0, 0.0), Size::new(100.0, 100.0), None, None);
        }
        pool.snap_all();
        pool
    }

    fn view(x: f32, width: f32, scale: f32) -> ViewState {
        ViewState {
            visible: LayoutBox::new(x, 0.0, width, 200.0),
            scale,
        }
    }

    fn controller(config: LodConfig, fetcher: Arc<StubFetcher>) -> LodController {
        let resolver = ImageResolver::new(ImageResolverConfig::default().with_proxy_base("https://img.test/p"));
        LodController::new(config, resolver, fetcher)
    }

    fn pump(ctl: &mut LodController, pool: &mut NodePool<Pic>, now: f64, until: impl Fn(&LodController, &NodePool<Pic>) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !until(ctl, pool) && Instant::now() < deadline {
            ctl.poll(pool, now);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn process_respects_per_frame_cap() {
        let mut pool = pool(10);
        let mut ctl = controller(LodConfig::default(), StubFetcher::new(Mode::Ok));
        let v = view(0.0, 2000.0, 1.0);

        assert_eq!(ctl.scan(&pool, &v, 0.0, true), 10);
        let mut total = 0;
        for _ in 0..3 {
            let n = ctl.process(&mut pool, &v, 0.0);
            assert!(n <= ctl.config().max_loads_per_frame);
            total += n;
        }
        assert_eq!(total, 10);
        assert!(ctl.queue().is_empty());
    }

    #[test]
    fn scan_orders_by_distance_and_throttles() {
        let pool = pool(5);
        let mut ctl = controller(LodConfig::default(), StubFetcher::new(Mode::Ok));
        // Center sits over the fourth node.
        let v = view(0.0, 770.0, 1.0);
        ctl.scan(&pool, &v, 0.0, false);
        let first = ctl.queue().front().unwrap().node;
        assert_eq!(pool.get(first).unwrap().id, "p3");
        let priorities: Vec<f32> = ctl.queue().iter().map(|t| t.priority).collect();
        assert!(priorities.windows(2).all(|w| w[0] <= w[1]));

        // Within the interval nothing is rescanned.
        assert_eq!(ctl.scan(&pool, &v, 1.0, false), 0);
        // Already-queued (node, tier) pairs are not duplicated.
        assert_eq!(ctl.scan(&pool, &v, 5.0, false), 0);
    }

    #[test]
    fn tier_follows_on_screen_size() {
        let pool = pool(1);
        let mut ctl = controller(LodConfig::default(), StubFetcher::new(Mode::Ok));
        ctl.scan(&pool, &view(0.0, 200.0, 1.0), 0.0, true);
        assert_eq!(ctl.queue()[0].tier, ResolutionTier::Low);

        let mut ctl = controller(LodConfig::default(), StubFetcher::new(Mode::Ok));
        ctl.scan(&pool, &view(0.0, 200.0, 2.0), 0.0, true);
        assert_eq!(ctl.queue()[0].tier, ResolutionTier::High);
    }

    #[test]
    fn stale_tasks_are_dropped() {
        let mut pool = pool(3);
        let fetcher = StubFetcher::new(Mode::Ok);
        let mut ctl = controller(LodConfig::default(), fetcher.clone());
        ctl.scan(&pool, &view(0.0, 400.0, 1.0), 0.0, true);
        assert_eq!(ctl.queue().len(), 3);

        // Camera moved away before processing.
        let moved = view(5000.0, 400.0, 1.0);
        assert_eq!(ctl.process(&mut pool, &moved, 0.0), 0);
        assert_eq!(ctl.stats().dropped_stale, 3);
        assert!(fetcher.fetched().is_empty());
    }

    #[test]
    fn successful_load_swaps_image() {
        let mut pool = pool(1);
        let mut ctl = controller(LodConfig::default(), StubFetcher::new(Mode::Ok));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        ctl.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let v = view(0.0, 200.0, 1.0);
        ctl.scan(&pool, &v, 0.0, true);
        assert_eq!(ctl.process(&mut pool, &v, 0.0), 1);
        let h = pool.order()[0];
        assert_eq!(pool.get(h).unwrap().requested_tier, Some(ResolutionTier::Low));

        pump(&mut ctl, &mut pool, 0.0, |_, p| p.get(p.order()[0]).unwrap().image.is_some());
        let node = pool.get(h).unwrap();
        assert_eq!(node.image_tier, Some(ResolutionTier::Low));
        assert_eq!(ctl.cache().len(), 1);
        assert!(matches!(events.lock().unwrap()[0], ImageEvent::Loaded { .. }));
    }

    #[test]
    fn failure_keeps_previous_image() {
        let mut pool = pool(1);
        let h = pool.order()[0];
        let previous = Arc::new(ImageData {
            key: "old".into(),
            width: 1,
            height: 1,
            rgba: vec![0; 4],
        });
        {
            let node = pool.get_mut(h).unwrap();
            node.image = Some(Arc::clone(&previous));
            node.image_tier = Some(ResolutionTier::Low);
            node.requested_tier = Some(ResolutionTier::Low);
        }
        let mut ctl = controller(LodConfig::default(), StubFetcher::new(Mode::Fail));
        let v = view(0.0, 200.0, 2.0);
        ctl.scan(&pool, &v, 0.0, true);
        assert_eq!(ctl.process(&mut pool, &v, 0.0), 1);
        assert_eq!(pool.get(h).unwrap().requested_tier, Some(ResolutionTier::High));

        pump(&mut ctl, &mut pool, 0.0, |c, _| c.in_flight() == 0);
        let node = pool.get(h).unwrap();
        assert!(Arc::ptr_eq(node.image.as_ref().unwrap(), &previous));
        assert_eq!(node.requested_tier, Some(ResolutionTier::Low));
        assert_eq!(ctl.failures().failures("https://img.test/p?id=1&width=1300&height=1300&format=webp&quality=85"), 1);
    }

    #[test]
    fn repeated_failures_suppress_url() {
        let mut pool = pool(1);
        let fetcher = StubFetcher::new(Mode::Fail);
        let config = LodConfig::default().with_retry_policy(2, 30.0);
        let mut ctl = controller(config, fetcher.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        ctl.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        let v = view(0.0, 200.0, 1.0);

        for round in 0..2 {
            let now = round as f64 * 3.0;
            ctl.scan(&pool, &v, now, true);
            assert_eq!(ctl.process(&mut pool, &v, now), 1);
            pump(&mut ctl, &mut pool, now, |c, _| c.in_flight() == 0);
        }
        assert!(events.lock().unwrap().iter().any(|e| matches!(e, ImageEvent::Suppressed { .. })));

        ctl.scan(&pool, &v, 10.0, true);
        assert_eq!(ctl.process(&mut pool, &v, 10.0), 0);
        assert_eq!(fetcher.fetched().len(), 2);

        // After the cooldown the URL is tried again.
        ctl.scan(&pool, &v, 40.0, true);
        assert_eq!(ctl.process(&mut pool, &v, 40.0), 1);
    }

    #[test]
    fn corrupt_image_gets_one_cache_busted_retry() {
        let mut pool = pool(1);
        let fetcher = StubFetcher::new(Mode::Corrupt);
        let mut ctl = controller(LodConfig::default(), fetcher.clone());
        let v = view(0.0, 200.0, 1.0);
        ctl.scan(&pool, &v, 0.0, true);
        ctl.process(&mut pool, &v, 0.0);

        pump(&mut ctl, &mut pool, 0.0, |c, _| c.failures().failures("https://img.test/p?id=1&width=130&height=130&format=webp&quality=75") > 0);
        let fetched = fetcher.fetched();
        assert_eq!(fetched.len(), 2);
        assert!(fetched[1].ends_with("&_cb=1"));
        assert!(pool.get(pool.order()[0]).unwrap().image.is_none());
    }

    #[test]
    fn upgrades_only_unless_downgrade_allowed() {
        let mut pool = pool(1);
        let h = pool.order()[0];
        pool.get_mut(h).unwrap().requested_tier = Some(ResolutionTier::High);
        let mut ctl = controller(LodConfig::default(), StubFetcher::new(Mode::Ok));
        assert_eq!(ctl.scan(&pool, &view(0.0, 200.0, 1.0), 0.0, true), 0);

        let config = LodConfig {
            allow_downgrade: true,
            ..LodConfig::default()
        };
        let mut ctl = controller(config, StubFetcher::new(Mode::Ok));
        assert_eq!(ctl.scan(&pool, &view(0.0, 200.0, 1.0), 0.0, true), 1);
    }

    #[test]
    fn warm_up_covers_offscreen_nodes_after_visible_work() {
        let mut pool = pool(6);
        let mut ctl = controller(LodConfig::default().with_max_loads_per_frame(10), StubFetcher::new(Mode::Ok));
        let v = view(0.0, 100.0, 1.0);
        ctl.scan(&pool, &v, 0.0, true);
        assert_eq!(ctl.warm_up(&pool), 5);
        assert!(ctl.queue().iter().skip(1).all(|t| t.prefetch));
        assert_eq!(ctl.process(&mut pool, &v, 0.0), 6);
    }

    #[test]
    fn shared_image_is_served_from_cache() {
        let mut pool = NodePool::new();
        pool.sync(vec![
            Pic { id: "a".into(), storage: Some(9) },
            Pic { id: "b".into(), storage: Some(9) },
        ]);
        let handles: Vec<NodeId> = pool.order().to_vec();
        pool.set_targets(handles[0], Point::ZERO, Size::new(100.0, 100.0), None, None);
        pool.set_targets(handles[1], Point::new(110.0, 0.0), Size::new(100.0, 100.0), None, None);

        let mut ctl = controller(LodConfig::default(), StubFetcher::new(Mode::Ok));
        let v = view(0.0, 100.0, 1.0);
        ctl.scan(&pool, &v, 0.0, true);
        ctl.process(&mut pool, &v, 0.0);
        pump(&mut ctl, &mut pool, 0.0, |c, _| c.cache().len() == 1);

        let wide = view(0.0, 400.0, 1.0);
        ctl.scan(&pool, &wide, 1.0, true);
        assert_eq!(ctl.process(&mut pool, &wide, 1.0), 0);
        assert!(pool.get(handles[1]).unwrap().image.is_some());
        assert_eq!(ctl.stats().cache_hits, 1);
    }

    fn shared_pool(n: usize, storage: u64) -> NodePool<Pic> {
        let mut pool = NodePool::new();
        pool.sync(
            (0..n)
                .map(|i| Pic {
                    id: format!("s{i}"),
                    storage: Some(storage),
                })
                .collect(),
        );
        let handles: Vec<NodeId> = pool.order().to_vec();
        for (i, h) in handles.into_iter().enumerate() {
            pool.set_targets(h, Point::new(i as f32 * 110.0, 0.0), Size::new(100.0, 100.0), None, None);
        }
        pool.snap_all();
        pool
    }

    #[test]
    fn shared_download_failure_counts_once() {
        let mut pool = shared_pool(3, 9);
        let fetcher = StubFetcher::new(Mode::Fail);
        let mut ctl = controller(LodConfig::default().with_retry_policy(3, 30.0), fetcher.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        ctl.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        let v = view(0.0, 400.0, 1.0);

        ctl.scan(&pool, &v, 0.0, true);
        ctl.process(&mut pool, &v, 0.0);
        pump(&mut ctl, &mut pool, 0.0, |c, _| c.in_flight() == 0);

        let url = "https://img.test/p?id=9&width=130&height=130&format=webp&quality=75";
        assert_eq!(fetcher.fetched().len(), 1);
        assert_eq!(ctl.failures().failures(url), 1);
        assert!(!ctl.failures().is_suppressed(url, 0.0));

        let events = events.lock().unwrap();
        let failed = events.iter().filter(|e| matches!(e, ImageEvent::Failed { .. })).count();
        assert_eq!(failed, 3);
        assert!(!events.iter().any(|e| matches!(e, ImageEvent::Suppressed { .. })));
        // Every waiter can be scanned again.
        assert!(pool.iter().all(|(_, n)| n.requested_tier.is_none()));
    }

    #[test]
    fn shared_corrupt_download_retries_once() {
        let mut pool = shared_pool(2, 9);
        let fetcher = StubFetcher::new(Mode::Corrupt);
        let mut ctl = controller(LodConfig::default(), fetcher.clone());
        let v = view(0.0, 400.0, 1.0);
        ctl.scan(&pool, &v, 0.0, true);
        ctl.process(&mut pool, &v, 0.0);

        let url = "https://img.test/p?id=9&width=130&height=130&format=webp&quality=75";
        pump(&mut ctl, &mut pool, 0.0, |c, _| c.failures().failures(url) > 0 && c.in_flight() == 0);
        assert_eq!(fetcher.fetched().len(), 2);
        assert_eq!(ctl.failures().failures(url), 1);
    }

    #[test]
    fn scan_forgets_elapsed_failures() {
        let mut pool = pool(1);
        let mut ctl = controller(LodConfig::default().with_retry_policy(3, 30.0), StubFetcher::new(Mode::Fail));
        let v = view(0.0, 200.0, 1.0);
        ctl.scan(&pool, &v, 0.0, true);
        ctl.process(&mut pool, &v, 0.0);
        pump(&mut ctl, &mut pool, 0.0, |c, _| c.in_flight() == 0);
        let url = "https://img.test/p?id=1&width=130&height=130&format=webp&quality=75";
        assert_eq!(ctl.failures().failures(url), 1);

        ctl.scan(&pool, &v, 31.0, true);
        assert_eq!(ctl.failures().failures(url), 0);
    }
}
