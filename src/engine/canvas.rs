//! The canvas engine: catalog → drill-down → layout → animation → images → draw.
//!
//! One [`PivotCanvas::frame`] call per display refresh runs, in order:
//! camera update, layout (only when dirty), node tick, image LOD
//! poll/scan/process, draw.

use std::sync::Arc;

use log::{debug, info};

use crate::events::ListenerId;
use crate::geom::{Point, Size};
use crate::group::{Dimension, DrillDown};
use crate::item::CatalogItem;
use crate::net::image::ImageFetcher;
use crate::net::lod::{ImageEvent, LodConfig, LodController};
use crate::net::resolve::{ImageResolver, ImageResolverConfig};
use crate::render::animator::{BlendFactors, LayoutNode, NodePool};
use crate::render::draw::{draw_frame, DrawStats, DrawStyle};
use crate::render::layout::{LayoutConfig, LayoutMode};
use crate::render::pivot::{self, GroupHeader, LayoutOutput};
use crate::render::surface::DrawSurface;
use crate::view::{Camera, CameraConfig};

/// Every tuning knob of the canvas in one place.
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    pub mode: LayoutMode,
    pub layout: LayoutConfig,
    pub camera: CameraConfig,
    pub lod: LodConfig,
    pub resolver: ImageResolverConfig,
    pub blend: BlendFactors,
    pub style: DrawStyle,
    /// Scale nodes start from on their first appearance.
    pub entrance_scale: f32,
    /// Animation is considered finished below this distance.
    pub settle_eps: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Pivot,
            layout: LayoutConfig::default(),
            camera: CameraConfig::default(),
            lod: LodConfig::default(),
            resolver: ImageResolverConfig::default(),
            blend: BlendFactors::default(),
            style: DrawStyle::default(),
            entrance_scale: 0.6,
            settle_eps: 0.05,
        }
    }
}

impl CanvasConfig {
    pub fn with_mode(mut self, mode: LayoutMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_lod(mut self, lod: LodConfig) -> Self {
        self.lod = lod;
        self
    }

    pub fn with_resolver(mut self, resolver: ImageResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_style(mut self, style: DrawStyle) -> Self {
        self.style = style;
        self
    }
}

pub struct PivotCanvas<T: CatalogItem> {
    config: CanvasConfig,
    catalog: Vec<T>,
    /// Last sync asked for caller order.
    ordered: bool,
    pool: NodePool<T>,
    drill: DrillDown,
    camera: Camera,
    lod: LodController,
    output: LayoutOutput,
    viewport: Size,
    dirty: bool,
    /// Refit the camera after the next layout.
    refit: bool,
    /// Skip the scan interval on the next frame.
    force_scan: bool,
    running: bool,
    frames: u64,
}

impl<T: CatalogItem> PivotCanvas<T> {
    pub fn new(config: CanvasConfig, dimensions: Vec<Dimension>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        let resolver = ImageResolver::new(config.resolver.clone());
        Self {
            pool: NodePool::with_blend(config.blend).with_entrance_scale(config.entrance_scale),
            camera: Camera::new(config.camera.clone()),
            lod: LodController::new(config.lod.clone(), resolver, fetcher),
            drill: DrillDown::new(dimensions),
            catalog: Vec::new(),
            ordered: false,
            output: LayoutOutput::default(),
            viewport: Size::default(),
            dirty: true,
            refit: true,
            force_scan: true,
            running: false,
            frames: 0,
            config,
        }
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn pool(&self) -> &NodePool<T> {
        &self.pool
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Direct camera access for pointer input (drag, wheel zoom, gestures).
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn drill(&self) -> &DrillDown {
        &self.drill
    }

    pub fn lod(&self) -> &LodController {
        &self.lod
    }

    pub fn layout_output(&self) -> &LayoutOutput {
        &self.output
    }

    pub fn mode(&self) -> LayoutMode {
        self.config.mode
    }

    pub fn catalog(&self) -> &[T] {
        &self.catalog
    }

    // ── Catalog ──

    /// Replace the catalog. Nodes keep their animation state per item id.
    pub fn sync(&mut self, items: Vec<T>) {
        self.catalog = items;
        self.ordered = false;
        self.rebuild_pool();
    }

    /// Like [`sync`](Self::sync), with node order following `items`.
    pub fn sync_ordered(&mut self, items: Vec<T>) {
        self.catalog = items;
        self.ordered = true;
        self.rebuild_pool();
    }

    /// Pool holds exactly the items passing the drill-down filters.
    fn rebuild_pool(&mut self) {
        let visible: Vec<T> = self.drill.filter(&self.catalog).into_iter().cloned().collect();
        debug!("pool sync: {} of {} items", visible.len(), self.catalog.len());
        if self.ordered {
            self.pool.sync_ordered(visible);
        } else {
            self.pool.sync(visible);
        }
        self.dirty = true;
        self.force_scan = true;
    }

    // ── Layout ──

    pub fn set_layout_mode(&mut self, mode: LayoutMode, layout: LayoutConfig) {
        info!("layout mode: {}", mode.label());
        self.config.mode = mode;
        self.config.layout = layout;
        self.dirty = true;
        self.refit = true;
    }

    /// Remember the viewport size; layout reruns on the next frame if it changed.
    pub fn set_viewport(&mut self, viewport: Size) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.camera.set_viewport_size(viewport);
            self.dirty = true;
            self.refit = true;
        }
    }

    /// Recompute the layout for `viewport` now.
    pub fn layout(&mut self, viewport: Size) -> &LayoutOutput {
        self.set_viewport(viewport);
        self.relayout();
        &self.output
    }

    fn relayout(&mut self) {
        self.dirty = false;
        if self.viewport.is_degenerate() {
            self.output = LayoutOutput::default();
            return;
        }
        let groups = self.drill.groups(&self.catalog);
        self.output = pivot::compute(&mut self.pool, &groups, self.config.mode, self.viewport, &self.config.layout);
        if self.output.is_empty() {
            return;
        }
        self.camera.set_content_bounds(self.output.content, self.output.tallest);
        if self.refit {
            self.camera.reset();
            self.refit = false;
        }
        self.force_scan = true;
    }

    // ── Hit testing ──

    /// Front-most item under a screen point, by current node rects.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<&T> {
        let world = self.camera.screen_to_world(Point::new(x, y));
        let mut nodes: Vec<&LayoutNode<T>> = self.pool.iter().map(|(_, n)| n).collect();
        nodes.sort_by_key(|n| n.z_index);
        nodes
            .into_iter()
            .rev()
            .find(|n| n.opacity.target > 0.0 && n.current_rect().contains(world))
            .map(|n| &n.item)
    }

    pub fn hit_test_header(&self, x: f32, y: f32) -> Option<&GroupHeader> {
        self.output.header_at(self.camera.screen_to_world(Point::new(x, y)))
    }

    // ── Render loop ──

    pub fn start(&mut self) {
        if !self.running {
            info!("render loop started");
            self.running = true;
        }
    }

    pub fn stop(&mut self) {
        if self.running {
            info!("render loop stopped after {} frames", self.frames);
            self.running = false;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// One frame. `now` is seconds on a monotonic clock. Does nothing while
    /// stopped or with a zero-area viewport.
    pub fn frame<S: DrawSurface + ?Sized>(&mut self, now: f64, surface: &mut S) -> DrawStats {
        if !self.running || self.viewport.is_degenerate() {
            return DrawStats::default();
        }
        self.frames += 1;

        self.camera.update();
        if self.dirty {
            self.relayout();
        }
        self.pool.tick();

        self.lod.poll(&mut self.pool, now);
        let view = self.camera.view_state();
        self.lod.scan(&self.pool, &view, now, self.force_scan);
        self.force_scan = false;
        self.lod.process(&mut self.pool, &view, now);

        draw_frame(surface, &self.pool, &self.output, &self.camera, &self.config.style)
    }

    /// True while anything is still moving or loading.
    pub fn needs_repaint(&self) -> bool {
        self.dirty
            || self.camera.is_animating(0.1)
            || !self.pool.is_settled(self.config.settle_eps)
            || self.lod.in_flight() > 0
            || !self.lod.queue().is_empty()
    }

    /// Jump every animation to its end state.
    pub fn settle(&mut self) {
        self.pool.snap_all();
        self.camera.settle();
    }

    // ── Viewport ──

    pub fn reset_view(&mut self) {
        self.camera.reset();
        self.force_scan = true;
    }

    pub fn center_on(&mut self, x: f32, y: f32, scale: Option<f32>) {
        self.camera.center_on(x, y, scale);
        self.force_scan = true;
    }

    /// Center on an item, zoomed so it fills `focus_fill` of the viewport
    /// height, and draw it above its neighbours. False when the id is not
    /// on the canvas.
    pub fn focus_item(&mut self, id: &str) -> bool {
        let Some(handle) = self.pool.id_of(id) else {
            return false;
        };
        let Some(rect) = self.pool.get(handle).map(|n| n.target_rect()) else {
            return false;
        };
        if rect.height <= 0.0 || self.viewport.is_degenerate() {
            return false;
        }
        self.pool.raise(handle);
        let scale = self.viewport.height * self.camera.config().focus_fill / rect.height;
        let c = rect.center();
        self.center_on(c.x, c.y, Some(scale));
        true
    }

    pub fn set_style(&mut self, style: DrawStyle) {
        self.config.style = style;
    }

    pub fn screen_to_world(&self, x: f32, y: f32) -> Point {
        self.camera.screen_to_world(Point::new(x, y))
    }

    // ── Drill-down ──

    pub fn set_dimension(&mut self, key: &str) -> bool {
        let changed = self.drill.set_dimension(key);
        if changed {
            self.dirty = true;
            self.refit = true;
        }
        changed
    }

    /// Switch dimension and drop the filters it invalidates.
    pub fn set_grouping_dimension(&mut self, key: &str) -> bool {
        let changed = self.drill.set_grouping_dimension(key);
        if changed {
            self.refit = true;
            self.rebuild_pool();
        }
        changed
    }

    pub fn drill_down(&mut self, key: &str) -> bool {
        let changed = self.drill.drill_down(key, &self.catalog);
        if changed {
            info!("drill down: {}", self.breadcrumbs().join(" / "));
            self.refit = true;
            self.rebuild_pool();
        }
        changed
    }

    pub fn drill_up(&mut self) -> bool {
        let changed = self.drill.drill_up();
        if changed {
            self.refit = true;
            self.rebuild_pool();
        }
        changed
    }

    pub fn reset_drill(&mut self) {
        self.drill.reset();
        self.refit = true;
        self.rebuild_pool();
    }

    pub fn breadcrumbs(&self) -> Vec<String> {
        self.drill.breadcrumbs()
    }

    pub fn can_use_dimension(&self, key: &str) -> bool {
        self.drill.can_use_dimension(key)
    }

    // ── Images ──

    /// Queue low-res loads for every node. Returns the number of tasks added.
    pub fn warm_up(&mut self) -> usize {
        self.lod.warm_up(&self.pool)
    }

    pub fn subscribe_images(&mut self, listener: impl FnMut(&ImageEvent) + Send + 'static) -> ListenerId {
        self.lod.subscribe(listener)
    }

    pub fn unsubscribe_images(&mut self, id: ListenerId) -> bool {
        self.lod.unsubscribe(id)
    }
}
