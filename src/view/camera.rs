//! Viewport camera: pan/zoom with rubber-band bounds.
//!
//! Screen space relates to world space by `screen = world * scale + offset`.
//! Input writes *targets*; [`Camera::update`] pulls targets back into the
//! valid range while idle and then eases the current values toward them.

use crate::geom::{LayoutBox, Point, Size};
use crate::render::animator::Animated;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraState {
    #[default]
    Idle,
    Dragging,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Blend factor for current → target.
    pub smoothing: f32,
    /// Per-frame pull back into the pan range while idle.
    pub spring_back: f32,
    /// Share of an out-of-bounds drag that still moves the view.
    pub drag_resistance: f32,
    pub lock_vertical_pan: bool,
    /// `min_scale = fit * min_fit_factor`.
    pub min_fit_factor: f32,
    /// Tallest item may grow to this many viewport heights at max zoom.
    pub max_item_viewport_ratio: f32,
    /// `max_scale = fit * fallback_zoom_factor` when item heights are unknown.
    pub fallback_zoom_factor: f32,
    /// Share of the viewport height a focused item fills.
    pub focus_fill: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.15,
            spring_back: 0.2,
            drag_resistance: 0.35,
            lock_vertical_pan: false,
            min_fit_factor: 0.9,
            max_item_viewport_ratio: 2.0,
            fallback_zoom_factor: 4.0,
            focus_fill: 0.6,
        }
    }
}

impl CameraConfig {
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(f32::EPSILON, 1.0);
        self
    }

    pub fn with_vertical_lock(mut self, lock: bool) -> Self {
        self.lock_vertical_pan = lock;
        self
    }
}

/// What the image LOD controller needs from the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Visible area in world coordinates.
    pub visible: LayoutBox,
    pub scale: f32,
}

pub struct Camera {
    config: CameraConfig,
    state: CameraState,
    viewport: Size,
    content: LayoutBox,
    tallest: f32,
    scale: Animated,
    offset_x: Animated,
    offset_y: Animated,
    fit_scale: f32,
    min_scale: f32,
    max_scale: f32,
    drag_start: Point,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            state: CameraState::Idle,
            viewport: Size::default(),
            content: LayoutBox::default(),
            tallest: 0.0,
            scale: Animated::new(1.0),
            offset_x: Animated::new(0.0),
            offset_y: Animated::new(0.0),
            fit_scale: 1.0,
            min_scale: 0.1,
            max_scale: 4.0,
            drag_start: Point::ZERO,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn scale(&self) -> f32 {
        self.scale.current
    }

    pub fn target_scale(&self) -> f32 {
        self.scale.target
    }

    pub fn offset(&self) -> Point {
        Point::new(self.offset_x.current, self.offset_y.current)
    }

    pub fn target_offset(&self) -> Point {
        Point::new(self.offset_x.target, self.offset_y.target)
    }

    pub fn scale_limits(&self) -> (f32, f32) {
        (self.min_scale, self.max_scale)
    }

    pub fn fit_scale(&self) -> f32 {
        self.fit_scale
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.viewport = size;
        self.recompute_limits();
    }

    /// New world bounds of the layout plus the tallest item height
    /// (0 when unknown).
    pub fn set_content_bounds(&mut self, bounds: LayoutBox, tallest: f32) {
        self.content = bounds;
        self.tallest = tallest;
        self.recompute_limits();
    }

    fn recompute_limits(&mut self) {
        let (vw, vh) = (self.viewport.width, self.viewport.height);
        let (cw, ch) = (self.content.width, self.content.height);
        self.fit_scale = if vw > 0.0 && vh > 0.0 && cw > 0.0 && ch > 0.0 {
            (vw / cw).min(vh / ch)
        } else {
            1.0
        };
        self.min_scale = self.fit_scale * self.config.min_fit_factor;
        let max = if self.tallest > 0.0 && vh > 0.0 {
            self.config.max_item_viewport_ratio * vh / self.tallest
        } else {
            self.fit_scale * self.config.fallback_zoom_factor
        };
        self.max_scale = max.max(self.fit_scale).max(self.min_scale);
    }

    /// Allowed offset range on one axis at `scale`. Content narrower than
    /// the viewport collapses the range to the centering offset.
    fn pan_range(&self, scale: f32, horizontal: bool) -> (f32, f32) {
        let (view, start, extent) = if horizontal {
            (self.viewport.width, self.content.x, self.content.width)
        } else {
            (self.viewport.height, self.content.y, self.content.height)
        };
        let scaled = extent * scale;
        if scaled <= view {
            let center = (view - scaled) * 0.5 - start * scale;
            (center, center)
        } else {
            (view - (start + extent) * scale, -start * scale)
        }
    }

    /// Once per frame, before layout.
    pub fn update(&mut self) {
        if self.state == CameraState::Idle {
            self.scale.target = self.scale.target.clamp(self.min_scale, self.max_scale);
            let s = self.scale.target;
            let spring = self.config.spring_back;
            for horizontal in [true, false] {
                let (lo, hi) = self.pan_range(s, horizontal);
                let axis = if horizontal {
                    &mut self.offset_x
                } else {
                    &mut self.offset_y
                };
                if lo == hi {
                    axis.target += (lo - axis.target) * spring;
                } else if axis.target > hi {
                    axis.target += (hi - axis.target) * spring;
                } else if axis.target < lo {
                    axis.target += (lo - axis.target) * spring;
                }
            }
        }
        let b = self.config.smoothing;
        self.scale.tick(b);
        self.offset_x.tick(b);
        self.offset_y.tick(b);
    }

    /// Zoom by `1 + delta` keeping the world point under `p` fixed.
    pub fn zoom_at(&mut self, p: Point, delta: f32) {
        let old = self.scale.target;
        if !(old > 0.0) {
            return;
        }
        let new = (old * (1.0 + delta)).clamp(self.min_scale, self.max_scale);
        let ratio = new / old;
        self.offset_x.target = p.x - (p.x - self.offset_x.target) * ratio;
        self.offset_y.target = p.y - (p.y - self.offset_y.target) * ratio;
        self.scale.target = new;
    }

    pub fn begin_drag(&mut self) {
        self.state = CameraState::Dragging;
        self.drag_start = self.target_offset();
    }

    /// Total pointer movement since `begin_drag`, in screen pixels.
    pub fn drag_to(&mut self, delta: Point) {
        if self.state != CameraState::Dragging {
            return;
        }
        let s = self.scale.target;
        let resistance = self.config.drag_resistance;

        let damp = |desired: f32, (lo, hi): (f32, f32)| {
            if desired > hi {
                hi + (desired - hi) * resistance
            } else if desired < lo {
                lo + (desired - lo) * resistance
            } else {
                desired
            }
        };

        self.offset_x.target = damp(self.drag_start.x + delta.x, self.pan_range(s, true));
        if !self.config.lock_vertical_pan {
            self.offset_y.target = damp(self.drag_start.y + delta.y, self.pan_range(s, false));
        }
    }

    pub fn end_drag(&mut self) {
        self.state = CameraState::Idle;
    }

    /// Pointer-up / touch-end / focus loss: back to idle immediately.
    pub fn cancel_interaction(&mut self) {
        self.state = CameraState::Idle;
    }

    /// Snap to the fit-to-content scale. Each axis is centered when the
    /// content is smaller than the viewport, else aligned to its left/top edge.
    pub fn reset(&mut self) {
        self.state = CameraState::Idle;
        let s = self.fit_scale.clamp(self.min_scale, self.max_scale);
        self.scale = Animated::new(s);
        let (x_lo, x_hi) = self.pan_range(s, true);
        let (y_lo, y_hi) = self.pan_range(s, false);
        self.offset_x = Animated::new(if x_lo == x_hi { x_lo } else { x_hi });
        self.offset_y = Animated::new(if y_lo == y_hi { y_lo } else { y_hi });
    }

    /// Move so world point `(x, y)` ends up in the viewport center.
    pub fn center_on(&mut self, x: f32, y: f32, scale: Option<f32>) {
        let s = scale
            .unwrap_or(self.scale.target)
            .clamp(self.min_scale, self.max_scale);
        self.scale.target = s;
        self.offset_x.target = self.viewport.width * 0.5 - x * s;
        self.offset_y.target = self.viewport.height * 0.5 - y * s;
    }

    /// Snap current values to targets.
    pub fn settle(&mut self) {
        self.scale.snap();
        self.offset_x.snap();
        self.offset_y.snap();
    }

    pub fn is_animating(&self, eps: f32) -> bool {
        !(self.scale.settled(1e-4) && self.offset_x.settled(eps) && self.offset_y.settled(eps))
    }

    pub fn screen_to_world(&self, p: Point) -> Point {
        let s = self.scale.current;
        Point::new((p.x - self.offset_x.current) / s, (p.y - self.offset_y.current) / s)
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        let s = self.scale.current;
        Point::new(p.x * s + self.offset_x.current, p.y * s + self.offset_y.current)
    }

    pub fn visible_world_rect(&self) -> LayoutBox {
        let tl = self.screen_to_world(Point::ZERO);
        let br = self.screen_to_world(Point::new(self.viewport.width, self.viewport.height));
        LayoutBox::new(tl.x, tl.y, br.x - tl.x, br.y - tl.y)
    }

    pub fn view_state(&self) -> ViewState {
        ViewState {
            visible: self.visible_world_rect(),
            scale: self.scale.current,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}
