//! Drawing surface abstraction.
//!
//! The draw pass only talks to [`DrawSurface`]; the viewer backs it with an
//! `egui::Painter`, tests with a recorder.

use std::sync::Arc;

use crate::geom::{LayoutBox, Point};
use crate::net::image::ImageData;

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with alpha multiplied by `opacity` (clamped to 0..=1).
    pub fn faded(self, opacity: f32) -> Self {
        let o = opacity.clamp(0.0, 1.0);
        Self {
            a: (self.a as f32 * o).round() as u8,
            ..self
        }
    }

    /// Linear blend toward `other`.
    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let m = |a: u8, b: u8| (a as f32 * (1.0 - t) + b as f32 * t).round() as u8;
        Self {
            r: m(self.r, other.r),
            g: m(self.g, other.g),
            b: m(self.b, other.b),
            a: m(self.a, other.a),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
}

/// Minimal 2D drawing API with a transform stack.
///
/// Coordinates passed to the drawing calls are in the current transformed
/// space; `translate`/`scale` compose onto the top of the stack.
pub trait DrawSurface {
    fn fill_rect(&mut self, rect: LayoutBox, color: Color);
    fn stroke_rect(&mut self, rect: LayoutBox, width: f32, color: Color);
    fn fill_rounded_rect(&mut self, rect: LayoutBox, radius: f32, color: Color);
    /// Draw `image` stretched into `dest`, multiplied by `opacity`.
    fn draw_image(&mut self, image: &Arc<ImageData>, dest: LayoutBox, opacity: f32);
    /// `pos` is the top-left (or top-center) of the text box.
    fn draw_text(&mut self, text: &str, pos: Point, size: f32, color: Color, align: TextAlign);
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, dx: f32, dy: f32);
    fn scale(&mut self, sx: f32, sy: f32);
}

/// Affine transform restricted to scale + translation, as used by the
/// surfaces in this crate: `p' = p * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub dx: f32,
    pub dy: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            dx: 0.0,
            dy: 0.0,
        }
    }
}

impl Transform {
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.dx += dx * self.scale_x;
        self.dy += dy * self.scale_y;
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.scale_x *= sx;
        self.scale_y *= sy;
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(p.x * self.scale_x + self.dx, p.y * self.scale_y + self.dy)
    }

    pub fn apply_rect(&self, r: LayoutBox) -> LayoutBox {
        let tl = self.apply(Point::new(r.x, r.y));
        LayoutBox::new(tl.x, tl.y, r.width * self.scale_x, r.height * self.scale_y)
    }
}

/// Save/restore stack shared by surface implementations.
#[derive(Debug, Clone, Default)]
pub struct TransformStack {
    current: Transform,
    saved: Vec<Transform>,
}

impl TransformStack {
    pub fn current(&self) -> &Transform {
        &self.current
    }

    pub fn save(&mut self) {
        self.saved.push(self.current);
    }

    /// Unbalanced restores are ignored.
    pub fn restore(&mut self) {
        if let Some(t) = self.saved.pop() {
            self.current = t;
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.current.translate(dx, dy);
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.current.scale(sx, sy);
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}
