//! egui Painter-backed drawing surface.
//!
//! Decoded node images are uploaded once as textures and kept while they
//! keep getting drawn; textures unused for `max_idle_frames` are released.

use std::collections::HashMap;
use std::sync::Arc;

use egui::{Align2, Color32, FontId, Pos2, Rect, Rounding, Stroke, TextureHandle, TextureOptions, Vec2};

use crate::geom::{LayoutBox, Point};
use crate::net::image::ImageData;
use crate::render::surface::{Color, DrawSurface, TextAlign, TransformStack};

pub fn to_color32(c: Color) -> Color32 {
    Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

struct CachedTexture {
    handle: TextureHandle,
    last_used: u64,
}

/// GPU textures for decoded images, keyed by image URL.
pub struct TextureCache {
    textures: HashMap<String, CachedTexture>,
    frame: u64,
    max_idle_frames: u64,
}

impl TextureCache {
    pub fn new(max_idle_frames: u64) -> Self {
        Self {
            textures: HashMap::new(),
            frame: 0,
            max_idle_frames,
        }
    }

    /// Call once per frame before drawing.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
        let (frame, max_idle) = (self.frame, self.max_idle_frames);
        self.textures.retain(|_, t| frame - t.last_used <= max_idle);
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    fn get_or_upload(&mut self, ctx: &egui::Context, image: &ImageData) -> &TextureHandle {
        let frame = self.frame;
        let entry = self.textures.entry(image.key.clone()).or_insert_with(|| {
            let color = egui::ColorImage::from_rgba_unmultiplied(
                [image.width as usize, image.height as usize],
                &image.rgba,
            );
            log::trace!("uploading texture {} ({}x{})", image.key, image.width, image.height);
            CachedTexture {
                handle: ctx.load_texture(image.key.clone(), color, TextureOptions::LINEAR),
                last_used: frame,
            }
        });
        entry.last_used = frame;
        &entry.handle
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new(120)
    }
}

/// [`DrawSurface`] over an `egui::Painter`. Coordinates are relative to
/// `origin` (the top-left of the canvas widget).
pub struct PainterSurface<'a> {
    ctx: &'a egui::Context,
    painter: &'a egui::Painter,
    textures: &'a mut TextureCache,
    stack: TransformStack,
}

impl<'a> PainterSurface<'a> {
    pub fn new(ctx: &'a egui::Context, painter: &'a egui::Painter, textures: &'a mut TextureCache, origin: Pos2) -> Self {
        let mut stack = TransformStack::default();
        stack.translate(origin.x, origin.y);
        Self {
            ctx,
            painter,
            textures,
            stack,
        }
    }

    fn rect(&self, r: LayoutBox) -> Rect {
        let r = self.stack.current().apply_rect(r);
        Rect::from_min_size(Pos2::new(r.x, r.y), Vec2::new(r.width.max(0.0), r.height.max(0.0)))
    }

    fn pos(&self, p: Point) -> Pos2 {
        let p = self.stack.current().apply(p);
        Pos2::new(p.x, p.y)
    }

    /// Lengths (radius, stroke width, font size) in screen pixels.
    fn px(&self, v: f32) -> f32 {
        v * self.stack.current().scale_x
    }
}

impl DrawSurface for PainterSurface<'_> {
    fn fill_rect(&mut self, rect: LayoutBox, color: Color) {
        self.painter.rect_filled(self.rect(rect), Rounding::ZERO, to_color32(color));
    }

    fn stroke_rect(&mut self, rect: LayoutBox, width: f32, color: Color) {
        let stroke = Stroke::new(self.px(width).max(0.5), to_color32(color));
        self.painter.rect_stroke(self.rect(rect), Rounding::ZERO, stroke);
    }

    fn fill_rounded_rect(&mut self, rect: LayoutBox, radius: f32, color: Color) {
        let rounding = Rounding::same(self.px(radius));
        self.painter.rect_filled(self.rect(rect), rounding, to_color32(color));
    }

    fn draw_image(&mut self, image: &Arc<ImageData>, dest: LayoutBox, opacity: f32) {
        if image.is_empty() {
            return;
        }
        let rect = self.rect(dest);
        if !self.painter.clip_rect().intersects(rect) {
            return;
        }
        let id = self.textures.get_or_upload(self.ctx, image).id();
        let uv = Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0));
        self.painter.image(id, rect, uv, Color32::WHITE.gamma_multiply(opacity.clamp(0.0, 1.0)));
    }

    fn draw_text(&mut self, text: &str, pos: Point, size: f32, color: Color, align: TextAlign) {
        let font_px = self.px(size);
        if font_px < 4.0 || text.is_empty() {
            return;
        }
        let anchor = match align {
            TextAlign::Left => Align2::LEFT_TOP,
            TextAlign::Center => Align2::CENTER_TOP,
        };
        self.painter
            .text(self.pos(pos), anchor, text, FontId::proportional(font_px), to_color32(color));
    }

    fn save(&mut self) {
        self.stack.save();
    }

    fn restore(&mut self) {
        self.stack.restore();
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.stack.translate(dx, dy);
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.stack.scale(sx, sy);
    }
}
