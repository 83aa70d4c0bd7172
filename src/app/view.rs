//! Canvas widget for `ViewerApp`: input handling and painting.

use eframe::egui;
use pivot_canvas::geom::{Point, Size};
use pivot_canvas::input::Gesture;
use pivot_canvas::render::paint::PainterSurface;

use super::ViewerApp;

/// Wheel points to zoom delta.
const WHEEL_ZOOM: f32 = 0.0015;

impl ViewerApp {
    /// Lay out, animate and paint the canvas into the remaining space.
    pub fn draw_canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        self.canvas.set_viewport(Size::new(rect.width(), rect.height()));

        let local = |p: egui::Pos2| Point::new(p.x - rect.min.x, p.y - rect.min.y);

        // Mouse drag pans with rubber-band edges.
        if response.drag_started() {
            self.drag_total = egui::Vec2::ZERO;
            self.canvas.camera_mut().begin_drag();
        }
        if response.dragged() {
            self.drag_total += response.drag_delta();
            let total = Point::new(self.drag_total.x, self.drag_total.y);
            self.canvas.camera_mut().drag_to(total);
        }
        if response.drag_stopped() {
            self.canvas.camera_mut().end_drag();
        }

        if let Some(pointer) = response.hover_pos() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll.abs() > 0.1 {
                self.canvas.camera_mut().zoom_at(local(pointer), scroll * WHEEL_ZOOM);
            }
        }

        self.handle_touches(ctx, rect);

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.click(local(pos));
            }
        }

        let painter = ui.painter_at(rect);
        self.textures.begin_frame();
        let now = self.app_start.elapsed().as_secs_f64();
        let mut surface = PainterSurface::new(ctx, &painter, &mut self.textures, rect.min);
        self.last_draw = self.canvas.frame(now, &mut surface);

        if self.canvas.needs_repaint() {
            ctx.request_repaint();
        }
    }

    /// Header click drills into the group; item click zooms to it.
    fn click(&mut self, p: Point) {
        if let Some(key) = self.canvas.hit_test_header(p.x, p.y).map(|h| h.key.clone()) {
            self.canvas.drill_down(&key);
            return;
        }
        if let Some(id) = self.canvas.hit_test(p.x, p.y).map(|item| item.id.clone()) {
            self.canvas.focus_item(&id);
        }
    }

    /// Multi-touch pinch and double-tap zoom. Single-finger pans and taps
    /// already arrive as pointer events.
    fn handle_touches(&mut self, ctx: &egui::Context, rect: egui::Rect) {
        let now = self.app_start.elapsed().as_secs_f64();
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            let egui::Event::Touch { id, phase, pos, .. } = event else {
                continue;
            };
            let p = Point::new(pos.x - rect.min.x, pos.y - rect.min.y);
            let gesture = match phase {
                egui::TouchPhase::Start => self.gestures.touch_start(id.0, p),
                egui::TouchPhase::Move => self.gestures.touch_move(id.0, p),
                egui::TouchPhase::End => self.gestures.touch_end(id.0, p, now),
                egui::TouchPhase::Cancel => {
                    self.gestures.cancel();
                    Gesture::Release
                }
            };
            match gesture {
                Gesture::Pinch { .. } | Gesture::DoubleTap { .. } => {
                    self.gestures.apply(self.canvas.camera_mut(), &gesture);
                }
                _ => {}
            }
        }
    }
}
