//! Touch gesture recognition.
//!
//! Turns raw touch events into canvas gestures:
//! - Tap: quick touch + release without movement
//! - Double-tap: two taps close in time and space → zoom in around the point
//! - Pinch: two fingers → zoom about their midpoint
//! - Pan: one finger dragged past the tap slop
//!
//! Timestamps are seconds on the caller's clock, so the recognizer is
//! deterministic under test.

use crate::geom::Point;
use crate::view::{Camera, CameraState};

#[derive(Debug, Clone, Copy)]
struct TouchPoint {
    id: u64,
    pos: Point,
}

/// Recognized gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Tap { pos: Point },
    DoubleTap { pos: Point },
    /// `scale` is relative to the previous pinch event, not the start.
    Pinch { scale: f32, center: Point },
    /// Total finger movement since the pan began, in screen pixels.
    Pan { total: Point },
    /// Fingers lifted or changed count; any drag in progress ends.
    Release,
    None,
}

#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Max seconds between taps of a double-tap.
    pub double_tap_secs: f64,
    /// Max distance between taps of a double-tap.
    pub double_tap_radius: f32,
    /// Movement below this is still a tap.
    pub tap_slop: f32,
    /// Scale multiplier applied by a double-tap.
    pub double_tap_zoom: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            double_tap_secs: 0.3,
            double_tap_radius: 50.0,
            tap_slop: 10.0,
            double_tap_zoom: 2.0,
        }
    }
}

/// Touch gesture state machine.
pub struct GestureRecognizer {
    config: GestureConfig,
    touches: Vec<TouchPoint>,
    /// Where the current single-finger sequence started.
    start: Option<Point>,
    panning: bool,
    /// Finger distance at the previous pinch event.
    pinch_dist: Option<f32>,
    /// A second finger touched down during this sequence; no tap on lift.
    multi: bool,
    last_tap: Option<(Point, f64)>,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            touches: Vec::with_capacity(4),
            start: None,
            panning: false,
            pinch_dist: None,
            multi: false,
            last_tap: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn active_touches(&self) -> usize {
        self.touches.len()
    }

    pub fn touch_start(&mut self, id: u64, pos: Point) -> Gesture {
        self.touches.retain(|t| t.id != id);
        self.touches.push(TouchPoint { id, pos });
        match self.touches.len() {
            1 => {
                self.start = Some(pos);
                self.panning = false;
                self.multi = false;
                Gesture::None
            }
            _ => {
                self.multi = true;
                self.panning = false;
                self.pinch_dist = Some(self.touches[0].pos.distance(self.touches[1].pos));
                Gesture::Release
            }
        }
    }

    pub fn touch_move(&mut self, id: u64, pos: Point) -> Gesture {
        let Some(touch) = self.touches.iter_mut().find(|t| t.id == id) else {
            return Gesture::None;
        };
        touch.pos = pos;

        if self.touches.len() >= 2 {
            let (a, b) = (self.touches[0].pos, self.touches[1].pos);
            let dist = a.distance(b);
            let previous = self.pinch_dist.replace(dist);
            return match previous {
                Some(prev) if prev > 1.0 => Gesture::Pinch {
                    scale: dist / prev,
                    center: Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5),
                },
                _ => Gesture::None,
            };
        }

        let Some(start) = self.start else {
            return Gesture::None;
        };
        if self.panning || start.distance(pos) > self.config.tap_slop {
            self.panning = true;
            return Gesture::Pan {
                total: Point::new(pos.x - start.x, pos.y - start.y),
            };
        }
        Gesture::None
    }

    /// `now` is only used for double-tap timing.
    pub fn touch_end(&mut self, id: u64, pos: Point, now: f64) -> Gesture {
        self.touches.retain(|t| t.id != id);

        if let [remaining] = self.touches.as_slice() {
            // Pinch over; the remaining finger starts a fresh pan.
            self.pinch_dist = None;
            self.start = Some(remaining.pos);
            self.panning = false;
            return Gesture::Release;
        }
        if !self.touches.is_empty() {
            return Gesture::Release;
        }

        let start = self.start.take();
        let was_tap = !self.multi
            && !self.panning
            && start.is_some_and(|s| s.distance(pos) <= self.config.tap_slop);
        self.panning = false;
        self.multi = false;
        self.pinch_dist = None;

        if !was_tap {
            return Gesture::Release;
        }

        if let Some((last_pos, last_at)) = self.last_tap.take() {
            if now - last_at <= self.config.double_tap_secs
                && last_pos.distance(pos) <= self.config.double_tap_radius
            {
                return Gesture::DoubleTap { pos };
            }
        }
        self.last_tap = Some((pos, now));
        Gesture::Tap { pos }
    }

    /// Touch cancelled by the platform.
    pub fn cancel(&mut self) {
        self.touches.clear();
        self.start = None;
        self.panning = false;
        self.pinch_dist = None;
        self.multi = false;
    }

    /// Apply a gesture to the camera. Taps are left to the caller for
    /// hit testing; they only end the drag here.
    pub fn apply(&self, camera: &mut Camera, gesture: &Gesture) {
        match *gesture {
            Gesture::Pan { total } => {
                if camera.state() != CameraState::Dragging {
                    camera.begin_drag();
                }
                camera.drag_to(total);
            }
            Gesture::Pinch { scale, center } => {
                if camera.state() == CameraState::Dragging {
                    camera.cancel_interaction();
                }
                camera.zoom_at(center, scale - 1.0);
            }
            Gesture::DoubleTap { pos } => {
                camera.cancel_interaction();
                let world = camera.screen_to_world(pos);
                let scale = camera.target_scale() * self.config.double_tap_zoom;
                camera.center_on(world.x, world.y, Some(scale));
            }
            Gesture::Tap { .. } | Gesture::Release => camera.cancel_interaction(),
            Gesture::None => {}
        }
    }
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{LayoutBox, Size};

    fn p(x: f32, y: f32) -> Point {
        Point::new(x, y)
    }

    fn zoomed_camera() -> Camera {
        let mut cam = Camera::default();
        cam.set_viewport_size(Size::new(800.0, 600.0));
        cam.set_content_bounds(LayoutBox::new(0.0, 0.0, 1600.0, 1200.0), 50.0);
        cam.reset();
        cam.zoom_at(p(400.0, 300.0), 1.0);
        cam.settle();
        cam
    }

    #[test]
    fn tap_and_double_tap() {
        let mut g = GestureRecognizer::default();
        g.touch_start(1, p(100.0, 100.0));
        assert_eq!(g.touch_end(1, p(102.0, 101.0), 0.0), Gesture::Tap { pos: p(102.0, 101.0) });

        g.touch_start(1, p(110.0, 100.0));
        assert_eq!(
            g.touch_end(1, p(110.0, 100.0), 0.2),
            Gesture::DoubleTap { pos: p(110.0, 100.0) }
        );

        // The pair is consumed; the next tap starts over.
        g.touch_start(1, p(110.0, 100.0));
        assert!(matches!(g.touch_end(1, p(110.0, 100.0), 0.3), Gesture::Tap { .. }));
    }

    #[test]
    fn slow_second_tap_is_single() {
        let mut g = GestureRecognizer::default();
        g.touch_start(1, p(10.0, 10.0));
        g.touch_end(1, p(10.0, 10.0), 0.0);
        g.touch_start(1, p(10.0, 10.0));
        assert!(matches!(g.touch_end(1, p(10.0, 10.0), 0.8), Gesture::Tap { .. }));
    }

    #[test]
    fn drag_becomes_pan_after_slop() {
        let mut g = GestureRecognizer::default();
        g.touch_start(7, p(0.0, 0.0));
        assert_eq!(g.touch_move(7, p(5.0, 0.0)), Gesture::None);
        assert_eq!(g.touch_move(7, p(30.0, -4.0)), Gesture::Pan { total: p(30.0, -4.0) });
        // Once panning, small moves keep panning.
        assert_eq!(g.touch_move(7, p(31.0, -4.0)), Gesture::Pan { total: p(31.0, -4.0) });
        assert_eq!(g.touch_end(7, p(31.0, -4.0), 1.0), Gesture::Release);
    }

    #[test]
    fn pinch_scale_is_incremental() {
        let mut g = GestureRecognizer::default();
        g.touch_start(1, p(100.0, 100.0));
        assert_eq!(g.touch_start(2, p(200.0, 100.0)), Gesture::Release);

        assert_eq!(
            g.touch_move(2, p(300.0, 100.0)),
            Gesture::Pinch { scale: 2.0, center: p(200.0, 100.0) }
        );
        match g.touch_move(2, p(400.0, 100.0)) {
            Gesture::Pinch { scale, .. } => assert!((scale - 1.5).abs() < 1e-5),
            other => panic!("expected pinch, got {other:?}"),
        }

        // Lifting one finger ends the pinch; the last lift is not a tap.
        assert_eq!(g.touch_end(2, p(400.0, 100.0), 0.5), Gesture::Release);
        assert_eq!(g.active_touches(), 1);
        assert_eq!(g.touch_end(1, p(100.0, 100.0), 0.6), Gesture::Release);
    }

    #[test]
    fn pan_drives_camera_and_release_ends_drag() {
        let mut cam = zoomed_camera();
        let g = GestureRecognizer::default();
        let start = cam.target_offset();

        g.apply(&mut cam, &Gesture::Pan { total: p(-40.0, -30.0) });
        assert_eq!(cam.state(), CameraState::Dragging);
        assert!((cam.target_offset().x - (start.x - 40.0)).abs() < 1e-3);
        assert!((cam.target_offset().y - (start.y - 30.0)).abs() < 1e-3);

        g.apply(&mut cam, &Gesture::Release);
        assert_eq!(cam.state(), CameraState::Idle);
    }

    #[test]
    fn pinch_zooms_about_center() {
        let mut cam = zoomed_camera();
        let g = GestureRecognizer::default();
        let center = p(250.0, 420.0);
        let before = cam.screen_to_world(center);

        g.apply(&mut cam, &Gesture::Pinch { scale: 1.25, center });
        cam.settle();
        let after = cam.screen_to_world(center);
        assert!((before.x - after.x).abs() < 1e-2 && (before.y - after.y).abs() < 1e-2);
        assert!((cam.scale() - 1.25).abs() < 1e-3);
    }

    #[test]
    fn double_tap_centers_and_zooms_in() {
        let mut cam = zoomed_camera();
        let g = GestureRecognizer::default();
        let tap = p(200.0, 150.0);
        let world = cam.screen_to_world(tap);

        g.apply(&mut cam, &Gesture::DoubleTap { pos: tap });
        cam.settle();
        assert!((cam.scale() - 2.0).abs() < 1e-3);
        let mid = cam.screen_to_world(p(400.0, 300.0));
        assert!((mid.x - world.x).abs() < 1e-2 && (mid.y - world.y).abs() < 1e-2);
    }
}
