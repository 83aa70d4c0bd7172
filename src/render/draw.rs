//! Draw pass: current node state + group headers onto a [`DrawSurface`].
//!
//! Reads only *current* animated values; never writes to the pool.

use crate::geom::{LayoutBox, Point};
use crate::item::CatalogItem;
use crate::render::animator::{LayoutNode, NodePool};
use crate::render::pivot::LayoutOutput;
use crate::render::surface::{Color, DrawSurface, TextAlign};
use crate::view::Camera;

#[derive(Debug, Clone)]
pub struct DrawStyle {
    pub background: Color,
    pub placeholder: Color,
    pub placeholder_border: Color,
    pub header_text: Color,
    pub header_rule: Color,
    pub label: Color,
    pub price: Color,
    pub corner_radius: f32,
    /// Screen pixels; labels are drawn at a constant on-screen size.
    pub header_font: f32,
    pub label_font: f32,
    /// Labels appear once a node is at least this wide on screen.
    pub label_min_px: f32,
}

impl DrawStyle {
    pub fn light() -> Self {
        Self {
            background: Color::rgb(250, 250, 252),
            placeholder: Color::rgb(235, 235, 240),
            placeholder_border: Color::rgb(200, 200, 205),
            header_text: Color::rgb(25, 25, 38),
            header_rule: Color::rgb(204, 204, 209),
            label: Color::rgb(38, 38, 46),
            price: Color::rgb(0, 80, 180),
            corner_radius: 6.0,
            header_font: 15.0,
            label_font: 11.0,
            label_min_px: 90.0,
        }
    }

    pub fn dark() -> Self {
        Self {
            background: Color::rgb(24, 24, 30),
            placeholder: Color::rgb(40, 40, 50),
            placeholder_border: Color::rgb(60, 60, 70),
            header_text: Color::rgb(230, 230, 240),
            header_rule: Color::rgb(60, 60, 70),
            label: Color::rgb(200, 200, 210),
            price: Color::rgb(80, 160, 255),
            ..Self::light()
        }
    }
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self::light()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub nodes_drawn: usize,
    pub nodes_culled: usize,
    pub images_drawn: usize,
    pub headers_drawn: usize,
}

/// Paint one frame. Nothing is drawn for a zero-area viewport or when there
/// is nothing laid out.
pub fn draw_frame<T, S>(
    surface: &mut S,
    pool: &NodePool<T>,
    layout: &LayoutOutput,
    camera: &Camera,
    style: &DrawStyle,
) -> DrawStats
where
    T: CatalogItem,
    S: DrawSurface + ?Sized,
{
    let mut stats = DrawStats::default();
    let viewport = camera.viewport();
    if viewport.is_degenerate() || (pool.is_empty() && layout.headers.is_empty()) {
        return stats;
    }

    surface.fill_rect(LayoutBox::new(0.0, 0.0, viewport.width, viewport.height), style.background);

    let view = camera.view_state();
    let scale = view.scale;
    if !(scale > 0.0) {
        return stats;
    }
    let offset = camera.offset();

    surface.save();
    surface.translate(offset.x, offset.y);
    surface.scale(scale, scale);

    for header in &layout.headers {
        if !header.rect.intersects(&view.visible) {
            continue;
        }
        let r = header.rect;
        surface.fill_rect(LayoutBox::new(r.x, r.y, r.width, 1.0 / scale), style.header_rule);
        let text = format!("{} ({})", header.label, header.count);
        surface.draw_text(
            &text,
            Point::new(r.center().x, r.y + 6.0 / scale),
            style.header_font / scale,
            style.header_text,
            TextAlign::Center,
        );
        stats.headers_drawn += 1;
    }

    let mut nodes: Vec<&LayoutNode<T>> = pool.iter().map(|(_, n)| n).collect();
    nodes.sort_by_key(|n| n.z_index);

    for node in nodes {
        let rect = node.visual_rect();
        let opacity = node.opacity.current.clamp(0.0, 1.0);
        if opacity <= 0.01 || rect.width <= 0.0 || !rect.intersects(&view.visible) {
            stats.nodes_culled += 1;
            continue;
        }
        draw_node(surface, node, rect, opacity, scale, style, &mut stats);
        stats.nodes_drawn += 1;
    }

    surface.restore();
    stats
}

fn draw_node<T, S>(
    surface: &mut S,
    node: &LayoutNode<T>,
    rect: LayoutBox,
    opacity: f32,
    scale: f32,
    style: &DrawStyle,
    stats: &mut DrawStats,
) where
    T: CatalogItem,
    S: DrawSurface + ?Sized,
{
    let radius = style.corner_radius / scale;
    match &node.image {
        Some(image) if !image.is_empty() => {
            let aspect = image.width as f32 / image.height as f32;
            surface.draw_image(image, contain(rect, aspect), opacity);
            stats.images_drawn += 1;
        }
        _ => {
            surface.fill_rounded_rect(rect, radius, style.placeholder.faded(opacity));
            surface.stroke_rect(rect, 1.0 / scale, style.placeholder_border.faded(opacity));
        }
    }

    if rect.width * scale < style.label_min_px {
        return;
    }
    let font = style.label_font / scale;
    let x = rect.center().x;
    let mut y = rect.bottom() + 4.0 / scale;
    surface.draw_text(node.item.label(), Point::new(x, y), font, style.label.faded(opacity), TextAlign::Center);
    if let Some(price) = node.item.price_text() {
        y += font * 1.3;
        surface.draw_text(&price, Point::new(x, y), font, style.price.faded(opacity), TextAlign::Center);
    }
}

/// Largest box of `aspect` (w/h) centered inside `rect`.
pub fn contain(rect: LayoutBox, aspect: f32) -> LayoutBox {
    if !(aspect > 0.0) || rect.height <= 0.0 {
        return rect;
    }
    let (w, h) = if rect.width / rect.height > aspect {
        (rect.height * aspect, rect.height)
    } else {
        (rect.width, rect.width / aspect)
    };
    LayoutBox::new(rect.x + (rect.width - w) * 0.5, rect.y + (rect.height - h) * 0.5, w, h)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geom::Size;
    use crate::group::dimension::tests::{product, Product};
    use crate::net::image::ImageData;
    use crate::render::surface::TransformStack;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Op {
        Fill(LayoutBox),
        Stroke(LayoutBox),
        Rounded(LayoutBox),
        Image(String, LayoutBox),
        Text(String),
    }

    /// Records draw calls in screen space.
    #[derive(Default)]
    pub struct Recorder {
        pub ops: Vec<Op>,
        pub stack: TransformStack,
    }

    impl DrawSurface for Recorder {
        fn fill_rect(&mut self, rect: LayoutBox, _color: Color) {
            self.ops.push(Op::Fill(self.stack.current().apply_rect(rect)));
        }
        fn stroke_rect(&mut self, rect: LayoutBox, _width: f32, _color: Color) {
            self.ops.push(Op::Stroke(self.stack.current().apply_rect(rect)));
        }
        fn fill_rounded_rect(&mut self, rect: LayoutBox, _radius: f32, _color: Color) {
            self.ops.push(Op::Rounded(self.stack.current().apply_rect(rect)));
        }
        fn draw_image(&mut self, image: &Arc<ImageData>, dest: LayoutBox, _opacity: f32) {
            self.ops
                .push(Op::Image(image.key.clone(), self.stack.current().apply_rect(dest)));
        }
        fn draw_text(&mut self, text: &str, _pos: Point, _size: f32, _color: Color, _align: TextAlign) {
            self.ops.push(Op::Text(text.to_string()));
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

    fn item(id: &str) -> Product {
        product(id, &["shoes"], None, Some(10.0))
    }

    fn camera() -> Camera {
        let mut cam = Camera::default();
        cam.set_viewport_size(Size::new(400.0, 300.0));
        cam.set_content_bounds(LayoutBox::new(0.0, 0.0, 400.0, 300.0), 100.0);
        cam.reset();
        cam
    }

    #[test]
    fn culls_offscreen_and_faded_nodes() {
        let mut pool = NodePool::new();
        pool.sync(vec![
            item("1"),
            item("2"),
            item("3"),
        ]);
        let h: Vec<_> = pool.order().to_vec();
        pool.set_targets(h[0], Point::new(10.0, 10.0), Size::new(50.0, 50.0), None, None);
        pool.set_targets(h[1], Point::new(900.0, 10.0), Size::new(50.0, 50.0), None, None);
        pool.set_targets(h[2], Point::new(100.0, 10.0), Size::new(50.0, 50.0), Some(0.0), None);
        pool.snap_all();

        let mut rec = Recorder::default();
        let stats = draw_frame(&mut rec, &pool, &LayoutOutput::default(), &camera(), &DrawStyle::default());
        assert_eq!(stats.nodes_drawn, 1);
        assert_eq!(stats.nodes_culled, 2);
        assert_eq!(rec.stack.depth(), 0);
        // Background, then placeholder for the one visible node.
        assert_eq!(rec.ops[0], Op::Fill(LayoutBox::new(0.0, 0.0, 400.0, 300.0)));
        assert_eq!(rec.ops[1], Op::Rounded(LayoutBox::new(10.0, 10.0, 50.0, 50.0)));
    }

    #[test]
    fn loaded_image_replaces_placeholder_and_keeps_aspect() {
        let mut pool = NodePool::new();
        pool.sync(vec![item("1")]);
        let h = pool.order()[0];
        pool.set_targets(h, Point::new(0.0, 0.0), Size::new(100.0, 100.0), None, None);
        pool.snap_all();
        pool.get_mut(h).unwrap().image = Some(Arc::new(ImageData {
            key: "wide".into(),
            width: 4,
            height: 2,
            rgba: vec![0; 32],
        }));

        let mut rec = Recorder::default();
        let stats = draw_frame(&mut rec, &pool, &LayoutOutput::default(), &camera(), &DrawStyle::default());
        assert_eq!(stats.images_drawn, 1);
        assert!(rec
            .ops
            .contains(&Op::Image("wide".into(), LayoutBox::new(0.0, 25.0, 100.0, 50.0))));
        assert!(!rec.ops.iter().any(|op| matches!(op, Op::Rounded(_))));
        // 100px on screen clears the label threshold.
        assert!(rec.ops.contains(&Op::Text("1".into())));
    }

    #[test]
    fn degenerate_viewport_draws_nothing() {
        let mut pool = NodePool::new();
        pool.sync(vec![item("1")]);
        let mut rec = Recorder::default();
        let stats = draw_frame(&mut rec, &pool, &LayoutOutput::default(), &Camera::default(), &DrawStyle::default());
        assert_eq!(stats, DrawStats::default());
        assert!(rec.ops.is_empty());
    }

    #[test]
    fn contain_letterboxes() {
        let r = LayoutBox::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(contain(r, 1.0), LayoutBox::new(25.0, 0.0, 50.0, 50.0));
        assert_eq!(contain(r, 0.0), r);
    }
}
