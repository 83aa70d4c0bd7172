//! Pivot layout orchestrator.
//!
//! Turns the node pool plus the active grouping into animation targets.
//! In pivot mode every group shares one cell size, found by bisection so
//! the largest group still fits its frame. The flat modes skip grouping
//! and hand the whole pool to one packing strategy.

use log::{debug, warn};

use crate::geom::{LayoutBox, Point, Size};
use crate::group::PivotGroup;
use crate::item::CatalogItem;
use crate::render::animator::{NodeId, NodePool};
use crate::render::layout::{
    fit_in_cell, pack_centered_row, pack_grid, pack_masonry, pack_matrix, pack_shelf,
    pack_smart_grid, search_cell_size, Anchor, LayoutConfig, LayoutMode, Orientation, PackItem,
};
use crate::render::scale::{scale_for, ScaleContext};

/// Header strip of one pivot group, in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupHeader {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub rect: LayoutBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOutput {
    pub headers: Vec<GroupHeader>,
    /// Shared cell size (pivot) or largest item side (flat modes).
    pub cell_size: f32,
    /// False when the largest group overflowed even at `min_cell`.
    pub constraint_satisfied: bool,
    /// World bounds of every node target and header.
    pub content: LayoutBox,
    /// Tallest node target height; camera zoom limit input.
    pub tallest: f32,
}

impl Default for LayoutOutput {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            cell_size: 0.0,
            constraint_satisfied: true,
            content: LayoutBox::default(),
            tallest: 0.0,
        }
    }
}

impl LayoutOutput {
    pub fn is_empty(&self) -> bool {
        self.tallest <= 0.0 && self.headers.is_empty()
    }

    /// Header containing a world point.
    pub fn header_at(&self, p: Point) -> Option<&GroupHeader> {
        self.headers.iter().find(|h| h.rect.contains(p))
    }
}

/// Write layout targets for every node in `pool`.
///
/// Zero nodes or a zero-area viewport leave the pool untouched and return
/// an empty output.
pub fn compute<T: CatalogItem>(
    pool: &mut NodePool<T>,
    groups: &[PivotGroup],
    mode: LayoutMode,
    viewport: Size,
    cfg: &LayoutConfig,
) -> LayoutOutput {
    if viewport.is_degenerate() || pool.is_empty() {
        return LayoutOutput::default();
    }
    let frame = LayoutBox::new(0.0, 0.0, viewport.width, viewport.height).inset(cfg.padding);
    if frame.width <= 0.0 || frame.height <= 0.0 {
        return LayoutOutput::default();
    }

    let ctx = cfg
        .scale_policy
        .context(pool.iter().map(|(_, node)| node.item.weight()));

    let mut out = match mode {
        LayoutMode::Pivot => pivot(pool, groups, &frame, &ctx, cfg),
        flat => flat_layout(pool, flat, &frame, &ctx, cfg),
    };

    let mut content: Option<LayoutBox> = None;
    let mut tallest = 0.0f32;
    for (_, node) in pool.iter() {
        if node.opacity.target <= 0.0 {
            continue;
        }
        let r = node.target_rect();
        tallest = tallest.max(r.height);
        content = Some(content.map_or(r, |c| c.union(&r)));
    }
    for h in &out.headers {
        content = Some(content.map_or(h.rect, |c| c.union(&h.rect)));
    }
    out.content = content.unwrap_or_default();
    out.tallest = tallest;
    out
}

fn pack_item<T: CatalogItem>(pool: &NodePool<T>, handle: NodeId, ctx: &ScaleContext) -> PackItem {
    pool.get(handle)
        .map(|node| PackItem::new(scale_for(node.item.weight(), ctx), node.item.aspect_ratio()))
        .unwrap_or_default()
}

fn place<T: CatalogItem>(pool: &mut NodePool<T>, handle: NodeId, rect: LayoutBox) {
    pool.set_targets(
        handle,
        Point::new(rect.x, rect.y),
        Size::new(rect.width, rect.height),
        None,
        None,
    );
}

/// Fade a node out in place.
fn hide<T: CatalogItem>(pool: &mut NodePool<T>, handle: NodeId) {
    let Some(node) = pool.get(handle) else {
        return;
    };
    let r = node.target_rect();
    pool.set_targets(handle, Point::new(r.x, r.y), Size::new(r.width, r.height), Some(0.0), None);
}

struct GroupFrame {
    items: LayoutBox,
    header: LayoutBox,
}

fn group_frames(count: usize, frame: &LayoutBox, cfg: &LayoutConfig) -> Vec<GroupFrame> {
    let gaps = count.saturating_sub(1) as f32 * cfg.group_gap;
    match cfg.orientation {
        Orientation::Columns => {
            let col_w = ((frame.width - gaps) / count as f32).max(cfg.min_cell);
            let item_h = (frame.height - cfg.header_height).max(cfg.min_cell);
            (0..count)
                .map(|i| {
                    let x = frame.x + i as f32 * (col_w + cfg.group_gap);
                    GroupFrame {
                        items: LayoutBox::new(x, frame.y, col_w, item_h),
                        header: LayoutBox::new(x, frame.y + item_h, col_w, cfg.header_height),
                    }
                })
                .collect()
        }
        Orientation::Rows => {
            let row_h = ((frame.height - gaps) / count as f32 - cfg.header_height).max(cfg.min_cell);
            (0..count)
                .map(|i| {
                    let y = frame.y + i as f32 * (row_h + cfg.header_height + cfg.group_gap);
                    GroupFrame {
                        header: LayoutBox::new(frame.x, y, frame.width, cfg.header_height),
                        items: LayoutBox::new(frame.x, y + cfg.header_height, frame.width, row_h),
                    }
                })
                .collect()
        }
    }
}

fn pivot<T: CatalogItem>(
    pool: &mut NodePool<T>,
    groups: &[PivotGroup],
    frame: &LayoutBox,
    ctx: &ScaleContext,
    cfg: &LayoutConfig,
) -> LayoutOutput {
    let resolved: Vec<(&PivotGroup, Vec<NodeId>)> = groups
        .iter()
        .map(|g| (g, g.ids.iter().filter_map(|id| pool.id_of(id)).collect::<Vec<_>>()))
        .filter(|(_, handles)| !handles.is_empty())
        .collect();

    let placed: std::collections::HashSet<NodeId> =
        resolved.iter().flat_map(|(_, h)| h.iter().copied()).collect();
    let orphans: Vec<NodeId> = pool.order().iter().copied().filter(|h| !placed.contains(h)).collect();
    for handle in orphans {
        hide(pool, handle);
    }
    if resolved.is_empty() {
        return LayoutOutput::default();
    }

    let frames = group_frames(resolved.len(), frame, cfg);
    let max_count = resolved.iter().map(|(_, h)| h.len()).max().unwrap_or(0);
    let slot = Size::new(frames[0].items.width, frames[0].items.height);
    let search = search_cell_size(
        max_count,
        slot,
        cfg.spacing,
        cfg.min_cell,
        cfg.max_cell,
        cfg.search_iterations,
    );
    if !search.satisfied {
        warn!(
            "layout: largest group ({max_count} items) does not fit at min cell {:.1}; degrading",
            cfg.min_cell
        );
    }
    let cell = search.size;
    let anchor = match cfg.orientation {
        Orientation::Columns => Anchor::Bottom,
        Orientation::Rows => Anchor::Top,
    };

    let mut headers = Vec::with_capacity(resolved.len());
    for ((group, handles), gf) in resolved.iter().zip(frames.iter()) {
        let n = handles.len();
        let cells = if n <= cfg.small_group_threshold {
            let fit = (gf.items.width - n.saturating_sub(1) as f32 * cfg.spacing) / n as f32;
            pack_centered_row(n, cell.min(fit).max(1.0), cfg.spacing, &gf.items, anchor)
        } else {
            pack_matrix(n, cell, cfg.spacing, &gf.items, anchor)
        };
        for (&handle, c) in handles.iter().zip(cells.iter()) {
            let item = pack_item(pool, handle, ctx);
            place(pool, handle, fit_in_cell(c, &item, anchor));
        }
        headers.push(GroupHeader {
            key: group.key.clone(),
            label: group.label.clone(),
            count: n,
            rect: gf.header,
        });
    }
    debug!(
        "pivot layout: {} groups, max {} items, cell {:.1}",
        headers.len(),
        max_count,
        cell
    );

    LayoutOutput {
        headers,
        cell_size: cell,
        constraint_satisfied: search.satisfied,
        ..LayoutOutput::default()
    }
}

fn flat_layout<T: CatalogItem>(
    pool: &mut NodePool<T>,
    mode: LayoutMode,
    frame: &LayoutBox,
    ctx: &ScaleContext,
    cfg: &LayoutConfig,
) -> LayoutOutput {
    let handles: Vec<NodeId> = pool.order().to_vec();
    let items: Vec<PackItem> = handles.iter().map(|h| pack_item(pool, *h, ctx)).collect();
    let rects = match mode {
        LayoutMode::Grid | LayoutMode::Pivot => pack_grid(&items, frame, cfg),
        LayoutMode::Shelf => pack_shelf(&items, frame, cfg),
        LayoutMode::Masonry => pack_masonry(&items, frame, cfg),
        LayoutMode::SmartGrid => pack_smart_grid(&items, frame, cfg),
    };
    let mut largest = 0.0f32;
    for (handle, rect) in handles.into_iter().zip(rects) {
        largest = largest.max(rect.width.max(rect.height));
        place(pool, handle, rect);
    }
    LayoutOutput {
        cell_size: largest,
        ..LayoutOutput::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::dimension::tests::{product, Product};
    use crate::group::{BucketConfig, Dimension};
    use crate::render::scale::ScalePolicy;

    fn bare_config() -> LayoutConfig {
        LayoutConfig {
            spacing: 0.0,
            padding: 0.0,
            group_gap: 0.0,
            header_height: 0.0,
            ..LayoutConfig::default()
        }
        .with_cell_range(10.0, 100.0)
        .with_scale_policy(ScalePolicy::Uniform)
    }

    fn setup(items: &[Product]) -> (NodePool<Product>, Vec<PivotGroup>) {
        let mut pool = NodePool::new();
        pool.sync(items.to_vec());
        let refs: Vec<&Product> = items.iter().collect();
        let groups = Dimension::category("category", "Category", 0).partition(&refs, &BucketConfig::default());
        (pool, groups)
    }

    fn items_in(category: &'static str, n: usize) -> Vec<Product> {
        (0..n)
            .map(|i| product(&format!("{category}-{i}"), &[category], None, None))
            .collect()
    }

    fn distinct_rows(pool: &NodePool<Product>) -> usize {
        let mut ys: Vec<f32> = pool.iter().map(|(_, n)| n.y.target).collect();
        ys.sort_by(f32::total_cmp);
        ys.dedup_by(|a, b| (*a - *b).abs() < 1e-3);
        ys.len()
    }

    #[test]
    fn small_group_is_one_centered_row() {
        let cfg = bare_config().with_small_group_threshold(4);
        let (mut pool, groups) = setup(&items_in("hats", 4));
        let out = compute(&mut pool, &groups, LayoutMode::Pivot, Size::new(250.0, 1000.0), &cfg);

        assert_eq!(distinct_rows(&pool), 1);
        let left = pool.iter().map(|(_, n)| n.x.target).fold(f32::MAX, f32::min);
        let right = pool.iter().map(|(_, n)| n.target_rect().right()).fold(f32::MIN, f32::max);
        assert!((left - (250.0 - right)).abs() < 1e-3);
        assert!(out.constraint_satisfied);
    }

    #[test]
    fn one_over_threshold_becomes_matrix() {
        let cfg = bare_config().with_small_group_threshold(4);
        let (mut pool, groups) = setup(&items_in("hats", 5));
        let out = compute(&mut pool, &groups, LayoutMode::Pivot, Size::new(250.0, 1000.0), &cfg);

        assert_eq!(out.cell_size, 100.0);
        // Two columns fit, so five items need three rows.
        assert_eq!(distinct_rows(&pool), 3);
    }

    #[test]
    fn every_group_shares_a_feasible_cell() {
        let cfg = bare_config().with_small_group_threshold(0);
        let mut items = items_in("bags", 3);
        items.extend(items_in("shoes", 9));
        let (mut pool, groups) = setup(&items);
        let out = compute(&mut pool, &groups, LayoutMode::Pivot, Size::new(600.0, 400.0), &cfg);

        let (cols, rows) = crate::render::layout::matrix_dims(out.cell_size, Size::new(300.0, 400.0), 0.0);
        assert!(cols * rows >= 9);
        assert!(pool.iter().all(|(_, n)| (n.width.target - out.cell_size).abs() < 1e-3));
        // Bags in the left column, shoes in the right.
        for (_, node) in pool.iter() {
            let r = node.target_rect();
            if node.id.starts_with("bags") {
                assert!(r.right() <= 300.0 + 1e-3);
            } else {
                assert!(r.x >= 300.0 - 1e-3);
            }
            assert!(r.bottom() <= 400.0 + 1e-3);
        }
        assert_eq!(out.headers.len(), 2);
        assert_eq!(out.headers[1].count, 9);
    }

    #[test]
    fn overflow_degrades_to_min_cell() {
        let cfg = bare_config().with_cell_range(20.0, 100.0);
        let (mut pool, groups) = setup(&items_in("socks", 200));
        let out = compute(&mut pool, &groups, LayoutMode::Pivot, Size::new(100.0, 100.0), &cfg);
        assert!(!out.constraint_satisfied);
        assert_eq!(out.cell_size, 20.0);
        assert!(out.content.height > 100.0);
    }

    #[test]
    fn columns_sit_on_a_shared_baseline() {
        let cfg = LayoutConfig::default().with_scale_policy(ScalePolicy::Uniform);
        let mut items = items_in("bags", 6);
        items.extend(items_in("shoes", 12));
        let (mut pool, groups) = setup(&items);
        let out = compute(&mut pool, &groups, LayoutMode::Pivot, Size::new(800.0, 600.0), &cfg);

        let baseline = out.headers[0].rect.y;
        for (_, node) in pool.iter() {
            assert!(node.target_rect().bottom() <= baseline + 1e-3);
        }
        let lowest = |prefix: &str| {
            pool.iter()
                .filter(|(_, n)| n.id.starts_with(prefix))
                .map(|(_, n)| n.target_rect().bottom())
                .fold(f32::MIN, f32::max)
        };
        assert!((lowest("bags") - lowest("shoes")).abs() < 1e-3);
    }

    #[test]
    fn rows_orientation_fills_from_header_down() {
        let mut cfg = bare_config()
            .with_orientation(Orientation::Rows)
            .with_small_group_threshold(0);
        cfg.header_height = 20.0;
        let mut items = items_in("bags", 3);
        items.extend(items_in("shoes", 3));
        let (mut pool, groups) = setup(&items);
        let out = compute(&mut pool, &groups, LayoutMode::Pivot, Size::new(400.0, 400.0), &cfg);

        for header in &out.headers {
            let top = pool
                .iter()
                .filter(|(_, n)| n.id.starts_with(header.key.as_str()))
                .map(|(_, n)| n.y.target)
                .fold(f32::MAX, f32::min);
            assert!((top - header.rect.bottom()).abs() < 1e-3);
        }
    }

    #[test]
    fn heavier_items_render_larger() {
        let mut items = items_in("bags", 3);
        items[0].weight = Some(1.0);
        items[1].weight = Some(5.0);
        items[2].weight = Some(10.0);
        let (mut pool, groups) = setup(&items);
        let cfg = bare_config().with_scale_policy(ScalePolicy::ByWeight {
            clamp_min: 0.5,
            clamp_max: 1.0,
        });
        compute(&mut pool, &groups, LayoutMode::Pivot, Size::new(400.0, 400.0), &cfg);

        let w = |id: &str| pool.get(pool.id_of(id).unwrap()).unwrap().width.target;
        assert!(w("bags-0") < w("bags-1"));
        assert!(w("bags-1") < w("bags-2"));
        assert!((w("bags-0") * 2.0 - w("bags-2")).abs() < 1e-3);
    }

    #[test]
    fn nodes_outside_groups_fade_out() {
        let items = items_in("bags", 3);
        let (mut pool, mut groups) = setup(&items);
        groups[0].ids.truncate(2);
        compute(&mut pool, &groups, LayoutMode::Pivot, Size::new(400.0, 400.0), &bare_config());
        let hidden = pool.get(pool.id_of("bags-2").unwrap()).unwrap();
        assert_eq!(hidden.opacity.target, 0.0);
    }

    #[test]
    fn degenerate_input_is_a_no_op() {
        let (mut pool, groups) = setup(&items_in("bags", 2));
        let out = compute(&mut pool, &groups, LayoutMode::Pivot, Size::new(0.0, 400.0), &bare_config());
        assert!(out.is_empty());
        assert!(pool.iter().all(|(_, n)| n.is_new));

        let mut empty: NodePool<Product> = NodePool::new();
        let out = compute(&mut empty, &[], LayoutMode::Grid, Size::new(400.0, 400.0), &bare_config());
        assert!(out.is_empty());
    }

    #[test]
    fn flat_modes_place_every_node() {
        let items = items_in("bags", 7);
        for mode in [LayoutMode::Grid, LayoutMode::Shelf, LayoutMode::Masonry, LayoutMode::SmartGrid] {
            let (mut pool, groups) = setup(&items);
            let out = compute(&mut pool, &groups, mode, Size::new(500.0, 400.0), &bare_config());
            assert!(out.headers.is_empty(), "{}", mode.label());
            assert!(pool.iter().all(|(_, n)| !n.is_new && n.width.target > 0.0), "{}", mode.label());
        }
    }
}
