//! Packing strategies: turn a list of items plus a frame into rectangles.
//!
//! Every strategy returns one [`LayoutBox`] per input item, in input order.
//! Item sizes are `base × scale`, fitted to the item's aspect ratio.
//!
//! - `pack_grid`      : uniform cells sized to fill the frame
//! - `pack_shelf`     : left→right rows, bottom-aligned, wrap on overflow
//! - `pack_masonry`   : shortest-column-first
//! - `pack_smart_grid`: scored column-count search
//! - cell matrix      : `matrix_dims` / `search_cell_size` / `pack_matrix`
//!   / `pack_centered_row`, used by the pivot orchestrator

use crate::geom::{LayoutBox, Size};
use crate::render::scale::ScalePolicy;

/// Which packing rule the canvas uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMode {
    /// Grouped columns/rows sharing one cell size.
    #[default]
    Pivot,
    Grid,
    Shelf,
    Masonry,
    SmartGrid,
}

impl LayoutMode {
    pub fn label(self) -> &'static str {
        match self {
            LayoutMode::Pivot => "pivot",
            LayoutMode::Grid => "grid",
            LayoutMode::Shelf => "shelf",
            LayoutMode::Masonry => "masonry",
            LayoutMode::SmartGrid => "smart grid",
        }
    }
}

/// How pivot groups are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Groups side by side; items stack upward from a shared baseline.
    #[default]
    Columns,
    /// Groups stacked vertically; items fill downward from each group's top.
    Rows,
}

/// Vertical anchoring of a packed block inside its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Top,
    Bottom,
}

/// Smart-grid score weights.
#[derive(Debug, Clone, Copy)]
pub struct SmartGridWeights {
    pub cell_size: f32,
    pub aspect_balance: f32,
    pub preferred_band: f32,
}

impl Default for SmartGridWeights {
    fn default() -> Self {
        Self {
            cell_size: 0.5,
            aspect_balance: 0.3,
            preferred_band: 0.2,
        }
    }
}

/// Layout tuning shared by every strategy.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Gap between neighbouring cells.
    pub spacing: f32,
    /// Margin between the world frame and the viewport-sized area.
    pub padding: f32,
    pub min_cell: f32,
    pub max_cell: f32,
    /// Binary-search iteration budget for the shared cell size.
    pub search_iterations: u32,
    /// Groups with at most this many items render as one centered row.
    pub small_group_threshold: usize,
    pub orientation: Orientation,
    /// Gap between pivot groups.
    pub group_gap: f32,
    /// Height reserved for a pivot group's header label.
    pub header_height: f32,
    pub scale_policy: ScalePolicy,
    /// Base item size for shelf rows and masonry columns.
    pub base_cell: f32,
    /// Smart-grid preferred cell-size band `(min, max)`.
    pub preferred_cell: (f32, f32),
    pub smart_weights: SmartGridWeights,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing: 8.0,
            padding: 24.0,
            min_cell: 24.0,
            max_cell: 240.0,
            search_iterations: 30,
            small_group_threshold: 4,
            orientation: Orientation::Columns,
            group_gap: 32.0,
            header_height: 36.0,
            scale_policy: ScalePolicy::default(),
            base_cell: 120.0,
            preferred_cell: (80.0, 160.0),
            smart_weights: SmartGridWeights::default(),
        }
    }
}

impl LayoutConfig {
    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing.max(0.0);
        self
    }

    pub fn with_cell_range(mut self, min_cell: f32, max_cell: f32) -> Self {
        self.min_cell = min_cell.max(1.0);
        self.max_cell = max_cell.max(self.min_cell);
        self
    }

    pub fn with_small_group_threshold(mut self, threshold: usize) -> Self {
        self.small_group_threshold = threshold;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_scale_policy(mut self, policy: ScalePolicy) -> Self {
        self.scale_policy = policy;
        self
    }
}

/// Per-item sizing input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackItem {
    /// Size multiplier from the scale policy.
    pub scale: f32,
    /// Width / height.
    pub aspect: f32,
}

impl PackItem {
    pub fn new(scale: f32, aspect: Option<f32>) -> Self {
        let aspect = aspect.filter(|a| a.is_finite() && *a > 0.0).unwrap_or(1.0);
        Self {
            scale: if scale.is_finite() && scale > 0.0 { scale } else { 1.0 },
            aspect,
        }
    }
}

impl Default for PackItem {
    fn default() -> Self {
        Self {
            scale: 1.0,
            aspect: 1.0,
        }
    }
}

/// Fit an item into a cell: scaled, aspect-preserving, horizontally centered,
/// resting on the cell's bottom or top edge.
pub fn fit_in_cell(cell: &LayoutBox, item: &PackItem, anchor: Anchor) -> LayoutBox {
    let side = cell.width.min(cell.height) * item.scale;
    let (w, h) = if item.aspect >= 1.0 {
        (side, side / item.aspect)
    } else {
        (side * item.aspect, side)
    };
    let x = cell.x + (cell.width - w) * 0.5;
    let y = match anchor {
        Anchor::Bottom => cell.bottom() - h,
        Anchor::Top => cell.y,
    };
    LayoutBox::new(x, y, w, h)
}

// ── Cell matrix ──────────────────────────────────────────────────────────────

/// Columns × rows of `cell`-sized squares that fit in `frame`.
pub fn matrix_dims(cell: f32, frame: Size, spacing: f32) -> (usize, usize) {
    if !(cell > 0.0) || frame.is_degenerate() {
        return (0, 0);
    }
    let fit = |extent: f32| ((extent + spacing) / (cell + spacing)).floor().max(0.0) as usize;
    (fit(frame.width), fit(frame.height))
}

/// Result of the shared cell-size search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSearch {
    pub size: f32,
    pub cols: usize,
    pub rows: usize,
    /// False when even `min_cell` cannot hold `max_count` items.
    pub satisfied: bool,
}

/// Largest cell size in `[min_cell, max_cell]` whose matrix holds `max_count`.
///
/// Bisects for at most `iterations` steps; the returned size always
/// satisfies the constraint when `satisfied` is true.
pub fn search_cell_size(
    max_count: usize,
    frame: Size,
    spacing: f32,
    min_cell: f32,
    max_cell: f32,
    iterations: u32,
) -> CellSearch {
    let min_cell = min_cell.max(f32::EPSILON);
    let max_cell = max_cell.max(min_cell);
    let fits = |s: f32| {
        let (c, r) = matrix_dims(s, frame, spacing);
        c.saturating_mul(r) >= max_count
    };
    let result = |size: f32, satisfied: bool| {
        let (cols, rows) = matrix_dims(size, frame, spacing);
        CellSearch {
            size,
            cols,
            rows,
            satisfied,
        }
    };

    if fits(max_cell) {
        return result(max_cell, true);
    }
    if !fits(min_cell) {
        return result(min_cell, false);
    }

    let mut lo = min_cell;
    let mut hi = max_cell;
    for _ in 0..iterations {
        let mid = (lo + hi) * 0.5;
        if mid <= lo || mid >= hi {
            break;
        }
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    result(lo, true)
}

/// Row-major matrix of `count` cells inside `frame`.
///
/// Column count balances the rows needed against the available width: the
/// fewest rows that fit, then the fewest columns that keep that row count.
/// `Bottom` fills from the baseline upward; `Top` fills downward.
pub fn pack_matrix(
    count: usize,
    cell: f32,
    spacing: f32,
    frame: &LayoutBox,
    anchor: Anchor,
) -> Vec<LayoutBox> {
    if count == 0 || !(cell > 0.0) {
        return Vec::new();
    }
    let (avail_cols, _) = matrix_dims(cell, Size::new(frame.width, f32::MAX), spacing);
    let avail_cols = avail_cols.max(1);
    let rows = count.div_ceil(avail_cols);
    let cols = count.div_ceil(rows);

    let block_w = cols as f32 * cell + (cols.saturating_sub(1)) as f32 * spacing;
    let x0 = frame.x + (frame.width - block_w) * 0.5;
    let step = cell + spacing;

    (0..count)
        .map(|i| {
            let col = i % cols;
            let row = i / cols;
            let x = x0 + col as f32 * step;
            let y = match anchor {
                Anchor::Bottom => frame.bottom() - cell - row as f32 * step,
                Anchor::Top => frame.y + row as f32 * step,
            };
            LayoutBox::new(x, y, cell, cell)
        })
        .collect()
}

/// One horizontally centered row of `count` cells.
pub fn pack_centered_row(
    count: usize,
    cell: f32,
    spacing: f32,
    frame: &LayoutBox,
    anchor: Anchor,
) -> Vec<LayoutBox> {
    if count == 0 || !(cell > 0.0) {
        return Vec::new();
    }
    let row_w = count as f32 * cell + (count - 1) as f32 * spacing;
    let x0 = frame.x + (frame.width - row_w) * 0.5;
    let y = match anchor {
        Anchor::Bottom => frame.bottom() - cell,
        Anchor::Top => frame.y,
    };
    (0..count)
        .map(|i| LayoutBox::new(x0 + i as f32 * (cell + spacing), y, cell, cell))
        .collect()
}

// ── Flat strategies ──────────────────────────────────────────────────────────

/// Uniform grid whose column count follows the frame's aspect ratio.
pub fn pack_grid(items: &[PackItem], frame: &LayoutBox, cfg: &LayoutConfig) -> Vec<LayoutBox> {
    let n = items.len();
    if n == 0 || frame.width <= 0.0 || frame.height <= 0.0 {
        return Vec::new();
    }
    let cols = ((n as f32 * frame.width / frame.height).sqrt().ceil() as usize).clamp(1, n);
    grid_with_cols(items, frame, cfg, cols)
}

fn grid_cell(n: usize, cols: usize, frame: &LayoutBox, spacing: f32) -> f32 {
    let rows = n.div_ceil(cols).max(1);
    let cw = (frame.width - (cols - 1) as f32 * spacing) / cols as f32;
    let ch = (frame.height - (rows - 1) as f32 * spacing) / rows as f32;
    cw.min(ch)
}

fn grid_with_cols(
    items: &[PackItem],
    frame: &LayoutBox,
    cfg: &LayoutConfig,
    cols: usize,
) -> Vec<LayoutBox> {
    let n = items.len();
    let cell = grid_cell(n, cols, frame, cfg.spacing).clamp(cfg.min_cell, cfg.max_cell);
    let block_w = cols as f32 * cell + (cols - 1) as f32 * cfg.spacing;
    let x0 = frame.x + ((frame.width - block_w) * 0.5).max(0.0);
    let step = cell + cfg.spacing;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let c = LayoutBox::new(
                x0 + (i % cols) as f32 * step,
                frame.y + (i / cols) as f32 * step,
                cell,
                cell,
            );
            fit_in_cell(&c, item, Anchor::Bottom)
        })
        .collect()
}

/// Shelf packing: left→right, bottom-aligned per row, wrapping when the
/// running width would exceed the frame. Row height = tallest item.
pub fn pack_shelf(items: &[PackItem], frame: &LayoutBox, cfg: &LayoutConfig) -> Vec<LayoutBox> {
    if items.is_empty() || frame.width <= 0.0 {
        return Vec::new();
    }
    let sizes: Vec<(f32, f32)> = items
        .iter()
        .map(|it| {
            let h = cfg.base_cell * it.scale;
            (h * it.aspect, h)
        })
        .collect();

    let mut out = vec![LayoutBox::default(); items.len()];
    let mut row: Vec<usize> = Vec::new();
    let mut row_w = 0.0f32;
    let mut y = frame.y;

    let mut flush = |row: &mut Vec<usize>, y: &mut f32| {
        let row_h = row.iter().map(|&i| sizes[i].1).fold(0.0f32, f32::max);
        let mut x = frame.x;
        for &i in row.iter() {
            let (w, h) = sizes[i];
            out[i] = LayoutBox::new(x, *y + row_h - h, w, h);
            x += w + cfg.spacing;
        }
        *y += row_h + cfg.spacing;
        row.clear();
    };

    for (i, &(w, _)) in sizes.iter().enumerate() {
        let needed = if row.is_empty() { w } else { row_w + cfg.spacing + w };
        if !row.is_empty() && needed > frame.width {
            flush(&mut row, &mut y);
            row_w = w;
        } else {
            row_w = needed;
        }
        row.push(i);
    }
    if !row.is_empty() {
        flush(&mut row, &mut y);
    }
    out
}

/// Masonry: every item goes to the currently shortest column (leftmost on ties).
pub fn pack_masonry(items: &[PackItem], frame: &LayoutBox, cfg: &LayoutConfig) -> Vec<LayoutBox> {
    if items.is_empty() || frame.width <= 0.0 {
        return Vec::new();
    }
    let (cols, _) = matrix_dims(cfg.base_cell, Size::new(frame.width, f32::MAX), cfg.spacing);
    let cols = cols.max(1);
    let col_w = (frame.width - (cols - 1) as f32 * cfg.spacing) / cols as f32;
    let mut heights = vec![frame.y; cols];

    items
        .iter()
        .map(|it| {
            let c = heights
                .iter()
                .enumerate()
                .fold(0usize, |best, (i, h)| if *h < heights[best] { i } else { best });
            let w = col_w * it.scale;
            let h = w / it.aspect;
            let x = frame.x + c as f32 * (col_w + cfg.spacing) + (col_w - w) * 0.5;
            let rect = LayoutBox::new(x, heights[c], w, h);
            heights[c] += h + cfg.spacing;
            rect
        })
        .collect()
}

/// Score one candidate column count. Higher is better.
fn smart_grid_score(n: usize, cols: usize, frame: &LayoutBox, cfg: &LayoutConfig) -> f32 {
    let rows = n.div_ceil(cols);
    let cell = grid_cell(n, cols, frame, cfg.spacing).max(0.0);
    let max_cell = frame.width.min(frame.height).max(f32::EPSILON);
    let size_score = (cell / max_cell).min(1.0);

    let block_aspect = (cols as f32) / (rows as f32);
    let frame_aspect = frame.width / frame.height;
    let aspect_score = block_aspect.min(frame_aspect) / block_aspect.max(frame_aspect);

    let (band_lo, band_hi) = cfg.preferred_cell;
    let band_score = if cell >= band_lo && cell <= band_hi {
        1.0
    } else {
        let dist = if cell < band_lo { band_lo - cell } else { cell - band_hi };
        1.0 / (1.0 + dist / band_lo.max(1.0))
    };

    let w = cfg.smart_weights;
    w.cell_size * size_score + w.aspect_balance * aspect_score + w.preferred_band * band_score
}

/// Chosen column count for `n` items, exposed for tests and diagnostics.
pub fn smart_grid_columns(n: usize, frame: &LayoutBox, cfg: &LayoutConfig) -> usize {
    if n == 0 || frame.width <= 0.0 || frame.height <= 0.0 {
        return 0;
    }
    let mut best = (1usize, f32::MIN);
    for cols in 1..=n {
        let score = smart_grid_score(n, cols, frame, cfg);
        if score > best.1 {
            best = (cols, score);
        }
    }
    best.0
}

/// Grid whose column count is picked by [`smart_grid_columns`].
pub fn pack_smart_grid(
    items: &[PackItem],
    frame: &LayoutBox,
    cfg: &LayoutConfig,
) -> Vec<LayoutBox> {
    let cols = smart_grid_columns(items.len(), frame, cfg);
    if cols == 0 {
        return Vec::new();
    }
    grid_with_cols(items, frame, cfg, cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(n: usize) -> Vec<PackItem> {
        vec![PackItem::default(); n]
    }

    #[test]
    fn chosen_cell_is_feasible_and_maximal() {
        let frame = Size::new(400.0, 300.0);
        for max_count in [1usize, 7, 24, 60, 150] {
            let s = search_cell_size(max_count, frame, 8.0, 10.0, 200.0, 30);
            assert!(s.satisfied);
            assert!(s.cols * s.rows >= max_count, "count={max_count}");
            // Anything meaningfully larger no longer fits.
            if s.size < 200.0 {
                let bigger = s.size + 0.01;
                let (c, r) = matrix_dims(bigger, frame, 8.0);
                assert!(c * r < max_count, "count={max_count} size={}", s.size);
            }
        }
    }

    #[test]
    fn infeasible_search_degrades_to_min() {
        let s = search_cell_size(10_000, Size::new(100.0, 100.0), 4.0, 20.0, 80.0, 30);
        assert!(!s.satisfied);
        assert_eq!(s.size, 20.0);
    }

    #[test]
    fn matrix_is_bottom_anchored_and_balanced() {
        let frame = LayoutBox::new(0.0, 0.0, 100.0, 200.0);
        // 3 columns fit (3*30 + 2*5 = 100); 4 items → 2 rows of 2.
        let cells = pack_matrix(4, 30.0, 5.0, &frame, Anchor::Bottom);
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0].bottom(), 200.0);
        assert_eq!(cells[1].y, cells[0].y);
        assert!(cells[2].y < cells[0].y);
        assert_eq!(cells[2].x, cells[0].x);
    }

    #[test]
    fn centered_row_is_centered() {
        let frame = LayoutBox::new(0.0, 0.0, 100.0, 50.0);
        let cells = pack_centered_row(2, 20.0, 10.0, &frame, Anchor::Top);
        assert_eq!(cells[0].x, 25.0);
        assert_eq!(cells[1].right(), 75.0);
        assert!(cells.iter().all(|c| c.y == 0.0));
    }

    #[test]
    fn shelf_wraps_and_bottom_aligns() {
        let cfg = LayoutConfig {
            base_cell: 40.0,
            spacing: 0.0,
            ..Default::default()
        };
        let items = vec![
            PackItem::new(1.0, Some(1.0)),
            PackItem::new(0.5, Some(2.0)),
            PackItem::new(1.0, Some(1.0)),
        ];
        let frame = LayoutBox::new(0.0, 0.0, 90.0, 500.0);
        let out = pack_shelf(&items, &frame, &cfg);
        // Row 1: 40 + 40 = 80 wide; third item wraps.
        assert_eq!(out[0].y, 0.0);
        assert_eq!(out[1].bottom(), out[0].bottom());
        assert_eq!(out[2].x, 0.0);
        assert_eq!(out[2].y, 40.0);
    }

    #[test]
    fn masonry_uses_shortest_column() {
        let cfg = LayoutConfig {
            base_cell: 50.0,
            spacing: 0.0,
            ..Default::default()
        };
        let items = vec![
            PackItem::new(1.0, Some(0.5)), // tall: col 0
            PackItem::new(1.0, Some(1.0)), // col 1
            PackItem::new(1.0, Some(1.0)), // col 1 again (shorter)
        ];
        let frame = LayoutBox::new(0.0, 0.0, 100.0, 1000.0);
        let out = pack_masonry(&items, &frame, &cfg);
        assert_eq!(out[0].x, 0.0);
        assert_eq!(out[1].x, 50.0);
        assert_eq!(out[2].x, 50.0);
        assert_eq!(out[2].y, 50.0);
    }

    #[test]
    fn smart_grid_prefers_frame_shaped_blocks() {
        let cfg = LayoutConfig::default();
        let wide = LayoutBox::new(0.0, 0.0, 1200.0, 300.0);
        let tall = LayoutBox::new(0.0, 0.0, 300.0, 1200.0);
        assert!(smart_grid_columns(16, &wide, &cfg) > smart_grid_columns(16, &tall, &cfg));
        assert_eq!(pack_smart_grid(&square(16), &wide, &cfg).len(), 16);
    }

    #[test]
    fn grid_respects_cell_bounds() {
        let cfg = LayoutConfig::default().with_cell_range(10.0, 50.0);
        let out = pack_grid(&square(2), &LayoutBox::new(0.0, 0.0, 1000.0, 1000.0), &cfg);
        assert!(out.iter().all(|r| r.width <= 50.0 + 1e-4));
    }
}
