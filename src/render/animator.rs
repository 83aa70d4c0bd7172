//! Animated node pool.
//!
//! Keeps one [`LayoutNode`] per stable item id across catalog syncs and
//! layout passes. Layout writes *targets*; [`NodePool::tick`] eases the
//! current values toward them once per frame.
//!
//! Storage is an arena: slots addressed by [`NodeId`] (index + generation),
//! an id → handle map for O(1) lookup during sync, and a free list so
//! churn does not grow the slot vector.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;

use crate::geom::{LayoutBox, Point, Size};
use crate::item::{CatalogItem, ResolutionTier};
use crate::net::image::ImageData;

/// Per-scalar-kind blend weights for `current += (target - current) * blend`.
#[derive(Debug, Clone, Copy)]
pub struct BlendFactors {
    pub position: f32,
    pub size: f32,
    pub opacity: f32,
    pub scale: f32,
}

impl Default for BlendFactors {
    fn default() -> Self {
        Self {
            position: 0.15,
            size: 0.15,
            opacity: 0.2,
            scale: 0.2,
        }
    }
}

impl BlendFactors {
    /// Same factor for every kind, clamped into (0, 1].
    pub fn uniform(blend: f32) -> Self {
        let b = clamp_blend(blend);
        Self {
            position: b,
            size: b,
            opacity: b,
            scale: b,
        }
    }

    fn clamped(self) -> Self {
        Self {
            position: clamp_blend(self.position),
            size: clamp_blend(self.size),
            opacity: clamp_blend(self.opacity),
            scale: clamp_blend(self.scale),
        }
    }
}

#[inline]
fn clamp_blend(b: f32) -> f32 {
    if b.is_nan() {
        1.0
    } else {
        b.clamp(f32::EPSILON, 1.0)
    }
}

/// Exponentially smoothed scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Animated {
    pub current: f32,
    pub target: f32,
}

impl Animated {
    #[inline]
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
        }
    }

    #[inline]
    pub fn tick(&mut self, blend: f32) {
        self.current += (self.target - self.current) * blend;
    }

    #[inline]
    pub fn snap(&mut self) {
        self.current = self.target;
    }

    #[inline]
    pub fn settled(&self, eps: f32) -> bool {
        (self.target - self.current).abs() <= eps
    }
}

/// Stable handle into the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// One animated item on the canvas.
#[derive(Debug, Clone)]
pub struct LayoutNode<T> {
    pub id: String,
    pub item: T,
    pub x: Animated,
    pub y: Animated,
    pub width: Animated,
    pub height: Animated,
    pub opacity: Animated,
    pub scale: Animated,
    /// Draw and hit-test order; ties keep pool order. See [`NodePool::raise`].
    pub z_index: i32,
    /// Set on creation, consumed by the first `set_targets`.
    pub is_new: bool,
    /// Tier requested from the loader (optimistic; set at dispatch time).
    pub requested_tier: Option<ResolutionTier>,
    /// Tier of the image currently displayed.
    pub image_tier: Option<ResolutionTier>,
    /// Displayed image; swapped by a single assignment on the render thread.
    pub image: Option<Arc<ImageData>>,
}

impl<T> LayoutNode<T> {
    fn fresh(id: String, item: T) -> Self {
        Self {
            id,
            item,
            x: Animated::new(0.0),
            y: Animated::new(0.0),
            width: Animated::new(0.0),
            height: Animated::new(0.0),
            opacity: Animated::new(0.0),
            scale: Animated::new(0.0),
            z_index: 0,
            is_new: true,
            requested_tier: None,
            image_tier: None,
            image: None,
        }
    }

    /// Current (animated) rectangle, before the `scale` multiplier.
    pub fn current_rect(&self) -> LayoutBox {
        LayoutBox::new(self.x.current, self.y.current, self.width.current, self.height.current)
    }

    /// Target rectangle written by the last layout pass.
    pub fn target_rect(&self) -> LayoutBox {
        LayoutBox::new(self.x.target, self.y.target, self.width.target, self.height.target)
    }

    /// Current rectangle with the entrance/hover scale applied around its center.
    pub fn visual_rect(&self) -> LayoutBox {
        let r = self.current_rect();
        let s = self.scale.current;
        let w = r.width * s;
        let h = r.height * s;
        LayoutBox::new(r.x + (r.width - w) * 0.5, r.y + (r.height - h) * 0.5, w, h)
    }

    fn tick(&mut self, blend: &BlendFactors) {
        self.x.tick(blend.position);
        self.y.tick(blend.position);
        self.width.tick(blend.size);
        self.height.tick(blend.size);
        self.opacity.tick(blend.opacity);
        self.scale.tick(blend.scale);
    }

    fn settled(&self, eps: f32) -> bool {
        self.x.settled(eps)
            && self.y.settled(eps)
            && self.width.settled(eps)
            && self.height.settled(eps)
            && self.opacity.settled(eps)
            && self.scale.settled(eps)
    }
}

struct Slot<T> {
    generation: u32,
    node: Option<LayoutNode<T>>,
}

/// Arena of animated nodes keyed by item id.
pub struct NodePool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    index: HashMap<String, NodeId>,
    order: Vec<NodeId>,
    blend: BlendFactors,
    /// Scale a new node starts from before easing to its settled scale.
    entrance_scale: f32,
}

impl<T> NodePool<T> {
    pub fn new() -> Self {
        Self::with_blend(BlendFactors::default())
    }

    pub fn with_blend(blend: BlendFactors) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            order: Vec::new(),
            blend: blend.clamped(),
            entrance_scale: 0.6,
        }
    }

    pub fn with_entrance_scale(mut self, scale: f32) -> Self {
        self.entrance_scale = scale.max(0.0);
        self
    }

    pub fn blend(&self) -> BlendFactors {
        self.blend
    }

    pub fn set_blend(&mut self, blend: BlendFactors) {
        self.blend = blend.clamped();
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Reconcile the pool with `items`: create missing nodes, replace the
    /// payload of existing ones, drop nodes whose id vanished. Existing
    /// nodes keep their order; new ones are appended.
    pub fn sync_with<F>(&mut self, items: Vec<T>, id_of: F)
    where
        F: Fn(&T) -> &str,
    {
        self.reconcile(items, id_of, false);
    }

    /// Like [`sync_with`](Self::sync_with), but the pool order afterwards
    /// follows the order of `items`.
    pub fn sync_ordered_with<F>(&mut self, items: Vec<T>, id_of: F)
    where
        F: Fn(&T) -> &str,
    {
        self.reconcile(items, id_of, true);
    }

    fn reconcile<F>(&mut self, items: Vec<T>, id_of: F, follow_caller_order: bool)
    where
        F: Fn(&T) -> &str,
    {
        let mut seen: HashMap<String, NodeId> = HashMap::with_capacity(items.len());
        let mut fresh_order: Vec<NodeId> = Vec::with_capacity(items.len());

        for item in items {
            let key = id_of(&item).to_string();
            if seen.contains_key(&key) {
                // Duplicate id in one batch: the later payload wins.
                if let Some(handle) = seen.get(&key).copied() {
                    if let Some(node) = self.get_mut(handle) {
                        node.item = item;
                    }
                }
                continue;
            }
            let handle = match self.index.get(&key).copied() {
                Some(handle) => {
                    if let Some(node) = self.get_mut(handle) {
                        node.item = item;
                    }
                    handle
                }
                None => self.insert(key.clone(), item),
            };
            fresh_order.push(handle);
            seen.insert(key, handle);
        }

        if follow_caller_order {
            self.order = fresh_order;
        } else {
            let mut known: HashSet<NodeId> =
                self.order.iter().copied().filter(|h| self.contains(*h)).collect();
            self.order.retain(|h| known.contains(h));
            for handle in fresh_order {
                if known.insert(handle) {
                    self.order.push(handle);
                }
            }
        }

        self.index = seen;
    }

    fn insert(&mut self, key: String, item: T) -> NodeId {
        let node = LayoutNode::fresh(key.clone(), item);
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        };
        self.index.insert(key, handle);
        handle
    }

    fn remove(&mut self, handle: NodeId) {
        if let Some(slot) = self.slots.get_mut(handle.index()) {
            if slot.generation == handle.generation && slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(handle.index);
            }
        }
    }

    pub fn contains(&self, handle: NodeId) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: NodeId) -> Option<&LayoutNode<T>> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, handle: NodeId) -> Option<&mut LayoutNode<T>> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Handle currently bound to an item id.
    pub fn id_of(&self, id: &str) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    /// Node handles in pool order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in pool order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &LayoutNode<T>)> {
        self.order
            .iter()
            .filter_map(move |h| self.get(*h).map(|n| (*h, n)))
    }

    /// All live nodes in pool order.
    pub fn all(&self) -> Vec<&LayoutNode<T>> {
        self.iter().map(|(_, n)| n).collect()
    }

    /// Write new layout targets. `opacity`/`scale` default to fully settled.
    ///
    /// The first call after creation starts the entrance animation: the
    /// node appears in place, faded out and shrunk, then eases in.
    pub fn set_targets(
        &mut self,
        handle: NodeId,
        pos: Point,
        size: Size,
        opacity: Option<f32>,
        scale: Option<f32>,
    ) -> bool {
        let entrance_scale = self.entrance_scale;
        let Some(node) = self.get_mut(handle) else {
            return false;
        };
        node.x.target = pos.x;
        node.y.target = pos.y;
        node.width.target = size.width;
        node.height.target = size.height;
        node.opacity.target = opacity.unwrap_or(1.0);
        node.scale.target = scale.unwrap_or(1.0);

        if node.is_new {
            node.x.snap();
            node.y.snap();
            node.width.snap();
            node.height.snap();
            node.opacity.current = 0.0;
            node.scale.current = entrance_scale;
            node.is_new = false;
        }
        true
    }

    /// Bring one node in front of all others and drop any earlier raise.
    pub fn raise(&mut self, handle: NodeId) -> bool {
        if !self.contains(handle) {
            return false;
        }
        for slot in self.slots.iter_mut() {
            if let Some(node) = slot.node.as_mut() {
                node.z_index = 0;
            }
        }
        if let Some(node) = self.get_mut(handle) {
            node.z_index = 1;
        }
        true
    }

    /// Snap every node to its targets (used after a hard reset).
    pub fn snap_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(node) = slot.node.as_mut() {
                node.x.snap();
                node.y.snap();
                node.width.snap();
                node.height.snap();
                node.opacity.snap();
                node.scale.snap();
            }
        }
    }
}

impl<T: Send + Sync> NodePool<T> {
    /// Advance every animated scalar one frame.
    pub fn tick(&mut self) {
        let blend = self.blend;
        self.slots.par_iter_mut().for_each(|slot| {
            if let Some(node) = slot.node.as_mut() {
                node.tick(&blend);
            }
        });
    }

    /// True when every scalar is within `eps` of its target.
    pub fn is_settled(&self, eps: f32) -> bool {
        self.slots
            .par_iter()
            .all(|slot| slot.node.as_ref().map_or(true, |n| n.settled(eps)))
    }
}

impl<T: CatalogItem> NodePool<T> {
    /// Sync using the item's own id accessor.
    pub fn sync(&mut self, items: Vec<T>) {
        self.sync_with(items, |item| item.id());
    }

    /// Ordered sync using the item's own id accessor.
    pub fn sync_ordered(&mut self, items: Vec<T>) {
        self.sync_ordered_with(items, |item| item.id());
    }
}

impl<T> Default for NodePool<T> {
    fn default() -> Self {
        Self::new()
    }
}
