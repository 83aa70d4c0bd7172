//! Drill-down state: the active dimension plus a stack of filters.

use log::debug;

use crate::group::bucket::{BucketConfig, NumericRange};
use crate::group::dimension::{Dimension, PivotGroup, UNKNOWN_GROUP};
use crate::item::CatalogItem;

/// Value a filter entry matches.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Key(String),
    /// Bucket range frozen at drill time.
    Range(NumericRange),
    /// Items with no usable value.
    Unknown,
}

impl FilterValue {
    pub fn label(&self) -> String {
        match self {
            FilterValue::Key(k) => k.clone(),
            FilterValue::Range(r) => r.label(),
            FilterValue::Unknown => UNKNOWN_GROUP.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrillFilter {
    /// Index into the dimension list.
    pub dimension: usize,
    pub value: FilterValue,
}

/// Dimension hierarchy walker.
///
/// Dimensions are kept in hierarchy order; index 0 is the root.
#[derive(Debug, Clone)]
pub struct DrillDown {
    dimensions: Vec<Dimension>,
    active: usize,
    stack: Vec<DrillFilter>,
    buckets: BucketConfig,
}

impl DrillDown {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self {
            dimensions,
            active: 0,
            stack: Vec::new(),
            buckets: BucketConfig::default(),
        }
    }

    pub fn with_bucket_config(mut self, buckets: BucketConfig) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn active_dimension(&self) -> Option<&Dimension> {
        self.dimensions.get(self.active)
    }

    pub fn filters(&self) -> &[DrillFilter] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.key == key)
    }

    fn is_filtered(&self, index: usize) -> bool {
        self.stack.iter().any(|f| f.dimension == index)
    }

    /// A dimension is usable when its declared parent already has a filter.
    pub fn can_use_dimension(&self, key: &str) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        match &self.dimensions[index].parent {
            None => true,
            Some(parent) => self.position(parent).is_some_and(|p| self.is_filtered(p)),
        }
    }

    /// Switch the active dimension. No-op returning false when the
    /// dimension is unknown or its parent filter is missing.
    pub fn set_dimension(&mut self, key: &str) -> bool {
        if !self.can_use_dimension(key) {
            debug!("dimension '{key}' not usable at depth {}", self.stack.len());
            return false;
        }
        if let Some(index) = self.position(key) {
            self.active = index;
            return true;
        }
        false
    }

    /// Like [`set_dimension`](Self::set_dimension), and also drops filters
    /// on that dimension and on every dimension below it.
    pub fn set_grouping_dimension(&mut self, key: &str) -> bool {
        if !self.can_use_dimension(key) {
            return false;
        }
        let Some(index) = self.position(key) else {
            return false;
        };
        let dropped: Vec<usize> = (0..self.dimensions.len())
            .filter(|&i| self.descends_from(i, index))
            .collect();
        self.stack.retain(|f| !dropped.contains(&f.dimension));
        self.active = index;
        true
    }

    /// True when `index` is `ancestor` or has it somewhere up its parent chain.
    fn descends_from(&self, index: usize, ancestor: usize) -> bool {
        let mut current = Some(index);
        let mut hops = 0;
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.dimensions.len() {
                return false;
            }
            current = self.dimensions[i].parent.as_deref().and_then(|p| self.position(p));
        }
        false
    }

    /// Items passing every filter on the stack.
    pub fn filter<'a, T: CatalogItem>(&self, items: &'a [T]) -> Vec<&'a T> {
        items.iter().filter(|item| self.matches(*item)).collect()
    }

    fn matches<T: CatalogItem>(&self, item: &T) -> bool {
        self.stack.iter().all(|f| {
            let Some(dim) = self.dimensions.get(f.dimension) else {
                return true;
            };
            match &f.value {
                FilterValue::Key(key) => dim.text_value(item).as_deref() == Some(key.as_str()),
                FilterValue::Range(range) => dim.numeric_value(item).is_some_and(|v| range.contains(v)),
                FilterValue::Unknown => {
                    if dim.is_numeric() {
                        dim.numeric_value(item).is_none()
                    } else {
                        dim.text_value(item).is_none()
                    }
                }
            }
        })
    }

    /// Groups of the filtered items under the active dimension. With no
    /// dimensions configured, everything lands in one group.
    pub fn groups<T: CatalogItem>(&self, items: &[T]) -> Vec<PivotGroup> {
        let filtered = self.filter(items);
        match self.active_dimension() {
            Some(dim) => dim.partition(&filtered, &self.buckets),
            None if filtered.is_empty() => Vec::new(),
            None => vec![PivotGroup {
                key: "All".to_string(),
                label: "All".to_string(),
                range: None,
                ids: filtered.iter().map(|i| i.id().to_string()).collect(),
            }],
        }
    }

    /// Narrow to the group `key` of the active dimension and advance to the
    /// next dimension that still splits the remaining items.
    pub fn drill_down<T: CatalogItem>(&mut self, key: &str, items: &[T]) -> bool {
        if self.active_dimension().is_none() || self.is_filtered(self.active) {
            return false;
        }
        let Some(group) = self.groups(items).into_iter().find(|g| g.key == key) else {
            return false;
        };
        let value = if group.is_unknown() {
            FilterValue::Unknown
        } else if let Some(range) = group.range {
            FilterValue::Range(range)
        } else {
            FilterValue::Key(group.key)
        };
        self.stack.push(DrillFilter {
            dimension: self.active,
            value,
        });

        let filtered = self.filter(items);
        let next = (self.active + 1..self.dimensions.len())
            .find(|&i| self.usable_index(i) && self.dimensions[i].partition(&filtered, &self.buckets).len() > 1)
            .or_else(|| (self.active + 1..self.dimensions.len()).find(|&i| self.usable_index(i)));
        if let Some(next) = next {
            self.active = next;
        }
        debug!("drilled into '{key}', depth {}, active dimension {}", self.stack.len(), self.active);
        true
    }

    fn usable_index(&self, index: usize) -> bool {
        !self.is_filtered(index) && self.can_use_dimension(&self.dimensions[index].key)
    }

    /// Pop one filter; its dimension becomes active again.
    pub fn drill_up(&mut self) -> bool {
        match self.stack.pop() {
            Some(filter) => {
                self.active = filter.dimension;
                true
            }
            None => false,
        }
    }

    /// Clear every filter and return to the root dimension.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.active = 0;
    }

    /// `"All"` followed by one `"<dimension>: <value>"` entry per filter.
    pub fn breadcrumbs(&self) -> Vec<String> {
        std::iter::once("All".to_string())
            .chain(self.stack.iter().map(|f| {
                let dim = self.dimensions.get(f.dimension).map_or("?", |d| d.label.as_str());
                format!("{dim}: {}", f.value.label())
            }))
            .collect()
    }
}
