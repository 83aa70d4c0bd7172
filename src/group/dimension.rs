//! Pivot dimensions: named ways of splitting the item set into groups.

use std::collections::HashMap;

use crate::group::bucket::{bucket_of, compute_buckets, BucketConfig, BucketStrategy, NumericRange};
use crate::item::CatalogItem;

/// Key and label of the group holding items with no usable value.
pub const UNKNOWN_GROUP: &str = "Unknown";

/// Where a dimension reads its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionSource {
    /// `CatalogItem::group_key`.
    GroupKey,
    /// Category name at a hierarchy level.
    Category(usize),
    /// Scalar attribute compared as text.
    Attribute(String),
    /// Numeric attribute split into buckets.
    Numeric { attribute: String, strategy: BucketStrategy },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub key: String,
    pub label: String,
    /// Dimension that must already be filtered before this one is usable.
    pub parent: Option<String>,
    pub source: DimensionSource,
}

impl Dimension {
    pub fn new(key: impl Into<String>, label: impl Into<String>, source: DimensionSource) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            parent: None,
            source,
        }
    }

    pub fn category(key: impl Into<String>, label: impl Into<String>, level: usize) -> Self {
        Self::new(key, label, DimensionSource::Category(level))
    }

    pub fn attribute(key: impl Into<String>, label: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(key, label, DimensionSource::Attribute(name.into()))
    }

    pub fn numeric(
        key: impl Into<String>,
        label: impl Into<String>,
        attribute: impl Into<String>,
        strategy: BucketStrategy,
    ) -> Self {
        Self::new(
            key,
            label,
            DimensionSource::Numeric {
                attribute: attribute.into(),
                strategy,
            },
        )
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.source, DimensionSource::Numeric { .. })
    }

    /// Text value of a non-numeric dimension.
    pub fn text_value<T: CatalogItem>(&self, item: &T) -> Option<String> {
        let value = match &self.source {
            DimensionSource::GroupKey => item.group_key(),
            DimensionSource::Category(level) => item.category(*level).map(str::to_string),
            DimensionSource::Attribute(name) => item.attribute(name).and_then(|v| v.as_text()),
            DimensionSource::Numeric { .. } => None,
        };
        value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    /// Numeric value of a numeric dimension.
    pub fn numeric_value<T: CatalogItem>(&self, item: &T) -> Option<f64> {
        match &self.source {
            DimensionSource::Numeric { attribute, .. } => item.attribute(attribute).and_then(|v| v.as_number()),
            _ => None,
        }
    }

    /// Split `items` into groups.
    ///
    /// Text groups are sorted by label, numeric groups by range. The
    /// [`UNKNOWN_GROUP`] always comes last. Empty groups are omitted.
    pub fn partition<T: CatalogItem>(&self, items: &[&T], buckets: &BucketConfig) -> Vec<PivotGroup> {
        let mut groups = match &self.source {
            DimensionSource::Numeric { strategy, .. } => self.partition_numeric(items, strategy, buckets),
            _ => self.partition_text(items),
        };
        let unknown: Vec<String> = items
            .iter()
            .filter(|item| !self.has_value(**item))
            .map(|item| item.id().to_string())
            .collect();
        if !unknown.is_empty() {
            groups.push(PivotGroup {
                key: UNKNOWN_GROUP.to_string(),
                label: UNKNOWN_GROUP.to_string(),
                range: None,
                ids: unknown,
            });
        }
        groups
    }

    fn has_value<T: CatalogItem>(&self, item: &T) -> bool {
        if self.is_numeric() {
            self.numeric_value(item).is_some()
        } else {
            self.text_value(item).is_some()
        }
    }

    fn partition_text<T: CatalogItem>(&self, items: &[&T]) -> Vec<PivotGroup> {
        let mut by_key: HashMap<String, Vec<String>> = HashMap::new();
        for item in items {
            if let Some(value) = self.text_value(*item) {
                by_key.entry(value).or_default().push(item.id().to_string());
            }
        }
        let mut groups: Vec<PivotGroup> = by_key
            .into_iter()
            .map(|(key, ids)| PivotGroup {
                label: key.clone(),
                key,
                range: None,
                ids,
            })
            .collect();
        groups.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| a.key.cmp(&b.key))
        });
        groups
    }

    fn partition_numeric<T: CatalogItem>(
        &self,
        items: &[&T],
        strategy: &BucketStrategy,
        buckets: &BucketConfig,
    ) -> Vec<PivotGroup> {
        let values: Vec<(usize, f64)> = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.numeric_value(*item).map(|v| (i, v)))
            .collect();
        let raw: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
        let ranges = compute_buckets(&raw, strategy, buckets);

        let mut members: Vec<Vec<String>> = vec![Vec::new(); ranges.len()];
        for (i, v) in values {
            if let Some(b) = bucket_of(v, &ranges) {
                members[b].push(items[i].id().to_string());
            }
        }
        ranges
            .into_iter()
            .zip(members)
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(range, ids)| {
                let label = range.label();
                PivotGroup {
                    key: label.clone(),
                    label,
                    range: Some(range),
                    ids,
                }
            })
            .collect()
    }
}

/// One group of the active dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotGroup {
    pub key: String,
    pub label: String,
    /// Bucket range for numeric dimensions.
    pub range: Option<NumericRange>,
    /// Member item ids, in input order.
    pub ids: Vec<String>,
}

impl PivotGroup {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_unknown(&self) -> bool {
        self.key == UNKNOWN_GROUP && self.range.is_none()
    }
}
