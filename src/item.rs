//! Accessor capability set the canvas core needs from a catalog item.
//!
//! The core never looks at item fields directly. A concrete product type
//! implements [`CatalogItem`] once; grouping, scaling, hit-testing and image
//! streaming all go through it.

use std::fmt;

/// Image resolution tier. Ordered: `Low < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResolutionTier {
    Low,
    High,
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionTier::Low => write!(f, "low"),
            ResolutionTier::High => write!(f, "high"),
        }
    }
}

/// Where an item's picture comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageDescriptor {
    /// Direct URLs. `high` falls back to `low` when absent.
    Url { low: String, high: Option<String> },
    /// Storage object resolved through the image proxy per tier.
    Storage { id: u64 },
}

/// A raw attribute value used by grouping dimensions.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
}

impl AttrValue {
    /// Numeric view of the value. Text parses if it looks like a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) if n.is_finite() => Some(*n),
            AttrValue::Number(_) => None,
            AttrValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Text view of the value. Empty text counts as missing.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Text(s) if s.trim().is_empty() => None,
            AttrValue::Text(s) => Some(s.trim().to_string()),
            AttrValue::Number(n) => Some(format_number(*n)),
        }
    }
}

/// Accessors implemented once per concrete item type.
pub trait CatalogItem: Clone + Send + Sync + 'static {
    /// Stable identity across catalog refreshes.
    fn id(&self) -> &str;

    /// Default grouping key when no dimension is configured.
    fn group_key(&self) -> Option<String>;

    /// Numeric weight driving the size multiplier.
    fn weight(&self) -> Option<f32>;

    fn label(&self) -> &str;

    fn price_text(&self) -> Option<String>;

    fn image(&self) -> Option<ImageDescriptor>;

    /// Category name at hierarchy `level` (0 = top level).
    fn category(&self, _level: usize) -> Option<&str> {
        None
    }

    /// Named scalar attribute (brand, season, price, ...).
    fn attribute(&self, _name: &str) -> Option<AttrValue> {
        None
    }

    /// Width / height of the item's picture; `None` means square.
    fn aspect_ratio(&self) -> Option<f32> {
        None
    }
}

/// Compact number formatting for labels: integers without decimals.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && (n.fract()).abs() < 1e-9 {
        format!("{}", n as i64)
    } else {
        format!("{:.2}", n)
    }
}
