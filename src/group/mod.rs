//! Grouping: dimensions, numeric buckets and drill-down state.

pub mod bucket;
pub mod dimension;
pub mod drill;

pub use bucket::{BucketConfig, BucketStrategy, NumericRange};
pub use dimension::{Dimension, DimensionSource, PivotGroup, UNKNOWN_GROUP};
pub use drill::{DrillDown, DrillFilter, FilterValue};
