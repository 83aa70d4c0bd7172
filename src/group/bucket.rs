//! Numeric bucketing for dimensions like price.
//!
//! Every strategy turns a set of finite values into an ordered list of
//! half-open [`NumericRange`]s covering them; the last range is closed.

use crate::item::format_number;

/// How a numeric attribute is split into buckets.
#[derive(Debug, Clone, PartialEq)]
pub enum BucketStrategy {
    /// Predefined boundaries. Values below the first or above the last
    /// boundary land in open-ended outer buckets.
    Fixed(Vec<f64>),
    EqualWidth,
    /// Equal population; boundaries never split a run of equal values.
    Quantile,
    /// 1-D k-means over the values.
    KMeans,
}

/// `[min, max)`, or `[min, max]` when `closed`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
    pub closed: bool,
}

impl NumericRange {
    pub fn new(min: f64, max: f64, closed: bool) -> Self {
        Self { min, max, closed }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && (v < self.max || (self.closed && v <= self.max))
    }

    pub fn label(&self) -> String {
        match (self.min.is_finite(), self.max.is_finite()) {
            (false, true) => format!("< {}", format_number(self.max)),
            (true, false) => format!(">= {}", format_number(self.min)),
            (false, false) => "All".to_string(),
            (true, true) if self.min == self.max => format_number(self.min),
            (true, true) => format!("{} - {}", format_number(self.min), format_number(self.max)),
        }
    }
}

/// Bucket count tuning.
#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    /// Buckets for a large value set.
    pub count: usize,
    /// Buckets once the set shrinks to `fine_threshold` values or fewer.
    pub fine_count: usize,
    pub fine_threshold: usize,
    pub kmeans_iterations: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            count: 5,
            fine_count: 8,
            fine_threshold: 60,
            kmeans_iterations: 20,
        }
    }
}

impl BucketConfig {
    /// Bucket count for a subset of `len` values with `distinct` distinct ones.
    pub fn count_for(&self, len: usize, distinct: usize) -> usize {
        let wanted = if len <= self.fine_threshold {
            self.fine_count.max(self.count)
        } else {
            self.count
        };
        wanted.min(distinct).max(1)
    }
}

/// Split `values` into ranges. Non-finite values are ignored; an empty
/// input yields no ranges.
pub fn compute_buckets(values: &[f64], strategy: &BucketStrategy, cfg: &BucketConfig) -> Vec<NumericRange> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(f64::total_cmp);
    let distinct = count_distinct(&sorted);
    let k = cfg.count_for(sorted.len(), distinct);

    match strategy {
        BucketStrategy::Fixed(bounds) => fixed(bounds),
        BucketStrategy::EqualWidth => equal_width(&sorted, k),
        BucketStrategy::Quantile => quantile(&sorted, k),
        BucketStrategy::KMeans => kmeans(&sorted, k, cfg.kmeans_iterations),
    }
}

/// Index of the range holding `v`.
pub fn bucket_of(v: f64, ranges: &[NumericRange]) -> Option<usize> {
    if !v.is_finite() {
        return None;
    }
    ranges.iter().position(|r| r.contains(v))
}

fn count_distinct(sorted: &[f64]) -> usize {
    if sorted.is_empty() {
        return 0;
    }
    1 + sorted.windows(2).filter(|w| w[0] != w[1]).count()
}

fn fixed(bounds: &[f64]) -> Vec<NumericRange> {
    let mut b: Vec<f64> = bounds.iter().copied().filter(|v| v.is_finite()).collect();
    b.sort_by(f64::total_cmp);
    b.dedup();
    if b.is_empty() {
        return vec![NumericRange::new(f64::NEG_INFINITY, f64::INFINITY, true)];
    }
    let mut out = Vec::with_capacity(b.len() + 1);
    out.push(NumericRange::new(f64::NEG_INFINITY, b[0], false));
    for w in b.windows(2) {
        out.push(NumericRange::new(w[0], w[1], false));
    }
    out.push(NumericRange::new(b[b.len() - 1], f64::INFINITY, true));
    out
}

/// Ranges from interior split points between the smallest and largest value.
fn from_splits(lo: f64, hi: f64, splits: &[f64]) -> Vec<NumericRange> {
    let mut edges = Vec::with_capacity(splits.len() + 2);
    edges.push(lo);
    for &s in splits {
        if s > edges[edges.len() - 1] && s < hi {
            edges.push(s);
        }
    }
    edges.push(hi);
    if edges.len() == 2 && lo == hi {
        return vec![NumericRange::new(lo, hi, true)];
    }
    let last = edges.len() - 2;
    edges
        .windows(2)
        .enumerate()
        .map(|(i, w)| NumericRange::new(w[0], w[1], i == last))
        .collect()
}

fn equal_width(sorted: &[f64], k: usize) -> Vec<NumericRange> {
    let lo = sorted[0];
    let hi = sorted[sorted.len() - 1];
    let width = (hi - lo) / k as f64;
    let splits: Vec<f64> = (1..k).map(|i| lo + width * i as f64).collect();
    from_splits(lo, hi, &splits)
}

fn quantile(sorted: &[f64], k: usize) -> Vec<NumericRange> {
    let n = sorted.len();
    let mut splits = Vec::with_capacity(k);
    let mut start = 0;
    for i in 1..k {
        let mut end = (i * n).div_ceil(k).max(start + 1);
        // Extend past duplicates so equal values share one bucket.
        while end < n && sorted[end] == sorted[end - 1] {
            end += 1;
        }
        if end >= n {
            break;
        }
        splits.push(sorted[end]);
        start = end;
    }
    from_splits(sorted[0], sorted[n - 1], &splits)
}

fn kmeans(sorted: &[f64], k: usize, iterations: usize) -> Vec<NumericRange> {
    let lo = sorted[0];
    let hi = sorted[sorted.len() - 1];
    let mut uniques = sorted.to_vec();
    uniques.dedup();
    if k <= 1 || uniques.len() <= 1 {
        return from_splits(lo, hi, &[]);
    }

    let mut centroids: Vec<f64> = (0..k)
        .map(|i| uniques[i * (uniques.len() - 1) / (k - 1)])
        .collect();

    for _ in 0..iterations {
        let mut sums = vec![0.0f64; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for &v in sorted {
            let nearest = nearest_centroid(&centroids, v);
            sums[nearest] += v;
            counts[nearest] += 1;
        }
        let next: Vec<f64> = centroids
            .iter()
            .enumerate()
            .map(|(i, &c)| if counts[i] > 0 { sums[i] / counts[i] as f64 } else { c })
            .collect();
        if next == centroids {
            break;
        }
        centroids = next;
    }

    centroids.sort_by(f64::total_cmp);
    centroids.dedup();
    let splits: Vec<f64> = centroids.windows(2).map(|w| (w[0] + w[1]) * 0.5).collect();
    from_splits(lo, hi, &splits)
}

fn nearest_centroid(centroids: &[f64], v: f64) -> usize {
    let mut best = 0;
    for (i, c) in centroids.iter().enumerate() {
        if (v - c).abs() < (v - centroids[best]).abs() {
            best = i;
        }
    }
    best
}
