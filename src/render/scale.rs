//! Weight → size multiplier.

/// Observed weight range for one layout pass plus the output clamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleContext {
    pub weight_min: Option<f32>,
    pub weight_max: Option<f32>,
    pub clamp_min: f32,
    pub clamp_max: f32,
}

impl ScaleContext {
    /// Scan every visible weight once. Non-finite weights are ignored.
    pub fn from_weights<I>(weights: I, clamp_min: f32, clamp_max: f32) -> Self
    where
        I: IntoIterator<Item = Option<f32>>,
    {
        let mut min: Option<f32> = None;
        let mut max: Option<f32> = None;
        for w in weights.into_iter().flatten().filter(|w| w.is_finite()) {
            min = Some(min.map_or(w, |m| m.min(w)));
            max = Some(max.map_or(w, |m| m.max(w)));
        }
        Self {
            weight_min: min,
            weight_max: max,
            clamp_min,
            clamp_max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalePolicy {
    /// Every item renders at 1×.
    Uniform,
    /// Heavier items render larger, linearly within `[clamp_min, clamp_max]`.
    ByWeight { clamp_min: f32, clamp_max: f32 },
}

impl Default for ScalePolicy {
    fn default() -> Self {
        ScalePolicy::ByWeight {
            clamp_min: 0.7,
            clamp_max: 1.0,
        }
    }
}

impl ScalePolicy {
    pub fn context<I>(&self, weights: I) -> ScaleContext
    where
        I: IntoIterator<Item = Option<f32>>,
    {
        match *self {
            ScalePolicy::Uniform => ScaleContext {
                weight_min: None,
                weight_max: None,
                clamp_min: 1.0,
                clamp_max: 1.0,
            },
            ScalePolicy::ByWeight { clamp_min, clamp_max } => {
                ScaleContext::from_weights(weights, clamp_min, clamp_max)
            }
        }
    }

    /// Largest multiplier this policy can produce.
    pub fn max_multiplier(&self) -> f32 {
        match *self {
            ScalePolicy::Uniform => 1.0,
            ScalePolicy::ByWeight { clamp_min, clamp_max } => clamp_min.max(clamp_max).max(1.0),
        }
    }
}

/// Multiplier for one item.
///
/// Returns 1 when the item has no weight or the range is degenerate.
pub fn scale_for(weight: Option<f32>, ctx: &ScaleContext) -> f32 {
    let (Some(w), Some(min), Some(max)) = (weight, ctx.weight_min, ctx.weight_max) else {
        return 1.0;
    };
    if !w.is_finite() || max <= min {
        return 1.0;
    }
    let t = (w - min) / (max - min);
    let s = ctx.clamp_min + t * (ctx.clamp_max - ctx.clamp_min);
    let (lo, hi) = if ctx.clamp_min <= ctx.clamp_max {
        (ctx.clamp_min, ctx.clamp_max)
    } else {
        (ctx.clamp_max, ctx.clamp_min)
    };
    s.clamp(lo, hi)
}
