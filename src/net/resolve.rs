//! Image URL resolution per resolution tier.
//!
//! Storage-backed images go through the resizing proxy:
//! `<proxy>?id=<id>&width=<px>&height=<px>&format=webp&quality=<q>`.
//! Direct URLs are used as given.

use url::Url;

use crate::item::{ImageDescriptor, ResolutionTier};

/// Pixel edge and encoder quality for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSpec {
    pub edge: u32,
    pub quality: u8,
}

#[derive(Debug, Clone)]
pub struct ImageResolverConfig {
    pub proxy_base: String,
    pub low: TierSpec,
    pub high: TierSpec,
    pub format: String,
    /// Ask the proxy for trimmed images with a transparent background.
    pub trim: bool,
}

impl Default for ImageResolverConfig {
    fn default() -> Self {
        Self {
            proxy_base: "https://share.arkturian.com/proxy.php".to_string(),
            low: TierSpec { edge: 130, quality: 75 },
            high: TierSpec { edge: 1300, quality: 85 },
            format: "webp".to_string(),
            trim: false,
        }
    }
}

impl ImageResolverConfig {
    pub fn with_proxy_base(mut self, base: impl Into<String>) -> Self {
        self.proxy_base = base.into();
        self
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn tier(&self, tier: ResolutionTier) -> TierSpec {
        match tier {
            ResolutionTier::Low => self.low,
            ResolutionTier::High => self.high,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageResolver {
    config: ImageResolverConfig,
}

impl ImageResolver {
    pub fn new(config: ImageResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ImageResolverConfig {
        &self.config
    }

    /// Largest decoded edge worth keeping for a tier.
    pub fn max_edge(&self, tier: ResolutionTier) -> u32 {
        self.config.tier(tier).edge
    }

    /// URL for `desc` at `tier`, or `None` when nothing usable is configured.
    pub fn resolve(&self, desc: &ImageDescriptor, tier: ResolutionTier) -> Option<String> {
        match desc {
            ImageDescriptor::Url { low, high } => {
                let url = match tier {
                    ResolutionTier::Low => low.as_str(),
                    ResolutionTier::High => high.as_deref().filter(|h| !h.is_empty()).unwrap_or(low.as_str()),
                };
                (!url.trim().is_empty()).then(|| url.to_string())
            }
            ImageDescriptor::Storage { id } => self.proxy_url(*id, tier),
        }
    }

    fn proxy_url(&self, id: u64, tier: ResolutionTier) -> Option<String> {
        let spec = self.config.tier(tier);
        let edge = spec.edge.to_string();
        let mut params = vec![
            ("id", id.to_string()),
            ("width", edge.clone()),
            ("height", edge),
            ("format", self.config.format.clone()),
            ("quality", spec.quality.to_string()),
        ];
        if self.config.trim {
            params.push(("trim", "true".to_string()));
        }
        match Url::parse_with_params(&self.config.proxy_base, &params) {
            Ok(url) => Some(url.into()),
            Err(e) => {
                log::warn!("invalid image proxy base '{}': {}", self.config.proxy_base, e);
                None
            }
        }
    }
}

/// Append a cache-busting query parameter.
pub fn cache_bust(url: &str, attempt: u32) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("_cb", &attempt.to_string());
            parsed.into()
        }
        Err(_) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}_cb={attempt}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_ids_resolve_through_proxy() {
        let resolver = ImageResolver::new(ImageResolverConfig::default().with_proxy_base("https://img.test/proxy"));
        let low = resolver
            .resolve(&ImageDescriptor::Storage { id: 42 }, ResolutionTier::Low)
            .unwrap();
        assert_eq!(
            low,
            "https://img.test/proxy?id=42&width=130&height=130&format=webp&quality=75"
        );
        let high = resolver
            .resolve(&ImageDescriptor::Storage { id: 42 }, ResolutionTier::High)
            .unwrap();
        assert!(high.contains("width=1300") && high.contains("quality=85"));
    }

    #[test]
    fn trim_flag_is_forwarded() {
        let resolver = ImageResolver::new(
            ImageResolverConfig::default()
                .with_proxy_base("https://img.test/proxy")
                .with_trim(true),
        );
        let url = resolver
            .resolve(&ImageDescriptor::Storage { id: 1 }, ResolutionTier::Low)
            .unwrap();
        assert!(url.ends_with("&trim=true"));
    }

    #[test]
    fn direct_urls_fall_back_to_low() {
        let resolver = ImageResolver::default();
        let desc = ImageDescriptor::Url {
            low: "https://cdn.test/a_small.jpg".into(),
            high: None,
        };
        assert_eq!(
            resolver.resolve(&desc, ResolutionTier::High).as_deref(),
            Some("https://cdn.test/a_small.jpg")
        );
        let blank = ImageDescriptor::Url {
            low: " ".into(),
            high: None,
        };
        assert_eq!(resolver.resolve(&blank, ResolutionTier::Low), None);
    }

    #[test]
    fn bad_proxy_base_resolves_nothing() {
        let resolver = ImageResolver::new(ImageResolverConfig::default().with_proxy_base("not a url"));
        assert_eq!(resolver.resolve(&ImageDescriptor::Storage { id: 1 }, ResolutionTier::Low), None);
    }

    #[test]
    fn cache_bust_appends_param() {
        assert_eq!(cache_bust("https://a.test/x.png", 1), "https://a.test/x.png?_cb=1");
        assert_eq!(cache_bust("https://a.test/x.png?w=1", 2), "https://a.test/x.png?w=1&_cb=2");
        assert_eq!(cache_bust("relative/x.png", 3), "relative/x.png?_cb=3");
    }
}
