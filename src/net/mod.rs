//! Image networking: URL resolution, background fetch + decode, caching,
//! and the level-of-detail controller that drives them.

pub mod cache;
pub mod image;
pub mod lod;
pub mod resolve;

pub use cache::{FailureTracker, ImageCache};
pub use image::{HttpFetcher, ImageData, ImageFetcher, ImageLoader};
pub use lod::{ImageEvent, ImageLoadTask, LodConfig, LodController};
pub use resolve::{ImageResolver, ImageResolverConfig};
