pub mod error;
pub mod events;
pub mod geom;
pub mod item;

pub mod group;
pub mod net;
pub mod render;
pub mod view;
pub mod input;
pub mod engine;

pub use engine::{CanvasConfig, PivotCanvas};
pub use error::ImageError;
pub use item::{AttrValue, CatalogItem, ImageDescriptor, ResolutionTier};
