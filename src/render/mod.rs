pub mod animator;
pub mod draw;
pub mod layout;
pub mod paint;
pub mod pivot;
pub mod scale;
pub mod surface;

pub use animator::{BlendFactors, LayoutNode, NodeId, NodePool};
pub use draw::{draw_frame, DrawStats, DrawStyle};
pub use layout::{LayoutConfig, LayoutMode, Orientation};
pub use pivot::{GroupHeader, LayoutOutput};
pub use scale::ScalePolicy;
pub use surface::{Color, DrawSurface, TextAlign};
