pub mod canvas;

pub use canvas::{CanvasConfig, PivotCanvas};
