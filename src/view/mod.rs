//! Viewport camera.

pub mod camera;

pub use camera::{Camera, CameraConfig, CameraState, ViewState};
