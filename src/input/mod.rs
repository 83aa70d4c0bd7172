//! Pointer and touch input.

pub mod gesture;

pub use gesture::{Gesture, GestureConfig, GestureRecognizer};
