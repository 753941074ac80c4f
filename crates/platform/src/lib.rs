//! Platform layer for toy2d.
//!
//! This crate provides:
//! - Window management via winit
//! - The surface factory and instance extension list the engine consumes
//! - Keyboard input state

mod input;
mod window;

pub use input::{InputState, KeyCode};
pub use window::{Window, required_extensions};
