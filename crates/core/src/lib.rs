//! Core utilities shared by every toy2d crate.
//!
//! - Error type and result alias
//! - Logging bootstrap
//! - Engine configuration loaded from TOML
//! - Frame rate counter

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::{EngineConfig, RendererConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameTimer;
