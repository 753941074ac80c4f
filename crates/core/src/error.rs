//! Error types shared by the non-GPU crates.

use thiserror::Error;

/// Main error type for toy2d outside the Vulkan layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or handle access failed.
    #[error("Window error: {0}")]
    Window(String),

    /// Surface creation or extension enumeration failed.
    #[error("Surface error: {0}")]
    Surface(String),

    /// Configuration file could not be parsed or holds invalid values.
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
