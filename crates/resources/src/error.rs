//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error while reading a file.
    #[error("IO error reading '{path}': {source}")]
    Io {
        /// Path of the file being read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image decoding error.
    #[error("Failed to decode image '{path}': {source}")]
    Image {
        /// Path of the image being decoded.
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },

    /// Pixel data does not match the declared dimensions.
    #[error("Image data is {actual} bytes, expected {expected} for {width}x{height} RGBA8")]
    PixelSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Shader binary is not a whole number of 32-bit words.
    #[error("SPIR-V file '{path}' is {len} bytes, not a multiple of 4")]
    MisalignedSpirv {
        path: PathBuf,
        len: usize,
    },
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
