//! Asset loading for toy2d.
//!
//! This crate handles the file formats the engine consumes:
//! - Image files decoded to tightly packed RGBA8
//! - Precompiled SPIR-V shader binaries

pub mod error;
pub mod image;
pub mod shader;

pub use error::{ResourceError, ResourceResult};
pub use image::RgbaImage;
pub use shader::read_spirv_file;
