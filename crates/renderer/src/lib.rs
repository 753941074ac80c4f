//! 2D frame orchestration on top of `toy2d-rhi`.
//!
//! This crate provides:
//! - The frame loop state machine and its Vulkan backend
//! - Uniform, texture and geometry management
//! - The [`Renderer`] draw API and the [`Engine`] that owns it

pub mod backend;
pub mod engine;
mod error;
pub mod frame;
pub mod frame_loop;
pub mod geometry;
pub mod renderer;
pub mod uniform;

pub use engine::Engine;
pub use error::{RendererError, RendererResult};
pub use frame::{DEFAULT_FRAMES_IN_FLIGHT, SlotCursor};
pub use frame_loop::{FrameBackend, FrameIndices, FrameLoop};
pub use renderer::Renderer;
pub use uniform::UniformObject;

// Re-export the vertex type used by the geometry setters
pub use toy2d_rhi::vertex::Vertex;
