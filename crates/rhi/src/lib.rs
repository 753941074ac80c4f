//! Thin RAII layer over `ash` for the toy2d engine.
//!
//! Every wrapper owns exactly one Vulkan object and destroys it on drop.
//! Objects created from the device hold an `Arc<Device>`, so dropping them
//! in any order still leaves the device alive until the last one is gone.
//! Instance, surface and device themselves must be dropped in reverse
//! creation order by their owner.

mod error;

pub mod buffer;
pub mod command;
pub mod command_manager;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod memory;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod transfer;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
