//! Engine lifetime: initialize, access the renderer, shut down.
//!
//! [`Engine`] is the explicitly constructed context that owns the Vulkan
//! instance, the surface, the logical device and the [`Renderer`]. There is
//! no global state; callers hold the engine and pass it where needed.
//!
//! # Example
//!
//! ```no_run
//! use toy2d_core::EngineConfig;
//! use toy2d_renderer::Engine;
//!
//! # fn example(
//! #     extensions: &[&'static std::ffi::CStr],
//! #     make_surface: impl FnOnce(&ash::Entry, &ash::Instance) -> Result<ash::vk::SurfaceKHR, String>,
//! # ) -> Result<(), toy2d_renderer::RendererError> {
//! let config = EngineConfig::default();
//! let mut engine = Engine::initialize(extensions, make_surface, 1280, 720, &config)?;
//! engine.renderer_mut().draw_rectangle()?;
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;
use std::fmt::Display;
use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use toy2d_core::EngineConfig;
use toy2d_rhi::device::Device;
use toy2d_rhi::instance::Instance;
use toy2d_rhi::physical_device::select_physical_device;
use toy2d_rhi::surface::Surface;

use crate::error::{RendererError, RendererResult};
use crate::renderer::Renderer;

/// Owner of every Vulkan object for one window.
///
/// # Resource Destruction Order
///
/// 1. Wait for the device to go idle
/// 2. Renderer (pipeline, buffers, swapchain, command pool)
/// 3. Logical device
/// 4. Surface
/// 5. Instance
///
/// ManuallyDrop is used to ensure correct destruction order.
pub struct Engine {
    renderer: ManuallyDrop<Renderer>,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,
}

impl Engine {
    /// Brings up the engine for a window.
    ///
    /// # Arguments
    ///
    /// * `extensions` - Instance extensions the windowing layer requires
    /// * `surface_factory` - Creates a presentable surface on the new instance
    /// * `width`, `height` - Window size in pixels
    /// * `config` - Validation and renderer settings
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails; everything created before the
    /// failure is released.
    pub fn initialize<F, E>(
        extensions: &[&'static CStr],
        surface_factory: F,
        width: u32,
        height: u32,
        config: &EngineConfig,
    ) -> RendererResult<Self>
    where
        F: FnOnce(&ash::Entry, &ash::Instance) -> Result<vk::SurfaceKHR, E>,
        E: Display,
    {
        info!("Initializing engine ({}x{})", width, height);

        let instance = Instance::new(config.renderer.validation, extensions)?;

        let raw_surface = surface_factory(instance.entry(), instance.handle())
            .map_err(|e| RendererError::SurfaceCreation(e.to_string()))?;
        let surface = Surface::from_raw(instance.entry(), instance.handle(), raw_surface);

        // Locals drop in reverse order on early return: device, surface, instance
        let physical_device_info = select_physical_device(instance.handle(), Some(&surface))?;
        let device = Device::new(&instance, &physical_device_info)?;

        let renderer = Renderer::new(
            &instance,
            device.clone(),
            &surface,
            width,
            height,
            &config.renderer,
        )?;

        info!("Engine initialized");

        Ok(Self {
            renderer: ManuallyDrop::new(renderer),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
        })
    }

    /// The renderer.
    #[inline]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// The renderer, for updates and draw calls.
    #[inline]
    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Waits for the GPU and releases everything in reverse creation order.
    ///
    /// # Errors
    ///
    /// Returns the device-idle error, if any. Resources are released either
    /// way.
    pub fn shutdown(self) -> RendererResult<()> {
        info!("Shutting down engine");
        let idle = self.device.wait_idle();
        drop(self);
        idle.map_err(Into::into)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during engine drop: {}", e);
        }

        // SAFETY: each field is dropped exactly once, here, and never used again.
        unsafe {
            ManuallyDrop::drop(&mut self.renderer);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Engine destroyed");
    }
}
