//! Presentable surface ownership and capability queries.

use ash::vk;
use tracing::debug;

use crate::error::RhiResult;

/// What a physical device can do with a surface.
#[derive(Clone, Debug, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// A swapchain needs at least one format and one present mode.
    #[inline]
    pub fn is_usable(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// RAII wrapper for a `vk::SurfaceKHR` created by the windowing layer.
///
/// The surface must be dropped before the instance it was created from.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Takes ownership of a surface handle created on `instance`.
    pub fn from_raw(entry: &ash::Entry, instance: &ash::Instance, handle: vk::SurfaceKHR) -> Self {
        Self {
            handle,
            loader: ash::khr::surface::Instance::new(entry, instance),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Whether `queue_family` on `physical_device` can present to this surface.
    pub fn supports_queue_family(&self, physical_device: vk::PhysicalDevice, queue_family: u32) -> bool {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family, self.handle)
                .unwrap_or(false)
        }
    }

    /// Capabilities, formats and present modes for `physical_device`.
    pub fn query_support(&self, physical_device: vk::PhysicalDevice) -> RhiResult<SurfaceSupport> {
        let support = unsafe {
            SurfaceSupport {
                capabilities: self
                    .loader
                    .get_physical_device_surface_capabilities(physical_device, self.handle)?,
                formats: self
                    .loader
                    .get_physical_device_surface_formats(physical_device, self.handle)?,
                present_modes: self
                    .loader
                    .get_physical_device_surface_present_modes(physical_device, self.handle)?,
            }
        };

        debug!(
            "Surface support: {} format(s), {} present mode(s), {}..{} images",
            support.formats.len(),
            support.present_modes.len(),
            support.capabilities.min_image_count,
            support.capabilities.max_image_count
        );
        Ok(support)
    }

    /// True if the device reports a usable format and present mode.
    pub fn is_usable_by(&self, physical_device: vk::PhysicalDevice) -> bool {
        self.query_support(physical_device)
            .is_ok_and(|support| support.is_usable())
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle was created on the instance the loader was built
        // from, and every swapchain using it is gone by now.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        debug!("Vulkan surface destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_needs_format_and_present_mode() {
        let usable = SurfaceSupport {
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
            ..Default::default()
        };
        assert!(usable.is_usable());

        let no_formats = SurfaceSupport {
            formats: vec![],
            ..usable.clone()
        };
        assert!(!no_formats.is_usable());

        let no_modes = SurfaceSupport {
            present_modes: vec![],
            ..usable
        };
        assert!(!no_modes.is_usable());
    }
}
