//! The logical device.
//!
//! [`Device`] is the shared GPU context. Every resource in this crate keeps
//! an `Arc<Device>` so the device outlives whatever was created from it.
//! Only one thread drives the device, so nothing here locks.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::memory::find_memory_type_index;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilies};

pub struct Device {
    raw: ash::Device,
    physical_device: vk::PhysicalDevice,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queues: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl Device {
    /// Creates the device with one queue per distinct family.
    ///
    /// The swapchain extension is enabled only for a device picked against a
    /// surface. No optional features are turned on.
    pub fn new(instance: &Instance, gpu: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let priority = [1.0f32];
        let queue_infos: Vec<_> = gpu
            .queues
            .distinct()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priority)
            })
            .collect();

        let extensions = if gpu.presentable {
            vec![ash::khr::swapchain::NAME.as_ptr()]
        } else {
            Vec::new()
        };
        let features = vk::PhysicalDeviceFeatures::default();
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let raw = unsafe {
            instance
                .handle()
                .create_device(gpu.handle, &create_info, None)?
        };

        let (graphics_queue, present_queue) = unsafe {
            (
                raw.get_device_queue(gpu.queues.graphics, 0),
                raw.get_device_queue(gpu.queues.present, 0),
            )
        };
        debug!("Queues: {:?}", gpu.queues);
        info!(
            "Logical device created on '{}'{}",
            gpu.name(),
            if gpu.presentable { " with swapchain support" } else { "" }
        );

        Ok(Arc::new(Self {
            raw,
            physical_device: gpu.handle,
            memory_properties: gpu.memory_properties,
            queues: gpu.queues,
            graphics_queue,
            present_queue,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.raw
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    #[inline]
    pub fn queue_families(&self) -> QueueFamilies {
        self.queues
    }

    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.queues.graphics
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// May be the same queue as [`Device::graphics_queue`].
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Index of the first memory type allowed by `type_bits` that has every
    /// flag in `properties`.
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<u32> {
        find_memory_type_index(&self.memory_properties, type_bits, properties).ok_or_else(|| {
            RhiError::ResourceCreationError(format!(
                "no memory type in {:#b} has {:?}",
                type_bits, properties
            ))
        })
    }

    /// Blocks until the whole device is idle.
    ///
    /// # Errors
    ///
    /// A failed wait is reported as [`RhiError::DeviceLostError`].
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.raw.device_wait_idle() }.map_err(RhiError::DeviceLostError)
    }

    /// Blocks until `queue` is idle. Failures map like [`Device::wait_idle`].
    pub fn queue_wait_idle(&self, queue: vk::Queue) -> RhiResult<()> {
        unsafe { self.raw.queue_wait_idle(queue) }.map_err(RhiError::DeviceLostError)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            error!("Device did not go idle before destruction: {}", e);
        }
        unsafe { self.raw.destroy_device(None) };
        info!("Logical device destroyed");
    }
}

// SAFETY: ash::Device is Send + Sync and the other fields are plain handles.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
