//! GPU buffer management.
//!
//! A [`Buffer`] owns exactly one `VkBuffer` and one dedicated `VkDeviceMemory`
//! allocation bound to it at offset 0. Creation and binding happen in a single
//! constructor, so a buffer handle never escapes without memory behind it.
//!
//! # Overview
//!
//! - [`BufferUsage`] presets usage and memory property flags per buffer role
//! - [`Buffer`] wraps the handle, its memory and the host-side map/copy/unmap
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use toy2d_rhi::device::Device;
//! use toy2d_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), toy2d_rhi::RhiError> {
//! let opacity = 0.5f32;
//! let uniform = Buffer::new(device, BufferUsage::Uniform, 4)?;
//! uniform.write(0, bytemuck::bytes_of(&opacity))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory;

/// Buffer role.
///
/// Each role maps to fixed Vulkan usage flags and memory property flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local vertex data, filled by staged transfer
    Vertex,
    /// Device-local 32-bit index data, filled by staged transfer
    Index,
    /// Host-coherent shader uniforms, written directly
    Uniform,
    /// Host-visible upload source for staged transfers
    Staging,
    /// Host-visible download target for reading device-local data back
    Readback,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
            BufferUsage::Readback => vk::BufferUsageFlags::TRANSFER_DST,
        }
    }

    /// Memory property flags the backing memory type must provide.
    pub fn memory_properties(self) -> vk::MemoryPropertyFlags {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            BufferUsage::Uniform | BufferUsage::Staging | BufferUsage::Readback => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
            BufferUsage::Readback => "readback",
        }
    }
}

/// GPU buffer with its own dedicated memory allocation.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// Memory bound at offset 0.
    memory: vk::DeviceMemory,
    /// Requested size in bytes.
    size: vk::DeviceSize,
    /// Allocated size in bytes, as reported by the driver.
    allocation_size: vk::DeviceSize,
    /// Memory type the allocation came from.
    memory_type_index: u32,
    /// Usage flags the buffer was created with.
    usage: vk::BufferUsageFlags,
    /// Property flags requested for the memory.
    properties: vk::MemoryPropertyFlags,
    /// Label used in logs.
    label: &'static str,
}

impl Buffer {
    /// Creates a buffer for one of the preset roles.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ResourceCreationError`] if `size` is zero or no
    /// memory type satisfies the role's property flags.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        Self::with_flags(
            device,
            size,
            usage.to_vk_usage(),
            usage.memory_properties(),
            usage.name(),
        )
    }

    /// Creates a buffer with explicit usage and memory property flags.
    ///
    /// Steps, all inside this call: create the handle, query its memory
    /// requirements, pick the first compatible memory type, allocate
    /// `requirements.size` bytes and bind them at offset 0. On any failure
    /// everything created so far is released.
    pub fn with_flags(
        device: Arc<Device>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        label: &'static str,
    ) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::ResourceCreationError(format!(
                "{} buffer size must be greater than 0",
                label
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None) }.map_err(|e| {
            RhiError::ResourceCreationError(format!("creating {} buffer failed: {}", label, e))
        })?;

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let (memory, memory_type_index) = match memory::allocate(&device, requirements, properties)
        {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { device.handle().bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.handle().free_memory(memory, None);
                device.handle().destroy_buffer(buffer, None);
            }
            return Err(RhiError::ResourceCreationError(format!(
                "binding {} buffer memory failed: {}",
                label, e
            )));
        }

        debug!(
            "Created {} buffer: {} bytes ({} allocated, memory type {})",
            label, size, requirements.size, memory_type_index
        );

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            allocation_size: requirements.size,
            memory_type_index,
            usage,
            properties,
            label,
        })
    }

    /// Copies `data` into the buffer at `offset` through a temporary mapping.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidAccess`] if the memory is not host-visible
    /// or the range exceeds the buffer.
    pub fn write(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.check_host_range(offset, data.len())?;

        unsafe {
            let mapped = self.device.handle().map_memory(
                self.memory,
                offset,
                data.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
            self.device.handle().unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Reads `len` bytes starting at `offset` through a temporary mapping.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Buffer::write`].
    pub fn read(&self, offset: vk::DeviceSize, len: usize) -> RhiResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        self.check_host_range(offset, len)?;

        let mut out = vec![0u8; len];
        unsafe {
            let mapped = self.device.handle().map_memory(
                self.memory,
                offset,
                len as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(mapped.cast::<u8>(), out.as_mut_ptr(), len);
            self.device.handle().unmap_memory(self.memory);
        }

        Ok(out)
    }

    fn check_host_range(&self, offset: vk::DeviceSize, len: usize) -> RhiResult<()> {
        if !self
            .properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(RhiError::InvalidAccess(format!(
                "{} buffer memory is not host-visible",
                self.label
            )));
        }
        check_range(self.size, offset, len).map_err(RhiError::InvalidAccess)
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the requested buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the size of the bound allocation, at least [`Buffer::size`].
    #[inline]
    pub fn allocation_size(&self) -> vk::DeviceSize {
        self.allocation_size
    }

    /// Returns the memory type index backing this buffer.
    #[inline]
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// Returns the property flags of the memory type actually chosen.
    pub fn memory_type_flags(&self) -> vk::MemoryPropertyFlags {
        self.device.memory_properties().memory_types[self.memory_type_index as usize]
            .property_flags
    }

    /// Returns the Vulkan usage flags.
    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // Memory goes first, then the handle
        unsafe {
            self.device.handle().free_memory(self.memory, None);
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.label);
    }
}

/// Validates that `[offset, offset + len)` lies inside a buffer of `size` bytes.
fn check_range(size: vk::DeviceSize, offset: vk::DeviceSize, len: usize) -> Result<(), String> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(format!(
            "range offset {} + {} bytes exceeds buffer of {} bytes",
            offset, len, size
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert_eq!(
            BufferUsage::Uniform.to_vk_usage(),
            vk::BufferUsageFlags::UNIFORM_BUFFER
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
        assert_eq!(
            BufferUsage::Readback.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_DST
        );
    }

    #[test]
    fn test_buffer_usage_memory_properties() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(
            BufferUsage::Vertex.memory_properties(),
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        );
        assert_eq!(
            BufferUsage::Index.memory_properties(),
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        );
        assert_eq!(BufferUsage::Uniform.memory_properties(), host);
        assert_eq!(BufferUsage::Staging.memory_properties(), host);
        assert_eq!(BufferUsage::Readback.memory_properties(), host);
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Staging.name(), "staging");
        assert_eq!(BufferUsage::Readback.name(), "readback");
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(16, 0, 16).is_ok());
        assert!(check_range(16, 8, 8).is_ok());
        assert!(check_range(16, 8, 9).is_err());
        assert!(check_range(16, 17, 0).is_err());
        assert!(check_range(16, u64::MAX, 1).is_err());
    }
}
