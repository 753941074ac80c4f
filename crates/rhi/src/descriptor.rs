//! Descriptor layout, pool and set updates.
//!
//! The fragment shader reads one set with two bindings, described by
//! [`Binding`]. The layout and the pool are both derived from the same
//! binding list, so the pool always matches what the layout declares.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// A binding of the engine's single descriptor set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    /// The per-slot uniform object, binding 0.
    Uniform,
    /// The combined image sampler, binding 1.
    Texture,
}

impl Binding {
    /// Both bindings, in binding order.
    pub const ALL: [Binding; 2] = [Binding::Uniform, Binding::Texture];

    #[inline]
    pub fn index(self) -> u32 {
        match self {
            Binding::Uniform => 0,
            Binding::Texture => 1,
        }
    }

    #[inline]
    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            Binding::Uniform => vk::DescriptorType::UNIFORM_BUFFER,
            Binding::Texture => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }

    fn layout_binding(self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(self.index())
            .descriptor_type(self.descriptor_type())
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
    }
}

/// One pool size per binding, enough for `set_count` sets.
fn pool_sizes(bindings: &[Binding], set_count: u32) -> Vec<vk::DescriptorPoolSize> {
    bindings
        .iter()
        .map(|binding| {
            vk::DescriptorPoolSize::default()
                .ty(binding.descriptor_type())
                .descriptor_count(set_count)
        })
        .collect()
}

pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a layout declaring `bindings`, all visible to the fragment stage.
    pub fn new(device: Arc<Device>, bindings: &[Binding]) -> RhiResult<Self> {
        let layout_bindings: Vec<_> = bindings.iter().map(|b| b.layout_binding()).collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)
        }
        .map_err(|e| RhiError::ResourceCreationError(format!("descriptor set layout: {}", e)))?;

        debug!("Descriptor set layout created with {:?}", bindings);
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Fixed-size pool. Sets are released with the pool, never one by one.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    capacity: u32,
}

impl DescriptorPool {
    /// Creates a pool holding `set_count` sets that declare `bindings`.
    pub fn new(device: Arc<Device>, bindings: &[Binding], set_count: u32) -> RhiResult<Self> {
        let sizes = pool_sizes(bindings, set_count);
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(set_count)
            .pool_sizes(&sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None) }
            .map_err(|e| RhiError::ResourceCreationError(format!("descriptor pool: {}", e)))?;

        debug!("Descriptor pool created for {} set(s)", set_count);
        Ok(Self {
            device,
            pool,
            capacity: set_count,
        })
    }

    /// Allocates `count` sets sharing `layout`.
    ///
    /// # Errors
    ///
    /// Fails once the pool's capacity is used up.
    pub fn allocate(
        &self,
        layout: &DescriptorSetLayout,
        count: usize,
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout.handle(); count];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        Ok(sets)
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

fn write_for<'a>(set: vk::DescriptorSet, binding: Binding) -> vk::WriteDescriptorSet<'a> {
    vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding.index())
        .descriptor_type(binding.descriptor_type())
}

/// Points the uniform binding of `set` at the first `range` bytes of `buffer`.
pub fn write_uniform_buffer(
    device: &Device,
    set: vk::DescriptorSet,
    buffer: vk::Buffer,
    range: vk::DeviceSize,
) {
    let info = [vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .range(range)];
    let write = write_for(set, Binding::Uniform).buffer_info(&info);
    unsafe {
        device
            .handle()
            .update_descriptor_sets(std::slice::from_ref(&write), &[]);
    }
}

/// Points the texture binding of `set` at a shader-readable view.
///
/// No frame that reads `set` may be in flight.
pub fn write_texture(
    device: &Device,
    set: vk::DescriptorSet,
    view: vk::ImageView,
    sampler: vk::Sampler,
) {
    let info = [vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(view)
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
    let write = write_for(set, Binding::Texture).image_info(&info);
    unsafe {
        device
            .handle()
            .update_descriptor_sets(std::slice::from_ref(&write), &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_are_ordered_and_fragment_only() {
        let layout: Vec<_> = Binding::ALL.iter().map(|b| b.layout_binding()).collect();

        assert_eq!(layout[0].binding, 0);
        assert_eq!(layout[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(layout[1].binding, 1);
        assert_eq!(
            layout[1].descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        for binding in &layout {
            assert_eq!(binding.descriptor_count, 1);
            assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        }
    }

    #[test]
    fn test_pool_sizes_scale_with_set_count() {
        let sizes = pool_sizes(&Binding::ALL, 3);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert!(sizes.iter().all(|size| size.descriptor_count == 3));
    }

    #[test]
    fn test_write_targets_binding() {
        let write = write_for(vk::DescriptorSet::null(), Binding::Texture);
        assert_eq!(write.dst_binding, 1);
        assert_eq!(write.dst_array_element, 0);
        assert_eq!(
            write.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
    }
}
