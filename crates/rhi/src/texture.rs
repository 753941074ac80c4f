//! Sampled 2D textures.
//!
//! A [`Texture`] owns an `R8G8B8A8_SRGB` image, its device-local memory and a
//! color view. Pixels arrive through a staging buffer and three one-shot
//! commands: a transition to `TRANSFER_DST_OPTIMAL`, the buffer-to-image
//! copy, and a transition to `SHADER_READ_ONLY_OPTIMAL`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use toy2d_rhi::command_manager::CommandManager;
//! use toy2d_rhi::device::Device;
//! use toy2d_rhi::texture::{Sampler, Texture};
//!
//! # fn example(device: Arc<Device>, commands: &CommandManager) -> Result<(), toy2d_rhi::RhiError> {
//! let white = Texture::from_rgba(device.clone(), commands, 1, 1, &[255, 255, 255, 255])?;
//! let sampler = Sampler::linear_repeat(device)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::buffer::{Buffer, BufferUsage};
use crate::command_manager::CommandManager;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory;

/// Pixel format of every texture.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Bytes per texel of [`TEXTURE_FORMAT`].
pub const BYTES_PER_PIXEL: usize = 4;

/// Access masks and pipeline stages for a supported layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutTransition {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

impl LayoutTransition {
    /// Barrier parameters for `old -> new`, or `None` if the pair is not one
    /// a texture upload performs.
    pub fn between(old: vk::ImageLayout, new: vk::ImageLayout) -> Option<Self> {
        match (old, new) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Some(Self {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            }),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
                Some(Self {
                    src_access: vk::AccessFlags::TRANSFER_WRITE,
                    dst_access: vk::AccessFlags::SHADER_READ,
                    src_stage: vk::PipelineStageFlags::TRANSFER,
                    dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
                })
            }
            _ => None,
        }
    }
}

/// Expected byte length of tightly packed RGBA8 pixels.
pub fn rgba_byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// GPU image with its memory and view.
pub struct Texture {
    device: Arc<Device>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    extent: vk::Extent2D,
}

impl Texture {
    /// Uploads tightly packed RGBA8 `pixels` into a new shader-readable
    /// texture.
    ///
    /// Blocks until the transfer has finished on the graphics queue.
    ///
    /// # Errors
    ///
    /// [`RhiError::ResourceCreationError`] if either dimension is zero, the
    /// pixel count does not match, or image creation, allocation or view
    /// creation fails. [`RhiError::DeviceLostError`] if a queue wait fails.
    pub fn from_rgba(
        device: Arc<Device>,
        commands: &CommandManager,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::ResourceCreationError(format!(
                "texture dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        let expected = rgba_byte_len(width, height);
        if pixels.len() != expected {
            return Err(RhiError::ResourceCreationError(format!(
                "{}x{} texture needs {} bytes of RGBA8, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }

        let staging = Buffer::new(
            device.clone(),
            BufferUsage::Staging,
            pixels.len() as vk::DeviceSize,
        )?;
        staging.write(0, pixels)?;

        let extent = vk::Extent2D { width, height };
        let texture = Self::allocate(device, extent)?;

        let image = texture.image;
        let queue = texture.device.graphics_queue();

        commands.execute_one_shot_and_wait(queue, |cmd| {
            record_transition(
                cmd,
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )
        })?;
        commands.execute_one_shot_and_wait(queue, |cmd| {
            cmd.copy_buffer_to_image(staging.handle(), image, extent)
        })?;
        commands.execute_one_shot_and_wait(queue, |cmd| {
            record_transition(
                cmd,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
        })?;

        info!("Texture uploaded ({}x{})", width, height);
        Ok(texture)
    }

    /// 1x1 opaque white texture.
    pub fn white(device: Arc<Device>, commands: &CommandManager) -> RhiResult<Self> {
        Self::from_rgba(device, commands, 1, 1, &[255, 255, 255, 255])
    }

    /// Creates the image, binds device-local memory and creates the view.
    /// Anything created before a failure is released by `Drop`.
    fn allocate(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None) }.map_err(|e| {
            RhiError::ResourceCreationError(format!("texture image creation failed: {}", e))
        })?;

        let mut texture = Self {
            device,
            image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            extent,
        };

        let requirements = unsafe {
            texture
                .device
                .handle()
                .get_image_memory_requirements(texture.image)
        };
        let (memory, _) = memory::allocate(
            &texture.device,
            requirements,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        texture.memory = memory;

        unsafe {
            texture
                .device
                .handle()
                .bind_image_memory(texture.image, texture.memory, 0)
        }
        .map_err(|e| {
            RhiError::ResourceCreationError(format!("binding texture memory failed: {}", e))
        })?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(texture.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .components(vk::ComponentMapping::default())
            .subresource_range(color_subresource_range());

        texture.view = unsafe { texture.device.handle().create_image_view(&view_info, None) }
            .map_err(|e| {
                RhiError::ResourceCreationError(format!("texture view creation failed: {}", e))
            })?;

        debug!(
            "Allocated {}x{} texture ({} bytes)",
            extent.width, extent.height, requirements.size
        );

        Ok(texture)
    }

    /// Returns the image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Returns the color view bound to descriptor sets.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            let device = self.device.handle();
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
        debug!(
            "Destroyed {}x{} texture",
            self.extent.width, self.extent.height
        );
    }
}

/// Sampler wrapper.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear filtering with repeat addressing on all axes, no anisotropy.
    pub fn linear_repeat(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe { device.handle().create_sampler(&create_info, None) }.map_err(
            |e| RhiError::ResourceCreationError(format!("sampler creation failed: {}", e)),
        )?;

        debug!("Created linear repeat sampler");
        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
        debug!("Destroyed sampler");
    }
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

fn record_transition(
    cmd: &crate::command::CommandBuffer,
    image: vk::Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) {
    // Only the two upload transitions are ever requested
    let Some(transition) = LayoutTransition::between(old, new) else {
        return;
    };

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_subresource_range())
        .src_access_mask(transition.src_access)
        .dst_access_mask(transition.dst_access);

    cmd.image_barrier(transition.src_stage, transition.dst_stage, &barrier);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_to_transfer_dst() {
        let t = LayoutTransition::between(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(t.src_access, vk::AccessFlags::empty());
        assert_eq!(t.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(t.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(t.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn test_transition_to_shader_read() {
        let t = LayoutTransition::between(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(t.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(t.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(t.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(t.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_unsupported_transition() {
        assert!(
            LayoutTransition::between(
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::PRESENT_SRC_KHR
            )
            .is_none()
        );
    }

    #[test]
    fn test_rgba_byte_len() {
        assert_eq!(rgba_byte_len(1, 1), 4);
        assert_eq!(rgba_byte_len(16, 8), 512);
    }

    #[test]
    fn test_color_subresource_range() {
        let range = color_subresource_range();
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(range.level_count, 1);
        assert_eq!(range.layer_count, 1);
    }
}
