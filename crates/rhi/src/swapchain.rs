//! The presentable image chain.
//!
//! [`SwapchainConfig::negotiate`] turns what the surface supports plus the
//! caller's [`SwapchainOptions`] into concrete settings; it is pure and runs
//! without a device. [`Swapchain`] builds the chain and one color view per
//! image from those settings.
//!
//! There is no recreation path: the window is fixed-size, and any
//! non-success acquire or present result is surfaced as a fatal error
//! ([`RhiError::AcquisitionError`], [`RhiError::PresentationError`]).

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::surface::{Surface, SurfaceSupport};

/// Caller preferences applied when negotiating the image chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainOptions {
    /// Requested image count before clamping to the surface limits
    pub preferred_image_count: u32,
    /// Use MAILBOX when the surface offers it, FIFO otherwise
    pub prefer_mailbox: bool,
}

impl Default for SwapchainOptions {
    fn default() -> Self {
        Self {
            preferred_image_count: 2,
            prefer_mailbox: true,
        }
    }
}

/// Settings the swapchain is created with.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub min_image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfig {
    /// Picks format, present mode, extent and image count for a window of
    /// `width` x `height` pixels.
    ///
    /// Format: 8-bit BGRA or RGBA sRGB in the sRGB nonlinear color space if
    /// offered, else the first reported. Present mode: MAILBOX when
    /// preferred and offered, else FIFO (always available). Extent: the
    /// surface's current extent when defined, else the window size clamped
    /// to the surface limits. Image count: the preference clamped to
    /// `min..=max`, where a max of 0 means unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the surface reports no
    /// formats or no present modes.
    pub fn negotiate(
        support: &SurfaceSupport,
        width: u32,
        height: u32,
        options: SwapchainOptions,
    ) -> RhiResult<Self> {
        if !support.is_usable() {
            return Err(RhiError::SwapchainError(
                "surface reports no formats or present modes".to_string(),
            ));
        }

        let surface_format = support
            .formats
            .iter()
            .copied()
            .find(is_srgb_8bit)
            .or_else(|| {
                let first = support.formats.first().copied();
                if let Some(format) = first {
                    warn!("No sRGB surface format, using {:?}", format.format);
                }
                first
            })
            .ok_or_else(|| RhiError::SwapchainError("surface reports no formats".to_string()))?;

        let present_mode = if options.prefer_mailbox
            && support.present_modes.contains(&vk::PresentModeKHR::MAILBOX)
        {
            vk::PresentModeKHR::MAILBOX
        } else {
            vk::PresentModeKHR::FIFO
        };

        let caps = &support.capabilities;
        let extent = if caps.current_extent.width != u32::MAX {
            caps.current_extent
        } else {
            vk::Extent2D {
                width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
                height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
            }
        };

        let mut min_image_count = options.preferred_image_count.max(caps.min_image_count);
        if caps.max_image_count > 0 {
            min_image_count = min_image_count.min(caps.max_image_count);
        }

        Ok(Self {
            surface_format,
            present_mode,
            extent,
            min_image_count,
            pre_transform: caps.current_transform,
        })
    }
}

fn is_srgb_8bit(format: &vk::SurfaceFormatKHR) -> bool {
    matches!(
        format.format,
        vk::Format::B8G8R8A8_SRGB | vk::Format::R8G8B8A8_SRGB
    ) && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
}

/// Owned swapchain handle plus its loader.
struct ChainHandle {
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
}

impl Drop for ChainHandle {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_swapchain(self.swapchain, None) };
    }
}

/// Color views over the swapchain images, destroyed on drop.
struct ImageViews {
    device: Arc<Device>,
    views: Vec<vk::ImageView>,
}

impl ImageViews {
    fn new(device: Arc<Device>, images: &[vk::Image], format: vk::Format) -> RhiResult<Self> {
        let mut created = Self {
            device,
            views: Vec::with_capacity(images.len()),
        };

        for (i, &image) in images.iter().enumerate() {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .level_count(1)
                        .layer_count(1),
                );

            // On error, dropping `created` releases the views made so far
            let view = unsafe { created.device.handle().create_image_view(&create_info, None) }
                .map_err(|e| {
                    RhiError::SwapchainError(format!("image view {} creation failed: {}", i, e))
                })?;
            created.views.push(view);
        }

        Ok(created)
    }
}

impl Drop for ImageViews {
    fn drop(&mut self) {
        for &view in &self.views {
            unsafe { self.device.handle().destroy_image_view(view, None) };
        }
    }
}

/// The image chain and one view per image.
///
/// The images belong to the swapchain. Views are released before the chain.
pub struct Swapchain {
    views: ImageViews,
    chain: ChainHandle,
    image_count: u32,
    config: SwapchainConfig,
}

impl Swapchain {
    /// Creates the swapchain for `surface`.
    ///
    /// Sharing is exclusive when graphics and present use the same queue
    /// family, else concurrent across both.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if negotiation fails or an image
    /// view cannot be created.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: &Surface,
        width: u32,
        height: u32,
        options: SwapchainOptions,
    ) -> RhiResult<Self> {
        let support = surface.query_support(device.physical_device())?;
        let config = SwapchainConfig::negotiate(&support, width, height, options)?;
        let (sharing_mode, families) = device.queue_families().sharing_mode();

        info!(
            "Creating swapchain {}x{}, {:?}, {:?}, at least {} images, {:?} sharing",
            config.extent.width,
            config.extent.height,
            config.surface_format.format,
            config.present_mode,
            config.min_image_count,
            sharing_mode
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(config.min_image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&families)
            .pre_transform(config.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true);

        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
        let chain = ChainHandle { loader, swapchain };

        let images = unsafe { chain.loader.get_swapchain_images(chain.swapchain)? };
        let views = ImageViews::new(device, &images, config.surface_format.format)?;
        debug!("Swapchain has {} images", images.len());

        Ok(Self {
            views,
            chain,
            image_count: images.len() as u32,
            config,
        })
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// Waits without timeout. The returned index selects the framebuffer and
    /// need not follow submission order.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::AcquisitionError`] for any result other than plain
    /// success, a suboptimal swapchain included.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<u32> {
        let result = unsafe {
            self.chain.loader.acquire_next_image(
                self.chain.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, false)) => Ok(index),
            Ok((_, true)) => Err(RhiError::AcquisitionError(vk::Result::SUBOPTIMAL_KHR)),
            Err(e) => Err(RhiError::AcquisitionError(e)),
        }
    }

    /// Queues `image_index` for presentation once `wait_semaphore` signals.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PresentationError`] for any result other than plain
    /// success, `SUBOPTIMAL_KHR` included.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<()> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.chain.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.chain.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(()),
            Ok(true) => Err(RhiError::PresentationError(vk::Result::SUBOPTIMAL_KHR)),
            Err(e) => Err(RhiError::PresentationError(e)),
        }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.config.surface_format.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }

    #[inline]
    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    /// Number of images the driver actually created.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.image_count
    }

    /// One view per image, in image order.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.views.views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        info!(
            "Destroying swapchain ({}x{}, {} images)",
            self.config.extent.width, self.config.extent.height, self.image_count
        );
    }
}
