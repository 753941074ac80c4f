//! Vulkan implementation of the frame steps.
//!
//! [`VulkanFrameBackend`] owns everything the frame cycle touches: the
//! swapchain, the render pass and its framebuffers, and the per-slot
//! command buffers and sync objects.
//!
//! # Synchronization
//!
//! ```text
//! per slot:   command buffer, image_available semaphore, in_flight fence
//! per image:  render_finished semaphore
//! ```
//!
//! The render-finished semaphore is indexed by swapchain image: presentation
//! of an image waits on it, and the image index need not match the slot.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use toy2d_rhi::command::CommandBuffer;
use toy2d_rhi::command_manager::CommandManager;
use toy2d_rhi::device::Device;
use toy2d_rhi::render_pass::{Framebuffers, RenderPass};
use toy2d_rhi::swapchain::Swapchain;
use toy2d_rhi::sync::{Fence, FenceState, Semaphore};
use toy2d_rhi::{RhiError, RhiResult};

use crate::frame_loop::FrameBackend;

/// Per-slot resources.
///
/// ```text
/// 1. Wait on in_flight_fence (previous use of this slot retired)
/// 2. Acquire swapchain image (signals image_available)
/// 3. Record command_buffer
/// 4. Submit: wait image_available, signal render_finished[image], arm in_flight_fence
/// ```
struct FrameSlot {
    /// Command buffer for recording rendering commands.
    command_buffer: CommandBuffer,
    /// Semaphore signaled when the acquired image is ready.
    image_available: Semaphore,
    /// Fence signaled when this slot's submission retires.
    in_flight_fence: Fence,
}

impl FrameSlot {
    fn new(device: Arc<Device>, command_buffer: vk::CommandBuffer) -> RhiResult<Self> {
        let command_buffer = CommandBuffer::from_handle(device.clone(), command_buffer);
        let image_available = Semaphore::new(device.clone())?;
        let in_flight_fence = Fence::new(device, FenceState::Signaled)?;

        Ok(Self {
            command_buffer,
            image_available,
            in_flight_fence,
        })
    }
}

/// Frame steps over a real device and swapchain.
///
/// Not thread-safe; drive it from the thread that owns the window.
pub struct VulkanFrameBackend {
    // Field order is drop order: sync objects, framebuffers, pass, swapchain
    slots: Vec<FrameSlot>,
    render_finished: Vec<Semaphore>,
    framebuffers: Framebuffers,
    render_pass: RenderPass,
    swapchain: Swapchain,
    device: Arc<Device>,
    clear_color: [f32; 4],
}

impl VulkanFrameBackend {
    /// Builds the render pass, one framebuffer per swapchain image and
    /// `frames_in_flight` slots with command buffers from `commands`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ResourceCreationError`] if `frames_in_flight` is
    /// zero or any object cannot be created.
    pub fn new(
        device: Arc<Device>,
        swapchain: Swapchain,
        commands: &CommandManager,
        frames_in_flight: usize,
        clear_color: [f32; 4],
    ) -> RhiResult<Self> {
        if frames_in_flight == 0 {
            return Err(RhiError::ResourceCreationError(
                "at least one frame in flight is required".to_string(),
            ));
        }

        let render_pass = RenderPass::new(device.clone(), swapchain.format())?;
        let framebuffers = Framebuffers::new(
            device.clone(),
            &render_pass,
            swapchain.image_views(),
            swapchain.extent(),
        )?;

        let slots = commands
            .allocate(frames_in_flight as u32)?
            .into_iter()
            .enumerate()
            .map(|(i, buffer)| {
                debug!("Created frame slot {}", i);
                FrameSlot::new(device.clone(), buffer)
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let render_finished = (0..swapchain.image_count())
            .map(|_| Semaphore::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Frame backend created: {} frames in flight, {} swapchain images",
            frames_in_flight,
            render_finished.len()
        );

        Ok(Self {
            slots,
            render_finished,
            framebuffers,
            render_pass,
            swapchain,
            device,
            clear_color,
        })
    }

    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Command buffer handles of every slot, in slot order.
    pub fn command_buffers(&self) -> Vec<vk::CommandBuffer> {
        self.slots
            .iter()
            .map(|slot| slot.command_buffer.handle())
            .collect()
    }

    fn slot(&self, slot: usize) -> RhiResult<&FrameSlot> {
        self.slots.get(slot).ok_or_else(|| {
            RhiError::InvalidAccess(format!(
                "frame slot {} out of range ({} slots)",
                slot,
                self.slots.len()
            ))
        })
    }

    fn render_finished(&self, image_index: u32) -> RhiResult<&Semaphore> {
        self.render_finished
            .get(image_index as usize)
            .ok_or(RhiError::AcquisitionError(vk::Result::ERROR_UNKNOWN))
    }
}

impl FrameBackend for VulkanFrameBackend {
    type Commands = CommandBuffer;

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn wait_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.slot(slot)?.in_flight_fence.wait_and_reset()
    }

    fn acquire(&mut self, slot: usize) -> RhiResult<u32> {
        let semaphore = self.slot(slot)?.image_available.handle();
        self.swapchain.acquire_next_image(semaphore)
    }

    fn record<F>(&mut self, slot: usize, image_index: u32, draw: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer),
    {
        let framebuffer = self
            .framebuffers
            .get(image_index)
            .ok_or(RhiError::AcquisitionError(vk::Result::ERROR_UNKNOWN))?;
        let cmd = &self.slot(slot)?.command_buffer;

        cmd.reset().map_err(recording_failed)?;
        cmd.begin_one_time().map_err(recording_failed)?;
        cmd.begin_render_pass(
            self.render_pass.handle(),
            framebuffer,
            self.swapchain.extent(),
            self.clear_color,
        );
        draw(cmd);
        cmd.end_render_pass();
        cmd.end().map_err(recording_failed)
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let frame = self.slot(slot)?;

        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished(image_index)?.handle()];
        let command_buffers = [frame.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                std::slice::from_ref(&submit_info),
                frame.in_flight_fence.handle(),
            )
        }
        .map_err(submit_failed)
    }

    fn present(&mut self, _slot: usize, image_index: u32) -> RhiResult<()> {
        let wait = self.render_finished(image_index)?.handle();
        self.swapchain
            .present(self.device.present_queue(), image_index, wait)
    }
}

/// Command buffer failures inside a frame are recording failures.
fn recording_failed(err: RhiError) -> RhiError {
    match err {
        RhiError::VulkanError(result) => RhiError::RecordingError(result),
        other => other,
    }
}

fn submit_failed(result: vk::Result) -> RhiError {
    match result {
        vk::Result::ERROR_DEVICE_LOST => RhiError::DeviceLostError(result),
        other => RhiError::SubmissionError(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_failures_are_fatal() {
        let err = recording_failed(RhiError::VulkanError(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
        assert!(matches!(
            err,
            RhiError::RecordingError(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_submit_failures_are_fatal() {
        let lost = submit_failed(vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(lost, RhiError::DeviceLostError(_)));

        let oom = submit_failed(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        assert!(matches!(oom, RhiError::SubmissionError(_)));
        assert!(oom.is_fatal());
        assert_eq!(oom.stage(), "submission");
    }
}
