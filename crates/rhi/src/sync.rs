//! Semaphores and fences.
//!
//! A [`Semaphore`] orders one queue operation after another on the GPU
//! (acquire before render, render before present). A [`Fence`] is the only
//! thing the host ever blocks on per frame: it guards reuse of a frame slot.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// GPU-only signal, created unsignaled.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let semaphore = unsafe {
            device
                .handle()
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        debug!("Semaphore created");
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Initial state of a [`Fence`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceState {
    /// The first wait returns at once. Frame slots start this way.
    Signaled,
    Unsignaled,
}

impl FenceState {
    fn create_flags(self) -> vk::FenceCreateFlags {
        match self {
            FenceState::Signaled => vk::FenceCreateFlags::SIGNALED,
            FenceState::Unsignaled => vk::FenceCreateFlags::empty(),
        }
    }
}

/// Host-awaitable signal armed by a queue submission.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    pub fn new(device: Arc<Device>, state: FenceState) -> RhiResult<Self> {
        let create_info = vk::FenceCreateInfo::default().flags(state.create_flags());
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        debug!("Fence created ({:?})", state);
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks without a timeout until the fence is signaled, then resets it
    /// so the next submission can arm it again.
    ///
    /// # Errors
    ///
    /// A failed wait is [`RhiError::DeviceLostError`]. A failed reset is
    /// reported as a plain Vulkan error.
    pub fn wait_and_reset(&self) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, u64::MAX)
                .map_err(RhiError::DeviceLostError)?;
            self.device.handle().reset_fences(&fences)?;
        }
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}
