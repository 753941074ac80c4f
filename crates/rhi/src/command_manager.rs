//! Command submission manager.
//!
//! [`CommandManager`] owns one command pool on the graphics family. It hands
//! out the long-lived per-slot command buffers and runs short one-shot
//! sequences (buffer copies, image layout transitions).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use toy2d_rhi::device::Device;
//! use toy2d_rhi::command_manager::CommandManager;
//!
//! # fn example(device: Arc<Device>, src: ash::vk::Buffer, dst: ash::vk::Buffer) -> Result<(), toy2d_rhi::RhiError> {
//! let commands = CommandManager::new(device.clone(), device.graphics_family())?;
//! commands.execute_one_shot_and_wait(device.graphics_queue(), |cmd| {
//!     cmd.copy_buffer(src, dst, 64);
//! })?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Owns a command pool and executes one-shot command sequences.
///
/// The pool allows per-buffer reset. Not thread-safe: record from one thread.
pub struct CommandManager {
    device: Arc<Device>,
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandManager {
    /// Creates a manager with a pool on `queue_family`.
    pub fn new(device: Arc<Device>, queue_family: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };

        info!("Command manager ready on queue family {}", queue_family);

        Ok(Self {
            device,
            pool,
            queue_family,
        })
    }

    /// Allocates `count` primary command buffers.
    ///
    /// They live until [`CommandManager::free`] or until the manager drops.
    pub fn allocate(&self, count: u32) -> RhiResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        let buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        debug!("Allocated {} command buffer(s)", buffers.len());
        Ok(buffers)
    }

    /// Records and submits a one-shot command buffer.
    ///
    /// The buffer begins with `ONE_TIME_SUBMIT`, `record` fills it, and it is
    /// submitted to `queue` with no semaphores and no fence. Completion is
    /// not awaited: the caller must wait for `queue` to go idle before
    /// passing the returned handle to [`CommandManager::free`].
    pub fn execute_one_shot<F>(&self, queue: vk::Queue, record: F) -> RhiResult<vk::CommandBuffer>
    where
        F: FnOnce(&CommandBuffer),
    {
        let handle = self.allocate(1)?.into_iter().next().ok_or_else(|| {
            RhiError::ResourceCreationError("pool returned no command buffer".to_string())
        })?;
        let cmd = CommandBuffer::from_handle(self.device.clone(), handle);

        let submitted = cmd
            .begin_one_time()
            .and_then(|()| {
                record(&cmd);
                cmd.end()
            })
            .and_then(|()| {
                let command_buffers = [handle];
                let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                unsafe {
                    self.device.handle().queue_submit(
                        queue,
                        std::slice::from_ref(&submit_info),
                        vk::Fence::null(),
                    )
                }
                .map_err(Into::into)
            });

        if let Err(e) = submitted {
            // Never reached the queue, so it is safe to release
            self.free(handle);
            return Err(e);
        }

        Ok(handle)
    }

    /// Runs [`CommandManager::execute_one_shot`], blocks until `queue` is idle,
    /// then frees the command buffer.
    ///
    /// The buffer is freed even when the wait fails: a lost device retires
    /// all of its pending work.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DeviceLostError`] if the queue wait fails.
    pub fn execute_one_shot_and_wait<F>(&self, queue: vk::Queue, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer),
    {
        let handle = self.execute_one_shot(queue, record)?;
        let waited = self.device.queue_wait_idle(queue);
        self.free(handle);
        waited
    }

    /// Returns one command buffer to the pool. It must not be pending.
    pub fn free(&self, buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.pool, std::slice::from_ref(&buffer));
        }
    }

    /// Resets every command buffer allocated from the pool.
    ///
    /// None of them may be pending on the GPU.
    pub fn reset_pool(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())?;
        }
        debug!("Command pool reset");
        Ok(())
    }

    #[inline]
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Drop for CommandManager {
    fn drop(&mut self) {
        // Frees every buffer still allocated from the pool
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        info!("Command pool destroyed (queue family {})", self.queue_family);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_manager_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandManager>();
    }
}
