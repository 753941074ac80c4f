//! Staged transfers into device-local memory.
//!
//! Uploads go through a host-visible staging buffer and a one-shot GPU copy,
//! followed by a blocking wait for the graphics queue to go idle. Uploads
//! happen at initialization or on state change, never per frame, so the
//! full queue stall is acceptable.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::command_manager::CommandManager;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Host-visible source buffer paired with a device-local destination of the
/// same byte size.
///
/// The staging half is only ever the source of a copy. Draw commands bind
/// [`StagedBuffer::device_local`].
pub struct StagedBuffer {
    staging: Buffer,
    device_local: Buffer,
}

impl StagedBuffer {
    /// Creates the pair for a device-local buffer of `usage` and `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ResourceCreationError`] if `usage` is not a
    /// device-local role or either allocation fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if !usage
            .memory_properties()
            .contains(vk::MemoryPropertyFlags::DEVICE_LOCAL)
        {
            return Err(RhiError::ResourceCreationError(format!(
                "{} buffers are not device-local and cannot be staged",
                usage.name()
            )));
        }

        let staging = Buffer::new(device.clone(), BufferUsage::Staging, size)?;
        let device_local = Buffer::new(device, usage, size)?;

        Ok(Self {
            staging,
            device_local,
        })
    }

    /// Creates the pair sized to `bytes` and uploads them.
    pub fn with_data(
        device: Arc<Device>,
        commands: &CommandManager,
        usage: BufferUsage,
        bytes: &[u8],
    ) -> RhiResult<Self> {
        let staged = Self::new(device, usage, bytes.len() as vk::DeviceSize)?;
        staged.upload(commands, bytes)?;
        Ok(staged)
    }

    /// Copies `bytes` into the device-local buffer.
    ///
    /// Maps the staging buffer, copies, unmaps, records a one-shot copy of
    /// the full range, submits it to the graphics queue and blocks until the
    /// queue is idle.
    ///
    /// # Errors
    ///
    /// [`RhiError::InvalidAccess`] if `bytes` does not match the buffer size,
    /// [`RhiError::DeviceLostError`] if the queue wait fails.
    pub fn upload(&self, commands: &CommandManager, bytes: &[u8]) -> RhiResult<()> {
        let size = self.device_local.size();
        if bytes.len() as vk::DeviceSize != size {
            return Err(RhiError::InvalidAccess(format!(
                "staged upload of {} bytes into a {} byte buffer",
                bytes.len(),
                size
            )));
        }

        self.staging.write(0, bytes)?;

        let (src, dst) = (self.staging.handle(), self.device_local.handle());
        let queue = commands.device().graphics_queue();
        commands.execute_one_shot_and_wait(queue, |cmd| cmd.copy_buffer(src, dst, size))?;

        debug!("Staged upload of {} bytes complete", size);
        Ok(())
    }

    /// Copies the device-local contents back to the host.
    ///
    /// Goes through a transient host-visible `TRANSFER_DST` buffer.
    pub fn read_back(&self, commands: &CommandManager) -> RhiResult<Vec<u8>> {
        let size = self.device_local.size();
        let readback = Buffer::new(commands.device().clone(), BufferUsage::Readback, size)?;

        let (src, dst) = (self.device_local.handle(), readback.handle());
        let queue = commands.device().graphics_queue();
        commands.execute_one_shot_and_wait(queue, |cmd| cmd.copy_buffer(src, dst, size))?;

        readback.read(0, size as usize)
    }

    /// The buffer draw commands bind.
    #[inline]
    pub fn device_local(&self) -> &Buffer {
        &self.device_local
    }

    /// The host-visible upload source.
    #[inline]
    pub fn staging(&self) -> &Buffer {
        &self.staging
    }

    /// Size of each half in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.device_local.size()
    }
}
