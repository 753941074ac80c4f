//! Uniform data shared with the fragment shader.
//!
//! Every frame slot has its own uniform buffer. An update must reach all of
//! them, otherwise a slot drawn later would still read the old value.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use toy2d_rhi::buffer::{Buffer, BufferUsage};
use toy2d_rhi::device::Device;
use toy2d_rhi::{RhiResult, vk};

/// Uniform buffer data.
///
/// # Memory Layout
///
/// - Offset 0: opacity (4 bytes)
/// - Total size: 4 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct UniformObject {
    /// Multiplier applied to the sampled color's alpha.
    pub opacity: f32,
}

impl UniformObject {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(opacity: f32) -> Self {
        Self { opacity }
    }
}

impl Default for UniformObject {
    fn default() -> Self {
        Self { opacity: 1.0 }
    }
}

/// Destination for one per-slot copy of the uniform data.
pub trait UniformSink {
    /// Overwrites the start of the sink with `bytes`.
    fn write_uniform(&self, bytes: &[u8]) -> RhiResult<()>;
}

impl UniformSink for Buffer {
    fn write_uniform(&self, bytes: &[u8]) -> RhiResult<()> {
        self.write(0, bytes)
    }
}

/// One uniform sink per frame slot.
pub struct UniformSet<S = Buffer> {
    sinks: Vec<S>,
}

impl<S: UniformSink> UniformSet<S> {
    pub fn new(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    /// Writes `value` into every slot's copy.
    ///
    /// Stops at the first failing sink.
    pub fn write_all<T: Pod>(&self, value: &T) -> RhiResult<()> {
        let bytes = bytemuck::bytes_of(value);
        for sink in &self.sinks {
            sink.write_uniform(bytes)?;
        }
        Ok(())
    }

    /// Sink for `slot`.
    pub fn get(&self, slot: usize) -> Option<&S> {
        self.sinks.get(slot)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.sinks.iter()
    }
}

impl UniformSet<Buffer> {
    /// One host-visible uniform buffer per slot, each holding the default
    /// [`UniformObject`].
    pub fn allocate(device: Arc<Device>, slot_count: usize) -> RhiResult<Self> {
        let buffers = (0..slot_count)
            .map(|_| {
                Buffer::new(
                    device.clone(),
                    BufferUsage::Uniform,
                    UniformObject::SIZE as vk::DeviceSize,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;
        let set = Self::new(buffers);
        set.write_all(&UniformObject::default())?;
        Ok(set)
    }

    /// Waits for `device` to go idle, then writes `value` into every slot.
    ///
    /// No frame can be reading a slot while it is overwritten.
    pub fn update(&self, device: &Device, value: &UniformObject) -> RhiResult<()> {
        device.wait_idle()?;
        self.write_all(value)
    }
}
