//! The per-frame state machine.
//!
//! Every frame runs the same six steps against one frame slot:
//!
//! ```text
//! 1. wait_slot  block on the slot's fence, then reset it
//! 2. acquire    next swapchain image, signals the slot's acquire semaphore
//! 3. record     reset + begin the slot's command buffer, render pass, draw callback
//! 4. submit     wait acquire semaphore, signal render_finished[image], arm the fence
//! 5. present    wait render_finished[image]
//! 6. advance    slot = (slot + 1) % frames_in_flight
//! ```
//!
//! [`FrameLoop`] owns the ordering; a [`FrameBackend`] supplies the steps.
//! Any step failing ends the frame with the error and leaves the slot
//! where it was. The loop then stays halted: once step 1 has reset the
//! slot's fence, nothing will signal it again, so another frame on that
//! slot would wait forever.

use toy2d_rhi::{RhiError, RhiResult};
use tracing::{debug, trace};

use crate::frame::SlotCursor;

/// Slot and image used by one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameIndices {
    /// Frame slot, cycles with period `frames_in_flight`.
    pub slot: usize,
    /// Swapchain image returned by acquire. Not tied to the slot.
    pub image_index: u32,
}

/// The primitive steps of one frame.
pub trait FrameBackend {
    /// Handle the draw callback records into.
    type Commands;

    /// Number of frame slots the backend owns.
    fn slot_count(&self) -> usize;

    /// Blocks until `slot`'s previous submission has retired, then resets
    /// its fence.
    fn wait_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Acquires the next presentable image, signaling `slot`'s acquire
    /// semaphore.
    fn acquire(&mut self, slot: usize) -> RhiResult<u32>;

    /// Records `slot`'s command buffer for `image_index`. `draw` runs inside
    /// the render pass.
    fn record<F>(&mut self, slot: usize, image_index: u32, draw: F) -> RhiResult<()>
    where
        F: FnOnce(&Self::Commands);

    /// Submits `slot`'s command buffer.
    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Queues `image_index` for presentation.
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;
}

/// Drives a [`FrameBackend`] through the frame cycle.
pub struct FrameLoop<B> {
    backend: B,
    cursor: SlotCursor,
    frames_presented: u64,
    /// Stage of the failure that stopped the loop.
    halted: Option<&'static str>,
}

impl<B: FrameBackend> FrameLoop<B> {
    pub fn new(backend: B) -> Self {
        let cursor = SlotCursor::new(backend.slot_count());
        Self {
            backend,
            cursor,
            frames_presented: 0,
            halted: None,
        }
    }

    /// Runs one complete frame. `draw` records the frame's draw commands.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error. All of them are fatal for the
    /// frame loop; the slot is not advanced. Every later call returns
    /// [`RhiError::FrameLoopHalted`] without touching the backend.
    pub fn run_frame<F>(&mut self, draw: F) -> RhiResult<FrameIndices>
    where
        F: FnOnce(&B::Commands, FrameIndices),
    {
        if let Some(stage) = self.halted {
            return Err(RhiError::FrameLoopHalted(stage));
        }

        let result = self.cycle(draw);
        if let Err(e) = &result {
            debug!("Frame loop halted at slot {}: {}", self.cursor.current(), e);
            self.halted = Some(e.stage());
        }
        result
    }

    fn cycle<F>(&mut self, draw: F) -> RhiResult<FrameIndices>
    where
        F: FnOnce(&B::Commands, FrameIndices),
    {
        let slot = self.cursor.current();

        self.backend.wait_slot(slot)?;
        let image_index = self.backend.acquire(slot)?;
        let indices = FrameIndices { slot, image_index };
        trace!("Frame {}: slot {}, image {}", self.frames_presented, slot, image_index);

        self.backend
            .record(slot, image_index, |commands| draw(commands, indices))?;
        self.backend.submit(slot, image_index)?;
        self.backend.present(slot, image_index)?;

        self.cursor.advance();
        self.frames_presented += 1;
        Ok(indices)
    }

    /// Slot the next frame will use.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.cursor.current()
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.cursor.count()
    }

    /// True after a frame failed.
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Number of frames that completed all six steps.
    #[inline]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
