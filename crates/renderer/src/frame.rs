//! Frame slot rotation.

/// Default number of frames that may be in flight at once.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Which frame slot the next frame uses.
///
/// Advances `(current + 1) mod count` once per frame, independently of the
/// swapchain image index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotCursor {
    /// Current slot (0 to count - 1)
    current: usize,
    /// Number of slots, at least 1
    count: usize,
}

impl SlotCursor {
    /// Creates a cursor over `count` slots starting at slot 0.
    ///
    /// A count of zero is treated as one.
    pub fn new(count: usize) -> Self {
        Self {
            current: 0,
            count: count.max(1),
        }
    }

    /// Get the current slot index.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Get the number of slots.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Advance to the next slot and return it.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.count;
        self.current
    }
}

impl Default for SlotCursor {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES_IN_FLIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_period_matches_count() {
        for count in 1..=4 {
            let mut cursor = SlotCursor::new(count);
            let seq: Vec<usize> = (0..count * 3)
                .map(|_| {
                    let slot = cursor.current();
                    cursor.advance();
                    slot
                })
                .collect();
            for (i, slot) in seq.iter().enumerate() {
                assert_eq!(*slot, i % count);
            }
        }
    }

    #[test]
    fn test_zero_count_is_one_slot() {
        let mut cursor = SlotCursor::new(0);
        assert_eq!(cursor.count(), 1);
        assert_eq!(cursor.advance(), 0);
    }

    #[test]
    fn test_default_is_double_buffered() {
        let mut cursor = SlotCursor::default();
        assert_eq!(cursor.current(), 0);
        assert_eq!(cursor.advance(), 1);
        assert_eq!(cursor.advance(), 0);
    }
}
