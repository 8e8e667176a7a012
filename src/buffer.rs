//! The sliding buffer (`C2`): a fixed-capacity byte window with head/tail
//! cursors and explicit compaction.

/// A fixed-capacity byte window supporting append-at-tail and consume-at-head
/// with compaction.
///
/// Invariants: `start <= end <= capacity`. The readable region is
/// `[start, end)`; the writable residual is `[end, capacity)`. `start` and
/// `end` only move forward between calls to [`SlidingBuffer::slide`], which
/// is the only operation that may reset `start` back to zero.
#[derive(Debug)]
pub struct SlidingBuffer {
    data: Vec<u8>,
    start: usize,
    end: usize,
}

impl SlidingBuffer {
    /// Constructs a new, empty buffer with the given fixed capacity.
    pub fn new(capacity: usize) -> Self {
        SlidingBuffer {
            data: vec![0u8; capacity],
            start: 0,
            end: 0,
        }
    }

    /// The total fixed capacity of this buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The readable region `[start, end)`.
    pub fn readable(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    /// The writable residual `[end, capacity)`.
    pub fn writable_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.end..]
    }

    /// The number of unread bytes currently held.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True if no unread bytes are held.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The number of bytes of writable residual *without* compacting.
    pub fn residual(&self) -> usize {
        self.capacity() - self.end
    }

    /// Marks `n` bytes, previously returned by [`SlidingBuffer::writable_mut`],
    /// as now part of the readable region.
    pub fn advance_end(&mut self, n: usize) {
        debug_assert!(self.end + n <= self.capacity());
        self.end += n;
    }

    /// Marks `n` bytes, previously returned by [`SlidingBuffer::readable`], as
    /// consumed.
    pub fn advance_start(&mut self, n: usize) {
        debug_assert!(self.start + n <= self.end);
        self.start += n;
    }

    /// Compacts the buffer (moving `[start, end)` down to offset `0`)
    /// whenever the current residual is not strictly greater than `reserve`.
    ///
    /// Returns whether the residual *after* this call exceeds `reserve`.
    pub fn slide(&mut self, reserve: usize) -> bool {
        if self.residual() <= reserve {
            self.data.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        self.residual() > reserve
    }

    /// Resets the buffer to empty, discarding any unread bytes.
    ///
    /// Used when a malformed request must be dropped wholesale rather than
    /// resynchronised by scanning (spec §4.2).
    pub fn reset(&mut self) {
        self.start = 0;
        self.end = 0;
    }
}
