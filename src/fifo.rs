//! Index bookkeeping for a single-writer / single-reader ring over a buffer
//! the caller owns.
//!
//! `AbstractFifo` never touches element data. The writer asks where it may
//! write, fills those positions of its own buffer, then reports how much it
//! wrote; the reader does the same in the other direction. One position is
//! always left unused so that "full" and "empty" stay distinguishable.
//!
//! ```
//! use lfring::AbstractFifo;
//!
//! let mut buffer = [0u32; 8];
//! let fifo = AbstractFifo::new(buffer.len());
//!
//! let regions = fifo.prepare_to_write(3);
//! for (n, i) in regions.iter().enumerate() {
//!     buffer[i] = n as u32;
//! }
//! fifo.finished_write(regions.len());
//!
//! let regions = fifo.prepare_to_read(10);
//! let read: Vec<u32> = regions.iter().map(|i| buffer[i]).collect();
//! fifo.finished_read(regions.len());
//! assert_eq!(read, vec![0, 1, 2]);
//! ```

use std::ops::Range;

use crossbeam_utils::CachePadded;

use crate::invariant::invariant;
use crate::sync::{AtomicUsize, Ordering};

/// Up to two contiguous index ranges; the second one starts at 0 when the
/// region wraps past the end of the buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FifoRegions {
    /// Indices starting at the current cursor.
    pub first: Range<usize>,
    /// Indices after wrapping to the start of the buffer; often empty.
    pub second: Range<usize>,
}

impl FifoRegions {
    /// Total indices in both regions.
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    /// No index at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every buffer index covered, in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = usize> {
        self.first.clone().chain(self.second.clone())
    }

    fn split(start: usize, count: usize, total: usize, wrap_limit: usize) -> Self {
        let first_len = (total - start).min(count);
        let second_len = (count - first_len).min(wrap_limit);
        FifoRegions {
            first: start..start + first_len,
            second: 0..second_len,
        }
    }
}

/// Read and write cursors for a ring buffer of `total_size` elements kept
/// elsewhere. Safe for one writer thread and one reader thread at a time.
pub struct AbstractFifo {
    total: usize,
    valid_start: CachePadded<AtomicUsize>,
    valid_end: CachePadded<AtomicUsize>,
}

impl AbstractFifo {
    /// # Panics
    ///
    /// If `total_size` is zero.
    pub fn new(total_size: usize) -> Self {
        assert!(total_size > 0, "fifo size must be greater than 0");
        AbstractFifo {
            total: total_size,
            valid_start: CachePadded::new(AtomicUsize::new(0)),
            valid_end: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Size of the buffer being managed.
    pub fn total_size(&self) -> usize {
        self.total
    }

    /// Positions the writer may still fill.
    pub fn free_space(&self) -> usize {
        self.total - self.num_ready() - 1
    }

    /// Positions written but not yet read.
    pub fn num_ready(&self) -> usize {
        let start = self.valid_start.load(Ordering::Acquire);
        let end = self.valid_end.load(Ordering::Acquire);
        ready_between(start, end, self.total)
    }

    /// Forget all pending data.
    pub fn reset(&mut self) {
        self.valid_start.store(0, Ordering::Relaxed);
        self.valid_end.store(0, Ordering::Relaxed);
    }

    /// Change the buffer size. Pending data is discarded.
    ///
    /// # Panics
    ///
    /// If `total_size` is zero.
    pub fn set_total_size(&mut self, total_size: usize) {
        assert!(total_size > 0, "fifo size must be greater than 0");
        self.reset();
        self.total = total_size;
    }

    /// Where to write up to `count` elements. May return fewer, or none if
    /// the fifo is full.
    pub fn prepare_to_write(&self, count: usize) -> FifoRegions {
        let start = self.valid_start.load(Ordering::Acquire);
        let end = self.valid_end.load(Ordering::Relaxed);

        let free = if end >= start {
            self.total - (end - start)
        } else {
            start - end
        };
        let count = count.min(free - 1);
        if count == 0 {
            return FifoRegions::default();
        }
        FifoRegions::split(end, count, self.total, start)
    }

    /// Publish `written` elements to the reader.
    pub fn finished_write(&self, written: usize) {
        invariant!(written < self.total);
        let mut end = self.valid_end.load(Ordering::Relaxed) + written;
        if end >= self.total {
            end -= self.total;
        }
        self.valid_end.store(end, Ordering::Release);
    }

    /// Where to read up to `count` elements. May return fewer, or none if
    /// nothing is ready.
    pub fn prepare_to_read(&self, count: usize) -> FifoRegions {
        let start = self.valid_start.load(Ordering::Relaxed);
        let end = self.valid_end.load(Ordering::Acquire);

        let count = count.min(ready_between(start, end, self.total));
        if count == 0 {
            return FifoRegions::default();
        }
        FifoRegions::split(start, count, self.total, end)
    }

    /// Hand `read` positions back to the writer.
    pub fn finished_read(&self, read: usize) {
        invariant!(read <= self.total);
        let mut start = self.valid_start.load(Ordering::Relaxed) + read;
        if start >= self.total {
            start -= self.total;
        }
        self.valid_start.store(start, Ordering::Release);
    }
}

impl std::fmt::Debug for AbstractFifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbstractFifo")
            .field("total", &self.total)
            .field("ready", &self.num_ready())
            .finish()
    }
}

#[inline]
fn ready_between(start: usize, end: usize, total: usize) -> usize {
    if end >= start {
        end - start
    } else {
        total - (start - end)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn fresh_fifo() {
        let fifo = AbstractFifo::new(10);
        assert_eq!(fifo.total_size(), 10);
        assert_eq!(fifo.num_ready(), 0);
        assert_eq!(fifo.free_space(), 9);
        assert!(fifo.prepare_to_read(4).is_empty());
    }

    #[test]
    fn write_is_capped_by_free_space() {
        let fifo = AbstractFifo::new(10);
        let regions = fifo.prepare_to_write(50);
        assert_eq!(regions.first, 0..9);
        assert_eq!(regions.second, 0..0);
        fifo.finished_write(regions.len());
        assert_eq!(fifo.free_space(), 0);
        assert!(fifo.prepare_to_write(1).is_empty());
    }

    #[test]
    fn regions_wrap_around() {
        let fifo = AbstractFifo::new(10);
        fifo.finished_write(fifo.prepare_to_write(7).len());
        fifo.finished_read(fifo.prepare_to_read(6).len());

        // start = 6, end = 7: writing 8 covers 7..10 then 0..5.
        let regions = fifo.prepare_to_write(8);
        assert_eq!(regions.first, 7..10);
        assert_eq!(regions.second, 0..5);
        fifo.finished_write(regions.len());
        assert_eq!(fifo.num_ready(), 9);

        let regions = fifo.prepare_to_read(100);
        assert_eq!(regions.first, 6..10);
        assert_eq!(regions.second, 0..5);
        assert_eq!(regions.iter().collect::<Vec<_>>(), vec![6, 7, 8, 9, 0, 1, 2, 3, 4]);
        fifo.finished_read(regions.len());
        assert_eq!(fifo.num_ready(), 0);
        assert_eq!(fifo.free_space(), 9);
    }

    #[test]
    fn set_total_size_discards_pending() {
        let mut fifo = AbstractFifo::new(4);
        fifo.finished_write(fifo.prepare_to_write(3).len());
        fifo.set_total_size(16);
        assert_eq!(fifo.total_size(), 16);
        assert_eq!(fifo.num_ready(), 0);
        assert_eq!(fifo.free_space(), 15);
    }

    #[test]
    #[should_panic(expected = "fifo size must be greater than 0")]
    fn zero_size_panics() {
        let _ = AbstractFifo::new(0);
    }
}
