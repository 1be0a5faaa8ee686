//! Lock-free triple buffer between the capture thread and the render loop.
//!
//! Three slots are split between the two sides: the writer owns one, the
//! reader owns one, and the third sits in `latest` as the most recently
//! published frame. Publishing and taking a frame both swap a slot index
//! through `latest`, so a slot is only ever reachable from one side at a time
//! and neither side waits for the other.

use crate::frame::Frame;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SLOT_COUNT: usize = 3;

const INDEX_MASK: usize = 0b011;
// Set while the slot in `latest` has been published but not yet taken.
const FRESH_BIT: usize = 0b100;

struct Shared {
    slots: [UnsafeCell<Frame>; SLOT_COUNT],
    latest: AtomicUsize,
}

// Each slot is owned by exactly one side at any time; ownership moves only
// through the AcqRel swaps on `latest`.
unsafe impl Sync for Shared {}

/// Creates the ring with all three slots pre-sized for `width` x `height`.
pub fn frame_ring(width: u32, height: u32) -> (FrameWriter, FrameReader) {
    let shared = Arc::new(Shared {
        slots: [
            UnsafeCell::new(Frame::new(width, height)),
            UnsafeCell::new(Frame::new(width, height)),
            UnsafeCell::new(Frame::new(width, height)),
        ],
        latest: AtomicUsize::new(1),
    });

    let writer = FrameWriter {
        shared: Arc::clone(&shared),
        write: 0,
        published: 0,
    };
    let reader = FrameReader {
        shared,
        read: 2,
        has_frame: false,
        taken: 0,
    };
    (writer, reader)
}

/// Producer half. Owned by the capture thread.
pub struct FrameWriter {
    shared: Arc<Shared>,
    write: usize,
    published: u64,
}

impl FrameWriter {
    /// The slot the producer may fill. Nothing written here is visible to the
    /// reader until [`publish`](Self::publish).
    pub fn acquire_write_slot(&mut self) -> &mut Frame {
        // SAFETY: `write` is never stored in `latest` nor held by the reader.
        unsafe { &mut *self.shared.slots[self.write].get() }
    }

    /// Hands the filled slot to the reader and takes back the previous
    /// unread-or-recycled slot as the next write target.
    pub fn publish(&mut self) {
        // Release makes the slot's pixel writes visible to the reader's acquire;
        // acquire makes the reader's last use of the returned slot happen-before
        // our next write into it.
        let previous = self
            .shared
            .latest
            .swap(self.write | FRESH_BIT, Ordering::AcqRel);
        self.write = previous & INDEX_MASK;
        self.published += 1;
    }

    pub fn write_index(&self) -> usize {
        self.write
    }

    /// Slot index currently parked in the hand-off position.
    pub fn latest_index(&self) -> usize {
        self.shared.latest.load(Ordering::Acquire) & INDEX_MASK
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

/// Consumer half. Owned by the render loop.
pub struct FrameReader {
    shared: Arc<Shared>,
    read: usize,
    has_frame: bool,
    taken: u64,
}

impl FrameReader {
    /// Returns the most recently published frame, or `None` if nothing has
    /// been published yet. When no new frame arrived since the last call the
    /// previously returned frame is handed out again.
    ///
    /// The frame is exclusively the reader's until the next call, so it may be
    /// annotated in place.
    pub fn try_latest(&mut self) -> Option<&mut Frame> {
        if self.shared.latest.load(Ordering::Relaxed) & FRESH_BIT != 0 {
            let previous = self.shared.latest.swap(self.read, Ordering::AcqRel);
            self.read = previous & INDEX_MASK;
            self.has_frame = true;
            self.taken += 1;
        }

        if !self.has_frame {
            return None;
        }

        // SAFETY: `read` came out of `latest` via the swap above; the writer
        // cannot obtain it until we swap it back.
        Some(unsafe { &mut *self.shared.slots[self.read].get() })
    }

    /// Whether a published frame is waiting that `try_latest` has not taken.
    pub fn has_fresh(&self) -> bool {
        self.shared.latest.load(Ordering::Acquire) & FRESH_BIT != 0
    }

    /// Number of distinct published frames taken so far.
    pub fn taken(&self) -> u64 {
        self.taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_start_disjoint() {
        let (writer, reader) = frame_ring(2, 2);
        assert_ne!(writer.write_index(), writer.latest_index());
        assert_ne!(writer.write_index(), reader.read);
        assert_ne!(writer.latest_index(), reader.read);
    }

    #[test]
    fn reader_reuses_frame_without_new_publish() {
        let (mut writer, mut reader) = frame_ring(1, 1);
        writer.acquire_write_slot().fill([7, 7, 7]);
        writer.publish();

        assert_eq!(reader.try_latest().map(|f| f.pixel(0, 0)), Some([7, 7, 7]));
        assert!(!reader.has_fresh());
        assert_eq!(reader.try_latest().map(|f| f.pixel(0, 0)), Some([7, 7, 7]));
        assert_eq!(reader.taken(), 1);
    }
}
