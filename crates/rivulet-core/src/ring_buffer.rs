//! Lock-free single-producer/single-consumer sample queue.
//!
//! [`RingBuffer::new`] returns a [`RingWriter`] and a [`RingReader`] sharing one
//! fixed-capacity ring. Each half can live on a different thread; neither side
//! ever blocks or allocates after construction.
//!
//! Cursors are monotonically increasing `u64` counters, so `write - read` is
//! always the number of queued samples and no slot is wasted to tell "full"
//! from "empty". Samples are stored as `f32` bit patterns in `AtomicU32` cells,
//! which keeps the implementation free of `unsafe`. Every cell access is
//! `Relaxed`; the cursor store (`Release`) and load (`Acquire`) on the other
//! side publish the cells.
//!
//! A short write count means overrun, a short read count means underrun. The
//! caller decides what to do; [`RunCounter`] records when it happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Default multiple of the block size used to size rings with headroom.
pub const DEFAULT_PADDING_FACTOR: usize = 2;

/// Ring capacity for `frames_per_block` frames with `padding_factor` blocks of
/// headroom. Never returns zero.
pub fn padded_capacity(frames_per_block: usize, padding_factor: usize) -> usize {
    (frames_per_block * padding_factor.max(1)).max(1)
}

struct Ring {
    cells: Box<[AtomicU32]>,
    /// Total samples ever read. Written only by the reader.
    read: AtomicU64,
    /// Total samples ever written. Written only by the writer.
    write: AtomicU64,
}

impl Ring {
    #[inline]
    fn capacity(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn slot(&self, cursor: u64) -> usize {
        (cursor % self.cells.len() as u64) as usize
    }

    fn queued(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        (write - read) as usize
    }
}

/// Constructor namespace for SPSC rings.
pub struct RingBuffer;

impl RingBuffer {
    /// Allocates a ring holding up to `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize) -> (RingWriter, RingReader) {
        assert!(capacity > 0, "ring capacity must be non-zero");
        let cells = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        let ring = Arc::new(Ring {
            cells,
            read: AtomicU64::new(0),
            write: AtomicU64::new(0),
        });
        (
            RingWriter {
                ring: Arc::clone(&ring),
            },
            RingReader { ring },
        )
    }
}

/// Producer half of a ring.
pub struct RingWriter {
    ring: Arc<Ring>,
}

impl RingWriter {
    /// Copies as many samples from `samples` as fit. Returns the number written.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let ring = &*self.ring;
        let write = ring.write.load(Ordering::Relaxed);
        let read = ring.read.load(Ordering::Acquire);
        let free = ring.capacity() - (write - read) as usize;
        let count = samples.len().min(free);

        for (offset, &sample) in samples[..count].iter().enumerate() {
            ring.cells[ring.slot(write + offset as u64)].store(sample.to_bits(), Ordering::Relaxed);
        }
        ring.write.store(write + count as u64, Ordering::Release);
        count
    }

    /// Number of samples that can be written without overrun.
    pub fn available_write(&self) -> usize {
        self.ring.capacity() - self.ring.queued()
    }

    /// Number of queued samples.
    pub fn available_read(&self) -> usize {
        self.ring.queued()
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Consumer half of a ring.
pub struct RingReader {
    ring: Arc<Ring>,
}

impl RingReader {
    /// Copies up to `out.len()` queued samples into `out`. Returns the number
    /// read; the remainder of `out` is left untouched.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let ring = &*self.ring;
        let read = ring.read.load(Ordering::Relaxed);
        let write = ring.write.load(Ordering::Acquire);
        let count = out.len().min((write - read) as usize);

        for (offset, sample) in out[..count].iter_mut().enumerate() {
            *sample = f32::from_bits(ring.cells[ring.slot(read + offset as u64)].load(Ordering::Relaxed));
        }
        ring.read.store(read + count as u64, Ordering::Release);
        count
    }

    /// Discards up to `count` queued samples. Returns the number discarded.
    pub fn skip(&mut self, count: usize) -> usize {
        let ring = &*self.ring;
        let read = ring.read.load(Ordering::Relaxed);
        let write = ring.write.load(Ordering::Acquire);
        let count = count.min((write - read) as usize);
        ring.read.store(read + count as u64, Ordering::Release);
        count
    }

    /// Discards everything currently queued.
    pub fn clear(&mut self) -> usize {
        self.skip(usize::MAX)
    }

    /// Number of queued samples.
    pub fn available_read(&self) -> usize {
        self.ring.queued()
    }

    /// Number of samples the writer could add right now.
    pub fn available_write(&self) -> usize {
        self.ring.capacity() - self.ring.queued()
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Records the frame at which the most recent under/overrun happened.
///
/// The realtime side calls [`record`](Self::record); a control thread polls
/// [`take_last`](Self::take_last). Frame numbers are stored off by one so that
/// zero means "nothing since the last poll".
#[derive(Debug, Default)]
pub struct RunCounter {
    last: AtomicU64,
    total: AtomicU64,
}

impl RunCounter {
    /// Creates a counter with no recorded events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event at `frame`.
    #[inline]
    pub fn record(&self, frame: u64) {
        self.last.store(frame.saturating_add(1), Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the frame of the latest event since the previous call, and clears it.
    pub fn take_last(&self) -> Option<u64> {
        match self.last.swap(0, Ordering::Relaxed) {
            0 => None,
            n => Some(n - 1),
        }
    }

    /// Total number of events recorded over the counter's lifetime.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
