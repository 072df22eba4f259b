//! Shared processed-frame clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

#[derive(Debug)]
struct ClockState {
    frames: AtomicU64,
    sample_rate: AtomicU32,
}

/// Cheaply cloneable view of a context's timeline.
///
/// The context advances the frame count once per rendered block, after every
/// node has processed it. [`Param`](crate::Param) reads it to turn "now" into
/// an absolute time when a ramp is scheduled.
#[derive(Debug, Clone)]
pub struct Clock {
    state: Arc<ClockState>,
}

impl Clock {
    /// Creates a clock at frame zero.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: Arc::new(ClockState {
                frames: AtomicU64::new(0),
                sample_rate: AtomicU32::new(sample_rate),
            }),
        }
    }

    /// Frames rendered so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.state.frames.load(Ordering::Acquire)
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.state.sample_rate.load(Ordering::Relaxed)
    }

    /// Seconds rendered so far.
    pub fn seconds(&self) -> f64 {
        let sr = self.sample_rate();
        if sr == 0 {
            0.0
        } else {
            self.frames() as f64 / f64::from(sr)
        }
    }

    pub(crate) fn advance(&self, frames: usize) {
        self.state.frames.fetch_add(frames as u64, Ordering::AcqRel);
    }

    pub(crate) fn set_sample_rate(&self, sample_rate: u32) {
        self.state.sample_rate.store(sample_rate, Ordering::Relaxed);
    }
}
