//! Analysis tap.
//!
//! [`Tap`] passes its input through unchanged and copies every block into one
//! ring per channel. The paired [`TapReader`] lives on a control thread and
//! keeps a rolling window of the most recent samples. A tap with no consumer
//! is typically registered with
//! [`Context::add_auto_pulled`](crate::Context::add_auto_pulled).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::buffer::Buffer;
use crate::mix;
use crate::node::{InitContext, NodeFormat, ProcessContext, Processor};
use crate::ring_buffer::{DEFAULT_PADDING_FACTOR, RingBuffer, RingReader, RingWriter};

/// Passthrough node feeding a [`TapReader`].
pub struct Tap {
    writers: Vec<RingWriter>,
    active_channels: Arc<AtomicUsize>,
}

impl Tap {
    /// Creates a tap for up to `max_channels` channels and a reader holding
    /// the last `window` frames.
    ///
    /// # Panics
    ///
    /// Panics if `window` is zero.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(max_channels: usize, window: usize) -> (Tap, TapReader) {
        assert!(window > 0, "tap window must be non-zero");
        let max_channels = max_channels.max(1);
        let (writers, readers): (Vec<_>, Vec<_>) = (0..max_channels)
            .map(|_| RingBuffer::new(window * DEFAULT_PADDING_FACTOR))
            .unzip();
        let active_channels = Arc::new(AtomicUsize::new(0));
        let reader = TapReader {
            readers,
            window: Buffer::new(window, max_channels),
            scratch: vec![0.0; window * DEFAULT_PADDING_FACTOR],
            active_channels: Arc::clone(&active_channels),
        };
        (
            Tap {
                writers,
                active_channels,
            },
            reader,
        )
    }
}

impl Processor for Tap {
    fn process(&mut self, buffer: &mut Buffer, ctx: &ProcessContext) {
        let frames = ctx.frames.min(buffer.frames());
        for (writer, channel) in self.writers.iter_mut().zip(buffer.channels_iter()) {
            writer.write(&channel[..frames]);
        }
    }

    fn initialize(&mut self, ctx: &InitContext) {
        let active = ctx.channels.min(self.writers.len());
        self.active_channels.store(active, Ordering::Release);
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::effect()
    }

    fn name(&self) -> &'static str {
        "tap"
    }
}

/// Control-thread view of a [`Tap`].
pub struct TapReader {
    readers: Vec<RingReader>,
    window: Buffer,
    scratch: Vec<f32>,
    active_channels: Arc<AtomicUsize>,
}

impl TapReader {
    /// Channels the tap currently writes.
    pub fn channels(&self) -> usize {
        self.active_channels.load(Ordering::Acquire)
    }

    /// Frames held by the window.
    pub fn window_frames(&self) -> usize {
        self.window.frames()
    }

    /// Drains the rings into the rolling window.
    pub fn update(&mut self) {
        let window = self.window.frames();
        for (ch, reader) in self.readers.iter_mut().enumerate() {
            let count = reader.read(&mut self.scratch);
            if count == 0 {
                continue;
            }
            let fresh = &self.scratch[count.saturating_sub(window)..count];
            let samples = self.window.channel_mut(ch);
            samples.copy_within(fresh.len().., 0);
            samples[window - fresh.len()..].copy_from_slice(fresh);
        }
    }

    /// The latest window, oldest sample first. Channels past
    /// [`channels`](Self::channels) are silent.
    pub fn buffer(&mut self) -> &Buffer {
        self.update();
        &self.window
    }

    /// RMS level of the latest window across the active channels.
    pub fn volume(&mut self) -> f32 {
        self.update();
        let active = self.channels().min(self.window.channels());
        if active == 0 {
            return 0.0;
        }
        let mean_sq: f32 = (0..active)
            .map(|ch| {
                let r = mix::rms(self.window.channel(ch));
                r * r
            })
            .sum::<f32>()
            / active as f32;
        mean_sq.sqrt()
    }
}
