//! Device-facing endpoints.
//!
//! [`LineOut`] is the root that a device renders. [`LineIn`] is a source fed
//! by the device's capture stream through an [`InputFeed`]: the device pushes
//! captured frames into per-channel rings and the node drains them once per
//! block. Under- and overruns are recorded, never reported as errors.

use std::sync::Arc;

use crate::buffer::Buffer;
use crate::node::{ChannelMode, NodeFormat, ProcessContext, Processor, DEFAULT_MAX_BUSES};
use crate::ring_buffer::{RingBuffer, RingReader, RingWriter, RunCounter};

/// Graph sink delivering to the device output.
///
/// Fixed at the device's channel count; accepts inputs but has no outputs.
/// Enables itself once initialized.
#[derive(Debug, Clone)]
pub struct LineOut {
    channels: usize,
}

impl LineOut {
    /// Creates a sink with `channels` channels.
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.max(1),
        }
    }
}

impl Processor for LineOut {
    fn process(&mut self, _buffer: &mut Buffer, _ctx: &ProcessContext) {}

    fn format(&self) -> NodeFormat {
        NodeFormat {
            channels: self.channels,
            mode: ChannelMode::Fixed,
            auto_enable: true,
            max_inputs: DEFAULT_MAX_BUSES,
            max_outputs: 0,
        }
    }

    fn name(&self) -> &'static str {
        "line_out"
    }
}

/// Source node playing captured device input.
pub struct LineIn {
    readers: Vec<RingReader>,
    underruns: Arc<RunCounter>,
    overruns: Arc<RunCounter>,
}

impl LineIn {
    /// Creates a line input with rings of `capacity` frames per channel, and
    /// the feed the device pushes into.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(channels: usize, capacity: usize) -> (LineIn, InputFeed) {
        let channels = channels.max(1);
        let capacity = capacity.max(1);
        let (writers, readers): (Vec<_>, Vec<_>) = (0..channels).map(|_| RingBuffer::new(capacity)).unzip();
        let overruns = Arc::new(RunCounter::new());
        let feed = InputFeed {
            writers,
            scratch: vec![0.0; capacity],
            overruns: Arc::clone(&overruns),
            frames_pushed: 0,
        };
        (
            LineIn {
                readers,
                underruns: Arc::new(RunCounter::new()),
                overruns,
            },
            feed,
        )
    }

    /// Frame of the last underrun since the previous call.
    pub fn take_last_underrun(&self) -> Option<u64> {
        self.underruns.take_last()
    }

    /// Frame (counted in pushed input frames) of the last overrun since the
    /// previous call.
    pub fn take_last_overrun(&self) -> Option<u64> {
        self.overruns.take_last()
    }

    /// Shared underrun recorder, for lock-free polling.
    pub fn underruns(&self) -> Arc<RunCounter> {
        Arc::clone(&self.underruns)
    }

    /// Shared overrun recorder, for lock-free polling.
    pub fn overruns(&self) -> Arc<RunCounter> {
        Arc::clone(&self.overruns)
    }
}

impl Processor for LineIn {
    fn process(&mut self, buffer: &mut Buffer, ctx: &ProcessContext) {
        let frames = ctx.frames.min(buffer.frames());
        let mut delivered = frames;
        for (reader, channel) in self.readers.iter_mut().zip(buffer.channels_iter_mut()) {
            let read = reader.read(&mut channel[..frames]);
            channel[read..].fill(0.0);
            delivered = delivered.min(read);
        }
        if delivered < frames {
            self.underruns.record(ctx.block_start_frame + delivered as u64);
        }
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::source(self.readers.len())
    }

    fn name(&self) -> &'static str {
        "line_in"
    }
}

/// Producer side of a [`LineIn`], owned by the device's capture callback.
///
/// Pushing never allocates: interleaved input is split through a scratch
/// buffer sized at construction.
pub struct InputFeed {
    writers: Vec<RingWriter>,
    scratch: Vec<f32>,
    overruns: Arc<RunCounter>,
    frames_pushed: u64,
}

impl InputFeed {
    /// Channel count expected by [`push_interleaved`](Self::push_interleaved).
    pub fn channels(&self) -> usize {
        self.writers.len()
    }

    /// Queues interleaved frames. Returns the number of frames accepted on
    /// every channel; the rest are dropped and recorded as an overrun.
    pub fn push_interleaved(&mut self, interleaved: &[f32]) -> usize {
        let channels = self.writers.len();
        let frames = interleaved.len() / channels;
        let chunk = self.scratch.len();

        let mut accepted = 0;
        let mut start = 0;
        while start < frames {
            let count = chunk.min(frames - start);
            let mut written = count;
            for (ch, writer) in self.writers.iter_mut().enumerate() {
                for (i, sample) in self.scratch[..count].iter_mut().enumerate() {
                    *sample = interleaved[(start + i) * channels + ch];
                }
                written = written.min(writer.write(&self.scratch[..count]));
            }
            accepted += written;
            if written < count {
                break;
            }
            start += count;
        }

        if accepted < frames {
            self.overruns.record(self.frames_pushed + accepted as u64);
        }
        self.frames_pushed += frames as u64;
        accepted
    }

    /// Queues a planar buffer. Returns the number of frames accepted.
    pub fn push_planar(&mut self, buffer: &Buffer) -> usize {
        let frames = buffer.frames();
        let mut accepted = frames;
        for (writer, channel) in self.writers.iter_mut().zip(buffer.channels_iter()) {
            accepted = accepted.min(writer.write(channel));
        }
        if accepted < frames {
            self.overruns.record(self.frames_pushed + accepted as u64);
        }
        self.frames_pushed += frames as u64;
        accepted
    }
}
