//! In-memory sample playback.

use std::sync::Arc;

use crate::buffer::Buffer;
use crate::node::{NodeFormat, ProcessContext, Processor};

/// Plays a shared, preloaded [`Buffer`].
///
/// The node has the buffer's channel count. Playback stops producing sound at
/// the end unless looping; starting a player that reached the end rewinds it.
#[derive(Debug, Clone)]
pub struct BufferPlayer {
    buffer: Arc<Buffer>,
    position: usize,
    looping: bool,
}

impl BufferPlayer {
    /// Creates a player positioned at the first frame.
    pub fn new(buffer: Arc<Buffer>) -> Self {
        Self {
            buffer,
            position: 0,
            looping: false,
        }
    }

    /// Frames in the buffer.
    pub fn num_frames(&self) -> usize {
        self.buffer.frames()
    }

    /// Next frame to be played.
    pub fn read_position(&self) -> usize {
        self.position
    }

    /// Moves the play position; clamped to the end.
    pub fn seek(&mut self, frame: usize) {
        self.position = frame.min(self.buffer.frames());
    }

    /// Whether playback wraps at the end.
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Enables or disables looping.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// True once a non-looping player has played every frame.
    pub fn is_eof(&self) -> bool {
        !self.looping && self.position >= self.buffer.frames()
    }
}

impl Processor for BufferPlayer {
    fn process(&mut self, out: &mut Buffer, ctx: &ProcessContext) {
        let frames = ctx.frames.min(out.frames());
        let total = self.buffer.frames();
        let channels = out.channels().min(self.buffer.channels());

        let mut written = 0;
        while written < frames && total > 0 {
            if self.position >= total {
                if !self.looping {
                    break;
                }
                self.position = 0;
            }
            let count = (frames - written).min(total - self.position);
            for ch in 0..channels {
                out.channel_mut(ch)[written..written + count]
                    .copy_from_slice(&self.buffer.channel(ch)[self.position..self.position + count]);
            }
            written += count;
            self.position += count;
        }
        if written < frames {
            out.zero_range(written, frames - written);
        }
    }

    fn start(&mut self) {
        if self.position >= self.buffer.frames() {
            self.position = 0;
        }
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::source(self.buffer.channels().max(1))
    }

    fn name(&self) -> &'static str {
        "buffer_player"
    }
}
