//! Multi-channel sample buffers.
//!
//! [`Buffer`] is a fixed-shape `frames × channels` container. The graph uses the
//! planar layout internally (each channel contiguous); the interleaved layout
//! exists for the device and file boundaries, which usually speak
//! `[L0, R0, L1, R1, ...]`.
//!
//! [`DynamicBuffer`] wraps a [`Buffer`] whose shape can change. Growing
//! reallocates only when the new size exceeds the current allocation, and the
//! allocation is released only by [`DynamicBuffer::shrink_to_fit`].

use std::ops::{Deref, DerefMut};

/// Sample ordering inside a [`Buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Each channel occupies `frames` contiguous samples.
    #[default]
    Planar,
    /// Frames are contiguous; channels alternate within a frame.
    Interleaved,
}

/// A `frames × channels` block of `f32` samples.
///
/// Invariant: `len() == frames() * channels()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buffer {
    data: Vec<f32>,
    frames: usize,
    channels: usize,
    layout: Layout,
}

impl Buffer {
    /// Creates a zeroed planar buffer.
    pub fn new(frames: usize, channels: usize) -> Self {
        Self::with_layout(frames, channels, Layout::Planar)
    }

    /// Creates a zeroed interleaved buffer.
    pub fn interleaved(frames: usize, channels: usize) -> Self {
        Self::with_layout(frames, channels, Layout::Interleaved)
    }

    /// Creates a zeroed buffer with the given layout.
    pub fn with_layout(frames: usize, channels: usize, layout: Layout) -> Self {
        Self {
            data: vec![0.0; frames * channels],
            frames,
            channels,
            layout,
        }
    }

    /// Builds a planar buffer from per-channel sample vectors.
    ///
    /// Channels shorter than the longest one are padded with silence.
    pub fn from_channels(channels: &[Vec<f32>]) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        let mut buffer = Self::new(frames, channels.len());
        for (ch, samples) in channels.iter().enumerate() {
            buffer.channel_mut(ch)[..samples.len()].copy_from_slice(samples);
        }
        buffer
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Total number of samples, `frames * channels`.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample ordering of this buffer.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// All samples in storage order.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// All samples in storage order, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Samples of one channel.
    ///
    /// Only meaningful for planar buffers. Debug builds reject an interleaved
    /// layout and an out-of-range channel; release builds rely on slice bounds.
    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        debug_assert_eq!(self.layout, Layout::Planar, "channel() on interleaved buffer");
        debug_assert!(ch < self.channels, "channel {ch} out of range ({})", self.channels);
        let start = ch * self.frames;
        &self.data[start..start + self.frames]
    }

    /// Samples of one channel, mutable. See [`channel`](Self::channel).
    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        debug_assert_eq!(self.layout, Layout::Planar, "channel_mut() on interleaved buffer");
        debug_assert!(ch < self.channels, "channel {ch} out of range ({})", self.channels);
        let start = ch * self.frames;
        &mut self.data[start..start + self.frames]
    }

    /// Iterates over the channels of a planar buffer.
    pub fn channels_iter(&self) -> impl Iterator<Item = &[f32]> {
        debug_assert_eq!(self.layout, Layout::Planar);
        self.data.chunks_exact(self.frames.max(1)).take(self.channels)
    }

    /// Iterates mutably over the channels of a planar buffer.
    pub fn channels_iter_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        debug_assert_eq!(self.layout, Layout::Planar);
        let channels = self.channels;
        self.data.chunks_exact_mut(self.frames.max(1)).take(channels)
    }

    /// Reads one sample regardless of layout.
    #[inline]
    pub fn sample(&self, frame: usize, ch: usize) -> f32 {
        self.data[self.index(frame, ch)]
    }

    /// Writes one sample regardless of layout.
    #[inline]
    pub fn set_sample(&mut self, frame: usize, ch: usize, value: f32) {
        let idx = self.index(frame, ch);
        self.data[idx] = value;
    }

    #[inline]
    fn index(&self, frame: usize, ch: usize) -> usize {
        debug_assert!(frame < self.frames && ch < self.channels);
        match self.layout {
            Layout::Planar => ch * self.frames + frame,
            Layout::Interleaved => frame * self.channels + ch,
        }
    }

    /// Fills every sample with zero.
    pub fn zero(&mut self) {
        self.data.fill(0.0);
    }

    /// Zeroes `count` frames starting at `start` on every channel.
    pub fn zero_range(&mut self, start: usize, count: usize) {
        debug_assert!(start + count <= self.frames, "zero_range past end of buffer");
        let end = (start + count).min(self.frames);
        match self.layout {
            Layout::Planar => {
                for ch in 0..self.channels {
                    let base = ch * self.frames;
                    self.data[base + start..base + end].fill(0.0);
                }
            }
            Layout::Interleaved => {
                self.data[start * self.channels..end * self.channels].fill(0.0);
            }
        }
    }

    /// Copies samples from a buffer of the same shape and layout.
    pub fn copy_from(&mut self, other: &Buffer) {
        debug_assert_eq!(self.layout, other.layout);
        self.data.copy_from_slice(&other.data);
    }

    /// Writes this planar buffer into `out` as interleaved frames.
    ///
    /// `out` must hold at least `frames * channels` samples.
    pub fn interleave_into(&self, out: &mut [f32]) {
        debug_assert_eq!(self.layout, Layout::Planar);
        let channels = self.channels;
        for (ch, samples) in self.channels_iter().enumerate() {
            for (frame, &s) in samples.iter().enumerate() {
                out[frame * channels + ch] = s;
            }
        }
    }

    /// Fills this planar buffer from interleaved samples.
    ///
    /// Frames missing from `src` are zeroed.
    pub fn deinterleave_from(&mut self, src: &[f32]) {
        debug_assert_eq!(self.layout, Layout::Planar);
        let channels = self.channels;
        let available = if channels == 0 { 0 } else { src.len() / channels };
        for (ch, samples) in self.channels_iter_mut().enumerate() {
            for (frame, s) in samples.iter_mut().enumerate() {
                *s = if frame < available {
                    src[frame * channels + ch]
                } else {
                    0.0
                };
            }
        }
    }
}

/// A [`Buffer`] whose shape can change without giving back its allocation.
#[derive(Debug, Clone, Default)]
pub struct DynamicBuffer {
    buffer: Buffer,
}

impl DynamicBuffer {
    /// Creates a zeroed planar buffer.
    pub fn new(frames: usize, channels: usize) -> Self {
        Self {
            buffer: Buffer::new(frames, channels),
        }
    }

    /// Changes the shape to `frames × channels` and zeroes the contents.
    ///
    /// Reallocates only when the new size exceeds [`capacity`](Self::capacity).
    pub fn set_size(&mut self, frames: usize, channels: usize) {
        self.buffer.data.clear();
        self.buffer.data.resize(frames * channels, 0.0);
        self.buffer.frames = frames;
        self.buffer.channels = channels;
    }

    /// Changes the frame count, keeping the channel count.
    pub fn set_frames(&mut self, frames: usize) {
        let channels = self.buffer.channels;
        self.set_size(frames, channels);
    }

    /// Changes the channel count, keeping the frame count.
    pub fn set_channels(&mut self, channels: usize) {
        let frames = self.buffer.frames;
        self.set_size(frames, channels);
    }

    /// Number of samples the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.buffer.data.capacity()
    }

    /// Releases storage beyond the current size.
    pub fn shrink_to_fit(&mut self) {
        self.buffer.data.shrink_to_fit();
    }

    /// Unwraps the inner buffer.
    pub fn into_inner(self) -> Buffer {
        self.buffer
    }
}

impl Deref for DynamicBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Buffer {
        &self.buffer
    }
}

impl DerefMut for DynamicBuffer {
    fn deref_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }
}
