//! Audio device boundary.
//!
//! An [`AudioDevice`] owns the realtime thread. The [`Context`](crate::Context)
//! hands it a [`RenderCallback`] on start; the device calls it once per block
//! with a planar buffer of `frames_per_block × output_channels` and delivers the
//! result to hardware (or, for [`OfflineDevice`], to the caller).
//!
//! The trait is object-safe so a context can hold `Box<dyn AudioDevice>` and
//! swap backends at runtime. Input capture flows the other way: the device
//! pushes captured samples into an [`InputFeed`] that a
//! [`LineIn`](crate::nodes::LineIn) node drains.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::buffer::Buffer;
use crate::error::DeviceError;
use crate::nodes::InputFeed;

/// Block render callback, invoked on the realtime thread.
///
/// The buffer is planar and already sized; the callback overwrites it.
pub type RenderCallback = Box<dyn FnMut(&mut Buffer) + Send>;

/// A source of realtime block callbacks.
pub trait AudioDevice: Send {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Frames per rendered block.
    fn frames_per_block(&self) -> usize;

    /// Output channel count.
    fn output_channels(&self) -> usize;

    /// Input channel count; zero when the device cannot capture.
    fn input_channels(&self) -> usize {
        0
    }

    /// Routes captured input into `feed`. Replaces any previous feed.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NoInput`] when the device has no input channels.
    fn attach_input(&mut self, feed: InputFeed) -> Result<(), DeviceError> {
        drop(feed);
        Err(DeviceError::NoInput(self.name().to_string()))
    }

    /// Starts calling `render` once per block.
    ///
    /// # Errors
    ///
    /// Returns a [`DeviceError`] when the backend stream cannot be built or started.
    fn start(&mut self, render: RenderCallback) -> Result<(), DeviceError>;

    /// Stops the realtime callback. The callback is dropped.
    fn stop(&mut self);

    /// Whether the callback is currently installed.
    fn is_running(&self) -> bool;
}

struct OfflineState {
    sample_rate: u32,
    frames_per_block: usize,
    output_channels: usize,
    input_channels: usize,
    render: Option<RenderCallback>,
    input: Option<InputFeed>,
    block: Buffer,
}

/// Deterministic device that renders only when asked.
///
/// Clones share one device, so a test can hand one clone to a
/// [`Context`](crate::Context) and drive rendering through another.
///
/// ```rust
/// use rivulet_core::{Context, OfflineDevice};
///
/// let device = OfflineDevice::new(48000, 128, 2);
/// let ctx = Context::with_device(Box::new(device.clone())).unwrap();
/// ctx.start().unwrap();
/// let out = device.render_frames(256);
/// assert_eq!(out.frames(), 256);
/// ```
#[derive(Clone)]
pub struct OfflineDevice {
    state: Arc<Mutex<OfflineState>>,
}

impl OfflineDevice {
    /// Creates an output-only device.
    pub fn new(sample_rate: u32, frames_per_block: usize, output_channels: usize) -> Self {
        Self::with_input(sample_rate, frames_per_block, output_channels, 0)
    }

    /// Creates a device that also accepts pushed input.
    pub fn with_input(
        sample_rate: u32,
        frames_per_block: usize,
        output_channels: usize,
        input_channels: usize,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(OfflineState {
                sample_rate,
                frames_per_block,
                output_channels,
                input_channels,
                render: None,
                input: None,
                block: Buffer::new(frames_per_block, output_channels),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OfflineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Renders whole blocks until at least `frames` frames are produced and
    /// returns exactly `frames` of them. Silent while stopped.
    pub fn render_frames(&self, frames: usize) -> Buffer {
        let mut state = self.lock();
        let channels = state.output_channels;
        let block_len = state.frames_per_block.max(1);
        let mut out = Buffer::new(frames, channels);

        let mut written = 0;
        while written < frames {
            let OfflineState { render, block, .. } = &mut *state;
            match render.as_mut() {
                Some(render) => render(block),
                None => block.zero(),
            }
            let count = block_len.min(frames - written);
            for ch in 0..channels {
                out.channel_mut(ch)[written..written + count]
                    .copy_from_slice(&block.channel(ch)[..count]);
            }
            written += count;
        }
        out
    }

    /// Pushes interleaved input samples to the attached line input.
    ///
    /// Returns the number of frames accepted; zero if no input is attached.
    pub fn push_input(&self, interleaved: &[f32]) -> usize {
        match self.lock().input.as_mut() {
            Some(feed) => feed.push_interleaved(interleaved),
            None => 0,
        }
    }
}

impl AudioDevice for OfflineDevice {
    fn name(&self) -> &str {
        "offline"
    }

    fn sample_rate(&self) -> u32 {
        self.lock().sample_rate
    }

    fn frames_per_block(&self) -> usize {
        self.lock().frames_per_block
    }

    fn output_channels(&self) -> usize {
        self.lock().output_channels
    }

    fn input_channels(&self) -> usize {
        self.lock().input_channels
    }

    fn attach_input(&mut self, feed: InputFeed) -> Result<(), DeviceError> {
        let mut state = self.lock();
        if state.input_channels == 0 {
            return Err(DeviceError::NoInput("offline".to_string()));
        }
        state.input = Some(feed);
        Ok(())
    }

    fn start(&mut self, render: RenderCallback) -> Result<(), DeviceError> {
        self.lock().render = Some(render);
        Ok(())
    }

    fn stop(&mut self) {
        let render = self.lock().render.take();
        drop(render);
    }

    fn is_running(&self) -> bool {
        self.lock().render.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_device_renders_silence() {
        let device = OfflineDevice::new(1000, 4, 2);
        let out = device.render_frames(10);
        assert_eq!(out.frames(), 10);
        assert!(out.data().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn callback_runs_per_block() {
        let mut device = OfflineDevice::new(1000, 4, 1);
        let mut blocks = 0.0;
        device
            .start(Box::new(move |buf: &mut Buffer| {
                blocks += 1.0;
                buf.data_mut().fill(blocks);
            }))
            .unwrap();
        assert!(device.is_running());
        let out = device.render_frames(10);
        assert_eq!(out.channel(0)[0], 1.0);
        assert_eq!(out.channel(0)[4], 2.0);
        assert_eq!(out.channel(0)[9], 3.0);
        device.stop();
        assert!(!device.is_running());
    }

    #[test]
    fn output_only_device_rejects_input() {
        let mut device = OfflineDevice::new(1000, 4, 2);
        let (_line_in, feed) = crate::nodes::LineIn::new(1, 8);
        assert!(matches!(
            device.attach_input(feed),
            Err(DeviceError::NoInput(_))
        ));
        assert_eq!(device.push_input(&[0.0; 4]), 0);
    }
}
