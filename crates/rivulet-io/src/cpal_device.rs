//! cpal-backed realtime device.
//!
//! Hosts deliver callbacks with whatever buffer size they like. The graph
//! renders fixed blocks, so the output callback keeps one rendered block
//! staged and copies from it until it is used up, rendering the next block on
//! demand. Captured input goes straight into the attached
//! [`InputFeed`](rivulet_core::nodes::InputFeed) rings.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rivulet_config::EngineConfig;
use rivulet_core::nodes::InputFeed;
use rivulet_core::{AudioDevice, Buffer, DeviceError, RenderCallback};

use crate::{Error, Result};

fn device_name(device: &cpal::Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio device information.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports audio input.
    pub is_input: bool,
    /// Whether the device supports audio output.
    pub is_output: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// List every device of the default host.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let devices = host.devices().map_err(|e| Error::Stream(e.to_string()))?;

    let mut infos = Vec::new();
    for device in devices {
        let Ok(name) = device_name(&device) else {
            continue;
        };
        let input = device.default_input_config().ok();
        let output = device.default_output_config().ok();
        let default_sample_rate = output
            .as_ref()
            .or(input.as_ref())
            .map_or(48000, |c| c.sample_rate());
        infos.push(DeviceInfo {
            name,
            is_input: input.is_some(),
            is_output: output.is_some(),
            default_sample_rate,
        });
    }
    Ok(infos)
}

/// Names of the default (input, output) devices.
pub fn default_devices() -> (Option<String>, Option<String>) {
    let host = cpal::default_host();
    let input = host.default_input_device().and_then(|d| device_name(&d).ok());
    let output = host.default_output_device().and_then(|d| device_name(&d).ok());
    (input, output)
}

#[derive(Clone, Copy)]
enum Direction {
    Input,
    Output,
}

/// Finds a device whose name contains `name` (case-insensitive), or the
/// host default.
fn find_device(host: &cpal::Host, name: Option<&str>, direction: Direction) -> Result<cpal::Device> {
    let Some(search) = name else {
        return match direction {
            Direction::Input => host.default_input_device(),
            Direction::Output => host.default_output_device(),
        }
        .ok_or(Error::NoDevice);
    };

    let search_lower = search.to_lowercase();
    let devices: Vec<cpal::Device> = match direction {
        Direction::Input => host.input_devices().map_err(|e| Error::Stream(e.to_string()))?.collect(),
        Direction::Output => host.output_devices().map_err(|e| Error::Stream(e.to_string()))?.collect(),
    };
    devices
        .into_iter()
        .find(|device| device_name(device).is_ok_and(|n| n.to_lowercase().contains(&search_lower)))
        .ok_or_else(|| Error::DeviceNotFound(search.to_string()))
}

/// How to open a [`CpalDevice`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceOptions {
    /// Substring of the device name; the host default when `None`.
    pub device_name: Option<String>,
    /// Sample rate; the device default when `None`.
    pub sample_rate: Option<u32>,
    /// Frames per rendered block.
    pub frames_per_block: usize,
    /// Output channels; the device default when `None`.
    pub output_channels: Option<usize>,
    /// Capture channels; zero opens no input stream.
    pub input_channels: usize,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            device_name: None,
            sample_rate: None,
            frames_per_block: 512,
            output_channels: None,
            input_channels: 0,
        }
    }
}

impl From<&EngineConfig> for DeviceOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            device_name: config.device_name.clone(),
            sample_rate: Some(config.sample_rate),
            frames_per_block: config.frames_per_block,
            output_channels: Some(config.output_channels),
            input_channels: config.input_channels,
        }
    }
}

/// Copies fixed rendered blocks into host buffers of any size.
struct BlockStager {
    block: Buffer,
    interleaved: Vec<f32>,
    cursor: usize,
}

impl BlockStager {
    fn new(frames: usize, channels: usize) -> Self {
        Self {
            block: Buffer::new(frames, channels),
            interleaved: vec![0.0; frames * channels],
            cursor: frames,
        }
    }

    /// Fills interleaved `out`, calling `render` whenever the staged block runs out.
    fn fill(&mut self, out: &mut [f32], render: &mut impl FnMut(&mut Buffer)) {
        let channels = self.block.channels();
        let frames = self.block.frames();
        let total = out.len() / channels;

        let mut written = 0;
        while written < total {
            if self.cursor == frames {
                render(&mut self.block);
                self.block.interleave_into(&mut self.interleaved);
                self.cursor = 0;
            }
            let count = (frames - self.cursor).min(total - written);
            out[written * channels..(written + count) * channels]
                .copy_from_slice(&self.interleaved[self.cursor * channels..(self.cursor + count) * channels]);
            self.cursor += count;
            written += count;
        }
        out[total * channels..].fill(0.0);
    }
}

struct InputSide {
    device: cpal::Device,
    config: cpal::StreamConfig,
}

/// Realtime device backed by the platform audio host.
///
/// Opened once with [`CpalDevice::open`], then handed to a
/// [`Context`](rivulet_core::Context), which starts and stops the streams.
pub struct CpalDevice {
    name: String,
    output: cpal::Device,
    config: cpal::StreamConfig,
    frames_per_block: usize,
    input: Option<InputSide>,
    feed: Arc<Mutex<Option<InputFeed>>>,
    output_stream: Option<cpal::Stream>,
    input_stream: Option<cpal::Stream>,
}

impl CpalDevice {
    /// Opens the output (and, when requested, input) device of the default host.
    ///
    /// Streams are not built until the owning context starts.
    pub fn open(options: &DeviceOptions) -> Result<Self> {
        let host = cpal::default_host();
        let output = find_device(&host, options.device_name.as_deref(), Direction::Output)?;
        let name = device_name(&output).unwrap_or_else(|_| "unknown".to_string());

        let default = output
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;
        if default.sample_format() != cpal::SampleFormat::F32 {
            tracing::warn!(
                device = %name,
                format = ?default.sample_format(),
                "device default format is not f32; stream build may fail"
            );
        }
        let config = cpal::StreamConfig {
            channels: options
                .output_channels
                .map_or(default.channels(), |c| c as u16),
            sample_rate: options.sample_rate.unwrap_or(default.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        let input = if options.input_channels > 0 {
            let device = find_device(&host, options.device_name.as_deref(), Direction::Input)
                .or_else(|_| host.default_input_device().ok_or(Error::NoDevice))?;
            Some(InputSide {
                device,
                config: cpal::StreamConfig {
                    channels: options.input_channels as u16,
                    sample_rate: config.sample_rate,
                    buffer_size: cpal::BufferSize::Default,
                },
            })
        } else {
            None
        };

        tracing::info!(
            device = %name,
            host = host.id().name(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            frames_per_block = options.frames_per_block,
            input_channels = options.input_channels,
            "audio device opened"
        );

        Ok(Self {
            name,
            output,
            config,
            frames_per_block: options.frames_per_block.max(1),
            input,
            feed: Arc::new(Mutex::new(None)),
            output_stream: None,
            input_stream: None,
        })
    }

    /// Opens the device described by engine settings.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::open(&DeviceOptions::from(config))
    }

    fn build_output(&self, mut render: RenderCallback) -> Result<cpal::Stream> {
        let mut stager = BlockStager::new(self.frames_per_block, usize::from(self.config.channels));
        let device = self.name.clone();
        self.output
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    stager.fill(data, &mut render);
                },
                move |err| tracing::error!(device = %device, error = %err, "output stream error"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))
    }

    fn build_input(&self, side: &InputSide) -> Result<cpal::Stream> {
        let feed = Arc::clone(&self.feed);
        let device = self.name.clone();
        side.device
            .build_input_stream(
                &side.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Contended only while a feed is being attached.
                    if let Ok(mut guard) = feed.try_lock()
                        && let Some(sink) = guard.as_mut()
                    {
                        sink.push_interleaved(data);
                    }
                },
                move |err| tracing::error!(device = %device, error = %err, "input stream error"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))
    }

    fn start_streams(&mut self, render: RenderCallback) -> Result<()> {
        let output = self.build_output(render)?;
        let input = match &self.input {
            Some(side) => Some(self.build_input(side)?),
            None => None,
        };

        if let Some(input) = &input {
            input.play().map_err(|e| Error::Stream(e.to_string()))?;
        }
        output.play().map_err(|e| Error::Stream(e.to_string()))?;

        self.output_stream = Some(output);
        self.input_stream = input;
        tracing::info!(device = %self.name, "streams started");
        Ok(())
    }
}

impl AudioDevice for CpalDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn frames_per_block(&self) -> usize {
        self.frames_per_block
    }

    fn output_channels(&self) -> usize {
        usize::from(self.config.channels)
    }

    fn input_channels(&self) -> usize {
        self.input
            .as_ref()
            .map_or(0, |side| usize::from(side.config.channels))
    }

    fn attach_input(&mut self, feed: InputFeed) -> std::result::Result<(), DeviceError> {
        if self.input.is_none() {
            return Err(DeviceError::NoInput(self.name.clone()));
        }
        let mut slot = self
            .feed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(feed);
        tracing::debug!(device = %self.name, "line input attached");
        Ok(())
    }

    fn start(&mut self, render: RenderCallback) -> std::result::Result<(), DeviceError> {
        if self.output_stream.is_some() {
            return Ok(());
        }
        self.start_streams(render).map_err(|err| {
            tracing::warn!(device = %self.name, error = %err, "failed to start streams");
            DeviceError::from(err)
        })
    }

    fn stop(&mut self) {
        if let Some(stream) = self.input_stream.take()
            && let Err(err) = stream.pause()
        {
            tracing::debug!(error = %err, "input stream pause failed");
        }
        if let Some(stream) = self.output_stream.take() {
            if let Err(err) = stream.pause() {
                tracing::debug!(error = %err, "output stream pause failed");
            }
            tracing::info!(device = %self.name, "streams stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.output_stream.is_some()
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.stop();
    }
}
