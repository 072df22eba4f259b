//! WAV file reading and writing.
//!
//! [`WavSource`] and [`WavTarget`] implement the core file traits, so a WAV
//! file can feed a [`FilePlayer`](rivulet_core::nodes::FilePlayer) or receive
//! a bounce. Integer PCM is scaled to `[-1, 1)`; 32-bit files are IEEE float.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavWriter};
use rivulet_core::{Buffer, FileError, SourceFile, TargetFile, read_all};

use crate::{Error, Result};

/// WAV audio encoding format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavFormat {
    /// Linear PCM (integer samples).
    Pcm,
    /// IEEE 754 floating-point samples.
    IeeeFloat,
}

/// WAV file metadata extracted without loading sample data.
#[derive(Debug, Clone)]
pub struct WavInfo {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample.
    pub bits_per_sample: u16,
    /// Total number of sample frames (samples per channel).
    pub num_frames: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Audio encoding format.
    pub format: WavFormat,
}

/// Read WAV metadata without loading sample data.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let num_frames = u64::from(reader.duration());
    let duration_secs = num_frames as f64 / f64::from(spec.sample_rate);

    let format = match spec.sample_format {
        SampleFormat::Float => WavFormat::IeeeFloat,
        SampleFormat::Int => WavFormat::Pcm,
    };

    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        num_frames,
        duration_secs,
        format,
    })
}

/// WAV file specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
    /// Bit depth per sample (e.g., 16, 24, 32).
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
        }
    }
}

impl From<hound::WavSpec> for WavSpec {
    fn from(spec: hound::WavSpec) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

#[inline]
fn int_scale(bits: u16) -> f32 {
    (1i64 << (bits.clamp(1, 32) - 1)) as f32
}

/// Streaming WAV decoder.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    spec: hound::WavSpec,
    num_frames: u64,
    position: u64,
}

impl WavSource {
    /// Opens `path` for reading.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened, is not a WAV file, or uses a sample
    /// format other than integer PCM or 32-bit float.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        if spec.sample_format == SampleFormat::Float && spec.bits_per_sample != 32 {
            return Err(Error::UnsupportedFormat(format!(
                "{}-bit float",
                spec.bits_per_sample
            )));
        }
        let num_frames = u64::from(reader.duration());
        Ok(Self {
            reader,
            spec,
            num_frames,
            position: 0,
        })
    }

    /// The file's format.
    pub fn spec(&self) -> WavSpec {
        self.spec.into()
    }

    fn read_frames<S: hound::Sample>(
        &mut self,
        buffer: &mut Buffer,
        frames: usize,
        convert: impl Fn(S) -> f32,
    ) -> Result<usize> {
        let channels = buffer.channels();
        let mut samples = self.reader.samples::<S>();
        for frame in 0..frames {
            for ch in 0..channels {
                match samples.next() {
                    Some(sample) => buffer.set_sample(frame, ch, convert(sample?)),
                    None => return Ok(frame),
                }
            }
        }
        Ok(frames)
    }
}

impl SourceFile for WavSource {
    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn channels(&self) -> usize {
        usize::from(self.spec.channels)
    }

    fn num_frames(&self) -> u64 {
        self.num_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read(&mut self, buffer: &mut Buffer) -> std::result::Result<usize, FileError> {
        let channels = self.channels();
        if buffer.channels() != channels {
            return Err(FileError::ChannelMismatch {
                expected: channels,
                actual: buffer.channels(),
            });
        }
        let remaining = self.num_frames.saturating_sub(self.position);
        let frames = (buffer.frames() as u64).min(remaining) as usize;

        let read = match self.spec.sample_format {
            SampleFormat::Float => self.read_frames::<f32>(buffer, frames, |s| s)?,
            SampleFormat::Int => {
                let scale = int_scale(self.spec.bits_per_sample);
                self.read_frames::<i32>(buffer, frames, |s| s as f32 / scale)?
            }
        };
        self.position += read as u64;
        Ok(read)
    }

    fn seek(&mut self, frame: u64) -> std::result::Result<(), FileError> {
        if frame > self.num_frames {
            return Err(FileError::SeekOutOfRange {
                frame,
                num_frames: self.num_frames,
            });
        }
        // `num_frames` came from a u32 duration, so the bound check keeps this lossless.
        self.reader.seek(frame as u32)?;
        self.position = frame;
        Ok(())
    }
}

/// Streaming WAV encoder.
///
/// 32-bit targets are written as IEEE float, narrower ones as clamped
/// integer PCM. Dropping an unfinalized target finalizes it, ignoring errors.
pub struct WavTarget {
    writer: Option<WavWriter<BufWriter<File>>>,
    spec: WavSpec,
}

impl WavTarget {
    /// Creates (or truncates) `path` for writing.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be created or `spec` is not encodable.
    pub fn create<P: AsRef<Path>>(path: P, spec: WavSpec) -> Result<Self> {
        let writer = WavWriter::create(path, hound::WavSpec::from(spec))?;
        Ok(Self {
            writer: Some(writer),
            spec,
        })
    }

    /// The file's format.
    pub fn spec(&self) -> WavSpec {
        self.spec
    }
}

impl TargetFile for WavTarget {
    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn channels(&self) -> usize {
        usize::from(self.spec.channels)
    }

    fn write(
        &mut self,
        buffer: &Buffer,
        frame_offset: usize,
        frame_count: usize,
    ) -> std::result::Result<(), FileError> {
        let channels = self.channels();
        if buffer.channels() != channels {
            return Err(FileError::ChannelMismatch {
                expected: channels,
                actual: buffer.channels(),
            });
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| FileError::Codec("write after finalize".to_string()))?;
        let end = (frame_offset + frame_count).min(buffer.frames());

        if self.spec.bits_per_sample == 32 {
            for frame in frame_offset..end {
                for ch in 0..channels {
                    writer.write_sample(buffer.sample(frame, ch)).map_err(Error::from)?;
                }
            }
        } else {
            let max_val = int_scale(self.spec.bits_per_sample);
            for frame in frame_offset..end {
                for ch in 0..channels {
                    let value = (buffer.sample(frame, ch) * max_val).clamp(-max_val, max_val - 1.0);
                    writer.write_sample(value as i32).map_err(Error::from)?;
                }
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> std::result::Result<(), FileError> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(|e| Error::from(e).into()),
            None => Ok(()),
        }
    }
}

/// Read a whole WAV file into a planar buffer along with its spec.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Buffer, WavSpec)> {
    let mut source = WavSource::open(path)?;
    let spec = source.spec();
    let buffer = read_all(&mut source)?;
    Ok((buffer, spec))
}

/// Write a planar buffer to a WAV file. The channel count comes from `buffer`.
pub fn write_wav<P: AsRef<Path>>(path: P, buffer: &Buffer, spec: WavSpec) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        ..spec
    };
    let mut target = WavTarget::create(path, spec)?;
    target.write(buffer, 0, buffer.frames())?;
    target.finalize()?;
    Ok(())
}
