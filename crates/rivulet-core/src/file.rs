//! Audio file boundary.
//!
//! [`SourceFile`] and [`TargetFile`] are the traits file-backed nodes and bounce
//! helpers talk to. Decoders live outside the core (`rivulet-io` provides WAV);
//! [`MemorySource`] and [`MemoryTarget`] are in-memory stand-ins.

use crate::buffer::Buffer;
use crate::error::FileError;

/// Frames read per call by [`read_all`] and the file player's reader thread.
pub const DEFAULT_FRAMES_PER_READ: usize = 4096;

/// A seekable decoder producing planar `f32` frames.
pub trait SourceFile: Send {
    /// Native sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Channel count.
    fn channels(&self) -> usize;

    /// Total frames in the file.
    fn num_frames(&self) -> u64;

    /// Current read position in frames.
    fn position(&self) -> u64;

    /// Reads up to `buffer.frames()` frames. Returns the number of frames
    /// read; zero at end of file. Frames past the returned count are untouched.
    ///
    /// # Errors
    ///
    /// [`FileError::ChannelMismatch`] if `buffer` has the wrong channel count,
    /// or a decoder error.
    fn read(&mut self, buffer: &mut Buffer) -> Result<usize, FileError>;

    /// Moves the read position to `frame`.
    ///
    /// # Errors
    ///
    /// [`FileError::SeekOutOfRange`] if `frame` is past the end.
    fn seek(&mut self, frame: u64) -> Result<(), FileError>;
}

/// An encoder accepting planar `f32` frames.
pub trait TargetFile: Send {
    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Channel count.
    fn channels(&self) -> usize;

    /// Appends `frame_count` frames of `buffer` starting at `frame_offset`.
    ///
    /// # Errors
    ///
    /// [`FileError::ChannelMismatch`] if `buffer` has the wrong channel count,
    /// or an encoder error.
    fn write(&mut self, buffer: &Buffer, frame_offset: usize, frame_count: usize) -> Result<(), FileError>;

    /// Flushes and closes the file. Further writes are an error.
    ///
    /// # Errors
    ///
    /// Returns an encoder error if the trailer cannot be written.
    fn finalize(&mut self) -> Result<(), FileError>;
}

/// Reads the whole of `source` from its current position into one buffer.
///
/// # Errors
///
/// Propagates read errors from the source.
pub fn read_all(source: &mut dyn SourceFile) -> Result<Buffer, FileError> {
    let channels = source.channels();
    let remaining = source.num_frames().saturating_sub(source.position()) as usize;
    let mut out = Buffer::new(remaining, channels);
    let mut chunk = Buffer::new(DEFAULT_FRAMES_PER_READ, channels);

    let mut filled = 0;
    while filled < remaining {
        let read = source.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        let count = read.min(remaining - filled);
        for ch in 0..channels {
            out.channel_mut(ch)[filled..filled + count].copy_from_slice(&chunk.channel(ch)[..count]);
        }
        filled += count;
    }
    if filled < remaining {
        out.zero_range(filled, remaining - filled);
    }
    Ok(out)
}

fn check_channels(expected: usize, buffer: &Buffer) -> Result<(), FileError> {
    if buffer.channels() == expected {
        Ok(())
    } else {
        Err(FileError::ChannelMismatch {
            expected,
            actual: buffer.channels(),
        })
    }
}

/// A [`SourceFile`] backed by a buffer in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Buffer,
    sample_rate: u32,
    position: usize,
}

impl MemorySource {
    /// Wraps a planar buffer.
    pub fn new(data: Buffer, sample_rate: u32) -> Self {
        Self {
            data,
            sample_rate,
            position: 0,
        }
    }
}

impl SourceFile for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.data.channels()
    }

    fn num_frames(&self) -> u64 {
        self.data.frames() as u64
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn read(&mut self, buffer: &mut Buffer) -> Result<usize, FileError> {
        check_channels(self.data.channels(), buffer)?;
        let count = buffer.frames().min(self.data.frames() - self.position);
        for ch in 0..self.data.channels() {
            buffer.channel_mut(ch)[..count]
                .copy_from_slice(&self.data.channel(ch)[self.position..self.position + count]);
        }
        self.position += count;
        Ok(count)
    }

    fn seek(&mut self, frame: u64) -> Result<(), FileError> {
        if frame > self.num_frames() {
            return Err(FileError::SeekOutOfRange {
                frame,
                num_frames: self.num_frames(),
            });
        }
        self.position = frame as usize;
        Ok(())
    }
}

/// A [`TargetFile`] that collects frames in memory.
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    finalized: bool,
}

impl MemoryTarget {
    /// Creates an empty target.
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![Vec::new(); channels],
            sample_rate,
            finalized: false,
        }
    }

    /// Frames written so far.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Everything written so far as a planar buffer.
    pub fn to_buffer(&self) -> Buffer {
        Buffer::from_channels(&self.channels)
    }

    /// Whether [`finalize`](TargetFile::finalize) has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl TargetFile for MemoryTarget {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels.len()
    }

    fn write(&mut self, buffer: &Buffer, frame_offset: usize, frame_count: usize) -> Result<(), FileError> {
        check_channels(self.channels.len(), buffer)?;
        if self.finalized {
            return Err(FileError::Codec("write after finalize".to_string()));
        }
        let end = (frame_offset + frame_count).min(buffer.frames());
        let start = frame_offset.min(end);
        for (ch, samples) in self.channels.iter_mut().enumerate() {
            samples.extend_from_slice(&buffer.channel(ch)[start..end]);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), FileError> {
        self.finalized = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Buffer {
        let left: Vec<f32> = (0..frames).map(|i| i as f32).collect();
        let right: Vec<f32> = left.iter().map(|v| -v).collect();
        Buffer::from_channels(&[left, right])
    }

    #[test]
    fn memory_source_reads_in_chunks() {
        let mut source = MemorySource::new(ramp(10), 1000);
        let mut chunk = Buffer::new(4, 2);
        assert_eq!(source.read(&mut chunk).unwrap(), 4);
        assert_eq!(source.read(&mut chunk).unwrap(), 4);
        assert_eq!(chunk.channel(0), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(source.read(&mut chunk).unwrap(), 2);
        assert_eq!(source.read(&mut chunk).unwrap(), 0);
    }

    #[test]
    fn seek_bounds() {
        let mut source = MemorySource::new(ramp(10), 1000);
        source.seek(10).unwrap();
        assert_eq!(source.position(), 10);
        assert!(matches!(
            source.seek(11),
            Err(FileError::SeekOutOfRange { frame: 11, num_frames: 10 })
        ));
    }

    #[test]
    fn channel_mismatch_rejected() {
        let mut source = MemorySource::new(ramp(4), 1000);
        let mut mono = Buffer::new(4, 1);
        assert!(matches!(
            source.read(&mut mono),
            Err(FileError::ChannelMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn read_all_from_position() {
        let mut source = MemorySource::new(ramp(5000), 1000);
        source.seek(1000).unwrap();
        let all = read_all(&mut source).unwrap();
        assert_eq!(all.frames(), 4000);
        assert_eq!(all.sample(0, 0), 1000.0);
        assert_eq!(all.sample(3999, 1), -4999.0);
    }

    #[test]
    fn memory_target_collects_ranges() {
        let mut target = MemoryTarget::new(2, 1000);
        let data = ramp(8);
        target.write(&data, 2, 3).unwrap();
        target.write(&data, 6, 10).unwrap();
        assert_eq!(target.frames(), 5);
        assert_eq!(target.to_buffer().channel(0), &[2.0, 3.0, 4.0, 6.0, 7.0]);
        target.finalize().unwrap();
        assert!(target.write(&data, 0, 1).is_err());
    }
}
