//! Hardware and file I/O for the rivulet audio graph.
//!
//! This crate provides:
//!
//! - **Realtime devices**: [`CpalDevice`], an [`AudioDevice`](rivulet_core::AudioDevice)
//!   backed by cpal that adapts host buffers of any size to fixed render blocks
//! - **WAV files**: [`WavSource`] and [`WavTarget`] for streaming playback and
//!   recording, plus whole-file [`read_wav`] / [`write_wav`]
//! - **Offline bounce**: [`bounce_to_wav`] renders a context straight to disk
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rivulet_core::Context;
//! use rivulet_core::nodes::{FilePlayer, Gain};
//! use rivulet_io::{CpalDevice, DeviceOptions, WavSource};
//!
//! let device = CpalDevice::open(&DeviceOptions::default())?;
//! let ctx = Context::with_device(Box::new(device))?;
//!
//! let player = ctx.make_node(FilePlayer::new(Box::new(WavSource::open("loop.wav")?))?)?;
//! let gain = ctx.make_node(Gain::new(0.8))?;
//! let out = ctx.make_line_out()?;
//! let _ = &player >> &gain >> &out;
//!
//! player.start();
//! ctx.start()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bounce;
mod cpal_device;
mod wav;

pub use bounce::{bounce_to_wav, render_to_target};
pub use cpal_device::{CpalDevice, DeviceInfo, DeviceOptions, default_devices, list_devices};
pub use wav::{WavFormat, WavInfo, WavSource, WavSpec, WavTarget, read_wav, read_wav_info, write_wav};

use rivulet_core::{DeviceError, FileError};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested sample format is not supported.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Source or target failure raised through the core file traits.
    #[error(transparent)]
    File(#[from] FileError),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for FileError {
    fn from(err: Error) -> Self {
        match err {
            Error::File(err) => err,
            Error::Io(err) | Error::Wav(hound::Error::IoError(err)) => FileError::Io(err),
            Error::Wav(hound::Error::Unsupported) => {
                FileError::UnsupportedFormat("unsupported WAV encoding".to_string())
            }
            Error::UnsupportedFormat(what) => FileError::UnsupportedFormat(what),
            other => FileError::Codec(other.to_string()),
        }
    }
}

impl From<Error> for DeviceError {
    fn from(err: Error) -> Self {
        match err {
            Error::NoDevice => DeviceError::NoDevice,
            Error::DeviceNotFound(name) => DeviceError::DeviceNotFound(name),
            Error::UnsupportedFormat(what) => DeviceError::UnsupportedConfig(what),
            Error::Stream(msg) => DeviceError::Stream(msg),
            other => DeviceError::Stream(other.to_string()),
        }
    }
}
