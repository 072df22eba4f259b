//! Error types for graph configuration, device, and file operations.
//!
//! Every error here is raised on a control thread at the call that detected
//! it. The render path never returns an error: ring buffer under/overruns are
//! recorded in [`RunCounter`](crate::RunCounter)s instead.

use thiserror::Error;

use crate::node::NodeId;

/// Errors raised while building or reconfiguring a processing graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The node handle belongs to a different [`Context`](crate::Context).
    #[error("node belongs to a different context")]
    ForeignNode,

    /// The node no longer exists in the graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The requested bus index exceeds the node's bus limit.
    #[error("bus {bus} out of range for '{node}' (max {max})")]
    BusOutOfRange {
        /// Name of the node.
        node: &'static str,
        /// The requested bus.
        bus: usize,
        /// Number of busses the node accepts.
        max: usize,
    },

    /// The requested input bus already has a connection.
    #[error("input bus {bus} of '{node}' is already connected")]
    InputBusInUse {
        /// Name of the node.
        node: &'static str,
        /// The occupied bus.
        bus: usize,
    },

    /// The requested output bus already has a connection.
    #[error("output bus {bus} of '{node}' is already connected")]
    OutputBusInUse {
        /// Name of the node.
        node: &'static str,
        /// The occupied bus.
        bus: usize,
    },

    /// Every bus of the node is occupied.
    #[error("no free {direction} bus on '{node}'")]
    NoFreeBus {
        /// Name of the node.
        node: &'static str,
        /// `"input"` or `"output"`.
        direction: &'static str,
    },

    /// Adding this connection would create a cycle through other nodes.
    #[error("connecting '{from}' to '{to}' would create a cycle")]
    CycleDetected {
        /// Name of the upstream node.
        from: &'static str,
        /// Name of the downstream node.
        to: &'static str,
    },

    /// A node format was rejected (for example zero channels).
    #[error("invalid node format: {0}")]
    InvalidFormat(String),

    /// The operation needs a device but the context has none.
    #[error("context has no audio device")]
    NoDevice,

    /// Block size and sample rate are owned by the attached device.
    #[error("block size and sample rate are fixed by the attached device")]
    DeviceAttached,
}

/// Errors raised by an audio device backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No audio device available on the system.
    #[error("no audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The device has no input channels to feed a line input.
    #[error("device '{0}' has no input")]
    NoInput(String),

    /// The device rejected the requested stream configuration.
    #[error("unsupported stream configuration: {0}")]
    UnsupportedConfig(String),

    /// Stream setup or runtime failure.
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Errors raised by a [`SourceFile`](crate::SourceFile) or
/// [`TargetFile`](crate::TargetFile).
#[derive(Debug, Error)]
pub enum FileError {
    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file's contents could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The file uses a sample format the reader does not handle.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// A seek past the end of the file.
    #[error("seek to frame {frame} past end of file ({num_frames} frames)")]
    SeekOutOfRange {
        /// The requested frame.
        frame: u64,
        /// Total frames in the file.
        num_frames: u64,
    },

    /// The buffer handed to the file does not match its channel count.
    #[error("buffer has {actual} channels, file has {expected}")]
    ChannelMismatch {
        /// Channels of the file.
        expected: usize,
        /// Channels of the buffer.
        actual: usize,
    },
}

/// Umbrella error for the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Graph configuration error.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Device backend error.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// File source or target error.
    #[error(transparent)]
    File(#[from] FileError),
}

/// Convenience result type for rivulet operations.
pub type Result<T> = std::result::Result<T, Error>;
