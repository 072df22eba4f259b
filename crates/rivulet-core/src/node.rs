//! The processing-unit contract.
//!
//! A node is a [`Processor`] stored in a [`Context`](crate::Context)'s graph.
//! The graph owns the topology, channel negotiation, and buffers; the
//! processor only fills or transforms one block at a time.
//!
//! ```rust
//! use rivulet_core::{Buffer, NodeFormat, ProcessContext, Processor};
//!
//! struct Invert;
//!
//! impl Processor for Invert {
//!     fn process(&mut self, buffer: &mut Buffer, _ctx: &ProcessContext) {
//!         for s in buffer.data_mut() {
//!             *s = -*s;
//!         }
//!     }
//!
//!     fn format(&self) -> NodeFormat {
//!         NodeFormat::effect()
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;

use crate::buffer::Buffer;
use crate::clock::Clock;
use crate::param::Param;

/// Bus limit used by [`NodeFormat`] constructors that accept connections.
pub const DEFAULT_MAX_BUSES: usize = 16;

/// Stable identifier of a node within one context.
///
/// Slots are reused after a node is reclaimed; the generation tells a stale id
/// from the node that now occupies its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Returns the slot index.
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Returns the slot generation.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

/// How a node's channel count reacts to its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// The channel count never changes through negotiation.
    #[default]
    Fixed,
    /// Adopts the largest channel count among its inputs.
    MatchesInput,
    /// Adopts the channel count of the node it feeds.
    MatchesOutput,
}

/// Static description of a node, read once when the node is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFormat {
    /// Initial channel count (≥ 1).
    pub channels: usize,
    /// Channel negotiation policy.
    pub mode: ChannelMode,
    /// Start processing as soon as the node is initialized.
    pub auto_enable: bool,
    /// Number of input busses; zero makes the node a pure source.
    pub max_inputs: usize,
    /// Number of output busses; zero makes the node a pure sink.
    pub max_outputs: usize,
}

impl NodeFormat {
    /// A fixed-channel source with no inputs. Starts disabled.
    pub fn source(channels: usize) -> Self {
        Self {
            channels,
            mode: ChannelMode::Fixed,
            auto_enable: false,
            max_inputs: 0,
            max_outputs: DEFAULT_MAX_BUSES,
        }
    }

    /// An effect that follows its inputs' channel count. Auto-enabled.
    pub fn effect() -> Self {
        Self {
            channels: 1,
            mode: ChannelMode::MatchesInput,
            auto_enable: true,
            max_inputs: DEFAULT_MAX_BUSES,
            max_outputs: DEFAULT_MAX_BUSES,
        }
    }

    /// Overrides the channel count and fixes it.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self.mode = ChannelMode::Fixed;
        self
    }

    /// Overrides the channel mode.
    pub fn with_mode(mut self, mode: ChannelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Overrides auto-enable.
    pub fn with_auto_enable(mut self, auto_enable: bool) -> Self {
        self.auto_enable = auto_enable;
        self
    }
}

impl Default for NodeFormat {
    fn default() -> Self {
        Self::effect()
    }
}

/// Per-block information handed to [`Processor::process`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessContext {
    /// Frames in this block.
    pub frames: usize,
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Absolute frame index of the first sample in this block.
    pub block_start_frame: u64,
}

impl ProcessContext {
    /// Absolute time of the first sample in this block, in seconds.
    #[inline]
    pub fn block_start_seconds(&self) -> f64 {
        self.block_start_frame as f64 / f64::from(self.sample_rate)
    }
}

/// Information handed to [`Processor::initialize`].
#[derive(Debug, Clone)]
pub struct InitContext {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Frames per rendered block.
    pub frames_per_block: usize,
    /// Negotiated channel count of the node.
    pub channels: usize,
    /// The context clock.
    pub clock: Clock,
}

/// Upcast helper so the graph can hand typed access back to a node handle.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Returns `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Block processor stored in a graph node.
///
/// `process` runs on the realtime thread with the context lock held. It must
/// not allocate, block, or perform I/O. Every other method runs on a control
/// thread.
pub trait Processor: AsAny + Send {
    /// Fills or transforms one block in place.
    ///
    /// The buffer is planar, `ctx.frames` long, and has this node's negotiated
    /// channel count. Called only while the node is enabled.
    fn process(&mut self, buffer: &mut Buffer, ctx: &ProcessContext);

    /// Called when the node becomes initialized, and again after the channel
    /// count, block size, or sample rate changes.
    fn initialize(&mut self, _ctx: &InitContext) {}

    /// Called before the node is torn down or re-initialized.
    fn uninitialize(&mut self) {}

    /// Called when the node is enabled.
    fn start(&mut self) {}

    /// Called when the node is disabled.
    fn stop(&mut self) {}

    /// Static format; read once when the node is made.
    fn format(&self) -> NodeFormat {
        NodeFormat::default()
    }

    /// Short name for diagnostics.
    fn name(&self) -> &'static str {
        "node"
    }

    /// Visits every [`Param`] owned by the processor.
    ///
    /// The context uses this to bind parameters to its clock and size their
    /// value arrays before the first block.
    fn visit_params(&mut self, _visit: &mut dyn FnMut(&mut Param)) {}
}
