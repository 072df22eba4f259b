//! Rivulet Core - block-synchronous audio processing graph
//!
//! This crate provides a pull-based graph of audio nodes rendered one block
//! at a time, with sample-accurate parameter automation and lock-free bridges
//! to non-realtime threads.
//!
//! # Core Abstractions
//!
//! ## Graph
//!
//! - [`Context`] - Owns the graph, its mutation lock, and the device lifecycle
//! - [`NodeRef`] - Handle to a node; connect with [`NodeRef::connect`] or `&a >> &b`
//! - [`Processor`] - Object-safe trait implemented by every node kind
//! - [`NodeFormat`] / [`ChannelMode`] - Static node description and channel negotiation policy
//!
//! ## Automation
//!
//! - [`Param`] - Ramp schedule evaluated per block into a value array
//! - [`Curve`] - Linear, ease-in, and ease-out ramp shapes
//!
//! ## Buffers & Threads
//!
//! - [`Buffer`] / [`DynamicBuffer`] - Planar or interleaved `f32` blocks
//! - [`mix`] - Channel-adapting sum and mix
//! - [`RingBuffer`] - Lock-free SPSC queue; [`RunCounter`] records under/overruns
//!
//! ## Boundaries
//!
//! - [`AudioDevice`] / [`OfflineDevice`] - Realtime callback providers
//! - [`SourceFile`] / [`TargetFile`] - File decoders and encoders
//! - [`nodes`] - Generators, gain, pan, filter, tap, players, line in/out
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::{Context, OfflineDevice};
//! use rivulet_core::nodes::{Gain, Generator, Waveform};
//!
//! let device = OfflineDevice::new(48000, 256, 2);
//! let ctx = Context::with_device(Box::new(device.clone())).unwrap();
//!
//! let osc = ctx.make_node(Generator::new(Waveform::Sine, 440.0)).unwrap();
//! let gain = ctx.make_node(Gain::new(0.5)).unwrap();
//! let out = ctx.make_line_out().unwrap();
//! let _ = &osc >> &gain >> &out;
//!
//! osc.start();
//! gain.with(|g| g.param_mut().ramp_to(0.0, 0.1));
//! ctx.start().unwrap();
//!
//! let rendered = device.render_frames(48000 / 10);
//! assert_eq!(rendered.channels(), 2);
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: [`Context::render`] takes one lock and never allocates
//! - **Negotiated channels**: nodes adopt neighbor channel counts or mix at the boundary
//! - **Object-safe traits**: processors, devices, and files are all `dyn`-friendly

pub mod buffer;
pub mod clock;
pub mod context;
pub mod device;
pub mod error;
pub mod file;
mod graph;
pub mod mix;
pub mod node;
pub mod nodes;
pub mod param;
pub mod ring_buffer;

pub use buffer::{Buffer, DynamicBuffer, Layout};
pub use clock::Clock;
pub use context::{Context, ContextOptions, NodeRef};
pub use device::{AudioDevice, OfflineDevice, RenderCallback};
pub use error::{DeviceError, Error, FileError, GraphError, Result};
pub use file::{DEFAULT_FRAMES_PER_READ, MemorySource, MemoryTarget, SourceFile, TargetFile, read_all};
pub use node::{AsAny, ChannelMode, DEFAULT_MAX_BUSES, InitContext, NodeFormat, NodeId, ProcessContext, Processor};
pub use param::{Curve, DEFAULT_RAMP_SECONDS, Event, Param, RampOptions};
pub use ring_buffer::{DEFAULT_PADDING_FACTOR, RingBuffer, RingReader, RingWriter, RunCounter, padded_capacity};
