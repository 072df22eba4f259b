//! The graph owner: scheduling, lifecycle, and node handles.
//!
//! A [`Context`] holds the node arena behind one mutation lock. Every
//! structural change, parameter schedule, and buffer resize takes that lock,
//! and so does [`Context::render`] for the duration of one block. Nothing else
//! on the render path blocks.
//!
//! Nodes are reached through [`NodeRef`] handles. A node stays alive while a
//! handle refers to it, while it is the root or auto-pulled, or while a
//! downstream node consumes it. When none of these hold, it is uninitialized
//! and removed, and its inputs are reconsidered in turn.
//!
//! ```rust
//! use rivulet_core::{Buffer, Context, ContextOptions};
//! use rivulet_core::nodes::{Gain, Generator, Waveform};
//!
//! let ctx = Context::new(ContextOptions::default());
//! let osc = ctx.make_node(Generator::new(Waveform::Sine, 440.0)).unwrap();
//! let gain = ctx.make_node(Gain::new(0.25)).unwrap();
//! let out = ctx.make_line_out().unwrap();
//!
//! osc.start();
//! let _ = &osc >> &gain >> &out;
//!
//! let mut block = Buffer::new(ctx.frames_per_block(), ctx.output_channels());
//! ctx.render(&mut block);
//! assert!(block.data().iter().any(|&s| s != 0.0));
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::ops::Shr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::buffer::Buffer;
use crate::clock::Clock;
use crate::device::{AudioDevice, RenderCallback};
use crate::error::{GraphError, Result};
use crate::graph::{Graph, NodeSlot};
use crate::node::{ChannelMode, NodeFormat, NodeId, Processor};
use crate::nodes::{LineIn, LineOut};
use crate::param::DEFAULT_RAMP_SECONDS;
use crate::ring_buffer::{DEFAULT_PADDING_FACTOR, padded_capacity};

/// Construction options for a [`Context`] without a device.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per rendered block.
    pub frames_per_block: usize,
    /// Channels of the rendered output.
    pub output_channels: usize,
    /// Ramp length used by [`Param::ramp_to_default`](crate::Param::ramp_to_default).
    pub default_ramp_seconds: f64,
    /// Blocks of headroom in rings created by the context.
    pub ring_padding_factor: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frames_per_block: 512,
            output_channels: 2,
            default_ramp_seconds: DEFAULT_RAMP_SECONDS,
            ring_padding_factor: DEFAULT_PADDING_FACTOR,
        }
    }
}

struct Shared {
    graph: Mutex<Graph>,
    device: Mutex<Option<Box<dyn AudioDevice>>>,
    enabled: AtomicBool,
    clock: Clock,
    options: ContextOptions,
}

impl Shared {
    fn graph(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn device(&self) -> MutexGuard<'_, Option<Box<dyn AudioDevice>>> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self, out: &mut Buffer) {
        let mut graph = self.graph();
        graph.render(out, self.clock.frames());
        self.clock.advance(out.frames());
    }
}

/// Owner of a processing graph and its scheduling.
///
/// Dropping the context stops its device and uninitializes every reachable
/// node. Outstanding [`NodeRef`]s stay valid but the graph no longer renders.
pub struct Context {
    shared: Arc<Shared>,
}

impl Context {
    /// Creates a context driven manually through [`render`](Self::render).
    pub fn new(options: ContextOptions) -> Self {
        let clock = Clock::new(options.sample_rate);
        let graph = Graph::new(
            options.sample_rate,
            options.frames_per_block.max(1),
            options.output_channels.max(1),
            clock.clone(),
            options.default_ramp_seconds,
        );
        Self {
            shared: Arc::new(Shared {
                graph: Mutex::new(graph),
                device: Mutex::new(None),
                enabled: AtomicBool::new(false),
                clock,
                options,
            }),
        }
    }

    /// Creates a context rendering through `device`, with default options.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidFormat`] if the device reports zero frames per
    /// block or zero output channels.
    pub fn with_device(device: Box<dyn AudioDevice>) -> Result<Self> {
        Self::with_device_options(device, ContextOptions::default())
    }

    /// Creates a context rendering through `device`. Sample rate, block size,
    /// and output channels come from the device; the rest from `options`.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidFormat`] if the device reports zero frames per
    /// block or zero output channels.
    pub fn with_device_options(device: Box<dyn AudioDevice>, options: ContextOptions) -> Result<Self> {
        if device.frames_per_block() == 0 || device.output_channels() == 0 {
            return Err(GraphError::InvalidFormat(format!(
                "device '{}' reports {} frames × {} channels",
                device.name(),
                device.frames_per_block(),
                device.output_channels()
            ))
            .into());
        }
        let options = ContextOptions {
            sample_rate: device.sample_rate(),
            frames_per_block: device.frames_per_block(),
            output_channels: device.output_channels(),
            ..options
        };
        #[cfg(feature = "tracing")]
        tracing::info!(
            device = device.name(),
            sample_rate = options.sample_rate,
            frames_per_block = options.frames_per_block,
            "context attached to device"
        );
        let ctx = Self::new(options);
        *ctx.shared.device() = Some(device);
        Ok(ctx)
    }

    // --- Properties ---

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.shared.graph().sample_rate()
    }

    /// Frames per rendered block.
    pub fn frames_per_block(&self) -> usize {
        self.shared.graph().frames_per_block()
    }

    /// Channels of the rendered output.
    pub fn output_channels(&self) -> usize {
        self.shared.graph().output_channels()
    }

    /// The options this context was built with.
    pub fn options(&self) -> &ContextOptions {
        &self.shared.options
    }

    /// The context timeline.
    pub fn clock(&self) -> Clock {
        self.shared.clock.clone()
    }

    /// Frames rendered so far.
    pub fn processed_frames(&self) -> u64 {
        self.shared.clock.frames()
    }

    /// Seconds rendered so far.
    pub fn processed_seconds(&self) -> f64 {
        self.shared.clock.seconds()
    }

    /// Number of live nodes.
    pub fn num_nodes(&self) -> usize {
        self.shared.graph().num_nodes()
    }

    /// Name of the attached device, if any.
    pub fn device_name(&self) -> Option<String> {
        self.shared.device().as_ref().map(|d| d.name().to_string())
    }

    // --- Nodes ---

    /// Adds a node using the processor's own format.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidFormat`] if the format declares zero channels.
    pub fn make_node<P: Processor>(&self, processor: P) -> std::result::Result<NodeRef<P>, GraphError> {
        let format = processor.format();
        self.make_node_with(processor, format)
    }

    /// Adds a node with an explicit format.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidFormat`] if the format declares zero channels.
    pub fn make_node_with<P: Processor>(
        &self,
        processor: P,
        format: NodeFormat,
    ) -> std::result::Result<NodeRef<P>, GraphError> {
        let id = self.shared.graph().insert_with(Box::new(processor), format)?;
        Ok(NodeRef {
            shared: Arc::clone(&self.shared),
            id,
            _marker: PhantomData,
        })
    }

    /// Adds a [`LineOut`] matching the output channels and makes it the root.
    ///
    /// # Errors
    ///
    /// Propagates [`make_node`](Self::make_node) errors.
    pub fn make_line_out(&self) -> std::result::Result<NodeRef<LineOut>, GraphError> {
        let node = self.make_node(LineOut::new(self.output_channels()))?;
        self.set_root(&node)?;
        Ok(node)
    }

    /// Adds a [`LineIn`] fed by the attached device's input stream.
    ///
    /// # Errors
    ///
    /// [`GraphError::NoDevice`] without a device, or
    /// [`DeviceError::NoInput`](crate::DeviceError::NoInput) if it cannot capture.
    pub fn make_line_in(&self) -> Result<NodeRef<LineIn>> {
        let frames = self.frames_per_block();
        let capacity = padded_capacity(frames, self.shared.options.ring_padding_factor);
        let line_in = {
            let mut device = self.shared.device();
            let device = device.as_mut().ok_or(GraphError::NoDevice)?;
            let channels = device.input_channels().max(1);
            let (line_in, feed) = LineIn::new(channels, capacity);
            device.attach_input(feed)?;
            line_in
        };
        Ok(self.make_node(line_in)?)
    }

    // --- Topology ---

    /// Makes `node` the node rendered into the output buffer.
    ///
    /// # Errors
    ///
    /// [`GraphError::ForeignNode`] if `node` belongs to another context.
    pub fn set_root<P: ?Sized>(&self, node: &NodeRef<P>) -> std::result::Result<(), GraphError> {
        self.check_owner(node)?;
        let reclaimed = self.shared.graph().set_root(Some(node.id))?;
        drop(reclaimed);
        Ok(())
    }

    /// Removes the root. Renders silence until a new root is set.
    pub fn clear_root(&self) {
        let reclaimed = self.shared.graph().set_root(None);
        drop(reclaimed);
    }

    /// Handle to the current root.
    pub fn root(&self) -> Option<NodeRef> {
        let mut graph = self.shared.graph();
        let id = graph.root()?;
        graph.retain(id);
        Some(NodeRef {
            shared: Arc::clone(&self.shared),
            id,
            _marker: PhantomData,
        })
    }

    /// Pulls `node` every block even though nothing consumes it.
    ///
    /// # Errors
    ///
    /// [`GraphError::ForeignNode`] if `node` belongs to another context.
    pub fn add_auto_pulled<P: ?Sized>(&self, node: &NodeRef<P>) -> std::result::Result<(), GraphError> {
        self.check_owner(node)?;
        self.shared.graph().add_auto_pulled(node.id)
    }

    /// Stops pulling `node`. No-op if it was not auto-pulled.
    pub fn remove_auto_pulled<P: ?Sized>(&self, node: &NodeRef<P>) {
        if self.check_owner(node).is_ok() {
            let reclaimed = self.shared.graph().remove_auto_pulled(node.id);
            drop(reclaimed);
        }
    }

    /// Disconnects the inputs of every node reachable from the root or the
    /// auto-pulled set.
    pub fn disconnect_all_nodes(&self) {
        let reclaimed = self.shared.graph().disconnect_all();
        drop(reclaimed);
    }

    /// Tree listing of the graph from the root and the auto-pulled nodes.
    pub fn graph_description(&self) -> String {
        self.shared.graph().describe()
    }

    fn check_owner<P: ?Sized>(&self, node: &NodeRef<P>) -> std::result::Result<(), GraphError> {
        if Arc::ptr_eq(&self.shared, &node.shared) {
            Ok(())
        } else {
            Err(GraphError::ForeignNode)
        }
    }

    // --- Lifecycle ---

    /// Enables processing and starts the attached device.
    ///
    /// # Errors
    ///
    /// Propagates the device's start error; the context stays disabled.
    pub fn start(&self) -> Result<()> {
        if self.shared.enabled.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        {
            let mut graph = self.shared.graph();
            graph.initialize_all();
            graph.set_reachable_auto_enabled(true);
            if let Some(root) = graph.root() {
                graph.set_enabled(root, true);
            }
        }

        let mut device = self.shared.device();
        if let Some(device) = device.as_mut()
            && !device.is_running()
            && let Err(err) = device.start(render_callback(Arc::downgrade(&self.shared)))
        {
            self.shared.enabled.store(false, Ordering::Release);
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %err, "device failed to start");
            return Err(err.into());
        }
        #[cfg(feature = "tracing")]
        tracing::info!("context started");
        Ok(())
    }

    /// Stops the attached device and disables processing.
    pub fn stop(&self) {
        if !self.shared.enabled.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(device) = self.shared.device().as_mut() {
            device.stop();
        }
        {
            let mut graph = self.shared.graph();
            if let Some(root) = graph.root() {
                graph.set_enabled(root, false);
            }
            graph.set_reachable_auto_enabled(false);
        }
        #[cfg(feature = "tracing")]
        tracing::info!("context stopped");
    }

    /// Starts or stops the context.
    ///
    /// # Errors
    ///
    /// Propagates [`start`](Self::start) errors.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.start()
        } else {
            self.stop();
            Ok(())
        }
    }

    /// Whether the context is started.
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Renders one block into `out` and advances the clock.
    ///
    /// `out` must be `frames_per_block()` frames long; its channel count may
    /// differ from the root's and is adapted with the usual mixing rules. The
    /// block is rendered whether or not the context is started, so offline
    /// code can drive the graph directly. Does not allocate.
    pub fn render(&self, out: &mut Buffer) {
        self.shared.render(out);
    }

    /// Initializes every node reachable from the root or the auto-pulled set.
    pub fn initialize_all_nodes(&self) {
        self.shared.graph().initialize_all();
    }

    /// Uninitializes every node reachable from the root or the auto-pulled set.
    pub fn uninitialize_all_nodes(&self) {
        self.shared.graph().uninitialize_all();
    }

    /// Changes the block size, resizing buffers and re-initializing nodes.
    ///
    /// # Errors
    ///
    /// [`GraphError::DeviceAttached`] when a device owns the block size, and
    /// [`GraphError::InvalidFormat`] for zero.
    pub fn set_frames_per_block(&self, frames: usize) -> std::result::Result<(), GraphError> {
        self.check_reconfigurable()?;
        if frames == 0 {
            return Err(GraphError::InvalidFormat("zero frames per block".to_string()));
        }
        let mut graph = self.shared.graph();
        let sample_rate = graph.sample_rate();
        graph.set_block_format(frames, sample_rate);
        Ok(())
    }

    /// Changes the sample rate, re-initializing nodes.
    ///
    /// # Errors
    ///
    /// [`GraphError::DeviceAttached`] when a device owns the sample rate, and
    /// [`GraphError::InvalidFormat`] for zero.
    pub fn set_sample_rate(&self, sample_rate: u32) -> std::result::Result<(), GraphError> {
        self.check_reconfigurable()?;
        if sample_rate == 0 {
            return Err(GraphError::InvalidFormat("zero sample rate".to_string()));
        }
        let mut graph = self.shared.graph();
        let frames = graph.frames_per_block();
        graph.set_block_format(frames, sample_rate);
        Ok(())
    }

    fn check_reconfigurable(&self) -> std::result::Result<(), GraphError> {
        if self.shared.device().is_some() {
            Err(GraphError::DeviceAttached)
        } else {
            Ok(())
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.stop();
        self.uninitialize_all_nodes();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("options", &self.shared.options)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

fn render_callback(shared: Weak<Shared>) -> RenderCallback {
    Box::new(move |out: &mut Buffer| match shared.upgrade() {
        Some(shared) if shared.enabled.load(Ordering::Acquire) => shared.render(out),
        _ => out.zero(),
    })
}

/// Handle to a node in a [`Context`].
///
/// `P` is the processor type, used by [`with`](Self::with) for typed access;
/// [`erase`](Self::erase) turns any handle into a `NodeRef<dyn Processor>`.
/// Handles are cheap to clone and keep the node alive.
pub struct NodeRef<P: ?Sized = dyn Processor> {
    shared: Arc<Shared>,
    id: NodeId,
    _marker: PhantomData<fn() -> Box<P>>,
}

impl<P: ?Sized> NodeRef<P> {
    /// The node's id within its context.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// A type-erased handle to the same node.
    pub fn erase(&self) -> NodeRef {
        self.shared.graph().retain(self.id);
        NodeRef {
            shared: Arc::clone(&self.shared),
            id: self.id,
            _marker: PhantomData,
        }
    }

    fn inspect<R>(&self, default: R, f: impl FnOnce(&NodeSlot) -> R) -> R {
        self.shared.graph().slot(self.id).map_or(default, f)
    }

    fn check_peer<Q: ?Sized>(&self, other: &NodeRef<Q>) -> std::result::Result<(), GraphError> {
        if Arc::ptr_eq(&self.shared, &other.shared) {
            Ok(())
        } else {
            Err(GraphError::ForeignNode)
        }
    }

    /// Runs `f` on the processor as a trait object, under the context lock.
    pub fn with_processor<R>(&self, f: impl FnOnce(&mut dyn Processor) -> R) -> Option<R> {
        let mut graph = self.shared.graph();
        graph.slot_mut(self.id).map(|slot| f(slot.processor.as_mut()))
    }

    // --- Connections ---

    /// Connects this node's first free output to `other`'s first free input.
    /// Returns a handle to `other` for chaining.
    ///
    /// # Errors
    ///
    /// See [`connect_bus`](Self::connect_bus).
    pub fn connect<Q: ?Sized>(&self, other: &NodeRef<Q>) -> std::result::Result<NodeRef<Q>, GraphError> {
        self.connect_impl(other, None, None)
    }

    /// Connects output bus `output_bus` to `other`'s input bus `input_bus`.
    ///
    /// # Errors
    ///
    /// [`GraphError::ForeignNode`] across contexts, bus errors for out-of-range
    /// or occupied busses, and [`GraphError::CycleDetected`] if `other`
    /// already feeds this node.
    pub fn connect_bus<Q: ?Sized>(
        &self,
        other: &NodeRef<Q>,
        output_bus: usize,
        input_bus: usize,
    ) -> std::result::Result<NodeRef<Q>, GraphError> {
        self.connect_impl(other, Some(output_bus), Some(input_bus))
    }

    /// Connects the first free output to `other`'s input bus `input_bus`.
    ///
    /// # Errors
    ///
    /// See [`connect_bus`](Self::connect_bus).
    pub fn connect_input_bus<Q: ?Sized>(
        &self,
        other: &NodeRef<Q>,
        input_bus: usize,
    ) -> std::result::Result<NodeRef<Q>, GraphError> {
        self.connect_impl(other, None, Some(input_bus))
    }

    fn connect_impl<Q: ?Sized>(
        &self,
        other: &NodeRef<Q>,
        output_bus: Option<usize>,
        input_bus: Option<usize>,
    ) -> std::result::Result<NodeRef<Q>, GraphError> {
        self.check_peer(other)?;
        let mut graph = self.shared.graph();
        graph.connect(self.id, other.id, output_bus, input_bus)?;
        graph.retain(other.id);
        Ok(NodeRef {
            shared: Arc::clone(&other.shared),
            id: other.id,
            _marker: PhantomData,
        })
    }

    /// Removes the connection on output bus `bus`.
    pub fn disconnect(&self, bus: usize) {
        let reclaimed = self.shared.graph().disconnect_output(self.id, bus);
        drop(reclaimed);
    }

    /// Removes the connection on input bus `bus`.
    pub fn disconnect_input(&self, bus: usize) {
        let reclaimed = self.shared.graph().disconnect_input(self.id, bus);
        drop(reclaimed);
    }

    /// Removes every input connection.
    pub fn disconnect_all_inputs(&self) {
        let reclaimed = self.shared.graph().disconnect_all_inputs(self.id);
        drop(reclaimed);
    }

    /// Removes every output connection.
    pub fn disconnect_all_outputs(&self) {
        let reclaimed = self.shared.graph().disconnect_all_outputs(self.id);
        drop(reclaimed);
    }

    // --- Enable state ---

    /// Enables processing.
    pub fn start(&self) {
        self.set_enabled(true);
    }

    /// Disables processing. A disabled node passes its summed input through.
    pub fn stop(&self) {
        self.set_enabled(false);
    }

    /// Enables or disables processing.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.graph().set_enabled(self.id, enabled);
    }

    // --- Queries ---

    /// Diagnostic name of the processor.
    pub fn name(&self) -> &'static str {
        self.inspect("", |s| s.name)
    }

    /// Negotiated channel count.
    pub fn num_channels(&self) -> usize {
        self.inspect(0, |s| s.channels)
    }

    /// Channel negotiation policy.
    pub fn channel_mode(&self) -> ChannelMode {
        self.inspect(ChannelMode::Fixed, |s| s.mode)
    }

    /// Whether the node processes.
    pub fn is_enabled(&self) -> bool {
        self.inspect(false, |s| s.enabled)
    }

    /// Whether the node is initialized.
    pub fn is_initialized(&self) -> bool {
        self.inspect(false, |s| s.initialized)
    }

    /// Whether the node processes in its consumer's buffer.
    pub fn is_process_in_place(&self) -> bool {
        self.inspect(false, |s| s.in_place)
    }

    /// Number of connected inputs.
    pub fn num_inputs(&self) -> usize {
        self.inspect(0, |s| s.inputs.len())
    }

    /// Number of connected outputs.
    pub fn num_outputs(&self) -> usize {
        self.inspect(0, |s| s.outputs.len())
    }

    /// Length in samples of the internal buffer; zero while in place and
    /// never allocated.
    pub fn internal_buffer_len(&self) -> usize {
        self.inspect(0, |s| s.internal.len())
    }

    /// Length in samples of the summing buffer.
    pub fn summing_buffer_len(&self) -> usize {
        self.inspect(0, |s| s.summing.len())
    }

    /// Whether `other` is connected to one of this node's inputs.
    pub fn is_connected_to_input<Q: ?Sized>(&self, other: &NodeRef<Q>) -> bool {
        self.check_peer(other).is_ok() && self.inspect(false, |s| s.inputs.values().any(|&i| i == other.id))
    }

    /// Whether this node feeds `other`.
    pub fn is_connected_to_output<Q: ?Sized>(&self, other: &NodeRef<Q>) -> bool {
        self.check_peer(other).is_ok() && self.inspect(false, |s| s.outputs.values().any(|&o| o == other.id))
    }
}

impl<P: Processor> NodeRef<P> {
    /// Runs `f` on the typed processor under the context lock.
    ///
    /// Use this for control-thread changes such as scheduling a ramp; the
    /// change is visible from the next block.
    pub fn with<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut graph = self.shared.graph();
        // A live handle keeps its node in the arena, and the handle's type
        // parameter is the type it was made with.
        let processor = graph
            .slot_mut(self.id)
            .and_then(|slot| slot.processor.as_mut().as_any_mut().downcast_mut::<P>())
            .expect("node handle refers to a live node of its own type");
        f(processor)
    }
}

impl<P: ?Sized> Clone for NodeRef<P> {
    fn clone(&self) -> Self {
        self.shared.graph().retain(self.id);
        Self {
            shared: Arc::clone(&self.shared),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<P: ?Sized> Drop for NodeRef<P> {
    fn drop(&mut self) {
        let reclaimed = self.shared.graph().release(self.id);
        drop(reclaimed);
    }
}

impl<P: ?Sized> fmt::Debug for NodeRef<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

/// `&a >> &b` connects `a` to `b` and yields `b`.
///
/// # Panics
///
/// Panics with the [`GraphError`] message if the connection is invalid. Use
/// [`NodeRef::connect`] to handle the error instead.
impl<P: ?Sized, Q: ?Sized> Shr<&NodeRef<Q>> for &NodeRef<P> {
    type Output = NodeRef<Q>;

    fn shr(self, rhs: &NodeRef<Q>) -> NodeRef<Q> {
        match self.connect(rhs) {
            Ok(node) => node,
            Err(err) => panic!("{err}"),
        }
    }
}

/// Chaining form of `&a >> &b`, so `&a >> &b >> &c` reads left to right.
///
/// # Panics
///
/// Panics with the [`GraphError`] message if the connection is invalid.
impl<P: ?Sized, Q: ?Sized> Shr<&NodeRef<Q>> for NodeRef<P> {
    type Output = NodeRef<Q>;

    fn shr(self, rhs: &NodeRef<Q>) -> NodeRef<Q> {
        &self >> rhs
    }
}
