//! Node arena, channel negotiation, and the block pull.
//!
//! The [`Graph`] is owned by a [`Context`](crate::Context) behind its mutation
//! lock. Nodes live in slots addressed by [`NodeId`]. Input edges own their
//! upstream node (a node stays alive while anything downstream consumes it);
//! output edges are plain lookups used for negotiation and teardown.
//!
//! # Processing modes
//!
//! A node with at most one input, at most one output, and the same channel
//! count as its neighbors processes *in place*: its input renders straight
//! into the buffer its consumer handed down, and the node transforms that
//! buffer. Every other node owns an internal and a summing buffer. It pulls
//! each input into the internal buffer, sums into the summing buffer,
//! processes that, and mixes the result into the consumer's buffer with
//! channel adaptation. A summing node caches its output for the block, so a
//! node feeding several consumers is processed once.
//!
//! # Negotiation
//!
//! [`Graph::configure`] runs whenever a node's connections change. It walks an
//! explicit worklist with a visited set, so channel counts pushed through
//! chains of `MatchesInput`/`MatchesOutput` nodes always terminate.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::mem;

use crate::buffer::{Buffer, DynamicBuffer, Layout};
use crate::clock::Clock;
use crate::error::GraphError;
use crate::mix;
use crate::node::{ChannelMode, InitContext, NodeFormat, NodeId, ProcessContext, Processor};

/// Processors removed from the graph, dropped by the caller after the lock is
/// released.
pub(crate) type Reclaimed = Vec<Box<dyn Processor>>;

pub(crate) struct NodeSlot {
    pub(crate) processor: Box<dyn Processor>,
    pub(crate) name: &'static str,
    /// Input bus → upstream node. Owning.
    pub(crate) inputs: BTreeMap<usize, NodeId>,
    /// Output bus → downstream node. Lookup only.
    pub(crate) outputs: BTreeMap<usize, NodeId>,
    pub(crate) channels: usize,
    pub(crate) mode: ChannelMode,
    pub(crate) auto_enable: bool,
    pub(crate) max_inputs: usize,
    pub(crate) max_outputs: usize,
    pub(crate) enabled: bool,
    pub(crate) initialized: bool,
    pub(crate) in_place: bool,
    pub(crate) internal: Buffer,
    pub(crate) summing: Buffer,
    last_processed: Option<u64>,
    external_refs: usize,
}

pub(crate) struct Graph {
    nodes: Vec<Option<NodeSlot>>,
    generations: Vec<u32>,
    free: Vec<u32>,
    root: Option<NodeId>,
    auto_pulled: Vec<NodeId>,
    /// Holds auto-pulled output and a root rendered for a differently shaped target.
    scratch: DynamicBuffer,
    sample_rate: u32,
    frames_per_block: usize,
    output_channels: usize,
    clock: Clock,
    default_ramp_seconds: f64,
}

impl Graph {
    pub(crate) fn new(
        sample_rate: u32,
        frames_per_block: usize,
        output_channels: usize,
        clock: Clock,
        default_ramp_seconds: f64,
    ) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            root: None,
            auto_pulled: Vec::new(),
            scratch: DynamicBuffer::default(),
            sample_rate,
            frames_per_block,
            output_channels,
            clock,
            default_ramp_seconds,
        }
    }

    // --- Slots ---

    pub(crate) fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        match self.generations.get(id.index as usize) {
            Some(&generation) if generation == id.generation => {
                self.nodes[id.index as usize].as_ref()
            }
            _ => None,
        }
    }

    pub(crate) fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        match self.generations.get(id.index as usize) {
            Some(&generation) if generation == id.generation => {
                self.nodes[id.index as usize].as_mut()
            }
            _ => None,
        }
    }

    fn require(&self, id: NodeId) -> Result<&NodeSlot, GraphError> {
        self.slot(id).ok_or(GraphError::NodeNotFound(id))
    }

    fn channels_of(&self, id: NodeId) -> usize {
        self.slot(id).map_or(0, |s| s.channels)
    }

    pub(crate) fn num_nodes(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub(crate) fn frames_per_block(&self) -> usize {
        self.frames_per_block
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn is_auto_pulled(&self, id: NodeId) -> bool {
        self.auto_pulled.contains(&id)
    }

    /// Stores a processor in a fresh slot with one external reference.
    pub(crate) fn insert(&mut self, processor: Box<dyn Processor>) -> Result<NodeId, GraphError> {
        let format = processor.format();
        self.insert_with(processor, format)
    }

    /// Like [`insert`](Self::insert) with an explicit format.
    pub(crate) fn insert_with(
        &mut self,
        mut processor: Box<dyn Processor>,
        format: NodeFormat,
    ) -> Result<NodeId, GraphError> {
        if format.channels == 0 {
            return Err(GraphError::InvalidFormat(format!(
                "'{}' declares zero channels",
                processor.name()
            )));
        }

        let clock = self.clock.clone();
        let frames = self.frames_per_block;
        let ramp = self.default_ramp_seconds;
        processor.visit_params(&mut |param| {
            param.attach(clock.clone(), frames);
            param.set_default_ramp_seconds(ramp);
        });

        let slot = NodeSlot {
            name: processor.name(),
            processor,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            channels: format.channels,
            mode: format.mode,
            auto_enable: format.auto_enable,
            max_inputs: format.max_inputs,
            max_outputs: format.max_outputs,
            enabled: false,
            initialized: false,
            in_place: true,
            internal: Buffer::default(),
            summing: Buffer::default(),
            last_processed: None,
            external_refs: 1,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index as usize] = Some(slot);
                index
            }
            None => {
                self.nodes.push(Some(slot));
                self.generations.push(0);
                (self.nodes.len() - 1) as u32
            }
        };
        let id = NodeId {
            index,
            generation: self.generations[index as usize],
        };
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: {} as {id}", self.require(id).map_or("?", |s| s.name));
        Ok(id)
    }

    pub(crate) fn retain(&mut self, id: NodeId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.external_refs += 1;
        }
    }

    pub(crate) fn release(&mut self, id: NodeId) -> Reclaimed {
        let mut reclaimed = Vec::new();
        if let Some(slot) = self.slot_mut(id) {
            slot.external_refs = slot.external_refs.saturating_sub(1);
            self.collect(id, &mut reclaimed);
        }
        reclaimed
    }

    /// Reclaims `start` and, in cascade, its inputs once nothing keeps them alive.
    fn collect(&mut self, start: NodeId, reclaimed: &mut Reclaimed) {
        let mut work = vec![start];
        while let Some(id) = work.pop() {
            let Some(slot) = self.slot(id) else { continue };
            if slot.external_refs > 0
                || !slot.outputs.is_empty()
                || self.root == Some(id)
                || self.auto_pulled.contains(&id)
            {
                continue;
            }

            self.uninitialize_node(id);
            let index = id.index as usize;
            let Some(mut slot) = self.nodes[index].take() else { continue };
            self.generations[index] = self.generations[index].wrapping_add(1);
            self.free.push(id.index);
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_remove: {} {id}", slot.name);

            for (_, input) in mem::take(&mut slot.inputs) {
                if let Some(upstream) = self.slot_mut(input) {
                    upstream.outputs.retain(|_, out| *out != id);
                }
                work.push(input);
            }
            reclaimed.push(slot.processor);
        }
    }

    // --- Topology ---

    /// Connects `from` into `to`. Self and duplicate edges are silent no-ops.
    pub(crate) fn connect(
        &mut self,
        from: NodeId,
        to: NodeId,
        output_bus: Option<usize>,
        input_bus: Option<usize>,
    ) -> Result<(), GraphError> {
        if from == to {
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_connect: ignoring self-connection of {from}");
            return Ok(());
        }
        let src = self.require(from)?;
        let dst = self.require(to)?;
        if dst.inputs.values().any(|&input| input == from) {
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_connect: {from} already feeds {to}");
            return Ok(());
        }

        let output_bus = pick_bus(&src.outputs, src.max_outputs, output_bus, src.name, "output")?;
        let input_bus = pick_bus(&dst.inputs, dst.max_inputs, input_bus, dst.name, "input")?;

        if self.reaches_upstream(from, to) {
            return Err(GraphError::CycleDetected {
                from: src.name,
                to: dst.name,
            });
        }

        if let Some(src) = self.slot_mut(from) {
            src.outputs.insert(output_bus, to);
        }
        if let Some(dst) = self.slot_mut(to) {
            dst.inputs.insert(input_bus, from);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {from}[{output_bus}] → {to}[{input_bus}]");

        self.configure(to);
        Ok(())
    }

    /// True if `target` is `start` or feeds it, directly or transitively.
    fn reaches_upstream(&self, start: NodeId, target: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            let idx = current.index as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            if let Some(slot) = self.slot(current) {
                stack.extend(slot.inputs.values().copied());
            }
        }
        false
    }

    pub(crate) fn disconnect_output(&mut self, from: NodeId, bus: usize) -> Reclaimed {
        let Some(to) = self.slot_mut(from).and_then(|s| s.outputs.remove(&bus)) else {
            return Vec::new();
        };
        if let Some(dst) = self.slot_mut(to) {
            dst.inputs.retain(|_, input| *input != from);
        }
        self.after_disconnect(from, to)
    }

    pub(crate) fn disconnect_input(&mut self, to: NodeId, bus: usize) -> Reclaimed {
        let Some(from) = self.slot_mut(to).and_then(|s| s.inputs.remove(&bus)) else {
            return Vec::new();
        };
        if let Some(src) = self.slot_mut(from) {
            src.outputs.retain(|_, output| *output != to);
        }
        self.after_disconnect(from, to)
    }

    pub(crate) fn disconnect_all_inputs(&mut self, id: NodeId) -> Reclaimed {
        let buses: Vec<usize> = self
            .slot(id)
            .map(|s| s.inputs.keys().copied().collect())
            .unwrap_or_default();
        buses
            .into_iter()
            .flat_map(|bus| self.disconnect_input(id, bus))
            .collect()
    }

    pub(crate) fn disconnect_all_outputs(&mut self, id: NodeId) -> Reclaimed {
        let buses: Vec<usize> = self
            .slot(id)
            .map(|s| s.outputs.keys().copied().collect())
            .unwrap_or_default();
        buses
            .into_iter()
            .flat_map(|bus| self.disconnect_output(id, bus))
            .collect()
    }

    /// Detaches every node reachable from the root or the auto-pulled set.
    pub(crate) fn disconnect_all(&mut self) -> Reclaimed {
        let mut reclaimed = Vec::new();
        for id in self.reachable_post_order() {
            reclaimed.extend(self.disconnect_all_inputs(id));
        }
        reclaimed
    }

    fn after_disconnect(&mut self, from: NodeId, to: NodeId) -> Reclaimed {
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: {from} → {to}");
        self.refresh(to);
        self.refresh(from);
        let mut reclaimed = Vec::new();
        self.collect(from, &mut reclaimed);
        reclaimed
    }

    pub(crate) fn set_root(&mut self, id: Option<NodeId>) -> Result<Reclaimed, GraphError> {
        if let Some(id) = id {
            self.require(id)?;
        }
        let previous = mem::replace(&mut self.root, id);
        if let Some(id) = id {
            self.configure(id);
        }
        let mut reclaimed = Vec::new();
        if let Some(previous) = previous
            && Some(previous) != id
        {
            self.refresh(previous);
            self.collect(previous, &mut reclaimed);
        }
        Ok(reclaimed)
    }

    pub(crate) fn add_auto_pulled(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.require(id)?;
        if !self.auto_pulled.contains(&id) {
            self.auto_pulled.push(id);
        }
        self.configure(id);
        Ok(())
    }

    pub(crate) fn remove_auto_pulled(&mut self, id: NodeId) -> Reclaimed {
        let mut reclaimed = Vec::new();
        if let Some(pos) = self.auto_pulled.iter().position(|&n| n == id) {
            self.auto_pulled.remove(pos);
            self.refresh(id);
            self.collect(id, &mut reclaimed);
        }
        reclaimed
    }

    // --- Negotiation ---

    /// Renegotiates channels and processing modes starting at `id`.
    pub(crate) fn configure(&mut self, id: NodeId) {
        let mut visited = vec![false; self.nodes.len()];
        let mut work = vec![id];
        while let Some(current) = work.pop() {
            let idx = current.index as usize;
            if idx >= visited.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;
            self.configure_node(current, &mut work);
        }
        self.reserve_scratch();
    }

    fn configure_node(&mut self, id: NodeId, work: &mut Vec<NodeId>) {
        let Some(slot) = self.slot(id) else { return };
        let inputs: Vec<NodeId> = slot.inputs.values().copied().collect();
        let outputs: Vec<NodeId> = slot.outputs.values().copied().collect();
        let mode = slot.mode;

        let mut in_place = inputs.len() <= 1 && outputs.len() <= 1;

        if mode == ChannelMode::MatchesInput
            && let Some(widest) = inputs.iter().map(|&i| self.channels_of(i)).max()
        {
            self.set_channels(id, widest);
        }
        let channels = self.channels_of(id);

        for &input in &inputs {
            let Some(upstream) = self.slot(input) else { continue };
            if upstream.channels != channels {
                if upstream.mode == ChannelMode::MatchesOutput {
                    self.set_channels(input, channels);
                    work.push(input);
                } else {
                    in_place = false;
                    self.setup_summing(input);
                }
            }
            if let Some(upstream) = self.slot(input)
                && upstream.in_place
                && upstream.outputs.len() > 1
            {
                self.setup_summing(input);
            }
            self.initialize_node(input);
        }

        for &output in &outputs {
            let Some(downstream) = self.slot(output) else { continue };
            if downstream.channels != channels {
                if downstream.mode == ChannelMode::MatchesInput {
                    self.set_channels(output, channels);
                    work.push(output);
                } else {
                    in_place = false;
                }
            }
        }

        if in_place && !self.forces_summing(id) {
            if let Some(slot) = self.slot_mut(id) {
                slot.in_place = true;
            }
        } else {
            self.setup_summing(id);
        }
        self.initialize_node(id);

        #[cfg(feature = "tracing")]
        if let Some(slot) = self.slot(id) {
            tracing::debug!(
                "graph_configure: {} {id} channels={} {}",
                slot.name,
                slot.channels,
                if slot.in_place { "in-place" } else { "summing" }
            );
        }
    }

    /// Recomputes the processing mode of one node without propagating channels.
    fn refresh(&mut self, id: NodeId) {
        let Some(slot) = self.slot(id) else { return };
        let channels = slot.channels;
        let neighbors_match = slot
            .inputs
            .values()
            .chain(slot.outputs.values())
            .all(|&n| self.channels_of(n) == channels);
        let in_place = slot.inputs.len() <= 1
            && slot.outputs.len() <= 1
            && neighbors_match
            && !self.forces_summing(id);

        if in_place {
            if let Some(slot) = self.slot_mut(id) {
                slot.in_place = true;
            }
        } else {
            self.setup_summing(id);
        }
    }

    /// Nodes that must cache their output regardless of topology.
    fn forces_summing(&self, id: NodeId) -> bool {
        let root_mismatch =
            self.root == Some(id) && self.channels_of(id) != self.output_channels;
        root_mismatch || self.auto_pulled.contains(&id)
    }

    fn set_channels(&mut self, id: NodeId, channels: usize) {
        if self.channels_of(id) == channels {
            return;
        }
        self.uninitialize_node(id);
        let frames = self.frames_per_block;
        if let Some(slot) = self.slot_mut(id) {
            slot.channels = channels;
            if !slot.in_place {
                slot.internal = Buffer::new(frames, channels);
                slot.summing = Buffer::new(frames, channels);
            }
        }
    }

    fn setup_summing(&mut self, id: NodeId) {
        let frames = self.frames_per_block;
        if let Some(slot) = self.slot_mut(id) {
            slot.in_place = false;
            if slot.internal.frames() != frames || slot.internal.channels() != slot.channels {
                slot.internal = Buffer::new(frames, slot.channels);
            }
            if slot.summing.frames() != frames || slot.summing.channels() != slot.channels {
                slot.summing = Buffer::new(frames, slot.channels);
            }
        }
    }

    fn reserve_scratch(&mut self) {
        let widest = self
            .auto_pulled
            .iter()
            .chain(&self.root)
            .map(|&id| self.channels_of(id))
            .max()
            .unwrap_or(0);
        let needed = widest * self.frames_per_block;
        if self.scratch.capacity() < needed {
            self.scratch.set_size(self.frames_per_block, widest);
        }
    }

    // --- Lifecycle ---

    fn init_context(&self, channels: usize) -> InitContext {
        InitContext {
            sample_rate: self.sample_rate as f32,
            frames_per_block: self.frames_per_block,
            channels,
            clock: self.clock.clone(),
        }
    }

    pub(crate) fn initialize_node(&mut self, id: NodeId) {
        let Some(slot) = self.slot(id) else { return };
        if slot.initialized {
            return;
        }
        let ctx = self.init_context(slot.channels);
        if let Some(slot) = self.slot_mut(id) {
            slot.processor.initialize(&ctx);
            slot.initialized = true;
            if slot.auto_enable && !slot.enabled {
                slot.enabled = true;
                slot.processor.start();
            }
        }
    }

    pub(crate) fn uninitialize_node(&mut self, id: NodeId) {
        if let Some(slot) = self.slot_mut(id) {
            if !slot.initialized {
                return;
            }
            if slot.auto_enable && slot.enabled {
                slot.enabled = false;
                slot.processor.stop();
            }
            slot.processor.uninitialize();
            slot.initialized = false;
        }
    }

    pub(crate) fn set_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(slot) = self.slot_mut(id)
            && slot.enabled != enabled
        {
            slot.enabled = enabled;
            if enabled {
                slot.processor.start();
            } else {
                slot.processor.stop();
            }
        }
    }

    /// Enables or disables every initialized auto-enabled node in reach.
    pub(crate) fn set_reachable_auto_enabled(&mut self, enabled: bool) {
        for id in self.reachable_post_order() {
            if self.slot(id).is_some_and(|s| s.auto_enable && s.initialized) {
                self.set_enabled(id, enabled);
            }
        }
    }

    /// Nodes reachable from the root and the auto-pulled set, inputs first.
    fn reachable_post_order(&self) -> Vec<NodeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let starts: Vec<NodeId> = self.root.iter().chain(&self.auto_pulled).copied().collect();
        for start in starts {
            let mut stack = vec![(start, false)];
            while let Some((id, expanded)) = stack.pop() {
                if expanded {
                    order.push(id);
                    continue;
                }
                let idx = id.index as usize;
                if idx >= visited.len() || visited[idx] {
                    continue;
                }
                let Some(slot) = self.slot(id) else { continue };
                visited[idx] = true;
                stack.push((id, true));
                for &input in slot.inputs.values().rev() {
                    stack.push((input, false));
                }
            }
        }
        order
    }

    pub(crate) fn initialize_all(&mut self) {
        for id in self.reachable_post_order() {
            self.initialize_node(id);
        }
    }

    pub(crate) fn uninitialize_all(&mut self) {
        for id in self.reachable_post_order() {
            self.uninitialize_node(id);
        }
    }

    /// Changes block size and sample rate, re-initializing what was initialized.
    pub(crate) fn set_block_format(&mut self, frames_per_block: usize, sample_rate: u32) {
        let was_initialized: Vec<NodeId> = self
            .live_ids()
            .filter(|&id| self.slot(id).is_some_and(|s| s.initialized))
            .collect();
        for &id in &was_initialized {
            self.uninitialize_node(id);
        }

        self.frames_per_block = frames_per_block;
        self.sample_rate = sample_rate;
        self.clock.set_sample_rate(sample_rate);

        let clock = self.clock.clone();
        let ids: Vec<NodeId> = self.live_ids().collect();
        for id in ids {
            let summing = self.slot(id).is_some_and(|s| !s.in_place);
            if summing {
                self.setup_summing(id);
            }
            if let Some(slot) = self.slot_mut(id) {
                slot.processor.visit_params(&mut |param| {
                    param.attach(clock.clone(), frames_per_block);
                });
            }
        }
        self.reserve_scratch();

        for id in was_initialized {
            self.initialize_node(id);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_format: {frames_per_block} frames @ {sample_rate} Hz");
    }

    fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref().map(|_| NodeId {
                index: index as u32,
                generation: self.generations[index],
            })
        })
    }

    // --- Rendering ---

    /// Renders one block from the root into `out`, then drives auto-pulled nodes.
    ///
    /// Allocation-free: buffers were sized during negotiation.
    pub(crate) fn render(&mut self, out: &mut Buffer, block_start_frame: u64) {
        debug_assert_eq!(out.frames(), self.frames_per_block, "render buffer size");
        debug_assert_eq!(out.layout(), Layout::Planar, "render buffer layout");
        let ctx = ProcessContext {
            frames: out.frames(),
            sample_rate: self.sample_rate as f32,
            block_start_frame,
        };

        match self.root {
            // An in-place chain processes the target directly, so its shape must
            // be the root's own.
            Some(root) if out.channels() != self.channels_of(root) => {
                let mut scratch = mem::take(&mut self.scratch);
                scratch.set_size(ctx.frames, self.channels_of(root));
                self.pull(root, &mut scratch, &ctx);
                mix::mix_into(out, &scratch);
                self.scratch = scratch;
            }
            Some(root) => self.pull(root, out, &ctx),
            None => out.zero(),
        }

        for i in 0..self.auto_pulled.len() {
            let id = self.auto_pulled[i];
            let channels = self.channels_of(id);
            let mut scratch = mem::take(&mut self.scratch);
            scratch.set_size(ctx.frames, channels);
            self.pull(id, &mut scratch, &ctx);
            self.scratch = scratch;
        }
    }

    /// Overwrites `dest` with the output of `id`, adapted to `dest`'s channels.
    fn pull(&mut self, id: NodeId, dest: &mut Buffer, ctx: &ProcessContext) {
        let Some(slot) = self.slot_mut(id) else {
            dest.zero();
            return;
        };

        if slot.in_place {
            match slot.inputs.values().next().copied() {
                Some(input) => self.pull(input, dest, ctx),
                None => dest.zero(),
            }
            if let Some(slot) = self.slot_mut(id)
                && slot.enabled
                && slot.initialized
            {
                slot.processor.process(dest, ctx);
            }
            return;
        }

        if slot.last_processed != Some(ctx.block_start_frame) {
            slot.last_processed = Some(ctx.block_start_frame);
            let mut internal = mem::take(&mut slot.internal);
            let mut summing = mem::take(&mut slot.summing);
            summing.zero();

            let mut next_bus = 0;
            while let Some((bus, input)) = self
                .slot(id)
                .and_then(|s| s.inputs.range(next_bus..).next().map(|(&b, &i)| (b, i)))
            {
                next_bus = bus + 1;
                self.pull(input, &mut internal, ctx);
                mix::sum_into(&mut summing, &internal);
            }

            if let Some(slot) = self.slot_mut(id) {
                if slot.enabled && slot.initialized {
                    slot.processor.process(&mut summing, ctx);
                }
                slot.internal = internal;
                slot.summing = summing;
            }
        }

        if let Some(slot) = self.slot(id) {
            mix::mix_into(dest, &slot.summing);
        }
    }

    // --- Diagnostics ---

    /// Human-readable tree of the graph, one node per line.
    pub(crate) fn describe(&self) -> String {
        let mut out = String::new();
        let starts: Vec<NodeId> = self.root.iter().chain(&self.auto_pulled).copied().collect();
        for start in starts {
            let mut stack = vec![(start, 0usize)];
            while let Some((id, depth)) = stack.pop() {
                let Some(slot) = self.slot(id) else { continue };
                let _ = writeln!(
                    out,
                    "{}{} [{}, ch: {}, {:?}, {}]",
                    "-- ".repeat(depth),
                    slot.name,
                    if slot.enabled { "enabled" } else { "disabled" },
                    slot.channels,
                    slot.mode,
                    if slot.in_place { "in-place" } else { "sum" },
                );
                for &input in slot.inputs.values().rev() {
                    stack.push((input, depth + 1));
                }
            }
        }
        out
    }
}

/// Resolves a requested (or first free) bus against a node's bus map.
fn pick_bus(
    used: &BTreeMap<usize, NodeId>,
    max: usize,
    requested: Option<usize>,
    node: &'static str,
    direction: &'static str,
) -> Result<usize, GraphError> {
    match requested {
        Some(bus) if bus >= max => Err(GraphError::BusOutOfRange { node, bus, max }),
        Some(bus) if used.contains_key(&bus) => Err(if direction == "input" {
            GraphError::InputBusInUse { node, bus }
        } else {
            GraphError::OutputBusInUse { node, bus }
        }),
        Some(bus) => Ok(bus),
        None => (0..max)
            .find(|bus| !used.contains_key(bus))
            .ok_or(GraphError::NoFreeBus { node, direction }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FRAMES: usize = 8;

    struct Source {
        value: f32,
        channels: usize,
        calls: Arc<AtomicUsize>,
    }

    impl Processor for Source {
        fn process(&mut self, buffer: &mut Buffer, _ctx: &ProcessContext) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            buffer.data_mut().fill(self.value);
        }
        fn format(&self) -> NodeFormat {
            NodeFormat::source(self.channels).with_auto_enable(true)
        }
        fn name(&self) -> &'static str {
            "source"
        }
    }

    struct Through(ChannelMode, usize);

    impl Processor for Through {
        fn process(&mut self, _buffer: &mut Buffer, _ctx: &ProcessContext) {}
        fn format(&self) -> NodeFormat {
            NodeFormat::effect().with_channels(self.1).with_mode(self.0)
        }
        fn name(&self) -> &'static str {
            "through"
        }
    }

    fn graph() -> Graph {
        Graph::new(1000, FRAMES, 2, Clock::new(1000), 0.005)
    }

    fn source(g: &mut Graph, value: f32, channels: usize) -> (NodeId, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let id = g
            .insert(Box::new(Source {
                value,
                channels,
                calls: Arc::clone(&calls),
            }))
            .unwrap();
        (id, calls)
    }

    #[test]
    fn self_and_duplicate_edges_are_noops() {
        let mut g = graph();
        let (a, _) = source(&mut g, 1.0, 1);
        let b = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        g.connect(b, b, None, None).unwrap();
        g.connect(a, b, None, None).unwrap();
        g.connect(a, b, None, None).unwrap();
        assert_eq!(g.slot(b).unwrap().inputs.len(), 1);
        assert_eq!(g.slot(a).unwrap().outputs.len(), 1);
    }

    #[test]
    fn source_rejects_inputs() {
        let mut g = graph();
        let (a, _) = source(&mut g, 1.0, 1);
        let (b, _) = source(&mut g, 1.0, 1);
        let err = g.connect(a, b, None, None).unwrap_err();
        assert!(matches!(err, GraphError::NoFreeBus { direction: "input", .. }));
    }

    #[test]
    fn bus_errors() {
        let mut g = graph();
        let (a, _) = source(&mut g, 1.0, 1);
        let (c, _) = source(&mut g, 1.0, 1);
        let b = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        assert!(matches!(
            g.connect(a, b, None, Some(99)),
            Err(GraphError::BusOutOfRange { bus: 99, .. })
        ));
        g.connect(a, b, None, Some(0)).unwrap();
        assert!(matches!(
            g.connect(c, b, None, Some(0)),
            Err(GraphError::InputBusInUse { bus: 0, .. })
        ));
    }

    #[test]
    fn indirect_cycle_rejected() {
        let mut g = graph();
        let a = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        let b = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        let c = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        g.connect(a, b, None, None).unwrap();
        g.connect(b, c, None, None).unwrap();
        assert!(matches!(
            g.connect(c, a, None, None),
            Err(GraphError::CycleDetected { .. })
        ));
    }

    #[test]
    fn matches_output_adopts_downstream_channels() {
        let mut g = graph();
        let up = g.insert(Box::new(Through(ChannelMode::MatchesOutput, 1))).unwrap();
        let fixed = g.insert(Box::new(Through(ChannelMode::Fixed, 4))).unwrap();
        g.connect(up, fixed, None, None).unwrap();
        assert_eq!(g.slot(up).unwrap().channels, 4);
        assert!(g.slot(fixed).unwrap().in_place);
    }

    #[test]
    fn matches_input_adopts_widest_input() {
        let mut g = graph();
        let (mono, _) = source(&mut g, 1.0, 1);
        let (quad, _) = source(&mut g, 1.0, 4);
        let mixer = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        g.connect(mono, mixer, None, None).unwrap();
        g.connect(quad, mixer, None, None).unwrap();
        let slot = g.slot(mixer).unwrap();
        assert_eq!(slot.channels, 4);
        assert!(!slot.in_place);
        assert!(!g.slot(mono).unwrap().in_place);
    }

    #[test]
    fn long_matches_chain_terminates() {
        let mut g = graph();
        let mut prev = g.insert(Box::new(Through(ChannelMode::MatchesOutput, 1))).unwrap();
        for _ in 0..64 {
            let next = g.insert(Box::new(Through(ChannelMode::MatchesOutput, 1))).unwrap();
            g.connect(prev, next, None, None).unwrap();
            prev = next;
        }
        let sink = g.insert(Box::new(Through(ChannelMode::Fixed, 3))).unwrap();
        g.connect(prev, sink, None, None).unwrap();
        assert_eq!(g.slot(prev).unwrap().channels, 3);
    }

    #[test]
    fn shared_input_processed_once_per_block() {
        let mut g = graph();
        let (src, calls) = source(&mut g, 0.5, 2);
        let left = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        let right = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        let sum = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        g.connect(src, left, None, None).unwrap();
        g.connect(src, right, None, None).unwrap();
        g.connect(left, sum, None, None).unwrap();
        g.connect(right, sum, None, None).unwrap();
        g.set_root(Some(sum)).unwrap();

        let mut out = Buffer::new(FRAMES, 2);
        g.render(&mut out, 0);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(out.data().iter().all(|&s| (s - 1.0).abs() < 1e-6));
        g.render(&mut out, FRAMES as u64);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn release_reclaims_cascade() {
        let mut g = graph();
        let (src, _) = source(&mut g, 1.0, 1);
        let fx = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        g.connect(src, fx, None, None).unwrap();
        assert!(g.release(src).is_empty(), "held as input of fx");
        assert_eq!(g.num_nodes(), 2);
        let reclaimed = g.release(fx);
        assert_eq!(reclaimed.len(), 2);
        assert_eq!(g.num_nodes(), 0);
        assert!(g.slot(src).is_none());
    }

    #[test]
    fn stale_id_after_slot_reuse() {
        let mut g = graph();
        let (a, _) = source(&mut g, 1.0, 1);
        g.release(a);
        let (b, _) = source(&mut g, 1.0, 1);
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(g.slot(a).is_none());
        assert!(g.slot(b).is_some());
    }

    #[test]
    fn describe_lists_tree() {
        let mut g = graph();
        let (src, _) = source(&mut g, 1.0, 2);
        let fx = g.insert(Box::new(Through(ChannelMode::MatchesInput, 1))).unwrap();
        g.connect(src, fx, None, None).unwrap();
        g.set_root(Some(fx)).unwrap();
        let text = g.describe();
        assert!(text.starts_with("through"));
        assert!(text.contains("-- source"));
    }

    #[test]
    fn zero_channel_format_rejected() {
        let mut g = graph();
        let err = g
            .insert(Box::new(Through(ChannelMode::Fixed, 0)))
            .err()
            .unwrap();
        assert!(matches!(err, GraphError::InvalidFormat(_)));
    }
}
