//! Integration tests for the rivulet-core graph.
//!
//! Exercises the public surface end to end: channel negotiation across
//! chains, pull rendering with fan-in and fan-out, node lifecycle, handle
//! collection, analysis taps, and device-driven rendering through
//! [`OfflineDevice`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rivulet_core::nodes::{BufferPlayer, Filter, Gain, Generator, Pan2d, Tap, Waveform};
use rivulet_core::{
    Buffer, ChannelMode, Context, ContextOptions, GraphError, MemorySource, NodeFormat,
    OfflineDevice, ProcessContext, Processor, mix,
};

/// Source emitting a constant value on every channel.
struct Dc(f32);

impl Processor for Dc {
    fn process(&mut self, buffer: &mut Buffer, _ctx: &ProcessContext) {
        buffer.data_mut().fill(self.0);
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::source(1).with_mode(ChannelMode::MatchesOutput)
    }
}

/// Constant source that counts how many times it was processed.
struct CountingDc {
    value: f32,
    calls: Arc<AtomicUsize>,
}

impl Processor for CountingDc {
    fn process(&mut self, buffer: &mut Buffer, _ctx: &ProcessContext) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        buffer.data_mut().fill(self.value);
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::source(1)
    }
}

fn context(sample_rate: u32, frames_per_block: usize, output_channels: usize) -> Context {
    Context::new(ContextOptions {
        sample_rate,
        frames_per_block,
        output_channels,
        ..ContextOptions::default()
    })
}

/// Renders `blocks` blocks and concatenates channel 0.
fn render_mono(ctx: &Context, blocks: usize) -> Vec<f32> {
    let mut out = Buffer::new(ctx.frames_per_block(), ctx.output_channels());
    let mut samples = Vec::with_capacity(blocks * out.frames());
    for _ in 0..blocks {
        ctx.render(&mut out);
        samples.extend_from_slice(out.channel(0));
    }
    samples
}

// ============================================================================
// 1. Channel negotiation
// ============================================================================

#[test]
fn effects_adopt_source_channels_through_a_chain() {
    let ctx = context(1000, 16, 2);
    let player = ctx
        .make_node(BufferPlayer::new(Arc::new(Buffer::new(64, 2))))
        .unwrap();
    let filter = ctx.make_node(Filter::low_pass(100.0)).unwrap();
    let gain = ctx.make_node(Gain::new(1.0)).unwrap();

    let _ = &player >> &filter >> &gain;
    assert_eq!(filter.num_channels(), 2);
    assert_eq!(gain.num_channels(), 2);
    assert!(filter.is_process_in_place());
}

#[test]
fn matches_output_source_follows_its_consumer() {
    let ctx = context(1000, 16, 2);
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    let pan = ctx.make_node(Pan2d::new(0.5)).unwrap();
    dc.connect(&pan).unwrap();
    assert_eq!(pan.num_channels(), 2);
    assert_eq!(dc.num_channels(), 2);
}

#[test]
fn channel_mismatch_forces_summing_and_mixes() {
    let ctx = context(1000, 16, 2);
    let mono = ctx
        .make_node(BufferPlayer::new(Arc::new(Buffer::from_channels(&[vec![0.5; 16]]))))
        .unwrap();
    let out = ctx.make_line_out().unwrap();
    mono.connect(&out).unwrap();
    mono.start();
    assert_eq!(out.num_channels(), 2);
    assert!(!out.is_process_in_place());

    let mut block = Buffer::new(16, 2);
    ctx.render(&mut block);
    assert!(block.channel(0).iter().all(|&s| (s - 0.5).abs() < 1e-6));
    assert!(block.channel(1).iter().all(|&s| (s - 0.5).abs() < 1e-6));
}

#[test]
fn in_place_nodes_have_exactly_one_input_and_matching_channels() {
    let ctx = context(1000, 16, 1);
    let a = ctx.make_node(Dc(1.0)).unwrap();
    let b = ctx.make_node(Dc(2.0)).unwrap();
    let gain = ctx.make_node(Gain::new(0.5)).unwrap();
    a.start();
    b.start();
    a.connect(&gain).unwrap();
    ctx.set_root(&gain).unwrap();
    assert!(gain.is_process_in_place());
    assert_eq!(gain.internal_buffer_len(), 0);
    assert_eq!(gain.summing_buffer_len(), 0);

    b.connect(&gain).unwrap();
    assert!(!gain.is_process_in_place());
    assert_eq!(gain.internal_buffer_len(), 16 * gain.num_channels());
    assert_eq!(gain.summing_buffer_len(), 16 * gain.num_channels());
    let summed = render_mono(&ctx, 1);
    assert!(summed.iter().all(|&s| (s - 1.5).abs() < 1e-6));

    b.disconnect_all_outputs();
    assert!(gain.is_process_in_place());
    let single = render_mono(&ctx, 1);
    assert!(single.iter().all(|&s| (s - 0.5).abs() < 1e-6));
}

#[test]
fn in_place_root_renders_into_narrower_target() {
    let ctx = context(1000, 16, 2);
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    let pan = ctx.make_node(Pan2d::new(0.5)).unwrap();
    dc.start();
    dc.connect(&pan).unwrap();
    ctx.set_root(&pan).unwrap();
    assert!(pan.is_process_in_place());

    // Both channels at 1/√2, summed and scaled by 1/√2.
    let mut mono = Buffer::new(16, 1);
    ctx.render(&mut mono);
    assert!(mono.channel(0).iter().all(|&s| (s - 1.0).abs() < 1e-5));

    let mut stereo = Buffer::new(16, 2);
    ctx.render(&mut stereo);
    let center = std::f32::consts::FRAC_1_SQRT_2;
    assert!(stereo.data().iter().all(|&s| (s - center).abs() < 1e-5));
}

#[test]
fn in_place_root_leaves_extra_target_channels_silent() {
    let ctx = context(1000, 16, 2);
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    let pan = ctx.make_node(Pan2d::new(0.0)).unwrap();
    dc.start();
    dc.connect(&pan).unwrap();
    ctx.set_root(&pan).unwrap();

    let mut quad = Buffer::new(16, 4);
    quad.data_mut().fill(9.0);
    ctx.render(&mut quad);
    assert!(quad.channel(0).iter().all(|&s| (s - 1.0).abs() < 1e-6));
    for ch in 1..4 {
        assert!(quad.channel(ch).iter().all(|&s| s.abs() < 1e-6), "channel {ch}");
    }
}

// ============================================================================
// 2. Rendering
// ============================================================================

#[test]
fn sine_through_gain_has_expected_rms() {
    let ctx = context(44100, 512, 1);
    let osc = ctx.make_node(Generator::new(Waveform::Sine, 440.0)).unwrap();
    let gain = ctx.make_node(Gain::new(0.5)).unwrap();
    osc.with(|o| o.set_amplitude(0.5));
    osc.start();
    let tail = &osc >> &gain;
    ctx.set_root(&tail).unwrap();

    let samples = render_mono(&ctx, 40);
    assert!(samples.len() >= 4096);
    let expected = 0.5 * 0.5 / 2.0_f32.sqrt();
    let measured = mix::rms(&samples);
    assert!(
        (measured - expected).abs() < 0.002,
        "rms {measured} expected {expected}"
    );
}

#[test]
fn fan_in_sums_all_inputs() {
    let ctx = context(1000, 16, 1);
    let a = ctx.make_node(Dc(0.25)).unwrap();
    let b = ctx.make_node(Dc(0.5)).unwrap();
    let gain = ctx.make_node(Gain::new(1.0)).unwrap();
    a.start();
    b.start();
    a.connect(&gain).unwrap();
    b.connect(&gain).unwrap();
    ctx.set_root(&gain).unwrap();

    let samples = render_mono(&ctx, 2);
    assert!(samples.iter().all(|&s| (s - 0.75).abs() < 1e-6));
}

#[test]
fn shared_input_is_processed_once_per_block() {
    let ctx = context(1000, 16, 1);
    let calls = Arc::new(AtomicUsize::new(0));
    let src = ctx
        .make_node(CountingDc {
            value: 1.0,
            calls: Arc::clone(&calls),
        })
        .unwrap();
    let left = ctx.make_node(Gain::new(0.5)).unwrap();
    let right = ctx.make_node(Gain::new(0.25)).unwrap();
    let sum = ctx.make_node(Gain::new(1.0)).unwrap();
    src.start();
    src.connect(&left).unwrap();
    src.connect(&right).unwrap();
    left.connect(&sum).unwrap();
    right.connect(&sum).unwrap();
    ctx.set_root(&sum).unwrap();

    let samples = render_mono(&ctx, 3);
    assert_eq!(calls.load(Ordering::Relaxed), 3);
    assert!(samples.iter().all(|&s| (s - 0.75).abs() < 1e-6));
}

#[test]
fn gain_ramp_is_sample_accurate_and_settles() {
    let ctx = context(1000, 100, 1);
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    let gain = ctx.make_node(Gain::new(1.0)).unwrap();
    dc.start();
    dc.connect(&gain).unwrap();
    ctx.set_root(&gain).unwrap();
    gain.with(|g| g.param_mut().ramp_to(0.0, 1.0));

    let ramp = render_mono(&ctx, 10);
    assert!((ramp[0] - 1.0).abs() < 1e-6);
    assert!((ramp[500] - 0.5).abs() < 0.01);
    assert!(ramp.windows(2).all(|w| w[1] <= w[0]));

    let tail = render_mono(&ctx, 1);
    assert!(tail.iter().all(|&s| s.abs() < 1e-6));
    assert!(gain.with(|g| g.value()).abs() < 1e-6);
}

#[test]
fn disabled_source_is_silent() {
    let ctx = context(1000, 16, 1);
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    ctx.set_root(&dc).unwrap();
    assert!(!dc.is_enabled());
    assert!(render_mono(&ctx, 1).iter().all(|&s| s == 0.0));

    dc.start();
    assert!(render_mono(&ctx, 1).iter().all(|&s| s == 1.0));
    dc.stop();
    assert!(render_mono(&ctx, 1).iter().all(|&s| s == 0.0));
}

// ============================================================================
// 3. Topology and lifetime
// ============================================================================

#[test]
fn connecting_into_an_upstream_node_is_a_cycle() {
    let ctx = context(1000, 16, 1);
    let a = ctx.make_node(Gain::new(1.0)).unwrap();
    let b = ctx.make_node(Gain::new(1.0)).unwrap();
    let c = ctx.make_node(Gain::new(1.0)).unwrap();
    let _ = &a >> &b >> &c;
    assert!(matches!(c.connect(&a), Err(GraphError::CycleDetected { .. })));
    assert!(!a.is_connected_to_input(&c));
}

#[test]
fn nodes_live_while_referenced_or_feeding_a_live_node() {
    let ctx = context(1000, 16, 1);
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    let gain = ctx.make_node(Gain::new(1.0)).unwrap();
    dc.connect(&gain).unwrap();
    ctx.set_root(&gain).unwrap();

    drop(dc);
    assert_eq!(ctx.num_nodes(), 2);
    drop(gain);
    assert_eq!(ctx.num_nodes(), 2);
    ctx.clear_root();
    assert_eq!(ctx.num_nodes(), 0);
}

#[test]
fn disconnect_all_nodes_keeps_handles_valid() {
    let ctx = context(1000, 16, 1);
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    let gain = ctx.make_node(Gain::new(1.0)).unwrap();
    dc.connect(&gain).unwrap();
    ctx.disconnect_all_nodes();
    assert_eq!(gain.num_inputs(), 0);
    assert_eq!(dc.num_outputs(), 0);
    assert_eq!(ctx.num_nodes(), 2);
}

#[test]
fn description_lists_inputs_under_root() {
    let ctx = context(1000, 16, 1);
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    let gain = ctx.make_node(Gain::new(1.0)).unwrap();
    dc.connect(&gain).unwrap();
    ctx.set_root(&gain).unwrap();
    let text = ctx.graph_description();
    let gain_line = text.find("gain").unwrap();
    let dc_line = text.find("-- node").unwrap();
    assert!(gain_line < dc_line, "{text}");
}

#[test]
fn block_size_change_reinitializes_nodes() {
    let ctx = context(1000, 16, 1);
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    let gain = ctx.make_node(Gain::new(1.0)).unwrap();
    dc.start();
    dc.connect(&gain).unwrap();
    ctx.set_root(&gain).unwrap();

    ctx.set_frames_per_block(32).unwrap();
    assert_eq!(ctx.frames_per_block(), 32);
    assert!(gain.is_initialized());
    let samples = render_mono(&ctx, 1);
    assert_eq!(samples.len(), 32);
    assert!(samples.iter().all(|&s| (s - 1.0).abs() < 1e-6));
}

// ============================================================================
// 4. Taps and auto-pull
// ============================================================================

#[test]
fn auto_pulled_tap_sees_signal_without_a_consumer() {
    let ctx = context(1000, 16, 1);
    let dc = ctx.make_node(Dc(0.5)).unwrap();
    let (tap, mut reader) = Tap::new(2, 64);
    let tap = ctx.make_node(tap).unwrap();
    dc.start();
    dc.connect(&tap).unwrap();
    ctx.add_auto_pulled(&tap).unwrap();

    render_mono(&ctx, 8);
    assert_eq!(reader.channels(), 1);
    assert!((reader.volume() - 0.5).abs() < 1e-6);

    ctx.remove_auto_pulled(&tap);
    render_mono(&ctx, 8);
    reader.update();
    assert!((reader.volume() - 0.5).abs() < 1e-6);
}

// ============================================================================
// 5. Devices and files
// ============================================================================

#[test]
fn offline_device_renders_only_while_started() {
    let device = OfflineDevice::new(1000, 16, 2);
    let ctx = Context::with_device(Box::new(device.clone())).unwrap();
    let dc = ctx.make_node(Dc(1.0)).unwrap();
    let out = ctx.make_line_out().unwrap();
    dc.start();
    dc.connect(&out).unwrap();

    assert!(device.render_frames(16).data().iter().all(|&s| s == 0.0));
    ctx.start().unwrap();
    let rendered = device.render_frames(40);
    assert_eq!(rendered.frames(), 40);
    assert!(rendered.data().iter().all(|&s| s == 1.0));
    assert_eq!(ctx.processed_frames(), 48);

    ctx.stop();
    assert!(device.render_frames(16).data().iter().all(|&s| s == 0.0));
}

#[test]
fn line_in_passes_pushed_input_to_output() {
    let device = OfflineDevice::with_input(1000, 16, 1, 1);
    let ctx = Context::with_device(Box::new(device.clone())).unwrap();
    let line_in = ctx.make_line_in().unwrap();
    let out = ctx.make_line_out().unwrap();
    line_in.connect(&out).unwrap();
    line_in.start();
    ctx.start().unwrap();

    assert_eq!(device.push_input(&[0.5; 16]), 16);
    let rendered = device.render_frames(16);
    assert!(rendered.channel(0).iter().all(|&s| s == 0.5));

    let starved = device.render_frames(16);
    assert!(starved.channel(0).iter().all(|&s| s == 0.0));
    assert_eq!(line_in.with(|l| l.take_last_underrun()), Some(16));
}

#[test]
fn line_in_requires_capture_capable_device() {
    let ctx = Context::with_device(Box::new(OfflineDevice::new(1000, 16, 2))).unwrap();
    assert!(ctx.make_line_in().is_err());
    let bare = context(1000, 16, 2);
    assert!(matches!(
        bare.make_line_in(),
        Err(rivulet_core::Error::Graph(GraphError::NoDevice))
    ));
}

#[test]
fn memory_source_round_trips_through_read_all() {
    let data = Buffer::from_channels(&[vec![0.1, 0.2, 0.3], vec![-0.1, -0.2, -0.3]]);
    let mut source = MemorySource::new(data.clone(), 22050);
    let loaded = rivulet_core::read_all(&mut source).unwrap();
    assert_eq!(loaded.channels(), 2);
    assert_eq!(loaded.channel(1), data.channel(1));
}
