//! Integration tests for rivulet-io.
//!
//! WAV files written by one part of the crate are read back by another, and
//! rendered through a core context. No test opens a hardware device.

use std::thread;
use std::time::Duration;

use rivulet_core::nodes::{FilePlayer, Gain, Generator, Waveform};
use rivulet_core::{Buffer, Context, ContextOptions, MemoryTarget, OfflineDevice, mix};
use rivulet_io::{WavSource, WavSpec, bounce_to_wav, read_wav, read_wav_info, render_to_target, write_wav};
use tempfile::TempDir;

fn context(output_channels: usize) -> Context {
    Context::new(ContextOptions {
        sample_rate: 48000,
        frames_per_block: 256,
        output_channels,
        ..ContextOptions::default()
    })
}

#[test]
fn bounce_writes_exact_frame_count() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");

    let ctx = context(2);
    let osc = ctx.make_node(Generator::new(Waveform::Sine, 1000.0)).unwrap();
    let gain = ctx.make_node(Gain::new(0.5)).unwrap();
    osc.start();
    let tail = &osc >> &gain;
    ctx.set_root(&tail).unwrap();

    let frames = bounce_to_wav(&ctx, &path, 0.1, 16).unwrap();
    assert_eq!(frames, 4800);

    let info = read_wav_info(&path).unwrap();
    assert_eq!(info.channels, 2);
    assert_eq!(info.num_frames, 4800);
    assert_eq!(info.sample_rate, 48000);

    let (loaded, _) = read_wav(&path).unwrap();
    let level = mix::rms(loaded.channel(0));
    assert!((level - 0.5 / 2.0_f32.sqrt()).abs() < 0.01, "rms {level}");
    assert_eq!(loaded.channel(0), loaded.channel(1));
}

#[test]
fn render_to_target_truncates_last_block() {
    let ctx = context(1);
    let mut target = MemoryTarget::new(1, 48000);
    let written = render_to_target(&ctx, &mut target, 300).unwrap();
    assert_eq!(written, 300);
    assert_eq!(target.frames(), 300);
    assert_eq!(ctx.processed_frames(), 512);
}

#[test]
fn file_player_streams_a_wav_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ramp.wav");
    let samples: Vec<f32> = (0..2048).map(|i| i as f32 / 4096.0).collect();
    write_wav(&path, &Buffer::from_channels(&[samples.clone()]), WavSpec::default()).unwrap();

    let device = OfflineDevice::new(48000, 256, 1);
    let ctx = Context::with_device(Box::new(device.clone())).unwrap();
    let source = WavSource::open(&path).unwrap();
    let player = ctx.make_node(FilePlayer::new(Box::new(source)).unwrap()).unwrap();
    let out = ctx.make_line_out().unwrap();
    player.connect(&out).unwrap();
    player.start();
    ctx.start().unwrap();

    // Give the reader thread time to prefill its rings.
    thread::sleep(Duration::from_millis(100));
    let rendered = device.render_frames(256);
    assert_eq!(rendered.channel(0), &samples[..256]);
}
