//! Plays a panned, swept sine tone on the default output device.
//!
//! Engine settings come from the user's `engine.toml` when it exists.
//! Set `RUST_LOG=debug` to see graph negotiation.

use std::thread;
use std::time::Duration;

use rivulet_config::{EngineConfig, paths};
use rivulet_core::Context;
use rivulet_core::nodes::{Gain, Generator, Pan2d, Waveform};
use rivulet_io::CpalDevice;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = EngineConfig::load_or_default(paths::default_engine_path())?;
    let device = CpalDevice::from_config(&config)?;
    let ctx = Context::with_device_options(Box::new(device), config.into_context_options())?;
    tracing::info!(
        device = ctx.device_name().as_deref().unwrap_or("unknown"),
        sample_rate = ctx.sample_rate(),
        frames_per_block = ctx.frames_per_block(),
        "context ready"
    );

    let osc = ctx.make_node(Generator::new(Waveform::Sine, 220.0))?;
    let gain = ctx.make_node(Gain::new(0.0))?;
    let pan = ctx.make_node(Pan2d::new(-1.0))?;
    let out = ctx.make_line_out()?;
    let _ = &osc >> &gain >> &pan >> &out;
    tracing::debug!("graph:\n{}", ctx.graph_description());

    osc.with(|o| o.freq_mut().ramp_to(880.0, 4.0));
    gain.with(|g| g.param_mut().ramp_to(0.3, 0.5));
    pan.with(|p| p.pos_mut().ramp_to(1.0, 4.0));

    osc.start();
    ctx.start()?;
    thread::sleep(Duration::from_secs(4));

    gain.with(|g| g.param_mut().ramp_to(0.0, 0.5));
    thread::sleep(Duration::from_millis(600));
    ctx.stop();

    tracing::info!(seconds = ctx.processed_seconds(), "done");
    Ok(())
}
