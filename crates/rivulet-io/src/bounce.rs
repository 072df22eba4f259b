//! Offline rendering to files.

use std::path::Path;

use rivulet_core::{Buffer, Context, TargetFile};

use crate::wav::{WavSpec, WavTarget};
use crate::Result;

/// Renders `frames` frames of `ctx` into `target`, block by block.
///
/// The context is rendered directly, so it must not also be driven by a
/// started device. The last block is truncated to `frames`. Returns the number
/// of frames written. The target is not finalized.
pub fn render_to_target(ctx: &Context, target: &mut dyn TargetFile, frames: u64) -> Result<u64> {
    let mut block = Buffer::new(ctx.frames_per_block(), target.channels());
    let mut written = 0u64;
    while written < frames {
        ctx.render(&mut block);
        let count = (frames - written).min(block.frames() as u64) as usize;
        target.write(&block, 0, count)?;
        written += count as u64;
    }
    tracing::debug!(frames = written, "offline render complete");
    Ok(written)
}

/// Renders `seconds` of `ctx` to a WAV file at the context's rate and output
/// channel count.
pub fn bounce_to_wav<P: AsRef<Path>>(ctx: &Context, path: P, seconds: f64, bits_per_sample: u16) -> Result<u64> {
    let spec = WavSpec {
        channels: ctx.output_channels() as u16,
        sample_rate: ctx.sample_rate(),
        bits_per_sample,
    };
    let mut target = WavTarget::create(&path, spec)?;
    let frames = (seconds.max(0.0) * f64::from(spec.sample_rate)).round() as u64;
    let written = render_to_target(ctx, &mut target, frames)?;
    target.finalize()?;
    tracing::info!(path = %path.as_ref().display(), frames = written, "bounced to WAV");
    Ok(written)
}
