//! Equal-power stereo panner.

use std::f32::consts::FRAC_PI_2;

use crate::buffer::Buffer;
use crate::node::{ChannelMode, NodeFormat, ProcessContext, Processor};
use crate::param::Param;

/// Pans a signal across two channels with constant total power.
///
/// Position 0 is hard left, 1 hard right, 0.5 center (both channels at
/// `1/√2`). The node is fixed at two channels; a mono input reaches it
/// broadcast to both.
#[derive(Debug, Clone)]
pub struct Pan2d {
    pos: Param,
}

impl Pan2d {
    /// Creates a panner at `pos`, clamped to `[0, 1]`.
    pub fn new(pos: f32) -> Self {
        Self {
            pos: Param::new(pos.clamp(0.0, 1.0)),
        }
    }

    /// Current position.
    pub fn pos(&self) -> f32 {
        self.pos.value()
    }

    /// Sets the position immediately, clamped to `[0, 1]`.
    pub fn set_pos(&mut self, pos: f32) {
        self.pos.set_value(pos.clamp(0.0, 1.0));
    }

    /// The position parameter, for scheduling ramps.
    pub fn pos_mut(&mut self) -> &mut Param {
        &mut self.pos
    }
}

impl Default for Pan2d {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[inline]
fn gains(pos: f32) -> (f32, f32) {
    let angle = pos.clamp(0.0, 1.0) * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

impl Processor for Pan2d {
    fn process(&mut self, buffer: &mut Buffer, ctx: &ProcessContext) {
        let frames = ctx.frames.min(buffer.frames());
        let varying = self.pos.eval_block(ctx);
        let constant = gains(self.pos.value());
        let positions = self.pos.value_array();

        let (left, right) = buffer.data_mut().split_at_mut(frames);
        for i in 0..frames {
            let (gl, gr) = if varying { gains(positions[i]) } else { constant };
            left[i] *= gl;
            right[i] *= gr;
        }
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::effect()
            .with_channels(2)
            .with_mode(ChannelMode::Fixed)
    }

    fn name(&self) -> &'static str {
        "pan2d"
    }

    fn visit_params(&mut self, visit: &mut dyn FnMut(&mut Param)) {
        visit(&mut self.pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(pos: f32) -> Buffer {
        let mut pan = Pan2d::new(pos);
        let mut buf = Buffer::new(4, 2);
        buf.data_mut().fill(1.0);
        pan.process(
            &mut buf,
            &ProcessContext {
                frames: 4,
                sample_rate: 1000.0,
                block_start_frame: 0,
            },
        );
        buf
    }

    #[test]
    fn hard_left_and_right() {
        let left = run(0.0);
        assert!((left.channel(0)[0] - 1.0).abs() < 1e-6);
        assert!(left.channel(1)[0].abs() < 1e-6);
        let right = run(1.0);
        assert!(right.channel(0)[0].abs() < 1e-6);
        assert!((right.channel(1)[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn center_is_equal_power() {
        let center = run(0.5);
        let (l, r) = (center.channel(0)[0], center.channel(1)[0]);
        assert!((l - r).abs() < 1e-6);
        assert!((l * l + r * r - 1.0).abs() < 1e-5);
    }

    #[test]
    fn fixed_stereo_format() {
        let format = Pan2d::default().format();
        assert_eq!(format.channels, 2);
        assert_eq!(format.mode, ChannelMode::Fixed);
    }
}
