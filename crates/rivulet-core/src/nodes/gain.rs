//! Linear gain.

use crate::buffer::Buffer;
use crate::mix;
use crate::node::{NodeFormat, ProcessContext, Processor};
use crate::param::Param;

/// Multiplies every channel by an automatable gain, clamped to `[min, max]`.
#[derive(Debug, Clone)]
pub struct Gain {
    gain: Param,
    min: f32,
    max: f32,
}

impl Gain {
    /// Creates a gain stage with range `[0, 1]`.
    pub fn new(gain: f32) -> Self {
        Self::with_range(gain, 0.0, 1.0)
    }

    /// Creates a gain stage with a custom range.
    pub fn with_range(gain: f32, min: f32, max: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            gain: Param::new(gain.clamp(min, max)),
            min,
            max,
        }
    }

    /// Sets the gain immediately, clamped to the range.
    pub fn set_value(&mut self, gain: f32) {
        self.gain.set_value(gain.clamp(self.min, self.max));
    }

    /// The current gain.
    pub fn value(&self) -> f32 {
        self.gain.value()
    }

    /// The gain parameter, for scheduling ramps. Ramp targets outside the
    /// range are clamped during processing.
    pub fn param_mut(&mut self) -> &mut Param {
        &mut self.gain
    }

    /// Lower bound.
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Upper bound.
    pub fn max(&self) -> f32 {
        self.max
    }
}

impl Processor for Gain {
    fn process(&mut self, buffer: &mut Buffer, ctx: &ProcessContext) {
        let frames = ctx.frames.min(buffer.frames());
        if self.gain.eval_block(ctx) {
            let gains = &self.gain.value_array()[..frames];
            for channel in buffer.channels_iter_mut() {
                for (sample, &g) in channel[..frames].iter_mut().zip(gains) {
                    *sample *= g.clamp(self.min, self.max);
                }
            }
        } else {
            mix::scale(buffer.data_mut(), self.gain.value().clamp(self.min, self.max));
        }
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::effect()
    }

    fn name(&self) -> &'static str {
        "gain"
    }

    fn visit_params(&mut self, visit: &mut dyn FnMut(&mut Param)) {
        visit(&mut self.gain);
    }
}
