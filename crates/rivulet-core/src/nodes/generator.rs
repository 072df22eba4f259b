//! Periodic and noise generators.

use std::f32::consts::TAU;

use crate::buffer::Buffer;
use crate::node::{InitContext, NodeFormat, ProcessContext, Processor};
use crate::param::Param;

use super::broadcast_first_channel;

/// Generator waveforms. Periodic shapes peak at ±1 except [`Phasor`](Self::Phasor).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    /// Pure sine.
    #[default]
    Sine,
    /// Rising ramp over `[0, 1)`, one per period.
    Phasor,
    /// Triangle starting at +1.
    Triangle,
    /// White noise; frequency is ignored.
    Noise,
}

#[derive(Debug, Clone)]
struct Oscillator {
    waveform: Waveform,
    phase: f32,
    noise_state: u32,
}

impl Oscillator {
    #[inline]
    fn tick(&mut self, increment: f32) -> f32 {
        let out = match self.waveform {
            Waveform::Sine => (TAU * self.phase).sin(),
            Waveform::Phasor => self.phase,
            Waveform::Triangle => 4.0 * (self.phase - 0.5).abs() - 1.0,
            Waveform::Noise => {
                // xorshift32
                let mut x = self.noise_state;
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                self.noise_state = x;
                (x as f32 / u32::MAX as f32) * 2.0 - 1.0
            }
        };
        self.phase += increment;
        self.phase -= self.phase.floor();
        out
    }
}

/// Oscillator source with an automatable frequency.
///
/// ```rust
/// use rivulet_core::nodes::{Generator, Waveform};
///
/// let mut osc = Generator::new(Waveform::Triangle, 110.0);
/// osc.freq_mut().ramp_to(220.0, 1.0);
/// osc.set_amplitude(0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Generator {
    osc: Oscillator,
    freq: Param,
    amplitude: f32,
}

impl Generator {
    /// Creates a generator at `freq` Hz with unit amplitude.
    pub fn new(waveform: Waveform, freq: f32) -> Self {
        Self {
            osc: Oscillator {
                waveform,
                phase: 0.0,
                noise_state: 0x1234_5678,
            },
            freq: Param::new(freq),
            amplitude: 1.0,
        }
    }

    /// The frequency parameter in Hz.
    pub fn freq(&self) -> &Param {
        &self.freq
    }

    /// Mutable frequency parameter, for scheduling ramps.
    pub fn freq_mut(&mut self) -> &mut Param {
        &mut self.freq
    }

    /// Output amplitude.
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Sets the output amplitude.
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    /// Current waveform.
    pub fn waveform(&self) -> Waveform {
        self.osc.waveform
    }

    /// Switches waveform without resetting the phase.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.osc.waveform = waveform;
    }

    /// Restarts the period.
    pub fn reset_phase(&mut self) {
        self.osc.phase = 0.0;
    }
}

impl Processor for Generator {
    fn process(&mut self, buffer: &mut Buffer, ctx: &ProcessContext) {
        let varying = self.freq.eval_block(ctx);
        let constant = self.freq.value();
        let freqs = self.freq.value_array();
        let inv_sr = 1.0 / ctx.sample_rate;
        let frames = ctx.frames.min(buffer.frames());

        let out = &mut buffer.channel_mut(0)[..frames];
        for (i, sample) in out.iter_mut().enumerate() {
            let freq = if varying { freqs[i] } else { constant };
            *sample = self.amplitude * self.osc.tick(freq * inv_sr);
        }
        broadcast_first_channel(buffer);
    }

    fn initialize(&mut self, _ctx: &InitContext) {
        self.osc.phase = 0.0;
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::source(1)
    }

    fn name(&self) -> &'static str {
        "generator"
    }

    fn visit_params(&mut self, visit: &mut dyn FnMut(&mut Param)) {
        visit(&mut self.freq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(frames: usize) -> ProcessContext {
        ProcessContext {
            frames,
            sample_rate: 1000.0,
            block_start_frame: 0,
        }
    }

    #[test]
    fn sine_quarter_period() {
        let mut osc = Generator::new(Waveform::Sine, 250.0);
        let mut buf = Buffer::new(4, 1);
        osc.process(&mut buf, &ctx(4));
        let s = buf.channel(0);
        assert!(s[0].abs() < 1e-6);
        assert!((s[1] - 1.0).abs() < 1e-6);
        assert!(s[2].abs() < 1e-5);
        assert!((s[3] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn phasor_ramps_and_wraps() {
        let mut osc = Generator::new(Waveform::Phasor, 250.0);
        let mut buf = Buffer::new(6, 1);
        osc.process(&mut buf, &ctx(6));
        assert_eq!(buf.channel(0), &[0.0, 0.25, 0.5, 0.75, 0.0, 0.25]);
    }

    #[test]
    fn noise_bounded_and_nonconstant() {
        let mut osc = Generator::new(Waveform::Noise, 0.0);
        let mut buf = Buffer::new(256, 1);
        osc.process(&mut buf, &ctx(256));
        let s = buf.channel(0);
        assert!(s.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert!(s.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn extra_channels_copy_first() {
        let mut osc = Generator::new(Waveform::Triangle, 100.0);
        let mut buf = Buffer::new(16, 2);
        osc.process(&mut buf, &ctx(16));
        assert_eq!(buf.channel(0), buf.channel(1));
    }

    #[test]
    fn amplitude_scales() {
        let mut osc = Generator::new(Waveform::Triangle, 100.0);
        osc.set_amplitude(0.5);
        let mut buf = Buffer::new(16, 1);
        osc.process(&mut buf, &ctx(16));
        assert!((buf.channel(0)[0] - 0.5).abs() < 1e-6);
    }
}
