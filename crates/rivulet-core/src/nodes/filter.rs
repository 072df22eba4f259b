//! Biquad filter node.
//!
//! Coefficients follow the RBJ Audio EQ Cookbook. The filter runs one
//! Direct Form I section per channel:
//!
//! ```text
//! y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
//! ```

use std::f32::consts::PI;

use crate::buffer::Buffer;
use crate::node::{InitContext, NodeFormat, ProcessContext, Processor};

/// Response type of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Passes frequencies below the cutoff.
    #[default]
    LowPass,
    /// Passes frequencies above the cutoff.
    HighPass,
    /// Passes a band around the center frequency, 0 dB peak.
    BandPass,
}

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// Feedforward.
    pub b0: f32,
    /// Feedforward.
    pub b1: f32,
    /// Feedforward.
    pub b2: f32,
    /// Feedback.
    pub a1: f32,
    /// Feedback.
    pub a2: f32,
}

impl Coefficients {
    /// Passthrough.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Computes coefficients for `mode` at `freq` Hz.
    ///
    /// `freq` is clamped inside `(0, nyquist)` and `q` to a small positive
    /// minimum so the result is always stable.
    pub fn design(mode: FilterMode, freq: f32, q: f32, sample_rate: f32) -> Self {
        let nyquist = sample_rate * 0.5;
        let freq = freq.clamp(1.0e-3, nyquist * 0.999);
        let q = q.max(1.0e-3);

        let omega = 2.0 * PI * freq / sample_rate;
        let (sin_w, cos_w) = omega.sin_cos();
        let alpha = sin_w / (2.0 * q);
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w;
        let a2 = 1.0 - alpha;

        let (b0, b1, b2) = match mode {
            FilterMode::LowPass => {
                let b1 = 1.0 - cos_w;
                (b1 * 0.5, b1, b1 * 0.5)
            }
            FilterMode::HighPass => {
                let b1 = -(1.0 + cos_w);
                (-b1 * 0.5, b1, -b1 * 0.5)
            }
            FilterMode::BandPass => (alpha, 0.0, -alpha),
        };

        let inv = 1.0 / a0;
        Self {
            b0: b0 * inv,
            b1: b1 * inv,
            b2: b2 * inv,
            a1: a1 * inv,
            a2: a2 * inv,
        }
    }
}

/// One Direct Form I section.
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Filters one sample.
    #[inline]
    pub fn process(&mut self, c: &Coefficients, input: f32) -> f32 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    /// Clears the delay lines.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Per-channel biquad filter.
#[derive(Debug, Clone)]
pub struct Filter {
    mode: FilterMode,
    freq: f32,
    q: f32,
    sample_rate: f32,
    coefficients: Coefficients,
    dirty: bool,
    sections: Vec<Biquad>,
}

impl Filter {
    /// Creates a filter; `q` of `FRAC_1_SQRT_2` gives a Butterworth response.
    pub fn new(mode: FilterMode, freq: f32, q: f32) -> Self {
        Self {
            mode,
            freq,
            q,
            sample_rate: 44100.0,
            coefficients: Coefficients::IDENTITY,
            dirty: true,
            sections: Vec::new(),
        }
    }

    /// Butterworth low-pass at `freq` Hz.
    pub fn low_pass(freq: f32) -> Self {
        Self::new(FilterMode::LowPass, freq, std::f32::consts::FRAC_1_SQRT_2)
    }

    /// Butterworth high-pass at `freq` Hz.
    pub fn high_pass(freq: f32) -> Self {
        Self::new(FilterMode::HighPass, freq, std::f32::consts::FRAC_1_SQRT_2)
    }

    /// Cutoff or center frequency in Hz.
    pub fn freq(&self) -> f32 {
        self.freq
    }

    /// Sets the cutoff or center frequency; applied from the next block.
    pub fn set_freq(&mut self, freq: f32) {
        self.freq = freq;
        self.dirty = true;
    }

    /// Resonance.
    pub fn q(&self) -> f32 {
        self.q
    }

    /// Sets the resonance; applied from the next block.
    pub fn set_q(&mut self, q: f32) {
        self.q = q;
        self.dirty = true;
    }

    /// Response type.
    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Switches response type; applied from the next block.
    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
        self.dirty = true;
    }

    /// The coefficients in use.
    pub fn coefficients(&self) -> Coefficients {
        self.coefficients
    }
}

impl Processor for Filter {
    fn process(&mut self, buffer: &mut Buffer, ctx: &ProcessContext) {
        if self.dirty {
            self.coefficients = Coefficients::design(self.mode, self.freq, self.q, self.sample_rate);
            self.dirty = false;
        }
        let frames = ctx.frames.min(buffer.frames());
        let c = self.coefficients;
        for (channel, section) in buffer.channels_iter_mut().zip(&mut self.sections) {
            for sample in &mut channel[..frames] {
                *sample = section.process(&c, *sample);
            }
        }
    }

    fn initialize(&mut self, ctx: &InitContext) {
        self.sample_rate = ctx.sample_rate;
        self.sections.clear();
        self.sections.resize(ctx.channels, Biquad::default());
        self.dirty = true;
    }

    fn uninitialize(&mut self) {
        self.sections.iter_mut().for_each(Biquad::clear);
    }

    fn name(&self) -> &'static str {
        "filter"
    }
}
