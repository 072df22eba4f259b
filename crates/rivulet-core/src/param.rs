//! Sample-accurate parameter automation.
//!
//! A [`Param`] holds a current value and a queue of ramp [`Event`]s on the
//! context's timeline. Control threads schedule ramps through a node handle
//! (which holds the context lock); the node's `process` evaluates the schedule
//! once per block into a pre-sized value array.
//!
//! ## Timeline
//!
//! Times are absolute seconds since the context started rendering. "Now" is
//! the start of the next block to be rendered, so a zero-duration ramp takes
//! effect on the very next sample evaluated.
//!
//! ## Usage
//!
//! ```rust
//! use rivulet_core::{Curve, Param, RampOptions};
//!
//! let mut freq = Param::new(220.0);
//! freq.ramp_to(440.0, 0.5);
//! freq.append_ramp_with(330.0, 0.25, RampOptions { delay: 0.1, curve: Curve::OutQuad });
//!
//! let mut block = [0.0_f32; 256];
//! let varying = freq.eval(0.0, &mut block, 48000.0);
//! assert!(varying);
//! assert_eq!(block[0], 220.0);
//! ```

use std::collections::VecDeque;

use crate::clock::Clock;
use crate::node::ProcessContext;

/// Ramp length used by [`Param::ramp_to_default`], in seconds.
pub const DEFAULT_RAMP_SECONDS: f64 = 0.005;

/// Tolerance when mapping event times onto sample indices, in samples.
const INDEX_EPSILON: f64 = 1e-6;

/// Interpolation shape of a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Curve {
    /// Constant rate of change.
    #[default]
    Linear,
    /// Quadratic ease-in: slow start, fast finish.
    InQuad,
    /// Quadratic ease-out: fast start, slow finish.
    OutQuad,
}

impl Curve {
    /// Interpolates between `from` and `to` at normalized time `t` in `[0, 1]`.
    #[inline]
    pub fn interpolate(self, from: f32, to: f32, t: f32) -> f32 {
        let factor = match self {
            Curve::Linear => t,
            Curve::InQuad => t * t,
            Curve::OutQuad => -t * (t - 2.0),
        };
        from + (to - from) * factor
    }
}

/// Options for a scheduled ramp.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RampOptions {
    /// Seconds to wait before the ramp begins.
    pub delay: f64,
    /// Interpolation shape.
    pub curve: Curve,
}

/// One scheduled ramp segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Absolute start time in seconds.
    pub begin: f64,
    /// Absolute end time in seconds.
    pub end: f64,
    /// Value at `begin`.
    pub begin_value: f32,
    /// Value at `end` and afterwards.
    pub end_value: f32,
    /// Interpolation shape.
    pub curve: Curve,
}

#[derive(Debug, Clone)]
struct Schedule {
    value: f32,
    events: VecDeque<Event>,
}

impl Schedule {
    fn eval(&mut self, block_start: f64, out: &mut [f32], sample_rate: f32) -> bool {
        let len = out.len();
        let sr = f64::from(sample_rate);
        let period = 1.0 / sr;
        let block_end = block_start + len as f64 * period;
        let index_of = |t: f64| -> usize {
            let idx = ((t - block_start) * sr - INDEX_EPSILON).ceil();
            if idx <= 0.0 { 0 } else { (idx as usize).min(len) }
        };

        let mut pos = 0;
        let mut varied = false;

        while let Some(&event) = self.events.front() {
            if event.end <= block_start {
                self.value = event.end_value;
                self.events.pop_front();
                continue;
            }
            if event.begin >= block_end {
                break;
            }

            varied = true;
            let begin_idx = index_of(event.begin).max(pos);
            let end_idx = index_of(event.end).max(begin_idx);
            out[pos..begin_idx].fill(self.value);

            let duration = event.end - event.begin;
            for (i, sample) in out[begin_idx..end_idx].iter_mut().enumerate() {
                let t = block_start + (begin_idx + i) as f64 * period;
                let frac = if duration > 0.0 {
                    ((t - event.begin) / duration).clamp(0.0, 1.0) as f32
                } else {
                    1.0
                };
                *sample = event
                    .curve
                    .interpolate(event.begin_value, event.end_value, frac);
            }
            pos = end_idx;

            if event.end <= block_end {
                self.value = event.end_value;
                self.events.pop_front();
            } else {
                if end_idx > 0 {
                    self.value = out[end_idx - 1];
                }
                break;
            }
        }

        out[pos..].fill(self.value);
        varied
    }
}

/// A time-varying control value with sample-accurate ramps.
#[derive(Debug, Clone)]
pub struct Param {
    schedule: Schedule,
    values: Vec<f32>,
    clock: Option<Clock>,
    default_ramp_seconds: f64,
}

impl Param {
    /// Creates a parameter holding `value` with an empty schedule.
    ///
    /// Until it is attached to a context (which happens when its node is made),
    /// ramps are scheduled relative to time zero.
    pub fn new(value: f32) -> Self {
        Self {
            schedule: Schedule {
                value,
                events: VecDeque::new(),
            },
            values: Vec::new(),
            clock: None,
            default_ramp_seconds: DEFAULT_RAMP_SECONDS,
        }
    }

    /// Binds the parameter to a context clock and sizes its value array.
    pub fn attach(&mut self, clock: Clock, frames_per_block: usize) {
        self.clock = Some(clock);
        self.values.resize(frames_per_block, self.schedule.value);
    }

    /// Sets the ramp length used by [`ramp_to_default`](Self::ramp_to_default).
    pub fn set_default_ramp_seconds(&mut self, seconds: f64) {
        self.default_ramp_seconds = seconds.max(0.0);
    }

    /// Ramp length used by [`ramp_to_default`](Self::ramp_to_default).
    pub fn default_ramp_seconds(&self) -> f64 {
        self.default_ramp_seconds
    }

    /// The running value: the last evaluated sample, or the value set.
    #[inline]
    pub fn value(&self) -> f32 {
        self.schedule.value
    }

    fn now(&self) -> f64 {
        self.clock.as_ref().map_or(0.0, Clock::seconds)
    }

    /// Sets the value immediately and discards any pending schedule.
    pub fn set_value(&mut self, value: f32) {
        self.schedule.events.clear();
        self.schedule.value = value;
    }

    /// Replaces the schedule with one linear ramp from the current value to
    /// `end_value` over `duration` seconds, starting now.
    pub fn ramp_to(&mut self, end_value: f32, duration: f64) {
        self.ramp_to_with(end_value, duration, RampOptions::default());
    }

    /// [`ramp_to`](Self::ramp_to) with the default ramp length.
    pub fn ramp_to_default(&mut self, end_value: f32) {
        self.ramp_to(end_value, self.default_ramp_seconds);
    }

    /// Replaces the schedule with one ramp starting `options.delay` seconds
    /// from now.
    pub fn ramp_to_with(&mut self, end_value: f32, duration: f64, options: RampOptions) {
        let begin = self.now() + options.delay.max(0.0);
        self.schedule.events.clear();
        self.schedule.events.push_back(Event {
            begin,
            end: begin + duration.max(0.0),
            begin_value: self.schedule.value,
            end_value,
            curve: options.curve,
        });
    }

    /// Queues a linear ramp that starts where the last queued ramp ends.
    pub fn append_ramp(&mut self, end_value: f32, duration: f64) {
        self.append_ramp_with(end_value, duration, RampOptions::default());
    }

    /// Queues a ramp that starts `options.delay` seconds after the last queued
    /// ramp ends (or after now, if nothing is queued).
    pub fn append_ramp_with(&mut self, end_value: f32, duration: f64, options: RampOptions) {
        let (time, value) = self.end_time_and_value();
        let begin = time + options.delay.max(0.0);
        self.schedule.events.push_back(Event {
            begin,
            end: begin + duration.max(0.0),
            begin_value: value,
            end_value,
            curve: options.curve,
        });
    }

    /// Removes every pending event; the current value is kept.
    pub fn cancel(&mut self) {
        self.schedule.events.clear();
    }

    /// Number of pending events.
    pub fn num_events(&self) -> usize {
        self.schedule.events.len()
    }

    /// Pending events in time order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.schedule.events.iter()
    }

    /// Time and value at which the schedule settles.
    pub fn end_time_and_value(&self) -> (f64, f32) {
        match self.schedule.events.back() {
            Some(event) => (event.end, event.end_value),
            None => (self.now(), self.schedule.value),
        }
    }

    /// Seconds from now until the schedule settles.
    pub fn remaining_duration(&self) -> f64 {
        (self.end_time_and_value().0 - self.now()).max(0.0)
    }

    /// Evaluates the block starting at `block_start` seconds into `out`.
    ///
    /// Events that ended at or before `block_start` are dropped. Samples before
    /// the first event hold the current value; samples inside an event follow
    /// its curve; samples after the last event hold its end value. Returns true
    /// when any event touched this block. Never allocates.
    pub fn eval(&mut self, block_start: f64, out: &mut [f32], sample_rate: f32) -> bool {
        self.schedule.eval(block_start, out, sample_rate)
    }

    /// Evaluates the current block into the internal value array.
    ///
    /// Read the result with [`value_array`](Self::value_array). Returns true
    /// when the values vary within the block.
    pub fn eval_block(&mut self, ctx: &ProcessContext) -> bool {
        if self.values.len() < ctx.frames {
            // Only reached for a parameter that was never attached.
            self.values.resize(ctx.frames, self.schedule.value);
        }
        let out = &mut self.values[..ctx.frames];
        self.schedule
            .eval(ctx.block_start_seconds(), out, ctx.sample_rate)
    }

    /// Values written by the last [`eval_block`](Self::eval_block).
    pub fn value_array(&self) -> &[f32] {
        &self.values
    }

    /// True if a pending event overlaps `[block_start, block_start + duration)`.
    pub fn is_varying_in(&self, block_start: f64, duration: f64) -> bool {
        let block_end = block_start + duration;
        self.schedule
            .events
            .iter()
            .any(|e| e.begin < block_end && e.end > block_start)
    }

    /// True if a pending event overlaps the next block to be rendered.
    pub fn is_varying_next_eval(&self) -> bool {
        let Some(clock) = &self.clock else {
            return !self.schedule.events.is_empty();
        };
        let sr = f64::from(clock.sample_rate().max(1));
        let frames = self.values.len().max(1) as f64;
        self.is_varying_in(clock.seconds(), frames / sr)
    }
}

impl Default for Param {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 1000.0;

    #[test]
    fn constant_without_events() {
        let mut p = Param::new(0.7);
        let mut out = [0.0; 16];
        assert!(!p.eval(0.0, &mut out, SR));
        assert!(out.iter().all(|&v| v == 0.7));
    }

    #[test]
    fn linear_ramp_hits_endpoints() {
        let mut p = Param::new(0.0);
        p.ramp_to(1.0, 0.01);
        let mut out = [0.0; 32];
        assert!(p.eval(0.0, &mut out, SR));
        assert_eq!(out[0], 0.0);
        assert!((out[5] - 0.5).abs() < 1e-6);
        assert_eq!(out[10], 1.0);
        assert!(out[10..].iter().all(|&v| v == 1.0));
        assert_eq!(p.num_events(), 0);
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn ramp_spanning_blocks_continues() {
        let mut p = Param::new(0.0);
        p.ramp_to(1.0, 0.02);
        let mut a = [0.0; 10];
        let mut b = [0.0; 10];
        p.eval(0.0, &mut a, SR);
        assert_eq!(p.num_events(), 1);
        assert!((p.value() - 0.45).abs() < 1e-6);
        p.eval(0.01, &mut b, SR);
        assert!((b[0] - 0.5).abs() < 1e-6);
        assert!((b[9] - 0.95).abs() < 1e-6);
        let mut c = [0.0; 4];
        p.eval(0.02, &mut c, SR);
        assert!(c.iter().all(|&v| v == 1.0));
        assert_eq!(p.num_events(), 0);
    }

    #[test]
    fn zero_duration_takes_effect_next_sample() {
        let mut p = Param::new(0.25);
        p.ramp_to(0.75, 0.0);
        let mut out = [0.0; 8];
        p.eval(0.0, &mut out, SR);
        assert!(out.iter().all(|&v| v == 0.75));
    }

    #[test]
    fn delayed_ramp_holds_current_value_first() {
        let mut p = Param::new(2.0);
        p.ramp_to_with(
            4.0,
            0.004,
            RampOptions {
                delay: 0.004,
                curve: Curve::Linear,
            },
        );
        let mut out = [0.0; 12];
        p.eval(0.0, &mut out, SR);
        assert_eq!(&out[..4], &[2.0; 4]);
        assert!((out[6] - 3.0).abs() < 1e-6);
        assert_eq!(&out[8..], &[4.0; 4]);
    }

    #[test]
    fn appended_ramps_chain() {
        let mut p = Param::new(0.0);
        p.ramp_to(1.0, 0.004);
        p.append_ramp(0.0, 0.004);
        let (end, value) = p.end_time_and_value();
        assert!((end - 0.008).abs() < 1e-12);
        assert_eq!(value, 0.0);

        let mut out = [0.0; 10];
        p.eval(0.0, &mut out, SR);
        assert_eq!(out[4], 1.0);
        assert!((out[6] - 0.5).abs() < 1e-6);
        assert_eq!(out[8], 0.0);
    }

    #[test]
    fn set_value_discards_schedule() {
        let mut p = Param::new(0.0);
        p.ramp_to(1.0, 1.0);
        p.set_value(0.3);
        assert_eq!(p.num_events(), 0);
        assert_eq!(p.value(), 0.3);
    }

    #[test]
    fn cancel_keeps_value() {
        let mut p = Param::new(0.0);
        p.ramp_to(1.0, 0.02);
        let mut out = [0.0; 10];
        p.eval(0.0, &mut out, SR);
        let held = p.value();
        p.cancel();
        p.eval(0.01, &mut out, SR);
        assert!(out.iter().all(|&v| v == held));
    }

    #[test]
    fn stale_events_dropped_and_applied() {
        let mut p = Param::new(0.0);
        p.ramp_to(5.0, 0.001);
        let mut out = [0.0; 4];
        p.eval(1.0, &mut out, SR);
        assert_eq!(p.num_events(), 0);
        assert!(out.iter().all(|&v| v == 5.0));
    }

    #[test]
    fn curves_shape_midpoint() {
        assert_eq!(Curve::Linear.interpolate(0.0, 1.0, 0.5), 0.5);
        assert_eq!(Curve::InQuad.interpolate(0.0, 1.0, 0.5), 0.25);
        assert_eq!(Curve::OutQuad.interpolate(0.0, 1.0, 0.5), 0.75);
        for curve in [Curve::Linear, Curve::InQuad, Curve::OutQuad] {
            assert_eq!(curve.interpolate(2.0, 4.0, 0.0), 2.0);
            assert_eq!(curve.interpolate(2.0, 4.0, 1.0), 4.0);
        }
    }

    #[test]
    fn varying_queries() {
        let mut p = Param::new(0.0);
        assert!(!p.is_varying_next_eval());
        p.ramp_to_with(
            1.0,
            0.1,
            RampOptions {
                delay: 1.0,
                curve: Curve::Linear,
            },
        );
        assert!(!p.is_varying_in(0.0, 0.5));
        assert!(p.is_varying_in(0.9, 0.2));
        assert!(p.is_varying_in(1.05, 0.01));
        assert!(!p.is_varying_in(1.1, 0.01));
    }

    #[test]
    fn attached_param_schedules_from_clock() {
        let clock = Clock::new(1000);
        let mut p = Param::new(0.0);
        p.attach(clock.clone(), 8);
        clock.advance(500);
        p.ramp_to(1.0, 0.1);
        let event = p.events().next().copied().unwrap();
        assert!((event.begin - 0.5).abs() < 1e-12);
        assert!((event.end - 0.6).abs() < 1e-12);
        assert!((p.remaining_duration() - 0.1).abs() < 1e-9);
        assert_eq!(p.value_array().len(), 8);
    }

    #[test]
    fn default_ramp_length() {
        let mut p = Param::new(0.0);
        assert_eq!(p.default_ramp_seconds(), DEFAULT_RAMP_SECONDS);
        p.set_default_ramp_seconds(0.01);
        p.ramp_to_default(1.0);
        let event = p.events().next().copied().unwrap();
        assert!((event.end - 0.01).abs() < 1e-12);
    }
}
