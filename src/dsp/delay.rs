use std::f32::consts::TAU;

use crate::dsp::smooth::SmoothedValue;

/// Fixed-capacity circular delay buffer with fractional reads.
///
/// Capacity is decided once at construction; nothing reallocates afterwards.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(2)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Read `delay_samples` behind the write head with linear interpolation.
    /// The distance is clamped into [1, capacity - 2].
    pub fn read_fractional(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay_samples.clamp(1.0, (len - 2) as f32);

        let whole = delay as usize;
        let frac = delay - whole as f32;

        let read_a = (self.write_pos + len - whole) % len;
        let read_b = (read_a + len - 1) % len;

        let a = self.buffer[read_a];
        let b = self.buffer[read_b];
        a + frac * (b - a)
    }

    /// Integer-offset read for tap banks where interpolation buys nothing.
    pub fn read_tap(&self, delay_samples: usize) -> f32 {
        let len = self.buffer.len();
        let delay = delay_samples.clamp(1, len - 1);
        self.buffer[(self.write_pos + len - delay) % len]
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/*
Tape Delay
==========

An echo with the rough edges of the hardware units it imitates:

  - the delay time is smoothed, so sweeping the time knob bends pitch
    instead of clicking;
  - the read head wobbles by a fraction of a sample at about half a hertz,
    the mechanical instability of a tape loop;
  - the feedback path runs through a one-pole low-pass (around 8 kHz) and a
    soft tanh saturator, so repeats get darker and rounder, never brighter;
  - every write into the loop is clamped to [-1, 1], which together with
    feedback <= 0.95 makes runaway impossible.

With dry_wet = 0 the input passes through untouched.
*/

/// Read-head wobble: sub-sample depth keeps a bare impulse within one
/// sample of its nominal echo position.
const WOBBLE_DEPTH_SAMPLES: f32 = 0.4;
const WOBBLE_RATE_HZ: f32 = 0.5;

/// Cutoff of the one-pole damping filter in the feedback loop.
const FEEDBACK_LP_HZ: f32 = 8_000.0;

const MIN_DELAY_SECONDS: f32 = 0.001;

pub struct TapeDelay {
    line: DelayLine,
    sample_rate: f32,
    delay_time: SmoothedValue,
    feedback: f32,
    dry_wet: f32,
    lp_coeff: f32,
    lp_state: f32,
    wobble_phase: f32,
}

impl TapeDelay {
    pub fn new(sample_rate: f32, max_delay_seconds: f32) -> Self {
        let capacity = (max_delay_seconds * sample_rate).ceil() as usize + 2;
        Self {
            line: DelayLine::new(capacity),
            sample_rate,
            delay_time: SmoothedValue::new(0.5, 0.005),
            feedback: 0.5,
            dry_wet: 0.5,
            lp_coeff: 1.0 - (-TAU * FEEDBACK_LP_HZ / sample_rate).exp(),
            lp_state: 0.0,
            wobble_phase: 0.0,
        }
    }

    pub fn set_delay_time(&mut self, seconds: f32) {
        let max = (self.line.capacity() - 2) as f32 / self.sample_rate;
        self.delay_time
            .set_target(seconds.clamp(MIN_DELAY_SECONDS, max));
    }

    pub fn delay_time(&self) -> f32 {
        self.delay_time.target()
    }

    pub fn set_feedback(&mut self, gain: f32) {
        self.feedback = gain.clamp(0.0, 0.95);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_dry_wet(&mut self, mix: f32) {
        self.dry_wet = mix.clamp(0.0, 1.0);
    }

    pub fn dry_wet(&self) -> f32 {
        self.dry_wet
    }

    #[inline]
    fn soft_clip(x: f32) -> f32 {
        // Gentle drive; unity slope at the origin so quiet repeats pass clean.
        (x * 1.2).tanh() / 1.2
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let time = self.delay_time.next();

        let wobble = (TAU * self.wobble_phase).sin() * WOBBLE_DEPTH_SAMPLES;
        self.wobble_phase += WOBBLE_RATE_HZ / self.sample_rate;
        if self.wobble_phase >= 1.0 {
            self.wobble_phase -= 1.0;
        }

        let distance = time * self.sample_rate + wobble;
        let wet = self.line.read_fractional(distance);

        // Damp then saturate the loop before it re-enters the tape.
        self.lp_state += self.lp_coeff * (wet - self.lp_state);
        let recirculated = Self::soft_clip(self.lp_state) * self.feedback;

        self.line.write((input + recirculated).clamp(-1.0, 1.0));

        input * (1.0 - self.dry_wet) + wet * self.dry_wet
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.line.reset();
        self.lp_state = 0.0;
        self.wobble_phase = 0.0;
    }
}
