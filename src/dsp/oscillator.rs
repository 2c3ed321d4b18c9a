#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/*
Oscillator Implementation
=========================

The oscillator is the raw sound source of the siren. It traces a repeating
shape as a phase accumulator sweeps through one cycle per period.

Vocabulary
----------

  phase       Normalized position in the cycle, 0.0 to 1.0. One complete
              waveform cycle = 1.0. Radians are only needed at the sin()
              call site (multiply by tau).

  phase_inc   How much phase advances per sample:

              phase_inc = frequency / sample_rate

  PolyBLEP    Polynomial band-limited step. Naive square and saw waves jump
              instantaneously at their discontinuities; sampled, those jumps
              fold energy back below Nyquist as inharmonic aliasing. PolyBLEP
              replaces the two samples around each jump with a quadratic
              segment whose spectrum rolls off the foldover by roughly 60 dB
              in the audible band.

Waveform notes
--------------

  SINE        sin(tau * phase). Pure, no correction needed.

  SAW         2*phase - 1, one downward jump per cycle at the wrap point.
              One BLEP subtracted at the wrap.

  SQUARE      +1 for the first half cycle, -1 for the second. Two jumps per
              cycle: BLEP added at the rising edge, subtracted at the
              falling edge (half a cycle later).

  TRIANGLE    2*|2*phase - 1| - 1. Its harmonics already fall at 12 dB per
              octave, which keeps foldover below the corrected square/saw
              floor, so it stays naive. This also keeps the shape exact at
              control rates where a BLEP region would never be entered.

At 0 Hz the phase freezes and the oscillator emits DC at the held phase.
*/

/// The shape of one oscillator cycle. Indices 0..3 cycle through the
/// variants in declaration order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
}

impl Waveform {
    /// Map an integer index onto a waveform, wrapping mod 4. Out-of-range
    /// indices are taken as their remainder rather than rejected.
    pub fn from_index(index: usize) -> Self {
        match index % 4 {
            0 => Waveform::Sine,
            1 => Waveform::Square,
            2 => Waveform::Saw,
            _ => Waveform::Triangle,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Waveform::Sine => 0,
            Waveform::Square => 1,
            Waveform::Saw => 2,
            Waveform::Triangle => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Saw => "saw",
            Waveform::Triangle => "triangle",
        }
    }
}

/// Quadratic correction segment around a step discontinuity.
///
/// `t` is the normalized phase, `dt` the per-sample phase increment. Returns
/// the residual to blend into the naive waveform; zero outside the two-sample
/// window around the jump.
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

pub struct Oscillator {
    sample_rate: f32,
    frequency: f32,
    phase: f32, // normalized, always in [0, 1)
    waveform: Waveform,
}

impl Oscillator {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            frequency: 440.0,
            phase: 0.0,
            waveform: Waveform::Sine,
        }
    }

    /// Set the frequency in Hz. Negative values are treated as silence-at-DC
    /// (the phase freezes); the engine clamps musical range before this call.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency.max(0.0);
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Restart the cycle. Called on trigger so every hit starts identically.
    pub fn reset_phase(&mut self) {
        self.phase = 0.0;
    }

    /// Produce one sample at the current phase, then advance. Output is in
    /// [-1, 1] for every waveform.
    pub fn next_sample(&mut self) -> f32 {
        let t = self.phase;
        let dt = self.frequency / self.sample_rate;

        let sample = match self.waveform {
            Waveform::Sine => (TAU * t).sin(),
            Waveform::Square => {
                let mut s = if t < 0.5 { 1.0 } else { -1.0 };
                s += poly_blep(t, dt);
                s -= poly_blep((t + 0.5).fract(), dt);
                s
            }
            Waveform::Saw => {
                let mut s = 2.0 * t - 1.0;
                s -= poly_blep(t, dt);
                s
            }
            Waveform::Triangle => 2.0 * (2.0 * t - 1.0).abs() - 1.0,
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        sample
    }

    /// Fill a block at the current frequency.
    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_matches_closed_form() {
        let sample_rate = 48_000.0;
        let mut osc = Oscillator::new(sample_rate);
        osc.set_frequency(440.0);

        let mut buffer = [0.0f32; 128];
        osc.render(&mut buffer);

        // sample n should be sin(tau * f * n / sr)
        let n = 12;
        let expected = (TAU * 440.0 * n as f32 / sample_rate).sin();
        assert!(
            (buffer[n] - expected).abs() < 1e-5,
            "expected {expected}, got {}",
            buffer[n]
        );
    }

    #[test]
    fn phase_stays_wrapped() {
        let mut osc = Oscillator::new(48_000.0);
        osc.set_frequency(12_345.0);
        for _ in 0..10_000 {
            osc.next_sample();
        }
        assert!(osc.phase >= 0.0 && osc.phase < 1.0);
    }

    #[test]
    fn zero_frequency_holds_dc() {
        let mut osc = Oscillator::new(48_000.0);
        osc.set_frequency(0.0);
        let first = osc.next_sample();
        for _ in 0..64 {
            let s = osc.next_sample();
            assert_eq!(s, first, "phase must freeze at 0 Hz");
        }
        assert_eq!(first, 0.0); // sin(0)
    }

    #[test]
    fn all_waveforms_stay_in_range() {
        for index in 0..4 {
            let mut osc = Oscillator::new(48_000.0);
            osc.set_waveform(Waveform::from_index(index));
            osc.set_frequency(880.0);
            for _ in 0..4_096 {
                let s = osc.next_sample();
                assert!(
                    (-1.001..=1.001).contains(&s),
                    "{:?} produced out-of-range sample {s}",
                    osc.waveform()
                );
            }
        }
    }

    #[test]
    fn waveform_index_wraps() {
        assert_eq!(Waveform::from_index(0), Waveform::Sine);
        assert_eq!(Waveform::from_index(3), Waveform::Triangle);
        assert_eq!(Waveform::from_index(4), Waveform::Sine);
        assert_eq!(Waveform::from_index(7), Waveform::Triangle);
    }

    #[test]
    fn reset_phase_restarts_cycle() {
        let mut osc = Oscillator::new(48_000.0);
        osc.set_frequency(440.0);
        let mut first = [0.0f32; 32];
        osc.render(&mut first);

        osc.reset_phase();
        let mut second = [0.0f32; 32];
        osc.render(&mut second);

        assert_eq!(first, second, "reset must reproduce the initial cycle");
    }
}
