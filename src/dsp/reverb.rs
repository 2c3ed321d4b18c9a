use std::f32::consts::TAU;

use crate::dsp::delay::DelayLine;

/*
Chamber Reverb
==============

A small-room reverb in the Schroeder/Moorer lineage, tuned for dub: dense
early energy, a dark modulated tail, and no metallic ring.

Signal path, per sample:

    input -+-> early reflection taps --------------- x 0.15 --+
           |                                                  v
           +-> allpass -> allpass -> 6 damped combs -> allpass + --> wet
                (input diffusion)     (in parallel)  (output)

    out = input * (1 - mix) + wet * mix

  - Early reflections: 8 taps between 13 and 59 ms off one shared line,
    summed at 0.15. These are the first wall bounces and give the room its
    apparent size before the tail develops.

  - Input diffusion: two 0.5-gain allpasses (5.0 ms, 8.9 ms) smear the
    attack so the comb bank is fed noise-like material instead of a click.

  - Comb bank: six parallel feedback combs, 29.7-57.1 ms, mutually prime-ish
    so their resonances interleave. Each feedback path runs through a
    one-pole low-pass (the damping control) and each read head drifts by a
    fraction of a sample at ~0.3 Hz, with the six phases staggered, which
    breaks up the static resonances that make small reverbs ring.

  - Feedback tracks the size control as 0.4 + size * 0.45 and is capped
    below 0.98, so the tail always decays.

Denormal handling: recursive state that falls below 1e-10 in magnitude is
flushed to exactly zero. This keeps the tail from degenerating into subnormal
arithmetic and keeps true silence bit-exact.
*/

const EARLY_TAPS_MS: [f32; 8] = [13.0, 17.0, 23.0, 29.0, 37.0, 43.0, 53.0, 59.0];
const EARLY_LEVEL: f32 = 0.15;

const INPUT_ALLPASS_MS: [f32; 2] = [5.0, 8.9];
const OUTPUT_ALLPASS_MS: f32 = 6.7;
const ALLPASS_GAIN: f32 = 0.5;

const COMB_DELAYS_MS: [f32; 6] = [29.7, 34.3, 39.1, 44.5, 50.3, 57.1];
const COMB_INPUT_GAIN: f32 = 0.15;
const COMB_MOD_DEPTH_SAMPLES: f32 = 0.5;
const COMB_MOD_RATE_HZ: f32 = 0.3;

const MAX_FEEDBACK: f32 = 0.98;
const DENORMAL_FLOOR: f32 = 1e-10;

#[inline]
fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_FLOOR {
        0.0
    } else {
        x
    }
}

/// Damped feedback comb with a slowly drifting read head.
struct Comb {
    line: DelayLine,
    delay_samples: f32,
    filter_store: f32,
    mod_phase: f32,
    mod_inc: f32,
}

impl Comb {
    fn new(sample_rate: f32, delay_ms: f32, mod_phase: f32) -> Self {
        let delay_samples = delay_ms * 1e-3 * sample_rate;
        Self {
            line: DelayLine::new(delay_samples.ceil() as usize + 4),
            delay_samples,
            filter_store: 0.0,
            mod_phase,
            mod_inc: COMB_MOD_RATE_HZ / sample_rate,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let drift = (TAU * self.mod_phase).sin() * COMB_MOD_DEPTH_SAMPLES;
        self.mod_phase += self.mod_inc;
        if self.mod_phase >= 1.0 {
            self.mod_phase -= 1.0;
        }

        let output = self.line.read_fractional(self.delay_samples + drift);

        // One-pole low-pass in the feedback loop; damp = damping * 0.5.
        self.filter_store = flush_denormal(output * (1.0 - damp) + self.filter_store * damp);

        self.line
            .write(flush_denormal(input + self.filter_store * feedback));

        output
    }

    fn reset(&mut self) {
        self.line.reset();
        self.filter_store = 0.0;
    }
}

/// Fixed-gain Schroeder allpass.
struct Allpass {
    line: DelayLine,
    delay_samples: usize,
}

impl Allpass {
    fn new(sample_rate: f32, delay_ms: f32) -> Self {
        let delay_samples = (delay_ms * 1e-3 * sample_rate).round() as usize;
        Self {
            line: DelayLine::new(delay_samples + 2),
            delay_samples: delay_samples.max(1),
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.line.read_tap(self.delay_samples);
        let output = -input + buffered;
        self.line
            .write(flush_denormal(input + buffered * ALLPASS_GAIN));
        output
    }

    fn reset(&mut self) {
        self.line.reset();
    }
}

pub struct ChamberReverb {
    early: DelayLine,
    early_taps: [usize; 8],
    input_diffusion: [Allpass; 2],
    combs: [Comb; 6],
    output_diffusion: Allpass,

    size: f32,
    damping: f32,
    dry_wet: f32,

    // Derived from size/damping; recomputed on the setters, not per sample.
    feedback: f32,
    damp: f32,
}

impl ChamberReverb {
    pub fn new(sample_rate: f32) -> Self {
        let to_samples = |ms: f32| (ms * 1e-3 * sample_rate).round() as usize;

        let longest_tap = to_samples(EARLY_TAPS_MS[EARLY_TAPS_MS.len() - 1]);
        let mut early_taps = [0usize; 8];
        for (tap, &ms) in early_taps.iter_mut().zip(EARLY_TAPS_MS.iter()) {
            *tap = to_samples(ms);
        }

        // Stagger the comb drift phases so no two read heads move together.
        let comb = |i: usize| {
            Comb::new(
                sample_rate,
                COMB_DELAYS_MS[i],
                i as f32 * 0.618_034 % 1.0,
            )
        };

        let mut reverb = Self {
            early: DelayLine::new(longest_tap + 2),
            early_taps,
            input_diffusion: [
                Allpass::new(sample_rate, INPUT_ALLPASS_MS[0]),
                Allpass::new(sample_rate, INPUT_ALLPASS_MS[1]),
            ],
            combs: [comb(0), comb(1), comb(2), comb(3), comb(4), comb(5)],
            output_diffusion: Allpass::new(sample_rate, OUTPUT_ALLPASS_MS),
            size: 0.5,
            damping: 0.5,
            dry_wet: 0.35,
            feedback: 0.0,
            damp: 0.0,
        };
        reverb.update_coefficients();
        reverb
    }

    fn update_coefficients(&mut self) {
        self.feedback = (0.4 + self.size * 0.45).min(MAX_FEEDBACK);
        self.damp = self.damping * 0.5;
    }

    pub fn set_size(&mut self, size: f32) {
        self.size = size.clamp(0.0, 1.0);
        self.update_coefficients();
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping.clamp(0.0, 1.0);
        self.update_coefficients();
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn set_dry_wet(&mut self, mix: f32) {
        self.dry_wet = mix.clamp(0.0, 1.0);
    }

    pub fn dry_wet(&self) -> f32 {
        self.dry_wet
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let mut early_sum = 0.0;
        for &tap in &self.early_taps {
            early_sum += self.early.read_tap(tap);
        }
        self.early.write(flush_denormal(input));
        let early = early_sum * EARLY_LEVEL;

        let mut diffused = input;
        for allpass in &mut self.input_diffusion {
            diffused = allpass.process(diffused);
        }

        let comb_in = diffused * COMB_INPUT_GAIN;
        let mut tail = 0.0;
        for comb in &mut self.combs {
            tail += comb.process(comb_in, self.feedback, self.damp);
        }

        let wet = early + self.output_diffusion.process(tail);

        input * (1.0 - self.dry_wet) + wet * self.dry_wet
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.early.reset();
        for allpass in &mut self.input_diffusion {
            allpass.reset();
        }
        for comb in &mut self.combs {
            comb.reset();
        }
        self.output_diffusion.reset();
    }
}
