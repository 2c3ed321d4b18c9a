//! The siren's audio engine: one voice, one DSP chain, no allocation after
//! construction.
//!
//! The chain per block: oscillator (with optional pitch-envelope sweep) ->
//! envelope gate -> LFO-modulated low-pass -> tape delay -> chamber reverb ->
//! DC blocker -> gain -> stereo interleave.
//!
//! [`SirenEngine`] is owned by the audio thread and is the only thing that
//! touches DSP state. Control threads hold [`EngineControls`] handles and
//! communicate exclusively through the atomic carriers in [`params`].

pub mod params;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::dsp::dc_blocker::DcBlocker;
use crate::dsp::delay::TapeDelay;
use crate::dsp::envelope::ArEnvelope;
use crate::dsp::filter::LowPassFilter;
use crate::dsp::lfo::Lfo;
use crate::dsp::oscillator::{Oscillator, Waveform};
use crate::dsp::reverb::ChamberReverb;
use crate::dsp::smooth::SmoothedValue;
use crate::{EngineConfig, MAX_BLOCK_SIZE, MAX_DELAY_SECONDS};

pub use params::EngineControls;

/// Pitch sweep applied while a trigger's attack runs: one octave up into the
/// base pitch, one octave down into it, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PitchEnvMode {
    None = 0,
    Up = 1,
    Down = 2,
}

impl PitchEnvMode {
    pub fn from_u8(value: u8) -> Self {
        match value % 3 {
            0 => PitchEnvMode::None,
            1 => PitchEnvMode::Up,
            _ => PitchEnvMode::Down,
        }
    }

    pub fn next(self) -> Self {
        match self {
            PitchEnvMode::None => PitchEnvMode::Up,
            PitchEnvMode::Up => PitchEnvMode::Down,
            PitchEnvMode::Down => PitchEnvMode::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchEnvMode::None => "none",
            PitchEnvMode::Up => "up",
            PitchEnvMode::Down => "down",
        }
    }
}

/// Frequency of the pitch sweep at normalized progress `t` in [0, 1].
/// Linear in semitones: Up runs -12 -> 0 semitones relative to `base`,
/// Down runs +12 -> 0. Clamped to stay above 20 Hz.
fn pitch_ramp_frequency(mode: PitchEnvMode, base: f32, t: f32) -> f32 {
    let semitones = match mode {
        PitchEnvMode::None => 0.0,
        PitchEnvMode::Up => -12.0 * (1.0 - t),
        PitchEnvMode::Down => 12.0 * (1.0 - t),
    };
    (base * (semitones / 12.0).exp2()).max(20.0)
}

/// Envelope levels below this are treated as silence and gated hard to
/// keep residue out of the delay line.
const GATE_FLOOR: f32 = 1e-3;

/// Smoothing coefficient for the zipper-prone parameters.
const SMOOTH_COEFF: f32 = 0.02;

pub struct SirenEngine {
    sample_rate: f32,
    shared: Arc<params::SharedParams>,

    oscillator: Oscillator,
    lfo: Lfo,
    envelope: ArEnvelope,
    filter: LowPassFilter,
    delay: TapeDelay,
    reverb: ChamberReverb,
    dc_blocker: DcBlocker,

    volume_smooth: SmoothedValue,
    freq_smooth: SmoothedValue,
    cutoff_smooth: SmoothedValue,

    last_gate_seq: u64,
    pitch_ramp_mode: PitchEnvMode,
    pitch_ramp_pos: u32,
    pitch_ramp_len: u32,

    // Scratch, sized once. Nothing allocates after construction.
    osc_buf: Vec<f32>,
    lfo_buf: Vec<f32>,
    env_buf: Vec<f32>,
}

impl SirenEngine {
    pub fn new(config: EngineConfig) -> Self {
        let sample_rate = config.sample_rate as f32;
        let shared = Arc::new(params::SharedParams::with_defaults());

        let mut delay = TapeDelay::new(sample_rate, MAX_DELAY_SECONDS);
        delay.set_delay_time(shared.delay_time.get());

        Self {
            sample_rate,
            oscillator: Oscillator::new(sample_rate),
            lfo: Lfo::new(sample_rate),
            envelope: ArEnvelope::new(sample_rate),
            filter: LowPassFilter::new(sample_rate),
            delay,
            reverb: ChamberReverb::new(sample_rate),
            dc_blocker: DcBlocker::new(),
            volume_smooth: SmoothedValue::new(shared.volume.get(), SMOOTH_COEFF),
            freq_smooth: SmoothedValue::new(shared.base_frequency.get(), SMOOTH_COEFF),
            cutoff_smooth: SmoothedValue::new(shared.filter_cutoff.get(), SMOOTH_COEFF),
            last_gate_seq: 0,
            pitch_ramp_mode: PitchEnvMode::None,
            pitch_ramp_pos: 0,
            pitch_ramp_len: 0,
            osc_buf: vec![0.0; MAX_BLOCK_SIZE],
            lfo_buf: vec![0.0; MAX_BLOCK_SIZE],
            env_buf: vec![0.0; MAX_BLOCK_SIZE],
            shared,
        }
    }

    /// A cloneable control-side handle. Any number may exist; they all point
    /// at the same carriers.
    pub fn controls(&self) -> EngineControls {
        EngineControls {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Render one block of interleaved stereo into `out` (`out.len() / 2`
    /// frames). Never panics, never allocates, never blocks; every sample
    /// leaves clamped to [-1, 1].
    pub fn process(&mut self, out: &mut [f32]) {
        let frames = (out.len() / 2).min(MAX_BLOCK_SIZE);
        debug_assert!(
            out.len() / 2 <= MAX_BLOCK_SIZE,
            "block of {} frames exceeds MAX_BLOCK_SIZE {MAX_BLOCK_SIZE}",
            out.len() / 2
        );

        self.sync_parameters();
        self.apply_gate_events();

        // Oscillator, with the pitch sweep overriding the smoothed base
        // frequency while it runs.
        for i in 0..frames {
            let base = self.freq_smooth.next();
            let freq = if self.pitch_ramp_pos < self.pitch_ramp_len {
                let t = self.pitch_ramp_pos as f32 / self.pitch_ramp_len as f32;
                self.pitch_ramp_pos += 1;
                pitch_ramp_frequency(self.pitch_ramp_mode, base, t)
            } else {
                base
            };
            self.oscillator.set_frequency(freq);
            self.osc_buf[i] = self.oscillator.next_sample();
        }

        self.lfo.render(&mut self.lfo_buf[..frames]);
        self.envelope.render(&mut self.env_buf[..frames]);

        // Filter with the LFO swinging the cutoff +/- 2 octaves, then the
        // envelope gate: levels under the floor are zeroed outright so the
        // delay line never records bleed.
        for i in 0..frames {
            let base_cutoff = self.cutoff_smooth.next();
            let modulated = (base_cutoff * (self.lfo_buf[i] * 2.0).exp2()).clamp(100.0, 8_000.0);
            self.filter.set_cutoff(modulated);
            let filtered = self.filter.process_sample(self.osc_buf[i]);
            self.osc_buf[i] = if self.env_buf[i] < GATE_FLOOR {
                0.0
            } else {
                filtered * self.env_buf[i]
            };
        }

        // Effects, gain, stereo interleave.
        for i in 0..frames {
            let mut sample = self.osc_buf[i];
            sample = self.delay.process_sample(sample);
            sample = self.reverb.process_sample(sample);
            sample = self.dc_blocker.process_sample(sample);

            let gain = self.volume_smooth.next();
            let y = (sample * gain).clamp(-1.0, 1.0);
            out[2 * i] = y;
            out[2 * i + 1] = y;
        }

        self.shared
            .active
            .store(self.envelope.is_active(), Ordering::Relaxed);
    }

    /// Pull every carrier once per block. One-block worst-case latency from
    /// a control write to its first audible sample.
    fn sync_parameters(&mut self) {
        self.oscillator.set_waveform(Waveform::from_index(
            self.shared.osc_waveform.load(Ordering::Relaxed),
        ));
        self.lfo.set_waveform(Waveform::from_index(
            self.shared.lfo_waveform.load(Ordering::Relaxed),
        ));
        self.lfo.set_frequency(self.shared.lfo_rate.get());
        self.lfo.set_depth(self.shared.lfo_depth.get());

        self.envelope.set_attack(self.shared.attack.get());
        self.envelope.set_release(self.shared.release.get());

        self.filter.set_resonance(self.shared.filter_resonance.get());

        self.delay.set_delay_time(self.shared.delay_time.get());
        self.delay.set_feedback(self.shared.delay_feedback.get());
        self.delay.set_dry_wet(self.shared.delay_mix.get());

        self.reverb.set_size(self.shared.reverb_size.get());
        self.reverb.set_damping(self.shared.reverb_damping.get());
        self.reverb.set_dry_wet(self.shared.reverb_mix.get());

        self.freq_smooth.set_target(self.shared.base_frequency.get());
        self.cutoff_smooth.set_target(self.shared.filter_cutoff.get());
        self.volume_smooth.set_target(self.shared.volume.get());
    }

    fn apply_gate_events(&mut self) {
        let (seq, pressed) = self.shared.gate.load();
        if seq == self.last_gate_seq {
            return;
        }
        let delta = seq.wrapping_sub(self.last_gate_seq);

        // A press that ended in a release inside the same block still fires
        // the attack first, so a tap with zero attack/release resolves to
        // Idle within this block instead of being lost.
        if pressed || delta >= 2 {
            self.start_note();
        }
        if !pressed {
            self.envelope.release();
        }
        self.last_gate_seq = seq;
    }

    fn start_note(&mut self) {
        // A fresh note from silence jumps straight to the target pitch; a
        // glide from the previous note's frequency is only kept while the
        // previous note is still sounding.
        if !self.envelope.is_active() {
            self.freq_smooth.snap(self.shared.base_frequency.get());
        }

        self.oscillator.reset_phase();
        self.envelope.trigger();

        let mode = PitchEnvMode::from_u8(self.shared.pitch_env_mode.load(Ordering::Relaxed));
        self.pitch_ramp_mode = mode;
        self.pitch_ramp_pos = 0;
        self.pitch_ramp_len = if mode == PitchEnvMode::None {
            0
        } else {
            (self.shared.attack.get() * self.sample_rate).round().max(1.0) as u32
        };
    }
}
