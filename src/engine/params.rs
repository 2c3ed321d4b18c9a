//! Thread-safe parameter carriers between the control surface and the
//! audio thread.
//!
//! Every parameter is a single machine word with atomic load/store: the
//! control threads write targets, the audio thread reads them at block
//! boundaries. No ordering is guaranteed *across* parameters -- each one is
//! independently valid at all times, so none is needed. Parameters that
//! zipper audibly (volume, base frequency, cutoff, delay time) get an
//! additional audio-thread-local smoother in the engine; the carriers here
//! only ever hold the target.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::PitchEnvMode;
use crate::dsp::Waveform;

/// An `f32` stored as its bit pattern in an `AtomicU32`.
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// The trigger gate packed into one word: bit 0 is the pressed state, the
/// remaining bits count gestures. The audio thread compares the count once
/// per block; a count that advanced by two or more with the gate ending up
/// released means a press and release both landed inside one block, and both
/// are applied in order.
pub(crate) struct GateWord(AtomicU64);

impl GateWord {
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub(crate) fn load(&self) -> (u64, bool) {
        let word = self.0.load(Ordering::Acquire);
        (word >> 1, word & 1 == 1)
    }

    fn advance(&self, pressed: bool) {
        let (seq, _) = self.load();
        let word = ((seq.wrapping_add(1)) << 1) | u64::from(pressed);
        self.0.store(word, Ordering::Release);
    }
}

pub(crate) struct SharedParams {
    pub(crate) volume: AtomicF32,
    pub(crate) base_frequency: AtomicF32,
    pub(crate) attack: AtomicF32,
    pub(crate) release: AtomicF32,
    pub(crate) osc_waveform: AtomicUsize,
    pub(crate) lfo_waveform: AtomicUsize,
    pub(crate) lfo_rate: AtomicF32,
    pub(crate) lfo_depth: AtomicF32,
    pub(crate) filter_cutoff: AtomicF32,
    pub(crate) filter_resonance: AtomicF32,
    pub(crate) delay_time: AtomicF32,
    pub(crate) delay_feedback: AtomicF32,
    pub(crate) delay_mix: AtomicF32,
    pub(crate) reverb_size: AtomicF32,
    pub(crate) reverb_damping: AtomicF32,
    pub(crate) reverb_mix: AtomicF32,
    pub(crate) pitch_env_mode: AtomicU8,

    pub(crate) gate: GateWord,
    /// Serializes trigger against release. The audio thread never takes it.
    gate_lock: Mutex<()>,

    /// Written by the audio thread after each block, read by control/status.
    pub(crate) active: AtomicBool,
}

impl SharedParams {
    pub(crate) fn with_defaults() -> Self {
        Self {
            volume: AtomicF32::new(0.7),
            base_frequency: AtomicF32::new(440.0),
            attack: AtomicF32::new(0.01),
            release: AtomicF32::new(0.5),
            osc_waveform: AtomicUsize::new(Waveform::Sine.index()),
            lfo_waveform: AtomicUsize::new(Waveform::Sine.index()),
            lfo_rate: AtomicF32::new(4.0),
            lfo_depth: AtomicF32::new(0.0),
            filter_cutoff: AtomicF32::new(2_000.0),
            filter_resonance: AtomicF32::new(0.0),
            delay_time: AtomicF32::new(0.2),
            delay_feedback: AtomicF32::new(0.5),
            delay_mix: AtomicF32::new(0.3),
            reverb_size: AtomicF32::new(0.5),
            reverb_damping: AtomicF32::new(0.5),
            reverb_mix: AtomicF32::new(0.35),
            pitch_env_mode: AtomicU8::new(PitchEnvMode::None as u8),
            gate: GateWord::new(),
            gate_lock: Mutex::new(()),
            active: AtomicBool::new(false),
        }
    }
}

/// Cloneable control-side handle to a [`SirenEngine`](super::SirenEngine).
///
/// Every setter clamps silently; reading a parameter back returns the
/// clamped value. All methods are lock-free except `trigger`/`release`,
/// which serialize against each other through a mutex the audio thread
/// never touches.
#[derive(Clone)]
pub struct EngineControls {
    pub(crate) shared: Arc<SharedParams>,
}

impl EngineControls {
    pub fn set_volume(&self, volume: f32) {
        self.shared.volume.set(volume.clamp(0.0, 1.0));
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume.get()
    }

    pub fn set_frequency(&self, hz: f32) {
        self.shared.base_frequency.set(hz.clamp(20.0, 20_000.0));
    }

    pub fn frequency(&self) -> f32 {
        self.shared.base_frequency.get()
    }

    pub fn set_attack_time(&self, seconds: f32) {
        self.shared.attack.set(seconds.clamp(0.0, 10.0));
    }

    pub fn attack_time(&self) -> f32 {
        self.shared.attack.get()
    }

    pub fn set_release_time(&self, seconds: f32) {
        self.shared.release.set(seconds.clamp(0.0, 10.0));
    }

    pub fn release_time(&self) -> f32 {
        self.shared.release.get()
    }

    pub fn set_waveform_index(&self, index: usize) {
        self.shared
            .osc_waveform
            .store(Waveform::from_index(index).index(), Ordering::Relaxed);
    }

    pub fn waveform(&self) -> Waveform {
        Waveform::from_index(self.shared.osc_waveform.load(Ordering::Relaxed))
    }

    pub fn set_lfo_waveform_index(&self, index: usize) {
        self.shared
            .lfo_waveform
            .store(Waveform::from_index(index).index(), Ordering::Relaxed);
    }

    pub fn lfo_waveform(&self) -> Waveform {
        Waveform::from_index(self.shared.lfo_waveform.load(Ordering::Relaxed))
    }

    pub fn set_lfo_rate(&self, hz: f32) {
        self.shared.lfo_rate.set(hz.clamp(0.0, 20.0));
    }

    pub fn set_lfo_depth(&self, depth: f32) {
        self.shared.lfo_depth.set(depth.clamp(0.0, 1.0));
    }

    pub fn set_filter_cutoff(&self, hz: f32) {
        self.shared.filter_cutoff.set(hz.clamp(20.0, 20_000.0));
    }

    pub fn filter_cutoff(&self) -> f32 {
        self.shared.filter_cutoff.get()
    }

    pub fn set_filter_resonance(&self, q: f32) {
        self.shared.filter_resonance.set(q.clamp(0.0, 0.95));
    }

    pub fn filter_resonance(&self) -> f32 {
        self.shared.filter_resonance.get()
    }

    pub fn set_delay_time(&self, seconds: f32) {
        self.shared.delay_time.set(seconds.clamp(0.001, 2.0));
    }

    pub fn delay_time(&self) -> f32 {
        self.shared.delay_time.get()
    }

    pub fn set_delay_feedback(&self, gain: f32) {
        self.shared.delay_feedback.set(gain.clamp(0.0, 0.95));
    }

    pub fn delay_feedback(&self) -> f32 {
        self.shared.delay_feedback.get()
    }

    pub fn set_delay_mix(&self, mix: f32) {
        self.shared.delay_mix.set(mix.clamp(0.0, 1.0));
    }

    pub fn set_reverb_size(&self, size: f32) {
        self.shared.reverb_size.set(size.clamp(0.0, 1.0));
    }

    pub fn reverb_size(&self) -> f32 {
        self.shared.reverb_size.get()
    }

    pub fn set_reverb_damping(&self, damping: f32) {
        self.shared.reverb_damping.set(damping.clamp(0.0, 1.0));
    }

    pub fn set_reverb_mix(&self, mix: f32) {
        self.shared.reverb_mix.set(mix.clamp(0.0, 1.0));
    }

    pub fn reverb_mix(&self) -> f32 {
        self.shared.reverb_mix.get()
    }

    pub fn set_pitch_envelope_mode(&self, mode: PitchEnvMode) {
        self.shared
            .pitch_env_mode
            .store(mode as u8, Ordering::Relaxed);
    }

    pub fn pitch_envelope_mode(&self) -> PitchEnvMode {
        PitchEnvMode::from_u8(self.shared.pitch_env_mode.load(Ordering::Relaxed))
    }

    /// Advance None -> Up -> Down -> None and return the new mode.
    pub fn cycle_pitch_envelope(&self) -> PitchEnvMode {
        let mut next = PitchEnvMode::None;
        let _ = self
            .shared
            .pitch_env_mode
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                next = PitchEnvMode::from_u8(current).next();
                Some(next as u8)
            });
        next
    }

    /// Start the siren: the audio thread resets the oscillator phase and
    /// sends the envelope into Attack at its next block.
    pub fn trigger(&self) {
        let _guard = match self.shared.gate_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.shared.gate.advance(true);
    }

    /// Let the siren go: the envelope enters Release at the next block.
    pub fn release(&self) {
        let _guard = match self.shared.gate_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.shared.gate.advance(false);
    }

    /// True while the envelope is sounding, as of the last processed block.
    pub fn is_playing(&self) -> bool {
        self.shared.active.load(Ordering::Relaxed)
    }

    /// Test hook: raw gate word, for asserting what reached the engine.
    #[cfg(test)]
    pub(crate) fn shared_gate_probe(&self) -> (u64, bool) {
        self.shared.gate.load()
    }
}
