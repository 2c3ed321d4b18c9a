use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::info;

use super::encoder::RotaryEncoder;
use super::pins::{bcm, PinReader};
use super::switch::{MomentarySwitch, SwitchEvent};
use crate::engine::EngineControls;
use crate::output::OutputSelect;
use crate::sampler::SamplePlayer;

/// Which overlay the five encoders currently address. Bank B is active
/// exactly while the shift button is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    A,
    B,
}

/// The control surface's own view of every encoder-addressable parameter.
/// Mutated tick by tick, clamped here, then pushed to the engine carriers.
#[derive(Debug, Clone)]
pub struct Parameters {
    // Bank A
    pub volume: f32,
    pub filter_freq: f32,
    pub filter_res: f32,
    pub delay_feedback: f32,
    pub reverb_mix: f32,
    // Bank B
    pub release: f32,
    pub delay_time: f32,
    pub reverb_size: f32,
    pub osc_waveform: usize,
    pub lfo_waveform: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            volume: 0.7,
            filter_freq: 2_000.0,
            filter_res: 0.2,
            delay_feedback: 0.5,
            reverb_mix: 0.35,
            release: 0.5,
            delay_time: 0.2,
            reverb_size: 0.5,
            osc_waveform: 0,
            lfo_waveform: 0,
        }
    }
}

/// Detector for the hidden sample-playback gesture: this many shift presses
/// inside the window flips the output between synth and sampler. Firing
/// clears the history, so holding the gesture does not retrigger, and the
/// same gesture toggles back out.
const SECRET_TAPS: usize = 4;
const SECRET_WINDOW: Duration = Duration::from_secs(2);

struct SecretTapDetector {
    taps: VecDeque<Instant>,
}

impl SecretTapDetector {
    fn new() -> Self {
        Self {
            taps: VecDeque::with_capacity(SECRET_TAPS),
        }
    }

    fn register(&mut self, now: Instant) -> bool {
        self.taps.push_back(now);
        while let Some(&front) = self.taps.front() {
            if now.duration_since(front) > SECRET_WINDOW {
                self.taps.pop_front();
            } else {
                break;
            }
        }
        if self.taps.len() >= SECRET_TAPS {
            self.taps.clear();
            true
        } else {
            false
        }
    }
}

struct SurfaceState {
    engine: EngineControls,
    sampler: Arc<SamplePlayer>,
    select: Arc<OutputSelect>,
    params: Mutex<Parameters>,
    shift_held: AtomicBool,
    secret: Mutex<SecretTapDetector>,
    shutdown: Option<Box<dyn Fn() + Send + Sync>>,
}

/// The physical control surface: five rotary encoders overlaid across two
/// banks plus trigger, pitch-envelope, shift, and shutdown buttons.
///
/// Event handling is synchronous in the poll threads; every handler is also
/// callable directly, which is how headless front-ends and the tests drive
/// the surface without pins.
pub struct ControlSurface {
    state: Arc<SurfaceState>,
    encoders: Vec<RotaryEncoder>,
    switches: Vec<MomentarySwitch>,
}

impl ControlSurface {
    pub fn new(
        engine: EngineControls,
        sampler: Arc<SamplePlayer>,
        select: Arc<OutputSelect>,
        shutdown: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> Self {
        Self {
            state: Arc::new(SurfaceState {
                engine,
                sampler,
                select,
                params: Mutex::new(Parameters::default()),
                shift_held: AtomicBool::new(false),
                secret: Mutex::new(SecretTapDetector::new()),
                shutdown,
            }),
            encoders: Vec::new(),
            switches: Vec::new(),
        }
    }

    /// Push the default parameter set into the engine. Called once at start
    /// so the first trigger sounds like the surface says it will.
    pub fn apply_initial(&self) {
        let params = lock(&self.state.params).clone();
        let engine = &self.state.engine;
        engine.set_volume(params.volume);
        engine.set_filter_cutoff(params.filter_freq);
        engine.set_filter_resonance(params.filter_res);
        engine.set_delay_feedback(params.delay_feedback);
        engine.set_reverb_mix(params.reverb_mix);
        engine.set_release_time(params.release);
        engine.set_delay_time(params.delay_time);
        engine.set_reverb_size(params.reverb_size);
        engine.set_waveform_index(params.osc_waveform);
        engine.set_lfo_waveform_index(params.lfo_waveform);
    }

    /// Wire the encoders and buttons to a pin source and start their poll
    /// threads. Without this the surface still works through the direct
    /// handler methods.
    pub fn attach(&mut self, pins: Arc<dyn PinReader>) {
        for (index, &(clk, dt)) in bcm::ENCODER_PINS.iter().enumerate() {
            let state = Arc::clone(&self.state);
            self.encoders.push(RotaryEncoder::spawn(
                Arc::clone(&pins),
                clk,
                dt,
                move |direction| state.handle_encoder(index, direction),
            ));
            info!("encoder {} on GPIO {clk}/{dt}", index + 1);
        }

        let buttons: [(u8, fn(&SurfaceState, SwitchEvent)); 4] = [
            (bcm::TRIGGER_BTN, SurfaceState::on_trigger),
            (bcm::PITCH_ENV_BTN, SurfaceState::on_pitch_env),
            (bcm::SHIFT_BTN, SurfaceState::on_shift),
            (bcm::SHUTDOWN_BTN, SurfaceState::on_shutdown),
        ];
        for (pin, handler) in buttons {
            let state = Arc::clone(&self.state);
            self.switches.push(MomentarySwitch::spawn(
                Arc::clone(&pins),
                pin,
                move |event| handler(&state, event),
            ));
            info!("button on GPIO {pin}");
        }

        info!("control surface ready");
        info!("bank A: volume, filter freq, filter res, delay feedback, reverb mix");
        info!("bank B: release, delay time, reverb size, osc wave, lfo wave");
    }

    /// Stop every poll thread and join it. The pin source outlives this
    /// call; releasing the hardware is its owner's job. Idempotent.
    pub fn stop(&mut self) {
        if self.encoders.is_empty() && self.switches.is_empty() {
            return;
        }
        for encoder in &mut self.encoders {
            encoder.stop();
        }
        for switch in &mut self.switches {
            switch.stop();
        }
        self.encoders.clear();
        self.switches.clear();
        info!("control surface stopped");
    }

    pub fn bank(&self) -> Bank {
        self.state.bank()
    }

    pub fn parameters(&self) -> Parameters {
        lock(&self.state.params).clone()
    }

    // Direct event entry points, one per physical gesture.

    pub fn handle_encoder(&self, index: usize, direction: i32) {
        self.state.handle_encoder(index, direction);
    }

    pub fn trigger_press(&self) {
        self.state.on_trigger(SwitchEvent::Pressed);
    }

    pub fn trigger_release(&self) {
        self.state.on_trigger(SwitchEvent::Released);
    }

    pub fn pitch_env_press(&self) {
        self.state.on_pitch_env(SwitchEvent::Pressed);
    }

    pub fn shift_press(&self) {
        self.state.on_shift(SwitchEvent::Pressed);
    }

    pub fn shift_release(&self) {
        self.state.on_shift(SwitchEvent::Released);
    }

    pub fn shutdown_press(&self) {
        self.state.on_shutdown(SwitchEvent::Pressed);
    }
}

impl Drop for ControlSurface {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl SurfaceState {
    fn bank(&self) -> Bank {
        if self.shift_held.load(Ordering::Relaxed) {
            Bank::B
        } else {
            Bank::A
        }
    }

    fn handle_encoder(&self, index: usize, direction: i32) {
        let bank = self.bank();
        let dir = direction as f32;
        let mut params = lock(&self.params);

        let (name, value) = match (bank, index) {
            (Bank::A, 0) => {
                params.volume = (params.volume + 0.02 * dir).clamp(0.0, 1.0);
                self.engine.set_volume(params.volume);
                ("volume", params.volume)
            }
            (Bank::A, 1) => {
                params.filter_freq = (params.filter_freq + 50.0 * dir).clamp(20.0, 20_000.0);
                self.engine.set_filter_cutoff(params.filter_freq);
                ("filter_freq", params.filter_freq)
            }
            (Bank::A, 2) => {
                params.filter_res = (params.filter_res + 0.02 * dir).clamp(0.0, 0.95);
                self.engine.set_filter_resonance(params.filter_res);
                ("filter_res", params.filter_res)
            }
            (Bank::A, 3) => {
                params.delay_feedback = (params.delay_feedback + 0.02 * dir).clamp(0.0, 0.95);
                self.engine.set_delay_feedback(params.delay_feedback);
                ("delay_feedback", params.delay_feedback)
            }
            (Bank::A, 4) => {
                params.reverb_mix = (params.reverb_mix + 0.02 * dir).clamp(0.0, 1.0);
                self.engine.set_reverb_mix(params.reverb_mix);
                ("reverb_mix", params.reverb_mix)
            }
            (Bank::B, 0) => {
                params.release = (params.release + 0.1 * dir).clamp(0.01, 5.0);
                self.engine.set_release_time(params.release);
                ("release", params.release)
            }
            (Bank::B, 1) => {
                params.delay_time = (params.delay_time + 0.05 * dir).clamp(0.001, 2.0);
                self.engine.set_delay_time(params.delay_time);
                ("delay_time", params.delay_time)
            }
            (Bank::B, 2) => {
                params.reverb_size = (params.reverb_size + 0.02 * dir).clamp(0.0, 1.0);
                self.engine.set_reverb_size(params.reverb_size);
                ("reverb_size", params.reverb_size)
            }
            (Bank::B, 3) => {
                params.osc_waveform =
                    (params.osc_waveform as i32 + direction).rem_euclid(4) as usize;
                self.engine.set_waveform_index(params.osc_waveform);
                let bank_name = if bank == Bank::A { "A" } else { "B" };
                info!(
                    "[Bank {bank_name}] osc_waveform: {}",
                    self.engine.waveform().name()
                );
                return;
            }
            (Bank::B, 4) => {
                params.lfo_waveform =
                    (params.lfo_waveform as i32 + direction).rem_euclid(4) as usize;
                self.engine.set_lfo_waveform_index(params.lfo_waveform);
                let bank_name = if bank == Bank::A { "A" } else { "B" };
                info!(
                    "[Bank {bank_name}] lfo_waveform: {}",
                    self.engine.lfo_waveform().name()
                );
                return;
            }
            _ => return,
        };

        let bank_name = if bank == Bank::A { "A" } else { "B" };
        info!("[Bank {bank_name}] {name}: {value:.3}");
    }

    fn on_trigger(&self, event: SwitchEvent) {
        match event {
            SwitchEvent::Pressed => {
                info!("trigger: pressed");
                if self.select.is_sampler() {
                    self.sampler.play();
                } else {
                    self.engine.trigger();
                }
            }
            SwitchEvent::Released => {
                info!("trigger: released");
                if !self.select.is_sampler() {
                    self.engine.release();
                }
            }
        }
    }

    fn on_pitch_env(&self, event: SwitchEvent) {
        if event == SwitchEvent::Pressed {
            let mode = self.engine.cycle_pitch_envelope();
            info!("pitch envelope: {}", mode.name());
        }
    }

    fn on_shift(&self, event: SwitchEvent) {
        match event {
            SwitchEvent::Pressed => {
                self.shift_held.store(true, Ordering::Relaxed);
                info!("bank B active");
                if lock(&self.secret).register(Instant::now()) {
                    let sampler_on = self.select.toggle();
                    if sampler_on {
                        info!("sample playback mode engaged");
                    } else {
                        info!("sample playback mode disengaged");
                        self.sampler.stop();
                    }
                }
            }
            SwitchEvent::Released => {
                self.shift_held.store(false, Ordering::Relaxed);
                info!("bank A active");
            }
        }
    }

    fn on_shutdown(&self, event: SwitchEvent) {
        if event == SwitchEvent::Pressed {
            info!("shutdown button pressed; stopping");
            if let Some(shutdown) = &self.shutdown {
                shutdown();
            }
        }
    }
}
