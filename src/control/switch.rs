use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::pins::{Level, PinReader};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A level change must hold this long before it counts.
const DEBOUNCE: Duration = Duration::from_millis(10);

/// A release is only reported after the press lasted at least this long;
/// anything shorter is contact chatter.
const MIN_PRESS: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchEvent {
    Pressed,
    Released,
}

/// Debounce state machine, time passed in explicitly so tests can drive it
/// without sleeping. Buttons are active-low: pressed reads `Level::Low`.
pub struct DebounceState {
    last_level: Level,
    last_change: Instant,
    pressed_at: Instant,
    pressed: bool,
}

impl DebounceState {
    pub fn new(initial: Level, now: Instant) -> Self {
        Self {
            last_level: initial,
            last_change: now,
            pressed_at: now,
            pressed: false,
        }
    }

    pub fn update(&mut self, level: Level, now: Instant) -> Option<SwitchEvent> {
        if level != self.last_level {
            self.last_level = level;
            self.last_change = now;
        }

        // Still inside the bounce window for this level.
        if now.duration_since(self.last_change) < DEBOUNCE {
            return None;
        }

        match (level, self.pressed) {
            (Level::Low, false) => {
                self.pressed = true;
                self.pressed_at = now;
                Some(SwitchEvent::Pressed)
            }
            (Level::High, true) => {
                if now.duration_since(self.pressed_at) >= MIN_PRESS {
                    self.pressed = false;
                    Some(SwitchEvent::Released)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

/// A momentary push button on one pin, polled from its own thread.
pub struct MomentarySwitch {
    running: Arc<AtomicBool>,
    pressed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MomentarySwitch {
    pub fn spawn<F>(pins: Arc<dyn PinReader>, pin: u8, on_event: F) -> Self
    where
        F: Fn(SwitchEvent) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let pressed = Arc::new(AtomicBool::new(false));

        let thread_running = Arc::clone(&running);
        let thread_pressed = Arc::clone(&pressed);
        let handle = thread::Builder::new()
            .name(format!("switch-{pin}"))
            .spawn(move || {
                let mut state = DebounceState::new(pins.read(pin), Instant::now());
                while thread_running.load(Ordering::Relaxed) {
                    if let Some(event) = state.update(pins.read(pin), Instant::now()) {
                        thread_pressed.store(event == SwitchEvent::Pressed, Ordering::Relaxed);
                        on_event(event);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })
            .ok();

        Self {
            running,
            pressed,
            handle,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MomentarySwitch {
    fn drop(&mut self) {
        self.stop();
    }
}
