use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::pins::{Level, PinReader};

/// Poll cadence. At 1 ms a hand-turned encoder cannot produce two CLK edges
/// inside one poll, so the decode below sees every step; contact bounce
/// shorter than the poll interval is absorbed for free.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Quadrature decode, separated from the thread so it can be tested by
/// feeding it level sequences directly.
///
/// On every CLK edge: DT differing from CLK means clockwise (+1), DT
/// matching means counter-clockwise (-1). State is re-derived from the live
/// levels each poll, so a missed edge costs one tick, never a stuck decoder.
pub struct QuadratureDecoder {
    last_clk: Level,
}

impl QuadratureDecoder {
    pub fn new(initial_clk: Level) -> Self {
        Self {
            last_clk: initial_clk,
        }
    }

    pub fn update(&mut self, clk: Level, dt: Level) -> Option<i32> {
        if clk == self.last_clk {
            return None;
        }
        self.last_clk = clk;
        Some(if dt != clk { 1 } else { -1 })
    }
}

/// A rotary encoder on two pins, polled from its own thread.
pub struct RotaryEncoder {
    running: Arc<AtomicBool>,
    position: Arc<AtomicI64>,
    handle: Option<JoinHandle<()>>,
}

impl RotaryEncoder {
    pub fn spawn<F>(pins: Arc<dyn PinReader>, clk_pin: u8, dt_pin: u8, on_tick: F) -> Self
    where
        F: Fn(i32) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let position = Arc::new(AtomicI64::new(0));

        let thread_running = Arc::clone(&running);
        let thread_position = Arc::clone(&position);
        let handle = thread::Builder::new()
            .name(format!("encoder-{clk_pin}"))
            .spawn(move || {
                let mut decoder = QuadratureDecoder::new(pins.read(clk_pin));
                while thread_running.load(Ordering::Relaxed) {
                    let clk = pins.read(clk_pin);
                    let dt = pins.read(dt_pin);
                    if let Some(direction) = decoder.update(clk, dt) {
                        thread_position.fetch_add(direction as i64, Ordering::Relaxed);
                        on_tick(direction);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })
            .ok();

        Self {
            running,
            position,
            handle,
        }
    }

    /// Net ticks since start; diagnostic only.
    pub fn position(&self) -> i64 {
        self.position.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RotaryEncoder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::pins::MemoryPins;

    #[test]
    fn clockwise_sequence_counts_up() {
        // Idle: both high. Clockwise: CLK falls while DT is still high.
        let mut dec = QuadratureDecoder::new(Level::High);
        assert_eq!(dec.update(Level::Low, Level::High), Some(1));
        // CLK rises while DT is low -> also +1 in this decode.
        assert_eq!(dec.update(Level::High, Level::Low), Some(1));
    }

    #[test]
    fn counter_clockwise_sequence_counts_down() {
        // Counter-clockwise: DT leads, so DT already matches CLK at the edge.
        let mut dec = QuadratureDecoder::new(Level::High);
        assert_eq!(dec.update(Level::Low, Level::Low), Some(-1));
        assert_eq!(dec.update(Level::High, Level::High), Some(-1));
    }

    #[test]
    fn no_edge_no_tick() {
        let mut dec = QuadratureDecoder::new(Level::High);
        assert_eq!(dec.update(Level::High, Level::Low), None);
        assert_eq!(dec.update(Level::High, Level::High), None);
    }

    #[test]
    fn thread_reports_ticks_from_pin_wiggles() {
        let pins = Arc::new(MemoryPins::new());
        let ticks = Arc::new(AtomicI64::new(0));

        let cb_ticks = Arc::clone(&ticks);
        let mut encoder = RotaryEncoder::spawn(
            Arc::clone(&pins) as Arc<dyn PinReader>,
            17,
            2,
            move |dir| {
                cb_ticks.fetch_add(dir as i64, Ordering::Relaxed);
            },
        );

        // One clockwise detent: CLK falls with DT high, then both return.
        pins.set(17, Level::Low);
        thread::sleep(Duration::from_millis(10));
        pins.set(2, Level::Low);
        thread::sleep(Duration::from_millis(10));
        pins.set(17, Level::High);
        thread::sleep(Duration::from_millis(10));
        pins.set(2, Level::High);
        thread::sleep(Duration::from_millis(10));

        encoder.stop();
        assert_eq!(ticks.load(Ordering::Relaxed), 2, "one detent = two edges");
        assert_eq!(encoder.position(), 2);
    }
}
