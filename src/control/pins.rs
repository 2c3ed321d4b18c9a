use std::sync::atomic::{AtomicBool, Ordering};

/// Logic level of an input pin. All controls idle HIGH (internal pull-ups)
/// and read LOW when pressed or grounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Source of pin levels. The physical GPIO driver lives outside this crate;
/// anything that can answer "what is pin N right now" plugs in here.
/// Reads must be non-blocking and idempotent.
pub trait PinReader: Send + Sync {
    fn read(&self, pin: u8) -> Level;
}

/// Every pin permanently HIGH: the no-hardware backend. Encoders never tick
/// and buttons never press, which is exactly what headless operation wants.
pub struct StaticPins;

impl PinReader for StaticPins {
    fn read(&self, _pin: u8) -> Level {
        Level::High
    }
}

/// In-memory pin bank, settable from anywhere. Backs the control-surface
/// tests and any software front-end that wants to feign hardware.
pub struct MemoryPins {
    levels: [AtomicBool; 32], // true = High
}

impl MemoryPins {
    pub fn new() -> Self {
        Self {
            levels: std::array::from_fn(|_| AtomicBool::new(true)),
        }
    }

    pub fn set(&self, pin: u8, level: Level) {
        if let Some(slot) = self.levels.get(pin as usize) {
            slot.store(level == Level::High, Ordering::Relaxed);
        }
    }
}

impl Default for MemoryPins {
    fn default() -> Self {
        Self::new()
    }
}

impl PinReader for MemoryPins {
    fn read(&self, pin: u8) -> Level {
        match self.levels.get(pin as usize) {
            Some(slot) if !slot.load(Ordering::Relaxed) => Level::Low,
            _ => Level::High,
        }
    }
}

/// BCM pin assignments. Chosen to stay clear of the I2S lines (18/19/21)
/// that the PCM5102 DAC owns.
pub mod bcm {
    pub const ENCODER_1_CLK: u8 = 17;
    pub const ENCODER_1_DT: u8 = 2;
    pub const ENCODER_2_CLK: u8 = 27;
    pub const ENCODER_2_DT: u8 = 22;
    pub const ENCODER_3_CLK: u8 = 23;
    pub const ENCODER_3_DT: u8 = 24;
    pub const ENCODER_4_CLK: u8 = 20;
    pub const ENCODER_4_DT: u8 = 26;
    pub const ENCODER_5_CLK: u8 = 14;
    pub const ENCODER_5_DT: u8 = 13;

    pub const TRIGGER_BTN: u8 = 4;
    pub const PITCH_ENV_BTN: u8 = 10;
    pub const SHIFT_BTN: u8 = 15;
    pub const SHUTDOWN_BTN: u8 = 3;

    /// Pins the DAC owns; nothing in the control surface may touch these.
    pub const I2S_RESERVED: [u8; 3] = [18, 19, 21];

    pub const ENCODER_PINS: [(u8, u8); 5] = [
        (ENCODER_1_CLK, ENCODER_1_DT),
        (ENCODER_2_CLK, ENCODER_2_DT),
        (ENCODER_3_CLK, ENCODER_3_DT),
        (ENCODER_4_CLK, ENCODER_4_DT),
        (ENCODER_5_CLK, ENCODER_5_DT),
    ];

    pub const BUTTON_PINS: [u8; 4] = [TRIGGER_BTN, PITCH_ENV_BTN, SHIFT_BTN, SHUTDOWN_BTN];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_map_avoids_i2s_lines() {
        let mut used: Vec<u8> = bcm::ENCODER_PINS
            .iter()
            .flat_map(|&(clk, dt)| [clk, dt])
            .chain(bcm::BUTTON_PINS)
            .collect();

        for pin in &used {
            assert!(
                !bcm::I2S_RESERVED.contains(pin),
                "pin {pin} collides with the DAC's I2S lines"
            );
        }

        // And no pin is assigned twice.
        used.sort_unstable();
        let len = used.len();
        used.dedup();
        assert_eq!(len, used.len(), "duplicate pin assignment");
    }

    #[test]
    fn memory_pins_default_high_and_latch_writes() {
        let pins = MemoryPins::new();
        assert_eq!(pins.read(4), Level::High);
        pins.set(4, Level::Low);
        assert_eq!(pins.read(4), Level::Low);
        pins.set(4, Level::High);
        assert_eq!(pins.read(4), Level::High);
    }

    #[test]
    fn static_pins_never_press() {
        let pins = StaticPins;
        for pin in 0..32 {
            assert_eq!(pins.read(pin), Level::High);
        }
    }
}
