use std::thread;
use std::time::Duration;

use tracing::info;

use super::{Sink, SinkError};

/// Headless stand-in for the DAC: swallows frames at real-time cadence so
/// the rest of the system behaves exactly as it would with hardware.
pub struct SimulatedSink {
    sample_rate: u32,
    frames_written: u64,
}

impl SimulatedSink {
    pub fn new(sample_rate: u32) -> Self {
        info!("running in simulation mode (no audio output)");
        Self {
            sample_rate,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Sink for SimulatedSink {
    fn write(&mut self, interleaved: &[i16]) -> Result<usize, SinkError> {
        let frames = interleaved.len() / 2;
        self.frames_written += frames as u64;
        // Pace like a real device would by blocking for one block duration.
        thread::sleep(Duration::from_secs_f64(
            frames as f64 / self.sample_rate as f64,
        ));
        Ok(frames)
    }

    fn recover(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_whole_blocks() {
        let mut sink = SimulatedSink::new(48_000);
        let block = vec![0i16; 512];
        assert_eq!(sink.write(&block).unwrap(), 256);
        assert_eq!(sink.frames_written(), 256);
    }
}
