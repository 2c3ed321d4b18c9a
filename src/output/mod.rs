//! Audio output: the sink abstraction, its backends, and the driver thread
//! that pumps engine blocks into it.

pub mod cpal_sink;
pub mod driver;
pub mod sim;

pub use cpal_sink::CpalSink;
pub use driver::{OutputDriver, Stats};
pub use sim::SimulatedSink;

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no output device named `{0}`")]
    DeviceNotFound(String),
    #[error("no default output device available")]
    NoDefaultDevice,
    #[error("stream negotiation failed: {0}")]
    Negotiation(String),
    #[error("sink underrun")]
    Underrun,
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Where the interleaved 16-bit frames go.
///
/// The contract mirrors a blocking PCM device: `write` either accepts the
/// whole block (possibly blocking for a bounded time while the device
/// catches up) or fails in a way `recover` can fix. The driver calls
/// `recover` on every failed write and keeps going; underruns are a
/// statistic here, never a crash.
///
/// Deliberately not `Send`: a sink lives and dies on the audio thread that
/// created it ([`OutputDriver::start`](driver::OutputDriver::start) takes a
/// factory, not a sink, for that reason).
pub trait Sink {
    /// Write one block of interleaved stereo frames. Returns the number of
    /// frames accepted.
    fn write(&mut self, interleaved: &[i16]) -> Result<usize, SinkError>;

    /// Re-prepare the device after a failed write.
    fn recover(&mut self) -> Result<(), SinkError>;

    /// Block until buffered frames have been consumed. Called once on stop.
    fn drain(&mut self) {}

    /// The rate the sink actually negotiated.
    fn sample_rate(&self) -> u32;

    /// Underruns the backend observed on its own (e.g. a callback running
    /// dry), beyond the failed writes the driver already counts.
    fn underruns(&self) -> u64 {
        0
    }
}

/// Which generator the output driver pulls from. Flipped by the control
/// surface's secret mode; read by the audio thread once per block.
pub struct OutputSelect {
    custom_audio: AtomicBool,
}

impl OutputSelect {
    pub fn new() -> Self {
        Self {
            custom_audio: AtomicBool::new(false),
        }
    }

    pub fn use_sampler(&self, on: bool) {
        self.custom_audio.store(on, Ordering::Relaxed);
    }

    pub fn is_sampler(&self) -> bool {
        self.custom_audio.load(Ordering::Relaxed)
    }

    /// Flip the source and report the new state.
    pub fn toggle(&self) -> bool {
        !self.custom_audio.fetch_xor(true, Ordering::Relaxed)
    }
}

impl Default for OutputSelect {
    fn default() -> Self {
        Self::new()
    }
}
