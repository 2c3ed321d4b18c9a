pub mod control;
pub mod dsp;
pub mod engine;
pub mod output;
pub mod sampler;

/// Process-wide default sample rate in frames per second.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Default frames per audio callback.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Upper bound on frames per block; scratch buffers are sized to this once.
pub const MAX_BLOCK_SIZE: usize = 2048;

/// Longest supported delay tail in seconds. Sizes the delay ring at init.
pub const MAX_DELAY_SECONDS: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub block_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}
