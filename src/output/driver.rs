use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{info, warn};

use super::{OutputSelect, Sink, SinkError};
use crate::engine::SirenEngine;
use crate::sampler::SamplePlayer;

/// Snapshot of the audio thread's health counters.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub blocks: u64,
    pub underruns: u64,
    /// Rolling ratio of DSP time to block wall-clock, as a percentage.
    pub cpu_usage: f32,
}

struct SharedStats {
    blocks: AtomicU64,
    write_failures: AtomicU64,
    sink_underruns: AtomicU64,
    cpu_usage_bits: AtomicU32,
}

/// The audio thread.
///
/// Owns the engine outright -- DSP state never leaves this thread -- and
/// pumps blocks into the sink at its pace: render, convert to int16,
/// blocking write. Failed writes are recovered and counted, never fatal;
/// a siren that goes quiet for a period is better than one that dies.
pub struct OutputDriver {
    running: Arc<AtomicBool>,
    stats: Arc<SharedStats>,
    handle: Option<JoinHandle<()>>,
}

impl OutputDriver {
    /// Spawn the audio thread. `sink_factory` runs *on* that thread (sinks
    /// are not `Send`); a factory error is reported back here and fails the
    /// start, so negotiation problems surface at init.
    pub fn start<F>(
        mut engine: SirenEngine,
        sampler: Arc<SamplePlayer>,
        select: Arc<OutputSelect>,
        block_size: usize,
        sink_factory: F,
    ) -> Result<Self, SinkError>
    where
        F: FnOnce() -> Result<Box<dyn Sink>, SinkError> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(SharedStats {
            blocks: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            sink_underruns: AtomicU64::new(0),
            cpu_usage_bits: AtomicU32::new(0),
        });

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), SinkError>>();
        let thread_running = Arc::clone(&running);
        let thread_stats = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name("siren-audio".into())
            .spawn(move || {
                let mut sink = match sink_factory() {
                    Ok(sink) => {
                        let _ = ready_tx.send(Ok(()));
                        sink
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                let sample_rate = engine.sample_rate() as f64;
                let block_duration = block_size as f64 / sample_rate;
                let mut float_buf = vec![0.0f32; block_size * 2];
                let mut int_buf = vec![0i16; block_size * 2];

                while thread_running.load(Ordering::Relaxed) {
                    let started = Instant::now();

                    if select.is_sampler() {
                        sampler.process(&mut float_buf);
                    } else {
                        engine.process(&mut float_buf);
                    }

                    for (dst, &src) in int_buf.iter_mut().zip(float_buf.iter()) {
                        *dst = (src.clamp(-1.0, 1.0) * 32_767.0) as i16;
                    }

                    let dsp_time = started.elapsed();

                    if let Err(err) = sink.write(&int_buf) {
                        thread_stats.write_failures.fetch_add(1, Ordering::Relaxed);
                        warn!("sink write failed: {err}; recovering");
                        if let Err(err) = sink.recover() {
                            warn!("sink recovery failed: {err}; continuing");
                        }
                    }

                    thread_stats.blocks.fetch_add(1, Ordering::Relaxed);
                    thread_stats
                        .sink_underruns
                        .store(sink.underruns(), Ordering::Relaxed);
                    let cpu = (dsp_time.as_secs_f64() / block_duration * 100.0) as f32;
                    thread_stats
                        .cpu_usage_bits
                        .store(cpu.to_bits(), Ordering::Relaxed);
                }

                sink.drain();
            })
            .map_err(|e| SinkError::Backend(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                running,
                stats,
                handle: Some(handle),
            }),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(SinkError::Backend("audio thread died during start".into()))
            }
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            blocks: self.stats.blocks.load(Ordering::Relaxed),
            underruns: self.stats.write_failures.load(Ordering::Relaxed)
                + self.stats.sink_underruns.load(Ordering::Relaxed),
            cpu_usage: f32::from_bits(self.stats.cpu_usage_bits.load(Ordering::Relaxed)),
        }
    }

    /// Cooperative stop: flag, join, drain (the thread drains on its way
    /// out). Idempotent.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        let stats = self.stats();
        if stats.blocks > 0 {
            let rate = stats.underruns as f64 / stats.blocks as f64 * 100.0;
            info!(
                "audio stopped: {} blocks, {} underruns ({rate:.2}%)",
                stats.blocks, stats.underruns
            );
        }
    }
}

impl Drop for OutputDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
