use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{error, info};

use super::{Sink, SinkError};

/// How long `write` will sit on a full ring before declaring the stream
/// stalled. A healthy callback empties a block in one period, so this is
/// far beyond any legitimate backpressure.
const WRITE_STALL: Duration = Duration::from_millis(250);
const WRITE_POLL: Duration = Duration::from_micros(500);

/// Ring depth in periods. Two are pre-filled with silence at start so the
/// callback never fires dry before the driver's first block lands.
const RING_PERIODS: usize = 8;
const PREFILL_PERIODS: usize = 2;

/// DAC-facing sink built on cpal.
///
/// The driver thread writes int16 frames into a lock-free ring; the cpal
/// callback drains it, converting to whatever sample format the device
/// negotiated. The callback counts every block it has to pad with silence.
///
/// Construct this *inside* the driver thread (the stream handle is not
/// `Send`); [`OutputDriver::start`](super::OutputDriver::start) takes a
/// factory for exactly that reason.
pub struct CpalSink {
    stream: cpal::Stream,
    producer: Producer<i16>,
    underruns: Arc<AtomicU64>,
    sample_rate: u32,
    ring_capacity: usize,
}

impl CpalSink {
    /// Open `device_name` (or the default output device), negotiate stereo
    /// at `sample_rate` with periods near `block_size`, and start the
    /// stream. Fails with a diagnostic on any negotiation problem.
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        block_size: usize,
    ) -> Result<Self, SinkError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| SinkError::Backend(e.to_string()))?
                .find(|d| d.name().ok().as_deref() == Some(name))
                .ok_or_else(|| SinkError::DeviceNotFound(name.to_string()))?,
            None => host
                .default_output_device()
                .ok_or(SinkError::NoDefaultDevice)?,
        };

        let default_config = device
            .default_output_config()
            .map_err(|e| SinkError::Negotiation(e.to_string()))?;

        let config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring_capacity = block_size * 2 * RING_PERIODS;
        let (mut producer, consumer) = RingBuffer::<i16>::new(ring_capacity);
        for _ in 0..block_size * 2 * PREFILL_PERIODS {
            let _ = producer.push(0);
        }

        let underruns = Arc::new(AtomicU64::new(0));

        let err_fn = |err| error!("output stream error: {err}");
        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_output_stream(
                    &config,
                    f32_callback(consumer, Arc::clone(&underruns)),
                    err_fn,
                    None,
                )
                .map_err(|e| SinkError::Negotiation(e.to_string()))?,
            cpal::SampleFormat::I16 => device
                .build_output_stream(
                    &config,
                    i16_callback(consumer, Arc::clone(&underruns)),
                    err_fn,
                    None,
                )
                .map_err(|e| SinkError::Negotiation(e.to_string()))?,
            other => {
                return Err(SinkError::Negotiation(format!(
                    "unsupported device sample format {other}"
                )))
            }
        };

        stream
            .play()
            .map_err(|e| SinkError::Backend(e.to_string()))?;

        info!(
            "audio output started: {sample_rate} Hz, {block_size}-frame periods, device={}",
            device.name().unwrap_or_else(|_| "default".into())
        );

        Ok(Self {
            stream,
            producer,
            underruns,
            sample_rate,
            ring_capacity,
        })
    }
}

fn f32_callback(
    mut consumer: Consumer<i16>,
    underruns: Arc<AtomicU64>,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data, _| {
        let mut ran_dry = false;
        for sample in data.iter_mut() {
            *sample = match consumer.pop() {
                Ok(v) => v as f32 / 32_768.0,
                Err(_) => {
                    ran_dry = true;
                    0.0
                }
            };
        }
        if ran_dry {
            underruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn i16_callback(
    mut consumer: Consumer<i16>,
    underruns: Arc<AtomicU64>,
) -> impl FnMut(&mut [i16], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data, _| {
        let mut ran_dry = false;
        for sample in data.iter_mut() {
            *sample = match consumer.pop() {
                Ok(v) => v,
                Err(_) => {
                    ran_dry = true;
                    0
                }
            };
        }
        if ran_dry {
            underruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Sink for CpalSink {
    fn write(&mut self, interleaved: &[i16]) -> Result<usize, SinkError> {
        let mut waited = Duration::ZERO;
        for &sample in interleaved {
            loop {
                match self.producer.push(sample) {
                    Ok(()) => break,
                    Err(_) => {
                        // Full ring is normal backpressure; a ring that
                        // stays full means the callback died.
                        if waited >= WRITE_STALL {
                            return Err(SinkError::Underrun);
                        }
                        thread::sleep(WRITE_POLL);
                        waited += WRITE_POLL;
                    }
                }
            }
        }
        Ok(interleaved.len() / 2)
    }

    fn recover(&mut self) -> Result<(), SinkError> {
        self.stream
            .play()
            .map_err(|e| SinkError::Backend(e.to_string()))
    }

    fn drain(&mut self) {
        let deadline = std::time::Instant::now() + Duration::from_millis(500);
        while self.producer.slots() < self.ring_capacity {
            if std::time::Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}
