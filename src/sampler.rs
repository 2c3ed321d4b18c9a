//! One-shot MP3 sample playback, the siren's hidden second voice.
//!
//! The file is decoded once at load time into interleaved stereo f32 at the
//! engine rate; playback afterwards is a lock-free copy loop driven entirely
//! by atomics, safe to run on the audio thread.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::params::AtomicF32;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to open sample file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode sample: {0}")]
    Decode(String),
    #[error("no decodable audio track in file")]
    NoAudioTrack,
    #[error("file decoded to zero frames")]
    Empty,
}

impl From<SymphoniaError> for SampleError {
    fn from(err: SymphoniaError) -> Self {
        SampleError::Decode(err.to_string())
    }
}

pub struct SamplePlayer {
    /// Interleaved stereo at the engine rate. Immutable after construction.
    frames: Vec<f32>,
    sample_rate: u32,

    playing: AtomicBool,
    looping: AtomicBool,
    position: AtomicUsize,
    gain: AtomicF32,
}

impl SamplePlayer {
    /// A player with nothing loaded; `process` emits silence. Used when the
    /// sample file is absent, which is not an error.
    pub fn empty(sample_rate: u32) -> Self {
        Self {
            frames: Vec::new(),
            sample_rate,
            playing: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            position: AtomicUsize::new(0),
            gain: AtomicF32::new(1.0),
        }
    }

    /// Decode `path` (MP3), fold mono to stereo, resample to `sample_rate`
    /// if the source disagrees, and keep the result for the process's
    /// lifetime.
    pub fn load(path: &Path, sample_rate: u32) -> Result<Self, SampleError> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(SampleError::NoAudioTrack)?;
        let track_id = track.id;

        let mut decoder =
            symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let mut interleaved: Vec<f32> = Vec::new();
        let mut source_rate = sample_rate;
        let mut channels = 2usize;
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                // End of stream, either cleanly or as a chained-stream reset.
                Err(SymphoniaError::ResetRequired) | Err(SymphoniaError::IoError(_)) => break,
                Err(err) => return Err(err.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder.decode(&packet)?;
            let spec = *decoded.spec();
            source_rate = spec.rate;
            channels = spec.channels.count();

            let buf = sample_buf
                .get_or_insert_with(|| SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }

        if interleaved.is_empty() {
            return Err(SampleError::Empty);
        }

        let stereo = to_stereo(&interleaved, channels);
        let frames = if source_rate != sample_rate {
            info!("resampling sample from {source_rate} Hz to {sample_rate} Hz");
            resample_stereo(&stereo, source_rate, sample_rate)
        } else {
            stereo
        };

        info!(
            "sample loaded: {} ({:.2} s at {sample_rate} Hz)",
            path.display(),
            frames.len() as f32 / 2.0 / sample_rate as f32
        );

        Ok(Self {
            frames,
            sample_rate,
            playing: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            position: AtomicUsize::new(0),
            gain: AtomicF32::new(1.0),
        })
    }

    pub fn is_loaded(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn duration_seconds(&self) -> f32 {
        self.frames.len() as f32 / 2.0 / self.sample_rate as f32
    }

    /// Restart from the top. Playing an empty player is a warning, not an
    /// error: the secret mode must be safe with no file on disk.
    pub fn play(&self) {
        if !self.is_loaded() {
            warn!("sample trigger ignored: nothing loaded");
            return;
        }
        self.position.store(0, Ordering::Relaxed);
        self.playing.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.playing.store(false, Ordering::Relaxed);
        self.position.store(0, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.set(gain.clamp(0.0, 1.0));
    }

    /// Fill an interleaved stereo block. Silence when stopped or empty;
    /// auto-stops (or wraps, when looping) at the end of the material.
    pub fn process(&self, out: &mut [f32]) {
        if !self.is_playing() || !self.is_loaded() {
            out.fill(0.0);
            return;
        }

        let gain = self.gain.get();
        let total = self.frames.len();
        let mut pos = self.position.load(Ordering::Relaxed);

        for frame in out.chunks_exact_mut(2) {
            if pos + 1 >= total {
                if self.looping.load(Ordering::Relaxed) {
                    pos = 0;
                } else {
                    self.playing.store(false, Ordering::Relaxed);
                    frame[0] = 0.0;
                    frame[1] = 0.0;
                    continue;
                }
            }
            frame[0] = self.frames[pos] * gain;
            frame[1] = self.frames[pos + 1] * gain;
            pos += 2;
        }

        self.position.store(pos, Ordering::Relaxed);
    }

    #[cfg(test)]
    fn from_frames(frames: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
            playing: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            position: AtomicUsize::new(0),
            gain: AtomicF32::new(1.0),
        }
    }
}

/// Duplicate mono into both channels; pass stereo through; fold anything
/// wider down to its first two channels.
fn to_stereo(interleaved: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        1 => {
            let mut out = Vec::with_capacity(interleaved.len() * 2);
            for &s in interleaved {
                out.push(s);
                out.push(s);
            }
            out
        }
        2 => interleaved.to_vec(),
        n => {
            let mut out = Vec::with_capacity(interleaved.len() / n * 2);
            for frame in interleaved.chunks_exact(n) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
            out
        }
    }
}

/// Linear-interpolation resampler over interleaved stereo. Adequate for
/// one-shot material; nothing here is pitch-critical.
fn resample_stereo(input: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    if input_rate == output_rate {
        return input.to_vec();
    }

    let ratio = output_rate as f64 / input_rate as f64;
    let input_frames = input.len() / 2;
    let output_frames = (input_frames as f64 * ratio) as usize;

    let mut output = vec![0.0f32; output_frames * 2];
    for out_frame in 0..output_frames {
        let src_pos = out_frame as f64 / ratio;
        let mut src_frame = src_pos as usize;
        let mut frac = (src_pos - src_frame as f64) as f32;
        if src_frame + 1 >= input_frames {
            src_frame = input_frames - 1;
            frac = 0.0;
        }
        for ch in 0..2 {
            let a = input[src_frame * 2 + ch];
            let b = input[(src_frame + 1).min(input_frames - 1) * 2 + ch];
            output[out_frame * 2 + ch] = a + frac * (b - a);
        }
    }
    output
}
