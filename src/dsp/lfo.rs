use crate::dsp::oscillator::{Oscillator, Waveform};

/// Control-rate oscillator for parameter modulation.
///
/// Same waveform math as [`Oscillator`], but running at 0-20 Hz and scaled
/// by a depth control. The engine points its output at the filter cutoff;
/// depth 0 produces an exact zero block, which is how the LFO ships disabled.
pub struct Lfo {
    osc: Oscillator,
    depth: f32,
}

/// Modulation rates above this stop reading as movement and start reading
/// as audio-rate sidebands, so the setter stops there.
const MAX_RATE_HZ: f32 = 20.0;

impl Lfo {
    pub fn new(sample_rate: f32) -> Self {
        let mut osc = Oscillator::new(sample_rate);
        osc.set_frequency(4.0);
        Self { osc, depth: 0.0 }
    }

    pub fn set_frequency(&mut self, hz: f32) {
        self.osc.set_frequency(hz.clamp(0.0, MAX_RATE_HZ));
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.osc.set_waveform(waveform);
    }

    pub fn waveform(&self) -> Waveform {
        self.osc.waveform()
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// Fill a block with bipolar modulation values in [-depth, depth].
    /// The phase keeps advancing at depth 0 so re-enabling the LFO resumes
    /// mid-sweep instead of snapping.
    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.osc.next_sample() * self.depth;
        }
    }
}
