/// First-order DC blocker: y[n] = x[n] - x[n-1] + R * y[n-1], R = 0.995.
///
/// The saturating delay feedback and the reverb's asymmetric tail both leak
/// small offsets; this strips them before the gain stage so the DAC never
/// sits off-center.
pub struct DcBlocker {
    x1: f32,
    y1: f32,
}

const R: f32 = 0.995;

impl DcBlocker {
    pub fn new() -> Self {
        Self { x1: 0.0, y1: 0.0 }
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let y = input - self.x1 + R * self.y1;
        self.x1 = input;
        self.y1 = if y.abs() < 1e-10 { 0.0 } else { y };
        self.y1
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_constant_offset() {
        let mut blocker = DcBlocker::new();
        let mut last = 1.0;
        for _ in 0..48_000 {
            last = blocker.process_sample(0.5);
        }
        assert!(
            last.abs() < 1e-3,
            "DC offset should be rejected, residual {last}"
        );
    }

    #[test]
    fn passes_audio_band_signal() {
        use std::f32::consts::TAU;
        let mut blocker = DcBlocker::new();
        let mut peak = 0.0f32;
        for n in 0..4_800 {
            let x = (TAU * 440.0 * n as f32 / 48_000.0).sin();
            let y = blocker.process_sample(x);
            if n > 1_000 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak > 0.95, "440 Hz should pass nearly unchanged, peak {peak}");
    }

    #[test]
    fn silence_stays_exactly_silent() {
        let mut blocker = DcBlocker::new();
        for _ in 0..1_024 {
            assert_eq!(blocker.process_sample(0.0), 0.0);
        }
    }
}
