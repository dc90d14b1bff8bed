//! Acoustic distress detection.
//!
//! Each microphone window passes two gates: overall loudness (RMS) and
//! spectral energy above a cutoff frequency, where screams and shouting
//! concentrate. Only a run of consecutive qualifying windows trips the
//! detector, so a door slam or a single loud beat does not escalate.

use crate::config::EmergencyConfig;
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::debug;

/// Sliding two-gate detector over fixed-size sample windows.
pub struct DistressMonitor {
    volume_threshold: f32,
    hf_threshold: f32,
    cutoff_bin: usize,
    consecutive_needed: u32,
    streak: u32,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
    window_len: usize,
}

impl DistressMonitor {
    pub fn new(cfg: &EmergencyConfig, sample_rate: u32, window_len: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(window_len);
        let cutoff_bin =
            ((cfg.high_freq_cutoff_hz * window_len as f32) / sample_rate as f32) as usize;
        Self {
            volume_threshold: cfg.volume_threshold,
            hf_threshold: cfg.high_freq_energy_threshold,
            cutoff_bin: cutoff_bin.min(window_len / 2),
            consecutive_needed: cfg.consecutive_windows,
            streak: 0,
            fft,
            scratch: vec![Complex32::default(); window_len],
            window_len,
        }
    }

    /// Feed one window. Returns `true` when the run of qualifying windows
    /// reaches the configured length; the streak resets after a trigger and
    /// on any window that fails either gate.
    pub fn push_window(&mut self, samples: &[f32]) -> bool {
        if samples.len() != self.window_len {
            return false;
        }

        let rms = rms(samples);
        if rms < self.volume_threshold {
            self.streak = 0;
            return false;
        }

        let hf = self.high_frequency_energy(samples);
        if hf < self.hf_threshold {
            self.streak = 0;
            return false;
        }

        self.streak += 1;
        debug!(rms, hf, streak = self.streak, "qualifying window");
        if self.streak >= self.consecutive_needed {
            self.streak = 0;
            true
        } else {
            false
        }
    }

    /// One-sided power above the cutoff bin, normalized so a full-scale
    /// sine at a single above-cutoff frequency measures 0.5.
    fn high_frequency_energy(&mut self, samples: &[f32]) -> f32 {
        for (slot, &s) in self.scratch.iter_mut().zip(samples) {
            *slot = Complex32::new(s, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let n = self.window_len as f32;
        self.scratch[self.cutoff_bin..self.window_len / 2]
            .iter()
            .map(|c| {
                let normalized = c.norm() / n;
                2.0 * normalized * normalized
            })
            .sum()
    }
}

fn rms(samples: &[f32]) -> f32 {
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::WINDOW_SAMPLES;
    use crate::config::EmergencyConfig;

    const SAMPLE_RATE: u32 = 16_000;

    fn monitor() -> DistressMonitor {
        DistressMonitor::new(&EmergencyConfig::default(), SAMPLE_RATE, WINDOW_SAMPLES)
    }

    fn sine(freq_hz: f32, amplitude: f32) -> Vec<f32> {
        (0..WINDOW_SAMPLES)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq_hz * t).sin()
            })
            .collect()
    }

    #[test]
    fn loud_high_frequency_triggers_on_the_third_window() {
        let mut m = monitor();
        let scream = sine(2_500.0, 0.5);
        assert!(!m.push_window(&scream));
        assert!(!m.push_window(&scream));
        assert!(m.push_window(&scream));
    }

    #[test]
    fn loud_low_frequency_never_triggers() {
        let mut m = monitor();
        let rumble = sine(200.0, 0.8);
        for _ in 0..10 {
            assert!(!m.push_window(&rumble));
        }
    }

    #[test]
    fn quiet_high_frequency_never_triggers() {
        let mut m = monitor();
        let hiss = sine(2_500.0, 0.005);
        for _ in 0..10 {
            assert!(!m.push_window(&hiss));
        }
    }

    #[test]
    fn an_interrupting_quiet_window_resets_the_streak() {
        let mut m = monitor();
        let scream = sine(2_500.0, 0.5);
        let silence = vec![0.0; WINDOW_SAMPLES];
        assert!(!m.push_window(&scream));
        assert!(!m.push_window(&scream));
        assert!(!m.push_window(&silence));
        assert!(!m.push_window(&scream));
        assert!(!m.push_window(&scream));
        assert!(m.push_window(&scream));
    }

    #[test]
    fn streak_resets_after_a_trigger() {
        let mut m = monitor();
        let scream = sine(2_500.0, 0.5);
        for _ in 0..2 {
            m.push_window(&scream);
        }
        assert!(m.push_window(&scream));
        // Needs a fresh run of three.
        assert!(!m.push_window(&scream));
        assert!(!m.push_window(&scream));
        assert!(m.push_window(&scream));
    }

    #[test]
    fn wrong_length_window_is_ignored() {
        let mut m = monitor();
        assert!(!m.push_window(&[0.5; 10]));
    }
}
