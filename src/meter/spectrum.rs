//! Software byte spectrum
//!
//! Produces the same kind of 0-255 magnitude bins a browser analyser node
//! does: Blackman window, DFT magnitude, exponential smoothing over time,
//! then a linear map from [-100 dB, -30 dB] onto the byte range.

use std::f32::consts::PI;

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Spectrum analyser over a fixed analysis window
#[derive(Debug, Clone)]
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    window: Vec<f32>,
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
    smoothed: Vec<f32>,
    frame: Vec<f32>,
}

impl SpectrumAnalyser {
    /// `fft_size` is the window length in samples (at least 2, rounded
    /// down to even); `smoothing` is clamped to [0, 1).
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        let fft_size = (fft_size.max(2) / 2) * 2;
        let n = fft_size as f32;

        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let cos_table = (0..fft_size).map(|i| (2.0 * PI * i as f32 / n).cos()).collect();
        let sin_table = (0..fft_size).map(|i| (2.0 * PI * i as f32 / n).sin()).collect();

        Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 0.999),
            window,
            cos_table,
            sin_table,
            smoothed: vec![0.0; fft_size / 2],
            frame: vec![0.0; fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyse the most recent `fft_size` samples (zero-padded at the front
    /// when fewer are available) and write one byte per bin into `out`.
    pub fn process(&mut self, samples: &[f32], out: &mut [u8]) {
        let n = self.fft_size;
        let take = samples.len().min(n);
        let pad = n - take;
        for (i, slot) in self.frame.iter_mut().enumerate() {
            *slot = if i < pad {
                0.0
            } else {
                samples[samples.len() - take + (i - pad)] * self.window[i]
            };
        }

        let bins = self.bin_count();
        for k in 0..bins {
            let mut re = 0.0f32;
            let mut im = 0.0f32;
            for (i, &x) in self.frame.iter().enumerate() {
                let idx = (k * i) % n;
                re += x * self.cos_table[idx];
                im -= x * self.sin_table[idx];
            }
            let magnitude = (re * re + im * im).sqrt() / n as f32;
            let previous = self.smoothed[k];
            self.smoothed[k] = self.smoothing * previous + (1.0 - self.smoothing) * magnitude;
        }

        for (slot, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            *slot = magnitude_to_byte(magnitude);
        }
        // Bins beyond what we computed read as silence
        for slot in out.iter_mut().skip(bins) {
            *slot = 0;
        }
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }
}

fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 / (MAX_DECIBELS - MIN_DECIBELS) * (db - MIN_DECIBELS);
    scaled.floor().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(amplitude: f32, cycles: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * cycles as f32 * i as f32 / len as f32).sin())
            .collect()
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut analyser = SpectrumAnalyser::new(64, 0.8);
        let mut bins = vec![7u8; analyser.bin_count()];
        analyser.process(&vec![0.0; 64], &mut bins);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_peaks_in_its_bin() {
        let mut analyser = SpectrumAnalyser::new(128, 0.0);
        let mut bins = vec![0u8; analyser.bin_count()];
        analyser.process(&tone(0.01, 8, 128), &mut bins);

        let (peak_bin, &peak) = bins.iter().enumerate().max_by_key(|(_, &b)| b).unwrap();
        assert_eq!(peak_bin, 8);
        assert!(peak > bins[7] && peak > bins[9]);
        assert!(bins[40] < 10);
    }

    #[test]
    fn test_full_scale_tone_saturates() {
        let mut analyser = SpectrumAnalyser::new(128, 0.0);
        let mut bins = vec![0u8; analyser.bin_count()];
        analyser.process(&tone(1.0, 8, 128), &mut bins);
        assert_eq!(bins[8], 255);
    }

    #[test]
    fn test_louder_input_gives_larger_bins() {
        let mut quiet = SpectrumAnalyser::new(128, 0.0);
        let mut loud = SpectrumAnalyser::new(128, 0.0);
        let mut quiet_bins = vec![0u8; 64];
        let mut loud_bins = vec![0u8; 64];

        quiet.process(&tone(0.001, 8, 128), &mut quiet_bins);
        loud.process(&tone(0.1, 8, 128), &mut loud_bins);

        let sum = |bins: &[u8]| bins.iter().map(|&b| b as u32).sum::<u32>();
        assert!(sum(&loud_bins) > sum(&quiet_bins));
    }

    #[test]
    fn test_smoothing_ramps_up() {
        let mut analyser = SpectrumAnalyser::new(128, 0.8);
        let mut first = vec![0u8; 64];
        let mut second = vec![0u8; 64];
        let signal = tone(0.01, 8, 128);

        analyser.process(&signal, &mut first);
        analyser.process(&signal, &mut second);
        assert!(second[8] > first[8]);

        analyser.reset();
        let mut after_reset = vec![0u8; 64];
        analyser.process(&signal, &mut after_reset);
        assert_eq!(after_reset[8], first[8]);
    }

    #[test]
    fn test_short_input_is_padded() {
        let mut analyser = SpectrumAnalyser::new(64, 0.0);
        let mut bins = vec![0u8; 32];
        analyser.process(&[0.5; 10], &mut bins);
        assert!(bins.iter().any(|&b| b > 0));
    }
}
