//! Short-time Fourier transform over Hann-windowed frames.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Magnitude spectrogram: `frames` rows of `n_fft / 2 + 1` bins.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub magnitudes: Vec<Vec<f32>>,
    pub n_fft: usize,
    pub hop: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn n_frames(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Center frequency of a bin in Hz.
    pub fn bin_hz(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.n_fft as f32
    }
}

/// Periodic Hann window.
pub fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| {
            let x = std::f32::consts::PI * n as f32 / len as f32;
            x.sin() * x.sin()
        })
        .collect()
}

/// Mirror an index into `[0, len)` without repeating the edge sample.
fn reflect_index(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut idx = i.rem_euclid(period);
    if idx >= len as isize {
        idx = period - idx;
    }
    idx as usize
}

/// Pad a signal by `pad` reflected samples on each side.
pub fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let len = samples.len();
    let mut out = Vec::with_capacity(len + 2 * pad);
    for i in -(pad as isize)..(len + pad) as isize {
        out.push(samples[reflect_index(i, len)]);
    }
    out
}

/// Magnitude STFT with reflect-centered framing.
///
/// Frames are taken every `hop` samples from the signal padded by
/// `n_fft / 2` on each side, so frame `t` is centered on sample
/// `t * hop` and the grid has `1 + len / hop` frames.
pub fn stft_centered(samples: &[f32], n_fft: usize, hop: usize, sample_rate: u32) -> Spectrogram {
    let padded = reflect_pad(samples, n_fft / 2);
    stft_raw(&padded, n_fft, hop, sample_rate)
}

/// Magnitude STFT over the buffer as-is (no padding), with an optional
/// normalization factor applied to every bin.
pub fn stft_scaled(
    samples: &[f32],
    n_fft: usize,
    hop: usize,
    sample_rate: u32,
    scale: f32,
) -> Spectrogram {
    let mut spec = stft_raw(samples, n_fft, hop, sample_rate);
    if (scale - 1.0).abs() > f32::EPSILON {
        for frame in spec.magnitudes.iter_mut() {
            for m in frame.iter_mut() {
                *m *= scale;
            }
        }
    }
    spec
}

fn stft_raw(samples: &[f32], n_fft: usize, hop: usize, sample_rate: u32) -> Spectrogram {
    let window = hann_window(n_fft);
    let n_bins = n_fft / 2 + 1;

    let n_frames = if samples.len() >= n_fft {
        (samples.len() - n_fft) / hop + 1
    } else {
        0
    };

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut magnitudes = Vec::with_capacity(n_frames);
    let mut buf = vec![Complex::new(0.0f32, 0.0f32); n_fft];

    for t in 0..n_frames {
        let start = t * hop;
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = Complex::new(samples[start + i] * window[i], 0.0);
        }
        fft.process(&mut buf);
        magnitudes.push(buf[..n_bins].iter().map(|c| c.norm()).collect());
    }

    Spectrogram {
        magnitudes,
        n_fft,
        hop,
        sample_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_endpoints_and_peak() {
        let w = hann_window(256);
        assert!(w[0].abs() < 1e-6);
        assert!((w[128] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn reflect_pad_mirrors_without_edge_repeat() {
        let padded = reflect_pad(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(padded, vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn centered_frame_count() {
        let samples = vec![0.0f32; 48_000];
        let spec = stft_centered(&samples, 2048, 512, 16_000);
        assert_eq!(spec.n_frames(), 48_000 / 512 + 1);
        assert_eq!(spec.magnitudes[0].len(), 1025);
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let rate = 16_000u32;
        let n_fft = 2048;
        // Bin-centered frequency: 32 * 16000 / 2048 = 250 Hz.
        let hz = 250.0f32;
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / rate as f32).sin())
            .collect();
        let spec = stft_centered(&samples, n_fft, 512, rate);
        let mid = &spec.magnitudes[spec.n_frames() / 2];
        let peak_bin = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak_bin, 32);
    }
}
