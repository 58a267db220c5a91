//! MFCC and spectral descriptor extraction.
//!
//! All per-frame outputs share the reflect-centered 2048/512 grid; the
//! descriptor sequences line up index-for-index with the MFCC columns.

use crate::dsp::mel::{self, N_MELS};
use crate::dsp::stft::{self, Spectrogram};
use crate::error::{AuthError, Result};

/// FFT size for the analysis grid.
pub const N_FFT: usize = 2048;

/// Hop between frames, samples.
pub const HOP: usize = 512;

/// Regression window for delta features.
const DELTA_WIDTH: usize = 9;

/// Rolloff keeps this fraction of total spectral energy below it.
const ROLLOFF_PERCENTILE: f32 = 0.85;

/// Pitch search band, Hz.
const F0_MIN_HZ: f32 = 150.0;
const F0_MAX_HZ: f32 = 4000.0;

/// A pitch candidate must exceed this fraction of the frame peak.
const F0_REL_THRESHOLD: f32 = 0.1;

/// Stacked feature channels over time: `3 * n_mfcc` rows (static, delta,
/// delta-delta), one column per frame.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    rows: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    /// Build a matrix from channel rows. Rows must share a length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { rows }
    }

    pub fn n_channels(&self) -> usize {
        self.rows.len()
    }

    pub fn n_frames(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn channel(&self, i: usize) -> &[f32] {
        &self.rows[i]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// Per-frame spectral descriptors on the MFCC frame grid.
#[derive(Debug, Clone)]
pub struct SpectralDescriptors {
    pub centroid: Vec<f32>,
    pub rolloff: Vec<f32>,
    pub bandwidth: Vec<f32>,
    pub zcr: Vec<f32>,
    pub chroma: Vec<[f32; 12]>,
    pub f0: Vec<f32>,
}

/// Run the full feature pipeline over a cleaned signal.
pub fn extract(
    samples: &[f32],
    sample_rate: u32,
    n_mfcc: usize,
) -> Result<(FeatureMatrix, SpectralDescriptors)> {
    let spec = stft::stft_centered(samples, N_FFT, HOP, sample_rate);
    if spec.n_frames() == 0 {
        return Err(AuthError::FeatureNaN { stage: "stft" });
    }

    let mfcc = mfcc_matrix(&spec, n_mfcc);
    ensure_finite_rows(&mfcc, "mfcc")?;

    let delta = delta_rows(&mfcc);
    let delta2 = delta_rows(&delta);

    let mut rows = Vec::with_capacity(3 * n_mfcc);
    rows.extend(mfcc);
    rows.extend(delta);
    rows.extend(delta2);
    let matrix = FeatureMatrix { rows };
    ensure_finite_rows(&matrix.rows, "mfcc_deltas")?;

    let descriptors = spectral_descriptors(samples, &spec)?;

    Ok((matrix, descriptors))
}

/// Log-mel cepstrum: power spectrogram -> mel bands -> dB -> DCT-II.
fn mfcc_matrix(spec: &Spectrogram, n_mfcc: usize) -> Vec<Vec<f32>> {
    let filters = mel::mel_filterbank(N_MELS, spec.n_fft, spec.sample_rate);

    let mut mel_frames: Vec<Vec<f32>> = spec
        .magnitudes
        .iter()
        .map(|frame| {
            let power: Vec<f32> = frame.iter().map(|&m| m * m).collect();
            mel::apply_filterbank(&filters, &power)
        })
        .collect();
    mel::power_to_db(&mut mel_frames);

    let mut rows = vec![vec![0.0f32; mel_frames.len()]; n_mfcc];
    for (t, bands) in mel_frames.iter().enumerate() {
        let coeffs = mel::dct_ii_ortho(bands, n_mfcc);
        for (k, &c) in coeffs.iter().enumerate() {
            rows[k][t] = c;
        }
    }
    rows
}

/// 9-point regression deltas with edge replication.
fn delta_rows(rows: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let half = (DELTA_WIDTH / 2) as isize;
    let denom: f32 = 2.0 * (1..=half).map(|n| (n * n) as f32).sum::<f32>();

    rows.iter()
        .map(|row| {
            let len = row.len() as isize;
            let at = |i: isize| row[i.clamp(0, len - 1) as usize];
            (0..len)
                .map(|t| {
                    let mut acc = 0.0f32;
                    for n in 1..=half {
                        acc += n as f32 * (at(t + n) - at(t - n));
                    }
                    acc / denom
                })
                .collect()
        })
        .collect()
}

fn spectral_descriptors(samples: &[f32], spec: &Spectrogram) -> Result<SpectralDescriptors> {
    let n_frames = spec.n_frames();
    let mut centroid = Vec::with_capacity(n_frames);
    let mut rolloff = Vec::with_capacity(n_frames);
    let mut bandwidth = Vec::with_capacity(n_frames);
    let mut chroma = Vec::with_capacity(n_frames);
    let mut f0 = Vec::with_capacity(n_frames);

    for frame in &spec.magnitudes {
        let total: f32 = frame.iter().sum();

        let c = if total > 1e-10 {
            frame
                .iter()
                .enumerate()
                .map(|(k, &m)| spec.bin_hz(k) * m)
                .sum::<f32>()
                / total
        } else {
            0.0
        };
        centroid.push(c);

        rolloff.push(rolloff_hz(frame, total, spec));

        let bw = if total > 1e-10 {
            let var = frame
                .iter()
                .enumerate()
                .map(|(k, &m)| {
                    let d = spec.bin_hz(k) - c;
                    m * d * d
                })
                .sum::<f32>()
                / total;
            var.max(0.0).sqrt()
        } else {
            0.0
        };
        bandwidth.push(bw);

        chroma.push(chroma_frame(frame, spec));
        f0.push(f0_frame(frame, spec));
    }

    let zcr = zcr_track(samples, n_frames);

    for (name, track) in [
        ("spectral_centroid", &centroid),
        ("spectral_rolloff", &rolloff),
        ("spectral_bandwidth", &bandwidth),
        ("zero_crossing_rate", &zcr),
        ("f0", &f0),
    ] {
        if track.iter().any(|v| !v.is_finite()) {
            return Err(AuthError::FeatureNaN { stage: name });
        }
    }
    if chroma.iter().flatten().any(|v| !v.is_finite()) {
        return Err(AuthError::FeatureNaN { stage: "chroma" });
    }

    Ok(SpectralDescriptors {
        centroid,
        rolloff,
        bandwidth,
        zcr,
        chroma,
        f0,
    })
}

/// Frequency below which `ROLLOFF_PERCENTILE` of the magnitude lies.
fn rolloff_hz(frame: &[f32], total: f32, spec: &Spectrogram) -> f32 {
    if total <= 1e-10 {
        return 0.0;
    }
    let threshold = ROLLOFF_PERCENTILE * total;
    let mut acc = 0.0f32;
    for (k, &m) in frame.iter().enumerate() {
        acc += m;
        if acc >= threshold {
            return spec.bin_hz(k);
        }
    }
    spec.bin_hz(frame.len() - 1)
}

/// Fold spectrum bins onto 12 pitch classes (A440 reference) and
/// normalize the frame by its peak.
fn chroma_frame(frame: &[f32], spec: &Spectrogram) -> [f32; 12] {
    let mut bins = [0.0f32; 12];
    for (k, &m) in frame.iter().enumerate().skip(1) {
        let hz = spec.bin_hz(k);
        let midi = 69.0 + 12.0 * (hz / 440.0).log2();
        let pc = (midi.round() as i32).rem_euclid(12) as usize;
        bins[pc] += m;
    }
    let peak = bins.iter().cloned().fold(0.0f32, f32::max);
    if peak > 1e-10 {
        for b in bins.iter_mut() {
            *b /= peak;
        }
    }
    bins
}

/// Strongest spectral peak in the pitch band, parabolic-interpolated.
/// 0.0 when no candidate clears the relative magnitude threshold.
fn f0_frame(frame: &[f32], spec: &Spectrogram) -> f32 {
    let frame_peak = frame.iter().cloned().fold(0.0f32, f32::max);
    if frame_peak <= 1e-10 {
        return 0.0;
    }
    let threshold = F0_REL_THRESHOLD * frame_peak;

    let mut best: Option<(usize, f32)> = None;
    for k in 1..frame.len() - 1 {
        let hz = spec.bin_hz(k);
        if hz < F0_MIN_HZ || hz > F0_MAX_HZ {
            continue;
        }
        let m = frame[k];
        if m <= threshold || m < frame[k - 1] || m < frame[k + 1] {
            continue;
        }
        if best.map_or(true, |(_, bm)| m > bm) {
            best = Some((k, m));
        }
    }

    match best {
        Some((k, _)) => {
            let (a, b, c) = (frame[k - 1], frame[k], frame[k + 1]);
            let denom = a - 2.0 * b + c;
            let shift = if denom.abs() > 1e-10 {
                (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
            } else {
                0.0
            };
            (k as f32 + shift) * spec.sample_rate as f32 / spec.n_fft as f32
        }
        None => 0.0,
    }
}

/// Per-frame zero-crossing rate over the same centered frame grid.
fn zcr_track(samples: &[f32], n_frames: usize) -> Vec<f32> {
    let padded = stft::reflect_pad(samples, N_FFT / 2);
    (0..n_frames)
        .map(|t| {
            let frame = &padded[t * HOP..t * HOP + N_FFT];
            let crossings = frame
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            crossings as f32 / (N_FFT - 1) as f32
        })
        .collect()
}

fn ensure_finite_rows(rows: &[Vec<f32>], stage: &'static str) -> Result<()> {
    for row in rows {
        if row.iter().any(|v| !v.is_finite()) {
            return Err(AuthError::FeatureNaN { stage });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(hz: f32, seconds: f32) -> Vec<f32> {
        let rate = 16_000.0f32;
        (0..(rate * seconds) as usize)
            .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / rate).sin())
            .collect()
    }

    #[test]
    fn stack_dimensions() {
        let samples = tone(300.0, 1.0);
        let (matrix, descriptors) = extract(&samples, 16_000, 40).unwrap();
        assert_eq!(matrix.n_channels(), 120);
        let frames = 16_000 / HOP + 1;
        assert_eq!(matrix.n_frames(), frames);
        assert_eq!(descriptors.centroid.len(), frames);
        assert_eq!(descriptors.rolloff.len(), frames);
        assert_eq!(descriptors.bandwidth.len(), frames);
        assert_eq!(descriptors.zcr.len(), frames);
        assert_eq!(descriptors.chroma.len(), frames);
        assert_eq!(descriptors.f0.len(), frames);
    }

    #[test]
    fn delta_of_linear_ramp_is_slope() {
        let ramp: Vec<f32> = (0..50).map(|i| i as f32).collect();
        let deltas = delta_rows(&[ramp]);
        // Away from the edges the regression recovers the unit slope.
        for t in 4..46 {
            assert!((deltas[0][t] - 1.0).abs() < 1e-4, "t={t}");
        }
    }

    #[test]
    fn delta_of_constant_is_zero() {
        let row = vec![3.5f32; 30];
        let deltas = delta_rows(&[row]);
        assert!(deltas[0].iter().all(|&d| d.abs() < 1e-6));
    }

    #[test]
    fn centroid_follows_tone_frequency() {
        let low = tone(300.0, 1.0);
        let high = tone(3_000.0, 1.0);
        let (_, d_low) = extract(&low, 16_000, 40).unwrap();
        let (_, d_high) = extract(&high, 16_000, 40).unwrap();
        let mean = |v: &[f32]| v.iter().sum::<f32>() / v.len() as f32;
        assert!(mean(&d_high.centroid) > mean(&d_low.centroid) + 1_000.0);
    }

    #[test]
    fn f0_tracks_a_tonal_signal() {
        // 250 Hz sits inside the pitch band and on a clean bin.
        let samples = tone(250.0, 1.0);
        let (_, descriptors) = extract(&samples, 16_000, 40).unwrap();
        let interior = &descriptors.f0[4..descriptors.f0.len() - 4];
        for &f in interior {
            assert!((f - 250.0).abs() < 20.0, "f0={f}");
        }
    }

    #[test]
    fn zcr_orders_by_frequency() {
        let slow = tone(200.0, 1.0);
        let fast = tone(4_000.0, 1.0);
        let (_, d_slow) = extract(&slow, 16_000, 40).unwrap();
        let (_, d_fast) = extract(&fast, 16_000, 40).unwrap();
        let mean = |v: &[f32]| v.iter().sum::<f32>() / v.len() as f32;
        assert!(mean(&d_fast.zcr) > mean(&d_slow.zcr));
    }

    #[test]
    fn chroma_rows_normalized() {
        let samples = tone(440.0, 1.0);
        let (_, descriptors) = extract(&samples, 16_000, 40).unwrap();
        for frame in &descriptors.chroma {
            let peak = frame.iter().cloned().fold(0.0f32, f32::max);
            assert!(peak <= 1.0 + 1e-6);
        }
        // A 440 Hz tone concentrates in pitch class A (index 9).
        let mid = &descriptors.chroma[descriptors.chroma.len() / 2];
        let best = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(best, 9);
    }
}
