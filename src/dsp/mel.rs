//! Mel filterbank, log compression, and the DCT behind MFCCs.
//!
//! Frequency mapping and filter normalization follow the Slaney
//! convention (linear below 1 kHz, logarithmic above, filters scaled to
//! constant area). This choice is part of the voiceprint schema: changing
//! it invalidates every stored record, so it must remain stable.

/// Number of mel bands feeding the cepstral transform.
pub const N_MELS: usize = 128;

/// Power floor before log compression.
const AMIN: f64 = 1e-10;

/// Dynamic range kept below the spectrogram peak, dB.
const TOP_DB: f64 = 80.0;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn logstep() -> f64 {
    (6.4f64).ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz < MIN_LOG_HZ {
        hz / F_SP
    } else {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / logstep()
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel < MIN_LOG_MEL {
        mel * F_SP
    } else {
        MIN_LOG_HZ * ((mel - MIN_LOG_MEL) * logstep()).exp()
    }
}

/// One triangular filter stored over its nonzero bin range.
#[derive(Debug, Clone)]
pub struct MelFilter {
    pub first_bin: usize,
    pub weights: Vec<f32>,
}

/// Build `n_mels` area-normalized triangular filters over the
/// `n_fft / 2 + 1` spectrum bins.
pub fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: u32) -> Vec<MelFilter> {
    let n_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;

    let mel_max = hz_to_mel(nyquist);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    let bin_hz: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let mut filters = Vec::with_capacity(n_mels);
    for m in 0..n_mels {
        let (lower, center, upper) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
        // Constant-area normalization.
        let enorm = 2.0 / (upper - lower);

        let mut first_bin = None;
        let mut weights = Vec::new();
        for (k, &hz) in bin_hz.iter().enumerate() {
            let up = (hz - lower) / (center - lower);
            let down = (upper - hz) / (upper - center);
            let w = up.min(down).max(0.0) * enorm;
            if w > 0.0 {
                if first_bin.is_none() {
                    first_bin = Some(k);
                }
                weights.push(w as f32);
            } else if first_bin.is_some() {
                break;
            }
        }

        filters.push(MelFilter {
            first_bin: first_bin.unwrap_or(0),
            weights,
        });
    }
    filters
}

/// Apply the filterbank to one frame of power-spectrum bins.
pub fn apply_filterbank(filters: &[MelFilter], power: &[f32]) -> Vec<f32> {
    filters
        .iter()
        .map(|f| {
            f.weights
                .iter()
                .enumerate()
                .map(|(i, &w)| w * power[f.first_bin + i])
                .sum()
        })
        .collect()
}

/// Convert a power spectrogram (frames of mel-band powers) to decibels,
/// flooring at `AMIN` and clamping to `TOP_DB` below the global peak.
pub fn power_to_db(frames: &mut [Vec<f32>]) {
    let mut max_db = f64::NEG_INFINITY;
    for frame in frames.iter_mut() {
        for p in frame.iter_mut() {
            let db = 10.0 * (f64::from(*p).max(AMIN)).log10();
            max_db = max_db.max(db);
            *p = db as f32;
        }
    }
    let floor = (max_db - TOP_DB) as f32;
    for frame in frames.iter_mut() {
        for p in frame.iter_mut() {
            if *p < floor {
                *p = floor;
            }
        }
    }
}

/// Orthonormal DCT-II of `input`, keeping the first `n_out` coefficients.
pub fn dct_ii_ortho(input: &[f32], n_out: usize) -> Vec<f32> {
    let n = input.len();
    let mut out = Vec::with_capacity(n_out);
    for k in 0..n_out {
        let mut acc = 0.0f64;
        for (i, &x) in input.iter().enumerate() {
            let angle = std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n as f64);
            acc += f64::from(x) * angle.cos();
        }
        let scale = if k == 0 {
            (1.0 / n as f64).sqrt()
        } else {
            (2.0 / n as f64).sqrt()
        };
        out.push((acc * scale) as f32);
    }
    out
}
