//! Signal conditioning ahead of feature extraction.
//!
//! Pre-emphasis, peak normalization, and a frame-energy voice activity
//! sweep. The cleaned signal feeds the feature pipeline; the metadata
//! feeds quality and liveness scoring and travels with the voiceprint.

use crate::audio::PcmSignal;
use crate::error::{AuthError, Result};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Single-pole pre-emphasis coefficient.
const PRE_EMPHASIS: f32 = 0.97;

/// Peak below this is treated as silence.
const SILENCE_FLOOR: f32 = 1e-9;

/// VAD analysis frame length, milliseconds.
const VAD_FRAME_MS: u32 = 25;

/// VAD hop, milliseconds.
const VAD_HOP_MS: u32 = 10;

/// A frame is speech when its energy exceeds this fraction of the peak
/// frame energy.
const VAD_THRESHOLD: f64 = 0.01;

/// Minimum total speech content before the signal is flagged, seconds.
const MIN_SPEECH_DURATION_S: f64 = 0.5;

/// Warning attached when the speech-frame count is too low.
pub const WARN_INSUFFICIENT_SPEECH: &str = "insufficient_speech";

/// Measurements taken during preprocessing. Lives alongside the cleaned
/// signal and is embedded in the voiceprint payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize)]
pub struct SignalMetadata {
    /// Signal length in seconds.
    pub duration_s: f64,
    /// Fraction of VAD frames classified as speech, in [0, 1].
    pub speech_ratio: f64,
    /// Peak absolute amplitude after normalization.
    pub max_amplitude: f64,
    /// Population variance of the per-frame energies.
    pub energy_variance: f64,
    /// Non-fatal observations about the signal.
    pub warnings: Vec<String>,
}

/// Clean a decoded signal and measure it.
///
/// Returns the pre-emphasized, peak-normalized samples together with the
/// signal metadata.
pub fn preprocess(signal: &PcmSignal) -> Result<(Vec<f32>, SignalMetadata)> {
    if signal.samples.is_empty() {
        return Err(AuthError::EmptySignal);
    }

    // y[0] = x[0]; y[n] = x[n] - a * x[n-1]
    let mut cleaned = Vec::with_capacity(signal.samples.len());
    cleaned.push(signal.samples[0]);
    for n in 1..signal.samples.len() {
        cleaned.push(signal.samples[n] - PRE_EMPHASIS * signal.samples[n - 1]);
    }

    let peak = cleaned.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    if peak < SILENCE_FLOOR {
        return Err(AuthError::SilentSignal);
    }
    for x in cleaned.iter_mut() {
        *x /= peak;
    }

    let rate = signal.sample_rate;
    let frame_len = (rate * VAD_FRAME_MS / 1000) as usize;
    let hop = (rate * VAD_HOP_MS / 1000) as usize;

    let energies = frame_energies(&cleaned, frame_len, hop);
    let max_energy = energies.iter().cloned().fold(0.0f64, f64::max);
    let speech_frames = energies
        .iter()
        .filter(|&&e| e > VAD_THRESHOLD * max_energy)
        .count();
    let speech_ratio = if energies.is_empty() {
        0.0
    } else {
        speech_frames as f64 / energies.len() as f64
    };

    let mut warnings = Vec::new();
    let min_speech_frames = MIN_SPEECH_DURATION_S * rate as f64 / hop as f64;
    if (speech_frames as f64) < min_speech_frames {
        warnings.push(WARN_INSUFFICIENT_SPEECH.to_string());
    }

    let max_amplitude = cleaned.iter().fold(0.0f32, |acc, &x| acc.max(x.abs())) as f64;

    let metadata = SignalMetadata {
        duration_s: cleaned.len() as f64 / rate as f64,
        speech_ratio,
        max_amplitude,
        energy_variance: population_variance(&energies),
        warnings,
    };

    log::debug!(
        "preprocessed signal: {:.2}s, speech_ratio={:.3}, energy_variance={:.4}",
        metadata.duration_s,
        metadata.speech_ratio,
        metadata.energy_variance
    );

    Ok((cleaned, metadata))
}

/// Sum-of-squares energy for each full frame.
fn frame_energies(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f64> {
    if samples.len() < frame_len || frame_len == 0 || hop == 0 {
        return Vec::new();
    }
    let n_frames = (samples.len() - frame_len) / hop + 1;
    (0..n_frames)
        .map(|i| {
            samples[i * hop..i * hop + frame_len]
                .iter()
                .map(|&x| (x as f64) * (x as f64))
                .sum()
        })
        .collect()
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64
}
