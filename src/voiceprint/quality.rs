//! Enrollment quality scoring.
//!
//! A multiplicative penalty model over signal measurements and feature
//! spread. Scores land in [0, 1]; enrollment requires the configured
//! minimum (0.50 by default). The score is reported to callers verbatim.

use crate::audio::SignalMetadata;
use crate::dsp::{FeatureMatrix, SpectralDescriptors};

/// Score a sample for enrollment suitability.
pub fn quality_score(
    metadata: &SignalMetadata,
    matrix: &FeatureMatrix,
    descriptors: &SpectralDescriptors,
) -> f64 {
    let mut score = 1.0f64;

    // Too little speech relative to the sample length.
    if metadata.speech_ratio < 0.60 {
        score *= 0.70;
    }

    // Very short samples give unstable statistics.
    if metadata.duration_s < 2.0 {
        score *= 0.80;
    }

    // Flat energy suggests monotone delivery or a constant source.
    if metadata.energy_variance < 0.01 {
        score *= 0.60;
    }

    // Low cepstral spread means little speaker-discriminative content.
    if mean_channel_variance(matrix) < 10.0 {
        score *= 0.80;
    }

    // A static spectral centroid means little articulation.
    if population_variance(&descriptors.centroid) < 1000.0 {
        score *= 0.90;
    }

    score.clamp(0.0, 1.0)
}

/// Mean over channels of each channel's time variance.
fn mean_channel_variance(matrix: &FeatureMatrix) -> f64 {
    if matrix.n_channels() == 0 {
        return 0.0;
    }
    let total: f64 = matrix
        .channels()
        .map(|channel| population_variance(channel))
        .sum();
    total / matrix.n_channels() as f64
}

fn population_variance(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    values
        .iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / n
}
