//! Voiceprint similarity.
//!
//! Weighted blend of three views of the summary statistics: cosine of the
//! MFCC mean vectors, correlation of the MFCC deviation profiles, and
//! relative closeness of the scalar spectral descriptors. The cosine term
//! enters raw (a negative cosine pulls the blend down); only the final
//! blend is clamped to [0, 1].

use crate::error::{AuthError, Result};
use crate::voiceprint::Voiceprint;

const MEAN_WEIGHT: f64 = 0.6;
const STD_WEIGHT: f64 = 0.2;
const SPECTRAL_WEIGHT: f64 = 0.2;

/// Neutral contribution when a spectral term cannot be formed.
const SPECTRAL_FALLBACK: f64 = 0.5;

/// Similarity in [0, 1] between two voiceprints of the same schema.
pub fn similarity(a: &Voiceprint, b: &Voiceprint) -> Result<f64> {
    if a.schema_version != b.schema_version {
        return Err(AuthError::SchemaMismatch {
            stored: a.schema_version.clone(),
            presented: b.schema_version.clone(),
        });
    }

    let mean_sim = cosine(&a.mfcc_stats.mean, &b.mfcc_stats.mean);
    let std_corr = pearson(&a.mfcc_stats.std, &b.mfcc_stats.std).abs();

    let spectral_pairs = [
        (a.spectral_means.centroid, b.spectral_means.centroid),
        (a.spectral_means.rolloff, b.spectral_means.rolloff),
        (a.spectral_means.bandwidth, b.spectral_means.bandwidth),
    ];
    let terms: Vec<f64> = spectral_pairs
        .iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|&(x, y)| closeness(f64::from(x), f64::from(y)))
        .collect();
    let spectral_sim = if terms.is_empty() {
        SPECTRAL_FALLBACK
    } else {
        terms.iter().sum::<f64>() / terms.len() as f64
    };

    let blended =
        MEAN_WEIGHT * mean_sim + STD_WEIGHT * std_corr + SPECTRAL_WEIGHT * spectral_sim;
    Ok(blended.clamp(0.0, 1.0))
}

/// Raw cosine; zero when either vector has zero norm or lengths differ.
fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Pearson correlation; zero when either side has no variance.
fn pearson(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let mean_b = b.iter().map(|&v| f64::from(v)).sum::<f64>() / n;

    let mut cov = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = f64::from(x) - mean_a;
        let dy = f64::from(y) - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// 1 - |x - y| / (|x| + |y| + 1e-8): 1.0 at equality, toward 0 as the
/// values diverge.
fn closeness(x: f64, y: f64) -> f64 {
    1.0 - (x - y).abs() / (x.abs() + y.abs() + 1e-8)
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::audio::SignalMetadata;
    use crate::voiceprint::{MfccStats, SpectralMeans, SCHEMA_VERSION};
    use proptest::prelude::*;

    fn arbitrary_voiceprint(
        mean: Vec<f32>,
        std: Vec<f32>,
        centroid: f32,
        rolloff: f32,
        bandwidth: f32,
    ) -> Voiceprint {
        let dim = mean.len();
        Voiceprint {
            schema_version: SCHEMA_VERSION.to_string(),
            mfcc_stats: MfccStats {
                mean,
                std,
                min: vec![0.0; dim],
                max: vec![0.0; dim],
            },
            spectral_means: SpectralMeans {
                centroid,
                rolloff,
                bandwidth,
                zcr: 0.0,
                chroma_mean: 0.0,
                f0_mean: 0.0,
            },
            signal_metadata: SignalMetadata {
                duration_s: 1.0,
                speech_ratio: 0.5,
                max_amplitude: 1.0,
                energy_variance: 0.1,
                warnings: vec![],
            },
            created_at: "2025-01-01T00:00:00+00:00".to_string(),
        }
    }

    proptest! {
        #[test]
        fn similarity_in_unit_interval_and_symmetric(
            mean_a in proptest::collection::vec(-50.0f32..50.0, 8),
            mean_b in proptest::collection::vec(-50.0f32..50.0, 8),
            std_a in proptest::collection::vec(0.0f32..20.0, 8),
            std_b in proptest::collection::vec(0.0f32..20.0, 8),
            spec_a in proptest::array::uniform3(0.0f32..8000.0),
            spec_b in proptest::array::uniform3(0.0f32..8000.0),
        ) {
            let a = arbitrary_voiceprint(mean_a, std_a, spec_a[0], spec_a[1], spec_a[2]);
            let b = arbitrary_voiceprint(mean_b, std_b, spec_b[0], spec_b[1], spec_b[2]);
            let ab = similarity(&a, &b).unwrap();
            let ba = similarity(&b, &a).unwrap();
            prop_assert!((0.0..=1.0).contains(&ab));
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        #[test]
        fn self_similarity_near_one(
            mean in proptest::collection::vec(1.0f32..50.0, 8),
            base_std in 0.5f32..10.0,
            spec in proptest::array::uniform3(10.0f32..8000.0),
        ) {
            // A voiceprint with nonzero mean norm and non-constant stds.
            let std: Vec<f32> = (0..8).map(|i| base_std + i as f32).collect();
            let vp = arbitrary_voiceprint(mean, std, spec[0], spec[1], spec[2]);
            let sim = similarity(&vp, &vp).unwrap();
            prop_assert!(sim >= 0.999);
        }
    }
}
