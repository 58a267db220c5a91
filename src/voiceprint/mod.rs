//! Voiceprint model: fixed-layout statistical summary of a speech sample.
//!
//! A voiceprint is the only artifact that survives a request, and only in
//! encrypted form. The layout is stamped with a schema version so future
//! feature sets can coexist with old records; nothing widens it silently.

pub mod compare;
pub mod integrity;
pub mod liveness;
pub mod quality;

use crate::audio::SignalMetadata;
use crate::dsp::{FeatureMatrix, SpectralDescriptors};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use compare::similarity;
pub use integrity::feature_hash;
pub use liveness::{assess_liveness, LivenessOutcome};
pub use quality::quality_score;

/// Layout version stamped into every voiceprint and record.
pub const SCHEMA_VERSION: &str = "1.0";

/// Time-axis statistics of the stacked MFCC matrix. Each vector has one
/// entry per channel (static + delta + delta-delta).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize)]
pub struct MfccStats {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

/// Scalar means of the per-frame spectral descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize)]
pub struct SpectralMeans {
    pub centroid: f32,
    pub rolloff: f32,
    pub bandwidth: f32,
    pub zcr: f32,
    pub chroma_mean: f32,
    pub f0_mean: f32,
}

/// Speaker-discriminative summary of one audio sample.
///
/// Plaintext voiceprints exist only in memory during enrollment or
/// verification; the buffers are zeroed when dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Voiceprint {
    pub schema_version: String,
    pub mfcc_stats: MfccStats,
    pub spectral_means: SpectralMeans,
    pub signal_metadata: SignalMetadata,
    /// RFC-3339 UTC creation timestamp.
    pub created_at: String,
}

impl Voiceprint {
    /// Reduce feature matrices to the fixed statistical summary.
    pub fn from_features(
        matrix: &FeatureMatrix,
        descriptors: &SpectralDescriptors,
        metadata: SignalMetadata,
    ) -> Self {
        let n = matrix.n_frames().max(1) as f64;

        let mut mean = Vec::with_capacity(matrix.n_channels());
        let mut std = Vec::with_capacity(matrix.n_channels());
        let mut min = Vec::with_capacity(matrix.n_channels());
        let mut max = Vec::with_capacity(matrix.n_channels());

        for channel in matrix.channels() {
            let m = channel.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
            let var = channel
                .iter()
                .map(|&v| {
                    let d = f64::from(v) - m;
                    d * d
                })
                .sum::<f64>()
                / n;
            mean.push(m as f32);
            std.push(var.sqrt() as f32);
            min.push(channel.iter().cloned().fold(f32::INFINITY, f32::min));
            max.push(channel.iter().cloned().fold(f32::NEG_INFINITY, f32::max));
        }

        let spectral_means = SpectralMeans {
            centroid: track_mean(&descriptors.centroid),
            rolloff: track_mean(&descriptors.rolloff),
            bandwidth: track_mean(&descriptors.bandwidth),
            zcr: track_mean(&descriptors.zcr),
            chroma_mean: chroma_mean(&descriptors.chroma),
            f0_mean: track_mean(&descriptors.f0),
        };

        Voiceprint {
            schema_version: SCHEMA_VERSION.to_string(),
            mfcc_stats: MfccStats {
                mean,
                std,
                min,
                max,
            },
            spectral_means,
            signal_metadata: metadata,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn track_mean(track: &[f32]) -> f32 {
    if track.is_empty() {
        return 0.0;
    }
    (track.iter().map(|&v| f64::from(v)).sum::<f64>() / track.len() as f64) as f32
}

/// Global mean over the 12 x T chroma matrix (mean of per-frame means).
fn chroma_mean(chroma: &[[f32; 12]]) -> f32 {
    if chroma.is_empty() {
        return 0.0;
    }
    let per_frame: f64 = chroma
        .iter()
        .map(|frame| frame.iter().map(|&v| f64::from(v)).sum::<f64>() / 12.0)
        .sum();
    (per_frame / chroma.len() as f64) as f32
}
