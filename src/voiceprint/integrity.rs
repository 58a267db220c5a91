//! Tamper-evidence digest over a voiceprint's salient features.
//!
//! The digest covers the comparison-relevant fields only (MFCC mean and
//! deviation vectors, spectral means, schema version) through a canonical
//! key-sorted textual encoding, so any serialization that preserves the
//! numbers reproduces the same hash. Floats are rendered as the shortest
//! round-trip decimal of their IEEE-754 double value.

use crate::voiceprint::Voiceprint;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// SHA-256 hex digest of the canonical feature encoding.
pub fn feature_hash(voiceprint: &Voiceprint) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_encoding(voiceprint).as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic key-sorted encoding of the hashed fields.
///
/// Keys appear in lexicographic order at both nesting levels; vectors
/// keep their element order. The encoding is stable across processes and
/// platforms for identical numeric content.
fn canonical_encoding(voiceprint: &Voiceprint) -> String {
    let mut out = String::new();
    out.push('{');

    out.push_str("\"mfcc_mean\":");
    write_float_list(&mut out, &voiceprint.mfcc_stats.mean);
    out.push_str(",\"mfcc_std\":");
    write_float_list(&mut out, &voiceprint.mfcc_stats.std);

    out.push_str(",\"schema_version\":\"");
    out.push_str(&voiceprint.schema_version);
    out.push('"');

    let s = &voiceprint.spectral_means;
    out.push_str(",\"spectral_means\":{");
    // Lexicographic field order.
    let fields: [(&str, f32); 6] = [
        ("bandwidth", s.bandwidth),
        ("centroid", s.centroid),
        ("chroma_mean", s.chroma_mean),
        ("f0_mean", s.f0_mean),
        ("rolloff", s.rolloff),
        ("zcr", s.zcr),
    ];
    for (i, (name, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "\"{}\":{}", name, f64::from(*value));
    }
    out.push('}');

    out.push('}');
    out
}

fn write_float_list(out: &mut String, values: &[f32]) {
    out.push('[');
    for (i, &v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}", f64::from(v));
    }
    out.push(']');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SignalMetadata;
    use crate::voiceprint::{MfccStats, SpectralMeans, SCHEMA_VERSION};

    fn voiceprint() -> Voiceprint {
        Voiceprint {
            schema_version: SCHEMA_VERSION.to_string(),
            mfcc_stats: MfccStats {
                mean: vec![1.5, -2.25, 0.0],
                std: vec![0.5, 1.0, 2.0],
                min: vec![-3.0, -3.0, -3.0],
                max: vec![3.0, 3.0, 3.0],
            },
            spectral_means: SpectralMeans {
                centroid: 1234.5,
                rolloff: 2345.0,
                bandwidth: 456.75,
                zcr: 0.125,
                chroma_mean: 0.5,
                f0_mean: 182.0,
            },
            signal_metadata: SignalMetadata {
                duration_s: 3.0,
                speech_ratio: 0.8,
                max_amplitude: 1.0,
                energy_variance: 0.5,
                warnings: vec![],
            },
            created_at: "2025-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn canonical_form_is_key_sorted() {
        let encoded = canonical_encoding(&voiceprint());
        assert!(encoded.starts_with("{\"mfcc_mean\":[1.5,-2.25,0]"));
        let spectral_pos = encoded.find("spectral_means").unwrap();
        let bandwidth_pos = encoded.find("bandwidth").unwrap();
        let zcr_pos = encoded.find("zcr").unwrap();
        assert!(spectral_pos < bandwidth_pos && bandwidth_pos < zcr_pos);
    }

    #[test]
    fn hash_is_stable_and_hex() {
        let a = feature_hash(&voiceprint());
        let b = feature_hash(&voiceprint());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_ignores_metadata_and_timestamp() {
        let mut other = voiceprint();
        other.created_at = "2030-06-15T12:00:00+00:00".to_string();
        other.signal_metadata.speech_ratio = 0.1;
        other.mfcc_stats.min[0] = -99.0;
        assert_eq!(feature_hash(&voiceprint()), feature_hash(&other));
    }

    #[test]
    fn hash_tracks_feature_changes() {
        let mut tampered = voiceprint();
        tampered.mfcc_stats.mean[1] += 0.0001;
        assert_ne!(feature_hash(&voiceprint()), feature_hash(&tampered));

        let mut tampered = voiceprint();
        tampered.spectral_means.f0_mean = 183.0;
        assert_ne!(feature_hash(&voiceprint()), feature_hash(&tampered));

        let mut tampered = voiceprint();
        tampered.schema_version = "1.1".to_string();
        assert_ne!(feature_hash(&voiceprint()), feature_hash(&tampered));
    }
}
