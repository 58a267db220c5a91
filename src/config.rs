//! Core configuration and the process secret.
//!
//! `CoreConfig` enumerates every tunable the engine honors. All fields
//! have serde defaults so a partial TOML file (or none at all) yields a
//! working configuration; `validate` rejects out-of-range values before
//! an engine is built from it.

use crate::audio::AudioFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use zeroize::Zeroizing;

/// Minimum accepted process secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("process secret too short: {actual} bytes (minimum {MIN_SECRET_LEN})")]
    SecretTooShort { actual: usize },
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Processing sample rate in Hz; all audio is resampled to this.
    pub sample_rate: u32,
    /// Number of MFCC coefficients per frame.
    pub n_mfcc: usize,
    /// Shortest accepted sample, seconds (inclusive).
    pub min_audio_duration_s: f64,
    /// Longest accepted sample, seconds (inclusive).
    pub max_audio_duration_s: f64,
    /// Similarity required for a verification pass.
    pub verification_threshold: f64,
    /// Liveness score below which verification reports spoofing.
    pub liveness_threshold: f64,
    /// Quality score required to enroll.
    pub quality_min: f64,
    /// PBKDF2-HMAC-SHA256 iteration count for key derivation.
    pub pbkdf2_iterations: u32,
    /// Container formats accepted at the input boundary.
    pub allowed_formats: Vec<AudioFormat>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            n_mfcc: 40,
            min_audio_duration_s: 1.0,
            max_audio_duration_s: 10.0,
            verification_threshold: 0.85,
            liveness_threshold: 0.70,
            quality_min: 0.50,
            pbkdf2_iterations: 100_000,
            allowed_formats: vec![
                AudioFormat::Wav,
                AudioFormat::Mp3,
                AudioFormat::M4a,
                AudioFormat::Ogg,
            ],
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if self.n_mfcc == 0 || self.n_mfcc > 128 {
            return Err(ConfigError::Invalid(format!(
                "n_mfcc must be in [1, 128], got {}",
                self.n_mfcc
            )));
        }
        if self.min_audio_duration_s <= 0.0 || self.max_audio_duration_s <= 0.0 {
            return Err(ConfigError::Invalid(
                "audio duration bounds must be positive".into(),
            ));
        }
        if self.min_audio_duration_s > self.max_audio_duration_s {
            return Err(ConfigError::Invalid(format!(
                "min_audio_duration_s {} exceeds max_audio_duration_s {}",
                self.min_audio_duration_s, self.max_audio_duration_s
            )));
        }
        for (name, value) in [
            ("verification_threshold", self.verification_threshold),
            ("liveness_threshold", self.liveness_threshold),
            ("quality_min", self.quality_min),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }
        if self.pbkdf2_iterations == 0 {
            return Err(ConfigError::Invalid(
                "pbkdf2_iterations must be positive".into(),
            ));
        }
        if self.allowed_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed_formats must name at least one container".into(),
            ));
        }
        Ok(())
    }
}

/// Stable per-process secret used for key derivation.
///
/// Injected at startup, never serialized, zeroed on drop. Rotating it
/// invalidates every stored record, so deployments must keep it stable
/// across restarts.
pub struct ProcessSecret(Zeroizing<Vec<u8>>);

impl ProcessSecret {
    pub fn new(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort {
                actual: bytes.len(),
            });
        }
        Ok(Self(Zeroizing::new(bytes)))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for ProcessSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProcessSecret({} bytes)", self.0.len())
    }
}
