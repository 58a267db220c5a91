//! Core operations: enroll, verify, re-enroll, delete.
//!
//! The engine is a stateless, reusable handle built once at startup from
//! the configuration and process secret. Every operation is synchronous
//! and CPU-bound; persistence is reached only through the store the
//! caller passes in, and every failure path leaves it unchanged.

use crate::audio::{self, AudioFormat, SignalMetadata};
use crate::config::{ConfigError, CoreConfig, ProcessSecret};
use crate::crypto::VoiceprintCipher;
use crate::dsp::{self, FeatureMatrix, SpectralDescriptors};
use crate::error::{AuthError, Result};
use crate::store::{StoreError, VoiceprintRecord, VoiceprintStore};
use crate::voiceprint::{
    assess_liveness, feature_hash, quality_score, similarity, Voiceprint,
};
use serde::Serialize;

/// Verification decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    Pass,
    Fail,
    SpoofingSuspected,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOutcome {
    pub quality_score: f64,
    pub warnings: Vec<String>,
    pub record: VoiceprintRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub similarity: f64,
    pub liveness: f64,
    pub decision: Decision,
}

/// Everything the pipeline derives from one audio sample.
struct Analysis {
    cleaned: Vec<f32>,
    metadata: SignalMetadata,
    matrix: FeatureMatrix,
    descriptors: SpectralDescriptors,
}

/// Reusable, thread-safe authentication core.
pub struct VoiceAuthEngine {
    config: CoreConfig,
    cipher: VoiceprintCipher,
}

impl VoiceAuthEngine {
    /// Build an engine from a validated configuration and process secret.
    pub fn new(config: CoreConfig, secret: ProcessSecret) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let cipher = VoiceprintCipher::new(secret, config.pbkdf2_iterations);
        log::info!(
            "engine ready: rate={}Hz, n_mfcc={}, verify>={:.2}, liveness>={:.2}, quality>={:.2}",
            config.sample_rate,
            config.n_mfcc,
            config.verification_threshold,
            config.liveness_threshold,
            config.quality_min
        );
        Ok(Self { config, cipher })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Enroll a user from an audio sample. Exactly one record per user;
    /// a second enrollment reports `AlreadyEnrolled`.
    pub fn enroll(
        &self,
        store: &dyn VoiceprintStore,
        user_id: &str,
        audio_bytes: &[u8],
        format: AudioFormat,
    ) -> Result<EnrollmentOutcome> {
        let analysis = self.analyze(audio_bytes, format)?;

        let quality = quality_score(&analysis.metadata, &analysis.matrix, &analysis.descriptors);
        if quality < self.config.quality_min {
            log::info!(
                "enrollment rejected for '{}': quality {:.3} below {:.2}",
                user_id,
                quality,
                self.config.quality_min
            );
            return Err(AuthError::QualityTooLow {
                score: quality,
                minimum: self.config.quality_min,
            });
        }

        let record = self.seal_record(user_id, &analysis, quality)?;
        store.store_record(&record).map_err(map_store_error)?;

        log::info!(
            "enrolled '{}': quality={:.3}, duration={:.2}s",
            user_id,
            quality,
            analysis.metadata.duration_s
        );

        Ok(EnrollmentOutcome {
            quality_score: quality,
            warnings: analysis.metadata.warnings.clone(),
            record,
        })
    }

    /// Replace an existing enrollment atomically.
    pub fn re_enroll(
        &self,
        store: &dyn VoiceprintStore,
        user_id: &str,
        audio_bytes: &[u8],
        format: AudioFormat,
    ) -> Result<EnrollmentOutcome> {
        let analysis = self.analyze(audio_bytes, format)?;

        let quality = quality_score(&analysis.metadata, &analysis.matrix, &analysis.descriptors);
        if quality < self.config.quality_min {
            return Err(AuthError::QualityTooLow {
                score: quality,
                minimum: self.config.quality_min,
            });
        }

        let record = self.seal_record(user_id, &analysis, quality)?;
        store.replace_record(&record).map_err(map_store_error)?;

        log::info!("re-enrolled '{}': quality={:.3}", user_id, quality);

        Ok(EnrollmentOutcome {
            quality_score: quality,
            warnings: analysis.metadata.warnings.clone(),
            record,
        })
    }

    /// Verify a user against their stored voiceprint.
    pub fn verify(
        &self,
        store: &dyn VoiceprintStore,
        user_id: &str,
        audio_bytes: &[u8],
        format: AudioFormat,
    ) -> Result<VerificationOutcome> {
        let record = store.load_record(user_id).map_err(map_store_error)?;

        let analysis = self.analyze(audio_bytes, format)?;
        let liveness = assess_liveness(
            &analysis.cleaned,
            &analysis.metadata,
            &analysis.descriptors.f0,
            self.config.sample_rate,
        );

        let stored = self
            .cipher
            .decrypt(&record.ciphertext, user_id, &record.salt)?;
        if feature_hash(&stored) != record.integrity_hash {
            return Err(AuthError::IntegrityViolation);
        }

        let presented = Voiceprint::from_features(
            &analysis.matrix,
            &analysis.descriptors,
            analysis.metadata.clone(),
        );
        let score = similarity(&stored, &presented)?;

        let decision = self.decide(score, liveness.score);
        log::info!(
            "verification for '{}': similarity={:.3}, liveness={:.3}, result={:?}",
            user_id,
            score,
            liveness.score,
            decision
        );

        Ok(VerificationOutcome {
            similarity: score,
            liveness: liveness.score,
            decision,
        })
    }

    /// Remove a user's enrollment.
    pub fn delete(&self, store: &dyn VoiceprintStore, user_id: &str) -> Result<()> {
        store.delete_record(user_id).map_err(map_store_error)?;
        log::info!("deleted voiceprint for '{}'", user_id);
        Ok(())
    }

    /// Decode, preprocess, and extract features from an audio sample.
    fn analyze(&self, audio_bytes: &[u8], format: AudioFormat) -> Result<Analysis> {
        let signal = audio::decode(audio_bytes, format, &self.config)?;
        let (cleaned, metadata) = audio::preprocess(&signal)?;
        let (matrix, descriptors) =
            dsp::extract(&cleaned, self.config.sample_rate, self.config.n_mfcc)?;
        Ok(Analysis {
            cleaned,
            metadata,
            matrix,
            descriptors,
        })
    }

    /// Build and encrypt the persisted record for an analyzed sample.
    fn seal_record(
        &self,
        user_id: &str,
        analysis: &Analysis,
        quality: f64,
    ) -> Result<VoiceprintRecord> {
        let voiceprint = Voiceprint::from_features(
            &analysis.matrix,
            &analysis.descriptors,
            analysis.metadata.clone(),
        );
        let integrity_hash = feature_hash(&voiceprint);
        let salt = VoiceprintCipher::generate_salt();
        let ciphertext = self.cipher.encrypt(&voiceprint, user_id, &salt)?;

        Ok(VoiceprintRecord {
            user_id: user_id.to_string(),
            schema_version: voiceprint.schema_version.clone(),
            salt,
            ciphertext,
            integrity_hash,
            quality_score: quality,
            enrollment_duration_s: analysis.metadata.duration_s,
            created_at: voiceprint.created_at.clone(),
        })
    }

    /// Liveness below threshold dominates; otherwise similarity decides.
    fn decide(&self, similarity: f64, liveness: f64) -> Decision {
        if liveness < self.config.liveness_threshold {
            Decision::SpoofingSuspected
        } else if similarity >= self.config.verification_threshold {
            Decision::Pass
        } else {
            Decision::Fail
        }
    }
}

fn map_store_error(err: StoreError) -> AuthError {
    match err {
        StoreError::NotFound => AuthError::NotEnrolled,
        StoreError::Conflict => AuthError::AlreadyEnrolled,
        StoreError::Backend(msg) => AuthError::InternalInvariant(msg),
    }
}
