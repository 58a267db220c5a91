//! Error kinds returned by the authentication core.
//!
//! Every failure is reported to the caller as one of these variants; the
//! core performs no retries and catches none of its own errors. Variants
//! carry the failing stage and any score involved so hosts can audit-log
//! them, but never plaintext voiceprint fields or key material.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The asserted container format is not allowed, or the byte stream
    /// does not carry that format's signature.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The container signature matched but the stream failed to decode.
    #[error("corrupt audio stream: {0}")]
    CorruptStream(String),

    /// Decoded signal contained no samples.
    #[error("empty audio signal")]
    EmptySignal,

    /// Peak amplitude below the silence floor; nothing to normalize.
    #[error("signal is silent")]
    SilentSignal,

    /// Decoded duration falls outside the configured bounds (inclusive).
    #[error("audio duration {seconds:.3}s outside allowed range [{min}s, {max}s]")]
    DurationOutOfRange { seconds: f64, min: f64, max: f64 },

    /// A non-finite value appeared in a feature computation.
    #[error("non-finite value during feature extraction: {stage}")]
    FeatureNaN { stage: &'static str },

    /// Enrollment quality below the configured minimum.
    #[error("voice quality too low: score {score:.4} < minimum {minimum:.4}")]
    QualityTooLow { score: f64, minimum: f64 },

    /// No voiceprint record exists for this user.
    #[error("user not enrolled")]
    NotEnrolled,

    /// A voiceprint record already exists for this user.
    #[error("user already enrolled")]
    AlreadyEnrolled,

    /// Stored and presented voiceprints use different schema versions.
    #[error("voiceprint schema mismatch: stored {stored}, presented {presented}")]
    SchemaMismatch { stored: String, presented: String },

    /// Authenticated decryption or the integrity digest check failed.
    #[error("voiceprint integrity violation")]
    IntegrityViolation,

    /// Decryption succeeded but the payload did not decode to a voiceprint.
    #[error("corrupt voiceprint payload")]
    CorruptVoiceprint,

    /// An internal invariant was broken; indicates a bug or a misbehaving
    /// persistence backend, not bad caller input.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
