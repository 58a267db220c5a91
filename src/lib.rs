//! Voxguard: voice biometric enrollment and verification core.
//!
//! The crate turns a raw audio sample into a compact speaker voiceprint,
//! scores enrollment quality, screens for replay/synthesis, compares
//! voiceprints for identity verification, and keeps persisted voiceprints
//! confidential at rest under per-user derived keys.
//!
//! The core is stateless and re-entrant: build a [`VoiceAuthEngine`] once
//! at startup and share it across threads. Persistence is supplied by the
//! host through the [`store::VoiceprintStore`] trait.

pub mod audio;
pub mod config;
pub mod crypto;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod store;
pub mod voiceprint;

pub use audio::AudioFormat;
pub use config::{ConfigError, CoreConfig, ProcessSecret};
pub use engine::{Decision, EnrollmentOutcome, VerificationOutcome, VoiceAuthEngine};
pub use error::{AuthError, Result};
pub use store::{FileStore, MemoryStore, StoreError, VoiceprintRecord, VoiceprintStore};
pub use voiceprint::Voiceprint;
