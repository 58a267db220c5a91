//! Spectral analysis primitives and the feature pipeline.
//!
//! Everything downstream of preprocessing shares one frame grid: the
//! reflect-centered 2048/512 Hann STFT computed here.

pub mod features;
pub mod mel;
pub mod stft;

pub use features::{extract, FeatureMatrix, SpectralDescriptors};
