//! Audio ingestion: container decoding and signal preprocessing.
//!
//! Decoding accepts a tagged byte buffer and produces mono f32 PCM at the
//! processing rate; preprocessing cleans the signal and measures it for
//! the downstream feature pipeline. Raw audio never leaves this layer.

pub mod decode;
pub mod preprocess;

pub use decode::{decode, AudioFormat, PcmSignal};
pub use preprocess::{preprocess, SignalMetadata};

/// Default processing sample rate (16 kHz).
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
