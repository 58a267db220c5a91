//! Container decoding to mono PCM at the processing rate.
//!
//! The caller asserts a container format; the byte stream must carry that
//! format's signature before any decoder touches it. Decoded audio is
//! downmixed to mono by channel averaging and resampled to the configured
//! rate, then checked against the duration bounds.

use crate::config::CoreConfig;
use crate::error::{AuthError, Result};
use rubato::{FftFixedIn, Resampler};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Accepted container formats at the input boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    M4a,
    Ogg,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// True when `bytes` starts with a signature of this container.
    pub fn matches_signature(&self, bytes: &[u8]) -> bool {
        match self {
            AudioFormat::Wav => bytes.starts_with(b"RIFF"),
            AudioFormat::Mp3 => {
                bytes.starts_with(b"ID3")
                    || bytes.starts_with(&[0xFF, 0xFB])
                    || bytes.starts_with(&[0xFF, 0xF3])
                    || bytes.starts_with(&[0xFF, 0xF2])
            }
            // MP4 family: "ftyp" brand at offset 4.
            AudioFormat::M4a => bytes.len() >= 8 && &bytes[4..8] == b"ftyp",
            AudioFormat::Ogg => bytes.starts_with(b"OggS"),
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(AudioFormat::Wav),
            "mp3" => Ok(AudioFormat::Mp3),
            "m4a" | "mp4" => Ok(AudioFormat::M4a),
            "ogg" => Ok(AudioFormat::Ogg),
            other => Err(AuthError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mono PCM at a known rate. Transient: consumed within the request that
/// produced it and never persisted.
#[derive(Debug, Clone)]
pub struct PcmSignal {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl PcmSignal {
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode a tagged byte buffer to mono PCM at `config.sample_rate`.
pub fn decode(bytes: &[u8], format: AudioFormat, config: &CoreConfig) -> Result<PcmSignal> {
    if !config.allowed_formats.contains(&format) {
        return Err(AuthError::UnsupportedFormat(format!(
            "{} is not an accepted container",
            format
        )));
    }
    if !format.matches_signature(bytes) {
        return Err(AuthError::UnsupportedFormat(format!(
            "byte stream does not carry a {} signature",
            format
        )));
    }

    let (samples, source_rate) = decode_to_mono_f32(bytes, format)?;
    if samples.is_empty() {
        return Err(AuthError::CorruptStream(
            "stream decoded to zero samples".into(),
        ));
    }

    let samples = if source_rate == config.sample_rate {
        samples
    } else {
        log::debug!(
            "resampling decoded audio: {} Hz -> {} Hz",
            source_rate,
            config.sample_rate
        );
        resample_mono(&samples, source_rate, config.sample_rate)?
    };

    let signal = PcmSignal {
        sample_rate: config.sample_rate,
        samples,
    };

    let seconds = signal.duration_s();
    if seconds < config.min_audio_duration_s || seconds > config.max_audio_duration_s {
        return Err(AuthError::DurationOutOfRange {
            seconds,
            min: config.min_audio_duration_s,
            max: config.max_audio_duration_s,
        });
    }

    Ok(signal)
}

/// Decode every packet of the default track, averaging channels to mono.
fn decode_to_mono_f32(bytes: &[u8], format: AudioFormat) -> Result<(Vec<f32>, u32)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.as_str());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AuthError::CorruptStream(format!("failed to probe container: {e}")))?;

    let mut reader = probed.format;
    let track = reader
        .default_track()
        .ok_or_else(|| AuthError::CorruptStream("no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| AuthError::CorruptStream("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AuthError::CorruptStream(format!("failed to create decoder: {e}")))?;

    let mut out: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AuthError::CorruptStream(format!("read error: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Recoverable packet corruption; the decoder resynchronizes.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(AuthError::CorruptStream(format!("decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let frames = decoded.frames() as u64;

        let required = (frames as usize).saturating_mul(channels);
        let needs_new = match sample_buf.as_ref() {
            Some(b) => b.capacity() < required,
            None => true,
        };
        if needs_new {
            sample_buf = Some(SampleBuffer::<f32>::new(frames, spec));
        } else if let Some(b) = sample_buf.as_mut() {
            b.clear();
        }

        let buf = match sample_buf.as_mut() {
            Some(b) => b,
            None => continue,
        };
        buf.copy_interleaved_ref(decoded);

        let data = buf.samples();
        if channels <= 1 {
            out.extend_from_slice(data);
        } else {
            for frame in data.chunks_exact(channels) {
                let sum: f32 = frame.iter().sum();
                out.push(sum / channels as f32);
            }
        }
    }

    Ok((out, source_rate))
}

/// Resample a mono buffer with an FFT-based fixed-input resampler.
///
/// The resampler pads partial chunks and carries an internal delay line;
/// the output is realigned by skipping that delay and truncated to the
/// exact rate-converted length so durations stay comparable.
fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    const CHUNK: usize = 1024;

    let mut resampler = FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK, 2, 1)
        .map_err(|e| AuthError::InternalInvariant(format!("resampler construction: {e}")))?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;

    let mut out: Vec<f32> = Vec::with_capacity(expected + 2 * CHUNK);
    let mut offset = 0usize;

    while samples.len() - offset >= resampler.input_frames_next() {
        let take = resampler.input_frames_next();
        let chunk = vec![samples[offset..offset + take].to_vec()];
        let produced = resampler
            .process(&chunk, None)
            .map_err(|e| AuthError::InternalInvariant(format!("resampler: {e}")))?;
        out.extend_from_slice(&produced[0]);
        offset += take;
    }

    if offset < samples.len() {
        let tail = vec![samples[offset..].to_vec()];
        let produced = resampler
            .process_partial(Some(&tail), None)
            .map_err(|e| AuthError::InternalInvariant(format!("resampler tail: {e}")))?;
        out.extend_from_slice(&produced[0]);
    }

    // Drain the delay line until the realigned output is complete.
    let mut flushes = 0;
    while out.len() < delay + expected {
        let flushed = resampler
            .process_partial(Option::<&[Vec<f32>]>::None, None)
            .map_err(|e| AuthError::InternalInvariant(format!("resampler flush: {e}")))?;
        out.extend_from_slice(&flushed[0]);
        flushes += 1;
        if flushes > 8 {
            return Err(AuthError::InternalInvariant(
                "resampler failed to drain its delay line".into(),
            ));
        }
    }

    Ok(out[delay..delay + expected].to_vec())
}
