//! Decoder adapter - raw file bytes in, per-channel f32 samples out
//!
//! Decodes an uploaded file's bytes (MP3, WAV, FLAC, OGG, ...) via Symphonia
//! and resamples to the engine rate via rubato, so everything downstream can
//! assume a single sample rate. Full-scale dynamic range is preserved: no gain
//! staging, no clamping on decode.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::Sample;

/// Frames fed to the resampler per call
const RESAMPLE_CHUNK: usize = 1024;

/// Errors that can occur while decoding an uploaded file
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported or malformed container: {0}")]
    UnsupportedFormat(String),

    #[error("No decodable audio track in file")]
    NoAudioTrack,

    #[error("Decoder error: {0}")]
    DecodeFailed(String),

    #[error("File is truncated or contains no audio frames")]
    NoFrames,

    #[error("Resampling failed: {0}")]
    ResampleFailed(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Decoded audio: per-channel sample sequences at a known rate.
///
/// Every channel has the same length. Samples are nominally in [-1, 1] but are
/// not clamped here; out-of-range values are the encoder's problem.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Sample rate of `channels` (always the engine rate after `decode_bytes`)
    pub sample_rate: u32,
    /// Per-channel sample data, channel 0 first
    pub channels: Vec<Vec<Sample>>,
}

impl DecodedAudio {
    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Duration in seconds at this audio's sample rate
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Decode a file's bytes into per-channel samples at `target_rate`.
///
/// `name_hint` is the original filename; its extension helps Symphonia pick a
/// demuxer faster but is not required. Files whose native rate differs from
/// `target_rate` are resampled, so callers always receive engine-rate audio.
pub fn decode_bytes(bytes: Vec<u8>, name_hint: &str, target_rate: u32) -> Result<DecodedAudio> {
    let decoded = decode_native(bytes, name_hint)?;

    if decoded.sample_rate == target_rate {
        return Ok(decoded);
    }

    log::info!(
        "Resampling {:?} from {} Hz to {} Hz ({} frames)",
        name_hint,
        decoded.sample_rate,
        target_rate,
        decoded.frame_count()
    );

    let channels = resample(&decoded.channels, decoded.sample_rate, target_rate)?;
    Ok(DecodedAudio {
        sample_rate: target_rate,
        channels,
    })
}

/// Decode to the file's native sample rate
fn decode_native(bytes: Vec<u8>, name_hint: &str) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = name_hint.rsplit('.').next().filter(|e| e.len() <= 4) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::UnsupportedFormat("unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    // Channel count is taken from the first decoded packet's signal spec;
    // codec params may not carry it for every format.
    let mut channels: Vec<Vec<Sample>> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet from {:?}: {}", name_hint, e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding packet from {:?}: {}", name_hint, e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            channels = vec![Vec::new(); spec.channels.count().max(1)];
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            let channel_count = channels.len();
            for frame in buf.samples().chunks_exact(channel_count) {
                for (ch, &sample) in frame.iter().enumerate() {
                    channels[ch].push(sample);
                }
            }
        }
    }

    if channels.first().map(|c| c.is_empty()).unwrap_or(true) {
        return Err(DecodeError::NoFrames);
    }

    Ok(DecodedAudio {
        sample_rate,
        channels,
    })
}

/// Resample all channels from `source_rate` to `target_rate`
fn resample(
    channels: &[Vec<Sample>],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<Sample>>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<Sample>::new(
        target_rate as f64 / source_rate as f64,
        1.0,
        params,
        RESAMPLE_CHUNK,
        channels.len(),
    )
    .map_err(|e| DecodeError::ResampleFailed(e.to_string()))?;

    let frames = channels[0].len();
    let mut out: Vec<Vec<Sample>> = vec![Vec::new(); channels.len()];
    let mut pos = 0;

    while pos + RESAMPLE_CHUNK <= frames {
        let chunk: Vec<&[Sample]> = channels
            .iter()
            .map(|c| &c[pos..pos + RESAMPLE_CHUNK])
            .collect();
        let processed = resampler
            .process(&chunk, None)
            .map_err(|e| DecodeError::ResampleFailed(e.to_string()))?;
        for (ch, data) in processed.into_iter().enumerate() {
            out[ch].extend_from_slice(&data);
        }
        pos += RESAMPLE_CHUNK;
    }

    if pos < frames {
        let chunk: Vec<&[Sample]> = channels.iter().map(|c| &c[pos..]).collect();
        let processed = resampler
            .process_partial(Some(&chunk), None)
            .map_err(|e| DecodeError::ResampleFailed(e.to_string()))?;
        for (ch, data) in processed.into_iter().enumerate() {
            out[ch].extend_from_slice(&data);
        }
    }

    // Drain the resampler's internal delay line
    let tail = resampler
        .process_partial(Option::<&[&[Sample]]>::None, None)
        .map_err(|e| DecodeError::ResampleFailed(e.to_string()))?;
    for (ch, data) in tail.into_iter().enumerate() {
        out[ch].extend_from_slice(&data);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mix::MixResult;
    use crate::types::StereoBuffer;
    use crate::wav;

    fn wav_bytes(left: &[f32], right: &[f32], rate: u32) -> Vec<u8> {
        wav::encode(&MixResult {
            sample_rate: rate,
            buffer: StereoBuffer::from_channels(left, right),
        })
    }

    #[test]
    fn test_decode_wav_roundtrip_at_engine_rate() {
        let left: Vec<f32> = (0..441).map(|i| (i as f32 / 441.0) * 0.5).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        let bytes = wav_bytes(&left, &right, 44_100);

        let decoded = decode_bytes(bytes, "ramp.wav", 44_100).unwrap();
        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.frame_count(), 441);

        // 16-bit storage limits the precision of the round trip
        for (orig, got) in left.iter().zip(&decoded.channels[0]) {
            assert!((orig - got).abs() < 2.0 / 32767.0, "{} vs {}", orig, got);
        }
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let frames = 48_000 / 10;
        let left: Vec<f32> = (0..frames)
            .map(|i| (i as f32 * 0.01).sin() * 0.25)
            .collect();
        let bytes = wav_bytes(&left, &left, 48_000);

        let decoded = decode_bytes(bytes, "tone.wav", 44_100).unwrap();
        assert_eq!(decoded.sample_rate, 44_100);

        // 100ms of audio resampled 48k -> 44.1k lands near 4410 frames
        let expected = 44_100 / 10;
        let got = decoded.frame_count() as i64;
        assert!(
            (got - expected as i64).abs() < 256,
            "expected ~{} frames, got {}",
            expected,
            got
        );
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_bytes(vec![0u8; 64], "noise.bin", 44_100);
        assert!(err.is_err());
    }

    #[test]
    fn test_decode_empty_fails() {
        assert!(decode_bytes(Vec::new(), "empty.wav", 44_100).is_err());
    }
}
