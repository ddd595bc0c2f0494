//! WAV container encoder - canonical 16-bit PCM serialization of a mix
//!
//! Pure byte-level encoder: 44-byte RIFF/WAVE header followed by interleaved
//! 16-bit little-endian frames. The byte layout is fixed (golden-file tested),
//! so this is written against the container format directly rather than going
//! through a writer library.

use crate::mix::MixResult;
use crate::types::Sample;

/// Channels in the output container. Mixes are always stereo.
const CHANNELS: u16 = 2;

/// Bytes per sample (16-bit PCM)
const BYTES_PER_SAMPLE: u16 = 2;

/// Default filename the encoded artifact is exposed under
pub const MIX_FILENAME: &str = "audio-mix.wav";

/// Encode a mix into a complete WAV file.
///
/// Total function: any `MixResult` yields a valid file. Samples are clamped to
/// [-1, 1] and quantized asymmetrically - `round(s * 32767)` for positives,
/// `round(s * 32768)` for negatives - matching the full i16 range at both
/// extremes. Identical input yields byte-identical output.
pub fn encode(mix: &MixResult) -> Vec<u8> {
    let frame_count = mix.frame_count();
    let data_len = frame_count as u32 * CHANNELS as u32 * BYTES_PER_SAMPLE as u32;
    let block_align = CHANNELS * BYTES_PER_SAMPLE;
    let byte_rate = mix.sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM format code
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&mix.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&(BYTES_PER_SAMPLE * 8).to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for sample in mix.buffer.iter() {
        out.extend_from_slice(&quantize(sample.left).to_le_bytes());
        out.extend_from_slice(&quantize(sample.right).to_le_bytes());
    }

    out
}

/// Clamp to [-1, 1] and map to i16 full scale.
#[inline]
fn quantize(sample: Sample) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}
