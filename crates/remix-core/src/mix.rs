//! Mixing engine - sums decoded tracks into one stereo buffer
//!
//! Tracks of different lengths and channel counts are aligned to a common
//! stereo timeline: mono tracks feed both lanes, channels past the second are
//! ignored, and short tracks contribute silence past their own end. The sum is
//! scaled by `1/sqrt(N)` to keep combined loudness roughly constant as track
//! count grows. No clipping happens here; the WAV encoder clamps on quantize.

use std::sync::Arc;

use crate::decode::DecodedAudio;
use crate::types::{Sample, StereoBuffer, StereoSample};

/// One track's contribution to a mix: its decoded samples and the user gain.
///
/// The decoded audio is shared, never copied - a mix snapshot holds `Arc`s so
/// the store can keep mutating while a recompute runs.
#[derive(Debug, Clone)]
pub struct MixSource {
    pub audio: Arc<DecodedAudio>,
    /// User gain, clamped to [0, 1] by the store before it gets here
    pub gain: Sample,
}

/// The mixed stereo buffer plus the rate it was produced at.
///
/// Always stereo, always `max(source length)` frames. Recomputed from scratch
/// on every relevant mutation; never patched incrementally.
#[derive(Debug, Clone, PartialEq)]
pub struct MixResult {
    pub sample_rate: u32,
    pub buffer: StereoBuffer,
}

impl MixResult {
    /// Number of stereo frames
    pub fn frame_count(&self) -> usize {
        self.buffer.len()
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Per-track processing hook applied to the upmixed, gain-staged stereo lane
/// before it is summed into the mix.
///
/// The effects panel (chorus, phaser, compressor, ...) collects parameters for
/// a stage like this, but v1 ships no DSP implementation - see [`EffectParams`].
pub trait TrackStage {
    fn process(&mut self, lane: &mut StereoBuffer);
}

/// Effect parameters as collected from the UI panel.
///
/// Plain data only: nothing in the engine consumes these yet. They exist so a
/// future `TrackStage` implementation has a stable parameter surface to hook.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectParams {
    pub chorus: bool,
    pub phaser: bool,
    pub compressor: f32,
    pub delay: f32,
    pub distortion: f32,
    pub gain: f32,
    pub highpass: f32,
    pub lowpass: f32,
    pub pitch_shift: f32,
    pub reverb: f32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            chorus: false,
            phaser: false,
            compressor: 0.0,
            delay: 0.0,
            distortion: 0.0,
            gain: 1.0,
            highpass: 0.0,
            lowpass: 0.0,
            pitch_shift: 0.0,
            reverb: 0.0,
        }
    }
}

/// Mix `sources` into a single stereo buffer at `sample_rate`.
///
/// Returns `None` when `sources` is empty (no buffer is produced for an empty
/// session). Callers must pass only tracks whose decode succeeded: pending and
/// failed tracks are excluded upstream so they count neither in the sum nor in
/// the `1/sqrt(N)` denominator.
///
/// Deterministic: identical sources and gains produce bit-identical output.
pub fn mix(sources: &[MixSource], sample_rate: u32) -> Option<MixResult> {
    mix_with_stage(sources, sample_rate, None)
}

/// [`mix`], with an optional per-track stage applied to each source's stereo
/// lane before summation.
pub fn mix_with_stage(
    sources: &[MixSource],
    sample_rate: u32,
    mut stage: Option<&mut dyn TrackStage>,
) -> Option<MixResult> {
    if sources.is_empty() {
        return None;
    }

    let frame_count = sources
        .iter()
        .map(|s| s.audio.frame_count())
        .max()
        .unwrap_or(0);

    // Power normalization over the number of sources present, not the number
    // contributing non-silence at a given frame.
    let norm = 1.0 / (sources.len() as Sample).sqrt();

    let mut buffer = StereoBuffer::silence(frame_count);
    let mixed = buffer.as_mut_slice();

    for source in sources {
        let left = &source.audio.channels[0];
        // Mono upmix: channel 0 feeds both lanes. Channels past 2 are ignored.
        let right = source.audio.channels.get(1).unwrap_or(left);

        match stage {
            None => {
                let scale = source.gain * norm;
                for (i, &l) in left.iter().enumerate() {
                    // Channels are equal-length after decode, but sources can
                    // be hand-built; a short right lane reads as silence
                    let r = right.get(i).copied().unwrap_or(0.0);
                    mixed[i] += StereoSample::new(l * scale, r * scale);
                }
            }
            Some(ref mut stage) => {
                // Build the gain-staged lane, run the stage, then accumulate
                let mut lane = StereoBuffer::silence(left.len());
                let lane_slice = lane.as_mut_slice();
                for (i, &l) in left.iter().enumerate() {
                    let r = right.get(i).copied().unwrap_or(0.0);
                    lane_slice[i] = StereoSample::new(l, r) * source.gain;
                }
                stage.process(&mut lane);
                for (i, sample) in lane.iter().enumerate() {
                    mixed[i] += *sample * norm;
                }
            }
        }
    }

    Some(MixResult {
        sample_rate,
        buffer,
    })
}
