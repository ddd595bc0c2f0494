//! Common types for Remix
//!
//! This module contains the fundamental audio types used throughout the Remix
//! mixing core, including the stereo buffer and the stable track identifier.

use std::ops::{Index, IndexMut};

/// Default engine sample rate (44.1kHz). The actual rate is taken from
/// configuration.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Maximum number of tracks in a session. Uploads past this are silently
/// dropped, never rejected with an error.
pub const MAX_TRACKS: usize = 8;

/// Audio sample type (32-bit float for processing, stored as 16-bit in files)
pub type Sample = f32;

/// Stable, position-independent track identifier.
///
/// Async results (decode completions, mix snapshots) resolve by `TrackId`,
/// so in-flight work can never land on the wrong track after the list has
/// been reordered by a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A buffer of stereo samples
///
/// The primary audio buffer type of the mixing core. Provides access to the
/// samples both as frames and as an interleaved f32 view for serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Create a buffer from interleaved samples [L, R, L, R, ...]
    pub fn from_interleaved(interleaved: &[Sample]) -> Self {
        assert!(interleaved.len() % 2 == 0, "Interleaved buffer must have even length");
        let samples = interleaved
            .chunks_exact(2)
            .map(|chunk| StereoSample::new(chunk[0], chunk[1]))
            .collect();
        Self { samples }
    }

    /// Create a buffer from separate left and right channel slices
    pub fn from_channels(left: &[Sample], right: &[Sample]) -> Self {
        assert_eq!(left.len(), right.len(), "Channel lengths must match");
        let samples = left
            .iter()
            .zip(right.iter())
            .map(|(&l, &r)| StereoSample::new(l, r))
            .collect();
        Self { samples }
    }

    /// Get the number of stereo frames in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get a slice of the samples
    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    /// Get a mutable slice of the samples
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Get a zero-copy view of samples as interleaved f32 [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Scale all samples by a factor
    pub fn scale(&mut self, factor: Sample) {
        for sample in &mut self.samples {
            *sample *= factor;
        }
    }

    /// Get an iterator over the samples
    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    /// Get the peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

impl Default for StereoBuffer {
    fn default() -> Self {
        Self { samples: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_operations() {
        let a = StereoSample::new(1.0, 2.0);
        let b = StereoSample::new(0.5, 0.5);

        let sum = a + b;
        assert_eq!(sum.left, 1.5);
        assert_eq!(sum.right, 2.5);

        let scaled = a * 0.5;
        assert_eq!(scaled.left, 0.5);
        assert_eq!(scaled.right, 1.0);
    }

    #[test]
    fn test_stereo_buffer_from_interleaved() {
        let interleaved = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let buffer = StereoBuffer::from_interleaved(&interleaved);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer[0].left, 1.0);
        assert_eq!(buffer[0].right, 2.0);
        assert_eq!(buffer[2].left, 5.0);
        assert_eq!(buffer[2].right, 6.0);
    }

    #[test]
    fn test_interleaved_view_is_zero_copy_layout() {
        let buffer = StereoBuffer::from_channels(&[1.0, 3.0], &[2.0, 4.0]);
        assert_eq!(buffer.as_interleaved(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_track_id_display() {
        assert_eq!(TrackId(7).to_string(), "track-7");
    }
}
