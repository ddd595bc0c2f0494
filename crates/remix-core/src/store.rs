//! Track store - the ordered list of uploaded tracks and their state
//!
//! Single source of truth for the session. Mutations are synchronous; the
//! async parts (decode completion, mix recompute) are coordinated by the
//! session layer and resolve back into the store by stable [`TrackId`].

use std::sync::Arc;

use crate::decode::DecodedAudio;
use crate::mix::EffectParams;
use crate::types::{Sample, TrackId, MAX_TRACKS};

/// Decode lifecycle of a track's raw bytes
#[derive(Debug, Clone, Default)]
pub enum DecodeState {
    /// Decode queued or in flight
    #[default]
    Pending,
    /// Decoded samples at the engine rate, shared with mix snapshots
    Ready(Arc<DecodedAudio>),
    /// Decode failed; the track stays visible so the user can see which file
    /// failed, but it is excluded from every mix
    Failed(String),
}

/// One uploaded audio source
#[derive(Debug, Clone)]
pub struct Track {
    /// Stable identity, independent of list position
    pub id: TrackId,
    /// Original filename, for display
    pub name: String,
    /// Immutable original file content (owned for the track's lifetime)
    raw: Arc<Vec<u8>>,
    /// User gain in [0, 1]
    gain: Sample,
    /// Playback cursor in seconds; cosmetic only, never affects mixing
    cursor: f64,
    /// Per-track effect settings. Stored and round-tripped but not yet
    /// applied during mixing.
    effects: EffectParams,
    decode: DecodeState,
}

impl Track {
    /// User gain in [0, 1]
    pub fn gain(&self) -> Sample {
        self.gain
    }

    /// Playback cursor in seconds
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Per-track effect settings
    pub fn effects(&self) -> &EffectParams {
        &self.effects
    }

    /// Current decode state
    pub fn decode_state(&self) -> &DecodeState {
        &self.decode
    }

    /// Decoded audio, if the decode has succeeded
    pub fn decoded(&self) -> Option<&Arc<DecodedAudio>> {
        match &self.decode {
            DecodeState::Ready(audio) => Some(audio),
            _ => None,
        }
    }

    /// The original file bytes
    pub fn raw_bytes(&self) -> &Arc<Vec<u8>> {
        &self.raw
    }

    /// Duration in seconds (0.0 until decoded)
    pub fn duration_seconds(&self) -> f64 {
        self.decoded().map(|a| a.duration_seconds()).unwrap_or(0.0)
    }
}

/// Ordered collection of tracks, capped at [`MAX_TRACKS`]
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: Vec<Track>,
    next_id: u64,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append tracks for the given `(filename, bytes)` pairs, in order.
    ///
    /// The combined list is silently truncated to [`MAX_TRACKS`]: files past
    /// the cap are dropped, not rejected with an error. Returns the ids of the
    /// tracks actually admitted; their decode state starts as `Pending`.
    pub fn add_files(&mut self, files: Vec<(String, Vec<u8>)>) -> Vec<TrackId> {
        let room = MAX_TRACKS.saturating_sub(self.tracks.len());
        let admitted = files.len().min(room);
        if admitted < files.len() {
            log::warn!(
                "Track limit reached: dropping {} of {} new files",
                files.len() - admitted,
                files.len()
            );
        }

        let mut ids = Vec::with_capacity(admitted);
        for (name, bytes) in files.into_iter().take(admitted) {
            let id = TrackId(self.next_id);
            self.next_id += 1;
            log::info!("Added {} as {} ({} bytes)", name, id, bytes.len());
            self.tracks.push(Track {
                id,
                name,
                raw: Arc::new(bytes),
                gain: 1.0,
                cursor: 0.0,
                effects: EffectParams::default(),
                decode: DecodeState::Pending,
            });
            ids.push(id);
        }
        ids
    }

    /// Remove a track and all its per-track state as one operation.
    ///
    /// Relative order of the remaining tracks is unchanged. Returns false if
    /// the id is unknown (already removed).
    pub fn remove(&mut self, id: TrackId) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.id != id);
        let removed = self.tracks.len() != before;
        if removed {
            log::info!("Removed {}", id);
        }
        removed
    }

    /// Set a track's gain, clamped to [0, 1] before storage
    pub fn set_gain(&mut self, id: TrackId, gain: Sample) -> bool {
        match self.track_mut(id) {
            Some(track) => {
                track.gain = gain.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    /// Replace a track's effect settings
    pub fn set_effects(&mut self, id: TrackId, effects: EffectParams) -> bool {
        match self.track_mut(id) {
            Some(track) => {
                track.effects = effects;
                true
            }
            None => false,
        }
    }

    /// Set a track's playback cursor, clamped to [0, duration]
    pub fn set_cursor(&mut self, id: TrackId, seconds: f64) -> bool {
        match self.tracks.iter_mut().find(|t| t.id == id) {
            Some(track) => {
                let duration = match &track.decode {
                    DecodeState::Ready(audio) => audio.duration_seconds(),
                    _ => 0.0,
                };
                track.cursor = seconds.clamp(0.0, duration);
                true
            }
            None => false,
        }
    }

    /// Record a decode outcome for a track. A no-op if the track was removed
    /// while the decode was in flight.
    pub fn resolve_decode(
        &mut self,
        id: TrackId,
        result: Result<DecodedAudio, String>,
    ) -> bool {
        match self.track_mut(id) {
            Some(track) => {
                track.decode = match result {
                    Ok(audio) => DecodeState::Ready(Arc::new(audio)),
                    Err(err) => {
                        log::warn!("Decode of {} ({}) failed: {}", id, track.name, err);
                        DecodeState::Failed(err)
                    }
                };
                true
            }
            None => {
                log::info!("Dropping decode result for removed {}", id);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    /// Tracks in upload order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}
