//! Mixer session: track store plus background decode and mix workers
//!
//! The session is single-threaded at its surface. Mutations update the store
//! synchronously and, when they can change the mix, bump a generation counter
//! and hand a snapshot to the mix worker. Worker results come back over an
//! mpsc channel and are applied by [`MixerSession::pump`], so callers decide
//! when state transitions become visible.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::message::{MixJob, SessionEvent};
use super::MixArtifact;
use crate::decode::decode_bytes;
use crate::mix::{mix, MixSource};
use crate::store::{DecodeState, TrackStore};
use crate::types::{Sample, TrackId};
use crate::wav;

pub struct MixerSession {
    store: TrackStore,
    sample_rate: u32,

    /// Latest mix-affecting state version
    generation: u64,
    /// Generation of the committed artifact (or of the empty state)
    committed_generation: u64,
    artifact: Option<MixArtifact>,
    pending_decodes: usize,

    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    mix_tx: Sender<MixJob>,
}

impl MixerSession {
    /// Create a session mixing at the given engine rate. Spawns the mix
    /// worker thread, which lives until the session is dropped.
    pub fn new(sample_rate: u32) -> Self {
        let (events_tx, events_rx) = channel();
        let (mix_tx, mix_rx) = channel::<MixJob>();

        let worker_tx = events_tx.clone();
        std::thread::Builder::new()
            .name("mix-worker".to_string())
            .spawn(move || mix_worker(mix_rx, worker_tx))
            .expect("Failed to spawn mix worker thread");

        Self {
            store: TrackStore::new(),
            sample_rate,
            generation: 0,
            committed_generation: 0,
            artifact: None,
            pending_decodes: 0,
            events_tx,
            events_rx,
            mix_tx,
        }
    }

    /// Add uploaded files as tracks and start decoding them in the
    /// background. Files past the track limit are silently dropped.
    pub fn add_files(&mut self, files: Vec<(String, Vec<u8>)>) -> Vec<TrackId> {
        let ids = self.store.add_files(files);
        for &id in &ids {
            let track = self.store.track(id).expect("just added");
            let raw = Arc::clone(track.raw_bytes());
            let name = track.name.clone();
            let rate = self.sample_rate;
            let tx = self.events_tx.clone();

            self.pending_decodes += 1;
            rayon::spawn(move || {
                let result =
                    decode_bytes(raw.as_ref().clone(), &name, rate).map_err(|e| e.to_string());
                // Session may be gone; nothing to do then
                let _ = tx.send(SessionEvent::DecodeFinished { id, result });
            });
        }
        ids
    }

    /// Remove a track. Its gain, cursor and decoded audio go with it, and the
    /// mix is recomputed without it.
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        let removed = self.store.remove(id);
        if removed {
            self.schedule_remix();
        }
        removed
    }

    /// Set a track's gain (clamped to [0, 1]) and recompute the mix
    pub fn set_gain(&mut self, id: TrackId, gain: Sample) -> bool {
        let changed = self.store.set_gain(id, gain);
        if changed {
            self.schedule_remix();
        }
        changed
    }

    /// Set a track's playback cursor. Never triggers a recompute.
    pub fn set_cursor(&mut self, id: TrackId, seconds: f64) -> bool {
        self.store.set_cursor(id, seconds)
    }

    /// Replace a track's effect settings. No recompute: the engine does not
    /// apply effects yet.
    pub fn set_effects(&mut self, id: TrackId, effects: crate::mix::EffectParams) -> bool {
        self.store.set_effects(id, effects)
    }

    /// Apply pending worker results. Returns the number of events handled.
    ///
    /// Decode results resolve into the store by id (dropped if the track was
    /// removed in the meantime) and trigger a recompute. Mix results commit
    /// only if their generation is still the latest; stale ones are discarded.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.events_rx.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            handled += 1;

            match event {
                SessionEvent::DecodeFinished { id, result } => {
                    self.pending_decodes = self.pending_decodes.saturating_sub(1);
                    let ok = result.is_ok();
                    if self.store.resolve_decode(id, result) && ok {
                        self.schedule_remix();
                    }
                }
                SessionEvent::MixFinished {
                    generation,
                    result,
                    wav,
                } => {
                    if generation == self.generation {
                        log::debug!(
                            "Committing mix generation {} ({} frames)",
                            generation,
                            result.frame_count()
                        );
                        self.artifact = Some(MixArtifact::new(result, wav));
                        self.committed_generation = generation;
                    } else {
                        log::debug!(
                            "Discarding stale mix generation {} (current {})",
                            generation,
                            self.generation
                        );
                    }
                }
            }
        }
        handled
    }

    /// True while a recompute for the latest state has not yet committed
    pub fn is_mixing(&self) -> bool {
        self.committed_generation != self.generation
    }

    /// Decodes still in flight
    pub fn pending_decodes(&self) -> usize {
        self.pending_decodes
    }

    /// The committed mix, if any
    pub fn artifact(&self) -> Option<&MixArtifact> {
        self.artifact.as_ref()
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    /// Pump until all decodes and the latest mix have settled, or the
    /// timeout expires. Returns true if the session settled.
    pub fn wait_settled(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.pending_decodes == 0 && !self.is_mixing() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Snapshot the mixable tracks and hand them to the mix worker under a
    /// fresh generation. With nothing to mix the artifact is cleared
    /// immediately and no job is sent.
    fn schedule_remix(&mut self) {
        self.generation += 1;

        let sources: Vec<MixSource> = self
            .store
            .tracks()
            .iter()
            .filter_map(|track| match track.decode_state() {
                DecodeState::Ready(audio) => Some(MixSource {
                    audio: Arc::clone(audio),
                    gain: track.gain(),
                }),
                DecodeState::Pending | DecodeState::Failed(_) => None,
            })
            .collect();

        if sources.is_empty() {
            self.artifact = None;
            self.committed_generation = self.generation;
            return;
        }

        log::debug!(
            "Scheduling mix generation {} with {} sources",
            self.generation,
            sources.len()
        );
        let _ = self.mix_tx.send(MixJob {
            generation: self.generation,
            sources,
            sample_rate: self.sample_rate,
        });
    }
}

/// Mix worker loop. Coalesces queued jobs to the newest before computing, so
/// a burst of edits costs one mix instead of one per edit.
fn mix_worker(rx: Receiver<MixJob>, tx: Sender<SessionEvent>) {
    while let Ok(mut job) = rx.recv() {
        while let Ok(newer) = rx.try_recv() {
            job = newer;
        }

        // Jobs always carry at least one source
        let Some(result) = mix(&job.sources, job.sample_rate) else {
            continue;
        };
        let bytes = wav::encode(&result);
        if tx
            .send(SessionEvent::MixFinished {
                generation: job.generation,
                result,
                wav: bytes,
            })
            .is_err()
        {
            break;
        }
    }
    log::debug!("Mix worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mix::MixResult;
    use crate::types::{StereoBuffer, StereoSample};

    const RATE: u32 = 44_100;
    const SETTLE: Duration = Duration::from_secs(10);

    /// A small valid WAV file with the given constant sample value
    fn wav_file(value: f32, frames: usize) -> Vec<u8> {
        let mut buffer = StereoBuffer::silence(frames);
        for sample in buffer.as_mut_slice() {
            *sample = StereoSample::new(value, value);
        }
        wav::encode(&MixResult {
            sample_rate: RATE,
            buffer,
        })
    }

    #[test]
    fn test_single_track_produces_artifact() {
        let mut session = MixerSession::new(RATE);
        session.add_files(vec![("a.wav".to_string(), wav_file(0.5, 100))]);
        assert!(session.wait_settled(SETTLE));

        let artifact = session.artifact().expect("mix committed");
        assert_eq!(artifact.result.frame_count(), 100);
        assert_eq!(artifact.filename, wav::MIX_FILENAME);
        // Single track: no attenuation
        let sample = artifact.result.buffer[50];
        assert!((sample.left - 0.5).abs() < 2.0 / 32767.0);
    }

    #[test]
    fn test_mix_reflects_all_sequential_additions() {
        let mut session = MixerSession::new(RATE);
        session.add_files(vec![("a.wav".to_string(), wav_file(0.4, 100))]);
        // Second add races the first decode and mix; the final artifact must
        // still include both tracks
        session.add_files(vec![("b.wav".to_string(), wav_file(0.4, 200))]);
        assert!(session.wait_settled(SETTLE));

        let artifact = session.artifact().expect("mix committed");
        assert_eq!(artifact.result.frame_count(), 200);
        let expected = 2.0 * 0.4 / (2.0f32).sqrt();
        let sample = artifact.result.buffer[50];
        assert!(
            (sample.left - expected).abs() < 4.0 / 32767.0,
            "got {}, expected {}",
            sample.left,
            expected
        );
    }

    #[test]
    fn test_removing_last_track_clears_artifact() {
        let mut session = MixerSession::new(RATE);
        let ids = session.add_files(vec![("a.wav".to_string(), wav_file(0.5, 50))]);
        assert!(session.wait_settled(SETTLE));
        assert!(session.artifact().is_some());

        session.remove_track(ids[0]);
        assert!(!session.is_mixing());
        assert!(session.artifact().is_none());
        assert!(session.wait_settled(SETTLE));
        assert!(session.artifact().is_none());
    }

    #[test]
    fn test_gain_change_recomputes() {
        let mut session = MixerSession::new(RATE);
        let ids = session.add_files(vec![("a.wav".to_string(), wav_file(0.8, 50))]);
        assert!(session.wait_settled(SETTLE));

        session.set_gain(ids[0], 0.5);
        assert!(session.is_mixing());
        assert!(session.wait_settled(SETTLE));

        let sample = session.artifact().unwrap().result.buffer[10];
        assert!((sample.left - 0.4).abs() < 2.0 / 32767.0);
    }

    #[test]
    fn test_edit_burst_settles_on_latest_value() {
        let mut session = MixerSession::new(RATE);
        let ids = session.add_files(vec![("a.wav".to_string(), wav_file(1.0, 50))]);
        assert!(session.wait_settled(SETTLE));

        // Rapid edits; only the last one may end up committed
        for gain in [0.9, 0.7, 0.5, 0.3, 0.25] {
            session.set_gain(ids[0], gain);
        }
        assert!(session.wait_settled(SETTLE));
        assert!(!session.is_mixing());

        let sample = session.artifact().unwrap().result.buffer[10];
        assert!((sample.left - 0.25).abs() < 2.0 / 32767.0);
    }

    #[test]
    fn test_failed_decode_excluded_from_mix() {
        let mut session = MixerSession::new(RATE);
        session.add_files(vec![
            ("good.wav".to_string(), wav_file(0.5, 100)),
            ("bad.bin".to_string(), vec![0xde, 0xad, 0xbe, 0xef]),
        ]);
        assert!(session.wait_settled(SETTLE));

        // The failed track is excluded from the sum and from N
        let artifact = session.artifact().expect("good track still mixes");
        let sample = artifact.result.buffer[10];
        assert!((sample.left - 0.5).abs() < 2.0 / 32767.0);
        assert_eq!(session.store().len(), 2);
    }

    #[test]
    fn test_cursor_moves_do_not_remix() {
        let mut session = MixerSession::new(RATE);
        let ids = session.add_files(vec![("a.wav".to_string(), wav_file(0.5, 50))]);
        assert!(session.wait_settled(SETTLE));

        session.set_cursor(ids[0], 0.0005);
        assert!(!session.is_mixing());
    }

    #[test]
    fn test_remove_while_decode_in_flight() {
        let mut session = MixerSession::new(RATE);
        let ids = session.add_files(vec![("a.wav".to_string(), wav_file(0.5, 50))]);
        // Remove before pumping the decode result
        session.remove_track(ids[0]);
        assert!(session.wait_settled(SETTLE));
        assert!(session.artifact().is_none());
        assert_eq!(session.store().len(), 0);
    }
}
