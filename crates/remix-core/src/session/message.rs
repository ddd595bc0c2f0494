//! Messages between the session and its worker threads
//!
//! Decode workers and the mix worker report back over an mpsc channel; the
//! session drains it on [`pump`](super::MixerSession::pump) and resolves each
//! message against current state by id or generation.

use crate::decode::DecodedAudio;
use crate::mix::{MixResult, MixSource};
use crate::types::TrackId;

/// A mix recompute request sent to the mix worker
///
/// `generation` tags the snapshot; the session only commits the outcome if it
/// still matches the latest generation when it arrives.
pub struct MixJob {
    pub generation: u64,
    pub sources: Vec<MixSource>,
    pub sample_rate: u32,
}

/// Events flowing back from worker threads to the session
pub enum SessionEvent {
    /// A track's decode finished, successfully or not
    DecodeFinished {
        id: TrackId,
        result: Result<DecodedAudio, String>,
    },

    /// The mix worker finished a job
    MixFinished {
        generation: u64,
        result: MixResult,
        wav: Vec<u8>,
    },
}
