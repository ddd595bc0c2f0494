//! Mixer Session
//!
//! Coordinates the track store with background decoding and mix recomputes.
//!
//! # Architecture
//!
//! ```text
//! Caller (UI / CLI)
//!     │
//!     │ add_files() / remove_track() / set_gain()
//!     ▼
//! MixerSession (owns TrackStore, generation counter)
//!     │                              │
//!     │ rayon::spawn per file        │ MixJob (mpsc, coalesced to newest)
//!     ▼                              ▼
//! Decode workers              mix-worker thread
//!     │                              │ mix() + wav::encode()
//!     │ DecodeFinished               │ MixFinished { generation, .. }
//!     └──────────────┬───────────────┘
//!                    ▼
//!           SessionEvent (mpsc), drained by pump()
//! ```
//!
//! Every mix-affecting mutation bumps the generation. A finished mix only
//! commits when its generation still matches, so a stale result can never
//! overwrite the outcome of a newer edit.

mod message;
mod service;

pub use message::{MixJob, SessionEvent};
pub use service::MixerSession;

use crate::mix::MixResult;
use crate::wav;

/// A committed mix: decoded samples plus the encoded WAV container
#[derive(Debug, Clone)]
pub struct MixArtifact {
    pub result: MixResult,
    /// Complete WAV file bytes, ready to write or download
    pub wav: Vec<u8>,
    /// Suggested download filename
    pub filename: &'static str,
}

impl MixArtifact {
    pub fn new(result: MixResult, wav: Vec<u8>) -> Self {
        Self {
            result,
            wav,
            filename: wav::MIX_FILENAME,
        }
    }
}
