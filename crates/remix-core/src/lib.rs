//! Remix Core - Multi-track audio mixing engine
//!
//! Decodes uploaded audio files to a common sample rate, mixes them with
//! per-track gain and power normalization, and encodes the result as a
//! 16-bit PCM WAV file. Remote clients cover stem splitting and
//! YouTube-to-MP3 conversion.

pub mod config;
pub mod decode;
pub mod mix;
pub mod remote;
pub mod session;
pub mod store;
pub mod types;
pub mod wav;

pub use types::*;
