//! Emulator contract.
//!
//! The scanner drives any type implementing `ChipEmulator`: a live UADE
//! binding, the trace replayer in `crate::trace`, or a scripted test double.

use serde::{Deserialize, Serialize};

use super::memory::MemoryReader;
use super::snapshot::SnapshotAccessor;

/// Subsong range reported by the replayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubsongRange {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

/// Song metadata reported by the emulator.
///
/// Every field is optional since not every backend knows which replayer
/// is running.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SongInfo {
    /// Name of the replayer (for example "ProTracker" or "TFMX")
    pub player_name: Option<String>,
    /// Name of the module format
    pub format_name: Option<String>,
    /// Subsong range, when the replayer exposes one
    pub subsong: Option<SubsongRange>,
}

/// A Paula emulator the scanner can drive.
pub trait ChipEmulator: SnapshotAccessor + MemoryReader {
    /// Render up to `max_frames` stereo frames, discarding the audio.
    ///
    /// # Returns
    ///
    /// The number of frames actually rendered. Zero or a negative value
    /// signals end of song or an error; the scanner stops on either.
    fn render_silent(&mut self, max_frames: usize) -> i32;

    /// Enable or disable song looping.
    ///
    /// The scanner disables looping before it starts so that a song end
    /// surfaces as a zero-length render.
    fn set_looping(&mut self, enabled: bool);

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Song metadata, if the backend knows it.
    fn song_info(&self) -> SongInfo {
        SongInfo::default()
    }
}
