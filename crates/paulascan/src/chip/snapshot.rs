//! Register snapshots.
//!
//! This module provides the per-channel and per-tick register snapshot
//! types, and the `SnapshotAccessor` trait emulators implement to expose
//! them.

use serde::{Deserialize, Serialize};

/// Paula has 4 audio channels
pub const CHANNELS: usize = 4;

/// Register state of one Paula channel at one point in time.
///
/// `sample_pointer` and `sample_length_words` change together when the
/// replayer assigns a new sample. The `pending_*` fields hold the latched
/// values Paula reloads at the end of the current DMA block, which is how
/// loop tails become visible before they reach the main fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    /// Period register (0 = silent/uninitialized)
    pub period: u32,
    /// Volume register (0-64)
    pub volume: u32,
    /// Whether audio DMA is enabled for this channel
    pub dma_active: bool,
    /// Base address of the assigned sample in chip memory (0 = none)
    pub sample_pointer: u32,
    /// Current DMA read position
    pub playback_pointer: u32,
    /// Sample length in 16-bit words
    pub sample_length_words: u32,
    /// Latched period applied on the next reload
    pub pending_period: u32,
    /// Latched length (words) applied on the next reload
    pub pending_length_words: u32,
}

impl ChannelSnapshot {
    /// Whether the channel is feeding samples at a real pitch.
    pub fn is_audible(&self) -> bool {
        self.dma_active && self.period > 0
    }

    /// Assigned sample length in bytes.
    pub fn sample_length_bytes(&self) -> u32 {
        self.sample_length_words.saturating_mul(2)
    }
}

/// CIA timer state as reported by the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CiaState {
    /// CIA-B timer A reload value (0 when the replayer does not use it)
    pub timer_a_value: u32,
    /// Vertical blank rate in Hz (50 for PAL, 60 for NTSC)
    pub vblank_hz: u32,
}

/// Full chip state captured after one rendered chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub channels: [ChannelSnapshot; CHANNELS],
    pub cia_timer_value: u32,
    pub vblank_hz: u32,
    /// Cumulative rendered frames at capture time
    pub frame_index: u64,
}

impl TickSnapshot {
    /// Capture the current state of `accessor`, stamped with `frame_index`.
    pub fn capture<A>(accessor: &A, frame_index: u64) -> Self
    where
        A: SnapshotAccessor + ?Sized,
    {
        let cia = accessor.cia_state();
        Self {
            channels: accessor.channel_snapshot(),
            cia_timer_value: cia.timer_a_value,
            vblank_hz: cia.vblank_hz,
            frame_index,
        }
    }

    /// Get a channel by index
    ///
    /// # Returns
    ///
    /// Some(&ChannelSnapshot) if the index is below `CHANNELS`, None otherwise
    pub fn channel(&self, channel: usize) -> Option<&ChannelSnapshot> {
        self.channels.get(channel)
    }
}

/// Read-only access to Paula and CIA registers.
///
/// Implementations must be cheap: the tick sampler calls both methods once
/// per rendered chunk. Queries never affect emulation state.
pub trait SnapshotAccessor {
    /// Current register state of all four channels.
    fn channel_snapshot(&self) -> [ChannelSnapshot; CHANNELS];

    /// Current CIA timer state.
    fn cia_state(&self) -> CiaState;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl SnapshotAccessor for Fixed {
        fn channel_snapshot(&self) -> [ChannelSnapshot; CHANNELS] {
            let mut channels = [ChannelSnapshot::default(); CHANNELS];
            channels[2] = ChannelSnapshot {
                period: 428,
                volume: 64,
                dma_active: true,
                sample_pointer: 0x2_0000,
                sample_length_words: 1000,
                ..Default::default()
            };
            channels
        }

        fn cia_state(&self) -> CiaState {
            CiaState {
                timer_a_value: 14_186,
                vblank_hz: 50,
            }
        }
    }

    #[test]
    fn test_capture_copies_channels_and_cia() {
        let tick = TickSnapshot::capture(&Fixed, 1280);
        assert_eq!(tick.frame_index, 1280);
        assert_eq!(tick.cia_timer_value, 14_186);
        assert_eq!(tick.vblank_hz, 50);
        let ch = tick.channel(2).unwrap();
        assert!(ch.is_audible());
        assert_eq!(ch.sample_length_bytes(), 2000);
        assert!(tick.channel(4).is_none());
    }
}
