//! Channel events.
//!
//! This module defines the events derived from two successive register
//! snapshots: note triggers and sample reassignments.

use super::snapshot::{CHANNELS, ChannelSnapshot, TickSnapshot};

/// Events that can be derived from a pair of channel snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A new note started on the channel
    ///
    /// Emitted when the period changes to a nonzero value while DMA is on.
    Trigger {
        /// Channel number that was triggered
        channel: u8,
        /// Period at trigger time
        period: u32,
        /// Sample assigned at trigger time
        sample_pointer: u32,
    },

    /// The sample pointer changed
    ///
    /// Emitted both for new instruments and for replayers that move the
    /// pointer into the loop part of the current instrument.
    SampleChange {
        /// Channel number
        channel: u8,
        /// Pointer before the change
        previous: u32,
        /// Pointer after the change
        current: u32,
        /// Latched length (words) at the time of the change
        pending_length_words: u32,
    },
}

/// Whether `current` is a note trigger relative to `previous`.
pub fn is_trigger(previous: &ChannelSnapshot, current: &ChannelSnapshot) -> bool {
    current.period != previous.period && current.period > 0 && current.dma_active
}

/// Derive events for one channel.
///
/// # Arguments
///
/// * `channel` - Channel number stamped into the events
/// * `previous` - Channel state at the previous tick
/// * `current` - Channel state at the current tick
///
/// # Returns
///
/// Zero, one or two events. A trigger is listed before a sample change.
pub fn detect_events(
    channel: u8,
    previous: &ChannelSnapshot,
    current: &ChannelSnapshot,
) -> Vec<ChannelEvent> {
    let mut events = Vec::new();
    if is_trigger(previous, current) {
        events.push(ChannelEvent::Trigger {
            channel,
            period: current.period,
            sample_pointer: current.sample_pointer,
        });
    }
    if current.sample_pointer != previous.sample_pointer {
        events.push(ChannelEvent::SampleChange {
            channel,
            previous: previous.sample_pointer,
            current: current.sample_pointer,
            pending_length_words: current.pending_length_words,
        });
    }
    events
}

/// Derive events for all channels between two ticks.
pub fn tick_events(previous: &TickSnapshot, current: &TickSnapshot) -> Vec<ChannelEvent> {
    (0..CHANNELS)
        .flat_map(|ch| detect_events(ch as u8, &previous.channels[ch], &current.channels[ch]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(period: u32, pointer: u32) -> ChannelSnapshot {
        ChannelSnapshot {
            period,
            volume: 64,
            dma_active: true,
            sample_pointer: pointer,
            sample_length_words: 512,
            ..Default::default()
        }
    }

    #[test]
    fn test_period_change_with_dma_triggers() {
        let events = detect_events(1, &playing(428, 0x1000), &playing(381, 0x1000));
        assert_eq!(
            events,
            vec![ChannelEvent::Trigger {
                channel: 1,
                period: 381,
                sample_pointer: 0x1000,
            }]
        );
    }

    #[test]
    fn test_no_trigger_without_dma_or_for_zero_period() {
        let mut off = playing(381, 0x1000);
        off.dma_active = false;
        assert!(!is_trigger(&playing(428, 0x1000), &off));
        assert!(!is_trigger(&playing(428, 0x1000), &playing(0, 0x1000)));
        assert!(!is_trigger(&playing(428, 0x1000), &playing(428, 0x1000)));
    }

    #[test]
    fn test_pointer_move_reports_sample_change() {
        let mut current = playing(428, 0x1400);
        current.pending_length_words = 256;
        let mut prev_tick = TickSnapshot::default();
        prev_tick.channels[3] = playing(428, 0x1000);
        let mut cur_tick = TickSnapshot::default();
        cur_tick.channels[3] = current;
        let events = tick_events(&prev_tick, &cur_tick);
        assert_eq!(
            events,
            vec![ChannelEvent::SampleChange {
                channel: 3,
                previous: 0x1000,
                current: 0x1400,
                pending_length_words: 256,
            }]
        );
    }
}
