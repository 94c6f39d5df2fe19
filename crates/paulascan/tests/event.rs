mod common;

use common::*;
use paulascan::chip::TickSnapshot;
use paulascan::chip::event::{ChannelEvent, tick_events};
use paulascan::scan::sampler::capture_ticks;

fn song_events(rows: usize) -> Vec<(u64, ChannelEvent)> {
    let mut emu = looping_song(rows);
    let end = emu.row_start(rows);
    let ticks = capture_ticks(&mut emu, 128, end, u64::MAX);
    let mut previous = TickSnapshot::default();
    let mut events = Vec::new();
    for tick in ticks {
        events.extend(
            tick_events(&previous, &tick)
                .into_iter()
                .map(|e| (tick.frame_index, e)),
        );
        previous = tick;
    }
    events
}

#[test]
fn test_first_tick_triggers_and_assigns_samples() {
    let events = song_events(4);
    let first: Vec<ChannelEvent> = events
        .iter()
        .filter(|(frame, _)| *frame == 128)
        .map(|(_, e)| *e)
        .collect();
    assert_eq!(
        first,
        vec![
            ChannelEvent::Trigger {
                channel: 0,
                period: 856,
                sample_pointer: MELODY_SAMPLE
            },
            ChannelEvent::SampleChange {
                channel: 0,
                previous: 0,
                current: MELODY_SAMPLE,
                pending_length_words: 1
            },
            ChannelEvent::Trigger {
                channel: 1,
                period: 428,
                sample_pointer: PAD_SAMPLE
            },
            ChannelEvent::SampleChange {
                channel: 1,
                previous: 0,
                current: PAD_SAMPLE,
                pending_length_words: 200
            },
        ]
    );
}

#[test]
fn test_loop_reload_is_a_sample_change_without_trigger() {
    let events = song_events(4);
    let reload: Vec<&(u64, ChannelEvent)> = events
        .iter()
        .filter(|(frame, e)| {
            *frame > 128
                && matches!(
                    e,
                    ChannelEvent::Trigger { channel: 1, .. }
                        | ChannelEvent::SampleChange { channel: 1, .. }
                )
        })
        .collect();
    assert_eq!(reload.len(), 1);
    // Tick 3 of row 0 starts at frame 2646; the first snapshot past it is 2688.
    assert_eq!(
        *reload[0],
        (
            2_688,
            ChannelEvent::SampleChange {
                channel: 1,
                previous: PAD_SAMPLE,
                current: PAD_SAMPLE + PAD_LOOP_START,
                pending_length_words: 200
            }
        )
    );
}

#[test]
fn test_one_melody_trigger_per_row() {
    let rows = 12;
    let events = song_events(rows);
    let triggers = events
        .iter()
        .filter(|(_, e)| matches!(e, ChannelEvent::Trigger { channel: 0, .. }))
        .count();
    assert_eq!(triggers, rows);
}
