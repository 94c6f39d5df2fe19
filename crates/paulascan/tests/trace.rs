mod common;

use common::*;
use paulascan::chip::{ChipEmulator, MemoryReader, SnapshotAccessor, SongInfo, SubsongRange};
use paulascan::trace::{TraceCommand, TraceDocument, TraceEmulator, TraceRecorder, parse_trace};
use paulascan::{ParseError, ScanConfig, Scanner};

fn recorded_song(rows: usize) -> (paulascan::ScanResult, TraceDocument) {
    let mut emu = looping_song(rows);
    emu.set_song_info(SongInfo {
        player_name: Some("ProTracker".into()),
        format_name: Some("MOD".into()),
        subsong: Some(SubsongRange {
            min: 0,
            max: 0,
            default: 0,
        }),
    });
    let mut recorder = TraceRecorder::new(emu);
    recorder.set_chunk_frames(128);
    let live = Scanner::new(ScanConfig::default())
        .scan(&mut recorder)
        .unwrap();
    assert_eq!(recorder.ticks_recorded() as u64, live.ticks_scanned);
    (live, recorder.into_document())
}

#[test]
fn test_replayed_trace_scans_identically() {
    let (live, document) = recorded_song(300);
    let bytes: Vec<u8> = (&document).into();
    let parsed = parse_trace(&bytes).unwrap();
    assert_eq!(parsed, document);

    let mut replay = TraceEmulator::new(parsed);
    let replayed = Scanner::new(ScanConfig::default())
        .scan(&mut replay)
        .unwrap();
    assert_eq!(replayed, live);
    assert_eq!(replayed.info.player_name.as_deref(), Some("ProTracker"));
    assert_eq!(replayed.samples.len(), 4);
}

#[test]
fn test_recorded_header_and_memory() {
    let (live, document) = recorded_song(60);
    let header = &document.header;
    assert_eq!(header.sample_rate, SAMPLE_RATE);
    assert_eq!(header.vblank_hz, 50);
    assert_eq!(header.chunk_frames, 128);
    assert_eq!(header.tick_count as u64, live.ticks_scanned);
    assert_eq!(document.total_frames(), live.frames_scanned);
    assert_eq!(document.commands.last(), Some(&TraceCommand::EndOfData));

    // Reads already covered by earlier blocks add nothing: the pad's loop
    // lies inside its first read and the late sample's zero reads match
    // unwritten memory.
    let (blocks, bytes) = document.memory_stats();
    assert_eq!(blocks, 3);
    assert_eq!(bytes, 1_024 + 2_000 + 128);
}

#[test]
fn test_trace_emulator_replays_registers_and_memory() {
    let (_, document) = recorded_song(60);
    let first_tick = *document.ticks().next().unwrap();

    let mut replay = TraceEmulator::new(document);
    assert_eq!(replay.sample_rate(), SAMPLE_RATE);
    assert_eq!(replay.render_silent(128), 128);
    assert_eq!(replay.channel_snapshot(), first_tick.channels);
    assert_eq!(replay.cia_state().timer_a_value, CIA_125_BPM);
    assert_eq!(replay.read_memory(MELODY_SAMPLE, 4), vec![1, 2, 3, 4]);
    // Not read during the first tick of the recording.
    assert_eq!(replay.read_memory(LATE_SAMPLE, 4), vec![0, 0, 0, 0]);
}

#[test]
fn test_truncated_trace_is_rejected() {
    let (_, document) = recorded_song(20);
    let command_count = document.commands.len();
    let bytes: Vec<u8> = document.into();
    // Drop the end marker and the last byte of the final tick.
    let cut = &bytes[..bytes.len() - 2];
    let err = TraceDocument::try_from(cut).unwrap_err();
    assert_eq!(err, ParseError::UnexpectedEof);
    assert_eq!(err.to_string(), "unexpected end of input");

    // Dropping only the end marker leaves a complete stream.
    let unterminated = TraceDocument::try_from(&bytes[..bytes.len() - 1]).unwrap();
    assert_eq!(unterminated.commands.len() + 1, command_count);
}
