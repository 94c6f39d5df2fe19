use std::collections::BTreeMap;
use std::path::Path;

use comfy_table::{Cell, ContentArrangement, Table, presets::NOTHING};
use paulascan::ScanResult;
use paulascan::chip::period::{find_closest_period, generate_12edo_period_table, period_to_hz};
use paulascan::scan::{ChannelRowEntry, Effect, SampleRecord, Termination};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.into_iter().map(Cell::new).collect::<Vec<_>>());
    table
}

fn termination_text(termination: &Termination) -> String {
    match termination {
        Termination::LoopDetected { row, restart_row } => {
            format!("loop detected at row {} (restarts at row {})", row, restart_row)
        }
        Termination::EndOfSong => "end of song".to_string(),
        Termination::FrameLimit => "frame limit".to_string(),
        Termination::TickLimit => "tick limit".to_string(),
        Termination::RowLimit => "row limit".to_string(),
    }
}

/// Playable loop length, with the latched value when it runs past the PCM.
fn loop_length_text(sample: &SampleRecord) -> String {
    let playable = sample.playable_loop_length_bytes();
    if playable == sample.loop_length_bytes() {
        playable.to_string()
    } else {
        format!("{} (latched {})", playable, sample.loop_length_bytes())
    }
}

fn summary_rows(result: &ScanResult) -> Vec<(String, String)> {
    let info = &result.info;
    let mut rows: Vec<(String, String)> = vec![
        (
            "player".into(),
            info.player_name.clone().unwrap_or_else(|| "(unknown)".into()),
        ),
        (
            "format".into(),
            info.format_name.clone().unwrap_or_else(|| "(unknown)".into()),
        ),
        (
            "sample_rate".into(),
            format!("{} Hz ({})", result.sample_rate, result.clock),
        ),
        (
            "tempo".into(),
            format!(
                "{} BPM, speed {} ({:?}{})",
                result.bpm,
                result.speed,
                result.tempo_source,
                if result.cia_reliable { ", CIA reliable" } else { "" }
            ),
        ),
        ("termination".into(), termination_text(&result.termination)),
        (
            "scanned".into(),
            format!(
                "{:.3} s, {} ticks, {} frames",
                result.seconds_scanned(),
                result.ticks_scanned,
                result.frames_scanned
            ),
        ),
        ("rows".into(), result.rows.len().to_string()),
        ("samples".into(), result.samples.len().to_string()),
    ];
    for change in result.tempo_changes.iter().skip(1) {
        rows.push((
            format!("tempo at row {}", change.row_index),
            format!("{} BPM, speed {}", change.bpm, change.speed),
        ));
    }
    rows
}

/// Tracker-style cell: note, instrument number and effect.
fn channel_cell(entry: &ChannelRowEntry, instruments: &BTreeMap<u32, usize>) -> String {
    let note = match entry.note() {
        Some(note) if entry.triggered => note.to_string(),
        _ => "---".to_string(),
    };
    let instrument = match instruments.get(&entry.sample_pointer) {
        Some(n) if entry.triggered => format!("{:02}", n),
        _ => "..".to_string(),
    };
    format!("{} {} {}", note, instrument, entry.effect)
}

fn print_samples(result: &ScanResult) {
    let table_12edo = generate_12edo_period_table(result.clock);
    let mut table = new_table(vec![
        "#", "pointer", "length", "loop start", "loop length", "period", "note", "rate",
    ]);
    for (n, sample) in result.samples.values().enumerate() {
        let period = sample.typical_period();
        let (note, rate) = match find_closest_period(&table_12edo, period) {
            Ok(entry) => {
                let rate = period_to_hz(period, result.clock.hz())
                    .map(|hz| format!("{:.0} Hz", hz))
                    .unwrap_or_default();
                (entry.note.to_string(), rate)
            }
            Err(_) => ("---".to_string(), String::new()),
        };
        let period_text = if sample.period_observed() {
            period.to_string()
        } else {
            format!("{} (assumed)", period)
        };
        table.add_row(vec![
            Cell::new(format!("{:02}", n + 1)),
            Cell::new(format!("0x{:06X}", sample.pointer())),
            Cell::new(sample.length_bytes()),
            Cell::new(sample.loop_start_bytes()),
            Cell::new(loop_length_text(sample)),
            Cell::new(period_text),
            Cell::new(note),
            Cell::new(rate),
        ]);
    }
    println!("{}", table);
}

fn print_rows(result: &ScanResult, limit: usize) {
    let instruments: BTreeMap<u32, usize> = result
        .samples
        .keys()
        .enumerate()
        .map(|(n, pointer)| (*pointer, n + 1))
        .collect();
    let restart = result.loop_restart_row();
    let mut table = new_table(vec!["row", "ch 1", "ch 2", "ch 3", "ch 4"]);
    let shown = if limit == 0 { result.rows.len() } else { limit };
    for (index, row) in result.rows.iter().enumerate().take(shown) {
        let marker = if restart == Some(index) { ">" } else { " " };
        let mut cells = vec![Cell::new(format!("{}{:04}", marker, index))];
        cells.extend(
            row.channels
                .iter()
                .map(|entry| Cell::new(channel_cell(entry, &instruments))),
        );
        table.add_row(cells);
    }
    println!("{}", table);
    if shown < result.rows.len() {
        println!("... {} more rows", result.rows.len() - shown);
    }
}

/// Print a scan result as tables.
pub fn print_scan(path: &Path, result: &ScanResult, rows: usize) {
    println!("{}", path.display());
    let mut summary = new_table(vec!["Field", "Value"]);
    for (k, v) in summary_rows(result) {
        summary.add_row(vec![Cell::new(k), Cell::new(v)]);
    }
    println!("{}", summary);

    if !result.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }

    if !result.samples.is_empty() {
        println!("\nSamples:");
        print_samples(result);
    }

    if !result.rows.is_empty() {
        println!("\nRows:");
        print_rows(result, rows);
        let effects = result
            .rows
            .iter()
            .flat_map(|row| row.channels.iter())
            .filter(|entry| entry.effect != Effect::None)
            .count();
        println!("{} channel entries carry an effect", effects);
    }
}
