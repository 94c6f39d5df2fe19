use std::convert::TryFrom;
use std::fs::File;
use std::io::{Read, stdin};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use comfy_table::{Cell, ContentArrangement, Table, presets::NOTHING};
use flate2::read::GzDecoder;
use log::{debug, info as log_info};
use paulascan::trace::{TraceCommand, TraceDocument, TraceEmulator};
use paulascan::{ScanConfig, Scanner};

use crate::report;

/// Settings of the `scan` subcommand.
pub struct ScanOptions {
    pub config: Option<PathBuf>,
    pub max_seconds: Option<u32>,
    pub max_rows: Option<usize>,
    pub rows: usize,
    pub json: bool,
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1F && bytes[1] == 0x8B
}

fn gunzip(bytes: &[u8], what: &str) -> anyhow::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .with_context(|| format!("failed to decompress gzip data from {}", what))?;
    Ok(out)
}

/// Read trace bytes from a path or stdin ('-') into a Vec<u8>.
///
/// Gzip input is decompressed, whether it is recognized by a `.gz`
/// extension or by the gzip magic bytes (0x1F 0x8B).
pub fn read_trace_as_vec(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    let mut inbuf = Vec::new();
    if path == Path::new("-") {
        stdin()
            .read_to_end(&mut inbuf)
            .context("failed to read from stdin")?;
        if is_gzip(&inbuf) {
            return gunzip(&inbuf, "stdin");
        }
        return Ok(inbuf);
    }

    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file: {}", path.display()))?;
    f.read_to_end(&mut inbuf)
        .with_context(|| format!("failed to read input file: {}", path.display()))?;

    let is_gz = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz || is_gzip(&inbuf) {
        gunzip(&inbuf, &path.display().to_string())
    } else {
        Ok(inbuf)
    }
}

fn parse_document(path: &Path, bytes: &[u8]) -> anyhow::Result<TraceDocument> {
    TraceDocument::try_from(bytes)
        .with_context(|| format!("failed to parse trace: {}", path.display()))
}

/// Key/value summary of a trace document.
fn summarize_doc(doc: &TraceDocument) -> Vec<(String, String)> {
    let header = &doc.header;
    let seconds = doc.total_frames() as f64 / header.sample_rate.max(1) as f64;
    let (block_count, block_bytes) = doc.memory_stats();
    let subsong = match header.info.subsong {
        Some(s) => format!("{}..={} (default {})", s.min, s.max, s.default),
        None => "(none)".to_string(),
    };
    let ticks = doc.ticks().count();
    let cia_driven = doc.ticks().filter(|t| t.cia.timer_a_value != 0).count();

    vec![
        ("trace version".into(), format!("0x{:04X}", header.version)),
        ("player".into(), header.info.player_name.clone().unwrap_or_else(|| "(unknown)".into())),
        ("format".into(), header.info.format_name.clone().unwrap_or_else(|| "(unknown)".into())),
        ("subsongs".into(), subsong),
        ("sample_rate".into(), format!("{} Hz", header.sample_rate)),
        ("vblank".into(), format!("{} Hz", header.vblank_hz)),
        ("chunk_frames".into(), header.chunk_frames.to_string()),
        ("tick_count".into(), format!("{} (header) / {} (stream)", header.tick_count, ticks)),
        ("ticks with CIA timer".into(), cia_driven.to_string()),
        (
            "frames".into(),
            format!("{} ({:.3} s)", doc.total_frames(), seconds),
        ),
        (
            "memory_blocks".into(),
            format!("count={} total_bytes={}", block_count, block_bytes),
        ),
        ("commands".into(), doc.commands.len().to_string()),
    ]
}

fn display_doc(doc: &TraceDocument) {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new("Field"), Cell::new("Value")]);
    for (k, v) in summarize_doc(doc) {
        table.add_row(vec![Cell::new(k), Cell::new(v)]);
    }
    println!("{}", table);
}

/// Print summary information for a trace.
pub fn info(path: &Path, bytes: Vec<u8>) -> anyhow::Result<()> {
    let doc = parse_document(path, &bytes)?;
    println!("{}", path.display());
    display_doc(&doc);
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ScanConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Replay a trace through the scanner and print the reconstruction.
pub fn scan(path: &Path, bytes: Vec<u8>, options: &ScanOptions) -> anyhow::Result<()> {
    let doc = parse_document(path, &bytes)?;
    let mut config = match &options.config {
        Some(config_path) => load_config(config_path)?,
        None => ScanConfig::default(),
    };
    if let Some(seconds) = options.max_seconds {
        config.set_max_seconds(seconds);
    }
    if let Some(rows) = options.max_rows {
        config.set_max_rows(rows);
    }
    // Replay returns one recorded tick per render.
    if doc.header.chunk_frames > 0 && doc.header.chunk_frames as usize != config.chunk_frames {
        debug!(
            "using the recorded chunk size of {} frames instead of {}",
            doc.header.chunk_frames, config.chunk_frames
        );
        config.set_chunk_frames(doc.header.chunk_frames as usize);
    }

    log_info!("scanning {} ({} ticks)", path.display(), doc.header.tick_count);
    let mut emulator = TraceEmulator::new(doc);
    let result = Scanner::new(config)
        .scan(&mut emulator)
        .with_context(|| format!("failed to scan trace: {}", path.display()))?;

    if options.json {
        let json = serde_json::to_string_pretty(&result).context("failed to encode JSON")?;
        println!("{}", json);
    } else {
        report::print_scan(path, &result, options.rows);
    }
    Ok(())
}

/// Run parse -> serialize -> re-parse on a trace and compare the results.
pub fn test_roundtrip(path: &Path, bytes: Vec<u8>) -> anyhow::Result<()> {
    let doc = parse_document(path, &bytes)?;
    let serialized: Vec<u8> = (&doc).into();
    let reparsed = TraceDocument::try_from(serialized.as_slice())
        .context("failed to re-parse the serialized trace")?;

    // Serialization terminates an unterminated stream.
    let mut expected = doc.clone();
    let terminated = matches!(expected.commands.last(), Some(TraceCommand::EndOfData));
    if !terminated {
        println!("note: the original stream has no end-of-data marker");
        expected.commands.push(TraceCommand::EndOfData);
    }

    if reparsed != expected {
        let first = expected
            .commands
            .iter()
            .zip(reparsed.commands.iter())
            .position(|(a, b)| a != b);
        match first {
            Some(index) => bail!("documents differ at command {}", index),
            None if expected.header != reparsed.header => bail!("document headers differ"),
            None => bail!(
                "command counts differ: {} vs {}",
                expected.commands.len(),
                reparsed.commands.len()
            ),
        }
    }

    let compared = serialized.len().min(bytes.len());
    match bytes[..compared]
        .iter()
        .zip(serialized.iter())
        .position(|(a, b)| a != b)
    {
        Some(off) => println!(
            "{}: documents match, bytes differ from 0x{:08X}",
            path.display(),
            off
        ),
        None if bytes.len() > serialized.len() => println!(
            "{}: documents match, {} trailing bytes ignored",
            path.display(),
            bytes.len() - serialized.len()
        ),
        None => println!("{}: OK", path.display()),
    }
    Ok(())
}
