//! Scan orchestration.
//!
//! A scan runs in two phases. The calibration phase captures the first
//! `tempo_window_seconds` of ticks (extracting samples as it goes) and
//! estimates the tempo from them. The streaming phase replays the buffered
//! ticks through the row grouper and loop detector, then keeps capturing
//! one tick at a time until the song loops, ends, or a cap is reached.
//!
//! # Examples
//!
//! ```
//! use paulascan::scan::{ScanConfig, Scanner, Termination};
//! use paulascan::trace::{TraceBuilder, TraceEmulator};
//!
//! let document = TraceBuilder::new(44_100).finalize();
//! let mut emulator = TraceEmulator::new(document);
//!
//! let mut scanner = Scanner::new(ScanConfig::default());
//! let result = scanner.scan(&mut emulator).unwrap();
//! assert!(result.rows.is_empty());
//! assert_eq!(result.termination, Termination::EndOfSong);
//! ```

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::config::ScanConfig;
use super::context::ScanContext;
use super::error::ScanError;
use super::loop_detect::LoopDetector;
use super::row::{Row, RowGrouper};
use super::sample::{SampleExtractor, SampleRecord};
use super::sampler::{SamplerStop, TickSampler};
use super::tempo::{self, TempoChange, TempoSource, TempoTracker};
use crate::chip::period::PaulaClock;
use crate::chip::{ChipEmulator, SongInfo};

/// Unresolved pointers listed in the zero-PCM warning.
const MAX_LISTED_POINTERS: usize = 8;

type RowCallback<'a> = Option<Box<dyn FnMut(usize, &Row) + 'a>>;

/// Why a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// The row stream repeated; `restart_row` is where the repeat begins
    LoopDetected { row: usize, restart_row: usize },
    /// The emulator reported the end of the song
    EndOfSong,
    FrameLimit,
    TickLimit,
    RowLimit,
}

impl Termination {
    /// Whether the scan stopped at a safety cap rather than at the song's end.
    pub fn hit_limit(&self) -> bool {
        matches!(
            self,
            Termination::FrameLimit | Termination::TickLimit | Termination::RowLimit
        )
    }
}

/// The reconstructed song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub rows: Vec<Row>,
    pub samples: BTreeMap<u32, SampleRecord>,
    /// Tempo in effect from each listed row; the first entry is row 0
    pub tempo_changes: Vec<TempoChange>,
    /// Initial tempo
    pub bpm: u32,
    pub speed: u32,
    pub cia_reliable: bool,
    pub tempo_source: TempoSource,
    pub warnings: Vec<String>,
    pub termination: Termination,
    pub info: SongInfo,
    pub frames_scanned: u64,
    pub ticks_scanned: u64,
    pub sample_rate: u32,
    pub clock: PaulaClock,
}

impl ScanResult {
    /// Seconds of audio rendered during the scan.
    pub fn seconds_scanned(&self) -> f64 {
        self.frames_scanned as f64 / self.sample_rate.max(1) as f64
    }

    /// Row the song loops back to, if a loop was detected
    pub fn loop_restart_row(&self) -> Option<usize> {
        match self.termination {
            Termination::LoopDetected { restart_row, .. } => Some(restart_row),
            _ => None,
        }
    }
}

/// Drives a `ChipEmulator` and reconstructs its song.
pub struct Scanner<'a> {
    config: ScanConfig,
    on_row: RowCallback<'a>,
}

impl<'a> Scanner<'a> {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            on_row: None,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Register a callback invoked with the index of every row as it is
    /// emitted.
    ///
    /// # Examples
    ///
    /// ```
    /// use paulascan::scan::{ScanConfig, Scanner};
    ///
    /// let mut scanner = Scanner::new(ScanConfig::default());
    /// scanner.on_row(|index, row| {
    ///     println!("row {}: {}", index, row.fingerprint());
    /// });
    /// ```
    pub fn on_row<F>(&mut self, callback: F)
    where
        F: FnMut(usize, &Row) + 'a,
    {
        self.on_row = Some(Box::new(callback));
    }

    /// Scan the song the emulator is playing.
    ///
    /// Looping is disabled first. The emulator's play position is consumed;
    /// it has to be reset before it can play the song again.
    ///
    /// # Errors
    ///
    /// `ScanError::InvalidConfig` or `ScanError::EmulatorNotReady`; both are
    /// detected before anything is rendered.
    pub fn scan<E>(&mut self, emulator: &mut E) -> Result<ScanResult, ScanError>
    where
        E: ChipEmulator + ?Sized,
    {
        self.config.validate()?;
        let sample_rate = emulator.sample_rate();
        if sample_rate == 0 {
            return Err(ScanError::EmulatorNotReady);
        }
        emulator.set_looping(false);
        let song_info = emulator.song_info();
        info!(
            "scan start: {} Hz, player {:?}, format {:?}",
            sample_rate, song_info.player_name, song_info.format_name
        );

        let config = &self.config;
        let mut ctx = ScanContext::new(sample_rate);
        let extractor = SampleExtractor::new(
            config.max_sample_bytes,
            config.min_sample_bytes,
            config.zero_read_retry_limit,
        );
        let mut sampler = TickSampler::new(
            config.chunk_frames,
            config.frame_limit(sample_rate),
            config.tick_limit(sample_rate),
        );

        let calibration = sampler.capture_ticks(
            emulator,
            config.tempo_window_frames(sample_rate),
            u64::MAX,
            |emu, tick| ctx.observe_tick(&extractor, emu, tick),
        );
        let estimate = tempo::estimate(&calibration, sample_rate);
        for warning in &estimate.warnings {
            ctx.warn(warning.clone());
        }
        let frames_per_row = estimate.frames_per_row(sample_rate);
        debug!(
            "calibrated on {} ticks: {} BPM, speed {}, {:?}, {:.1} frames per row",
            calibration.len(),
            estimate.bpm,
            estimate.speed,
            estimate.source,
            frames_per_row
        );

        let mut tracker = TempoTracker::new(&estimate, sample_rate);
        let mut grouper = RowGrouper::new(frames_per_row);
        let mut detector = LoopDetector::new(config.loop_window_rows, config.loop_min_rows);
        let mut termination = None;

        let mut buffered = calibration.into_iter();
        loop {
            let tick = match buffered.next() {
                Some(tick) => tick,
                None => match sampler.next_tick(emulator) {
                    Some(tick) => {
                        ctx.observe_tick(&extractor, emulator, &tick);
                        tick
                    }
                    None => break,
                },
            };
            if let Some(row) = grouper.push(tick)
                && let Some(stop) =
                    self.emit_row(&mut ctx, &mut tracker, &mut grouper, &mut detector, row)
            {
                termination = Some(stop);
                break;
            }
        }
        if termination.is_none()
            && let Some(row) = grouper.finish()
        {
            termination = self.emit_row(&mut ctx, &mut tracker, &mut grouper, &mut detector, row);
        }

        let termination = termination.unwrap_or(match sampler.stop_reason() {
            Some(SamplerStop::FrameLimit) => Termination::FrameLimit,
            Some(SamplerStop::TickLimit) => Termination::TickLimit,
            Some(SamplerStop::EndOfSong) | None => Termination::EndOfSong,
        });
        self.finish_warnings(&mut ctx, termination, sample_rate);

        info!(
            "scan stopped: {:?} after {} rows, {} ticks, {} samples, {} BPM speed {}",
            termination,
            ctx.rows.len(),
            sampler.ticks_captured(),
            ctx.samples.len(),
            estimate.bpm,
            estimate.speed
        );

        Ok(ScanResult {
            rows: ctx.rows,
            samples: ctx.samples.into_records(),
            tempo_changes: tracker.into_changes(),
            bpm: estimate.bpm,
            speed: estimate.speed,
            cia_reliable: estimate.cia_reliable,
            tempo_source: estimate.source,
            warnings: ctx.warnings,
            termination,
            info: song_info,
            frames_scanned: sampler.frames_rendered(),
            ticks_scanned: sampler.ticks_captured(),
            sample_rate,
            clock: self.config.clock,
        })
    }

    /// Store a row, notify the callback, follow tempo changes and check for
    /// a loop or the row cap.
    fn emit_row(
        &mut self,
        ctx: &mut ScanContext,
        tracker: &mut TempoTracker,
        grouper: &mut RowGrouper,
        detector: &mut LoopDetector,
        row: Row,
    ) -> Option<Termination> {
        let fingerprint = row.fingerprint();
        let cia_timer_value = row.cia_timer_value;
        let index = ctx.push_row(row);
        if let Some(callback) = self.on_row.as_mut() {
            callback(index, &ctx.rows[index]);
        }
        if let Some(frames_per_row) = tracker.observe_row(index, cia_timer_value) {
            grouper.set_frames_per_row(frames_per_row);
        }
        if detector.check_and_register(fingerprint)
            && let Some(found) = detector.matched()
        {
            return Some(Termination::LoopDetected {
                row: found.detected_at_row,
                restart_row: found.restart_row,
            });
        }
        if ctx.rows.len() >= self.config.max_rows {
            return Some(Termination::RowLimit);
        }
        None
    }

    fn finish_warnings(&self, ctx: &mut ScanContext, termination: Termination, sample_rate: u32) {
        match termination {
            Termination::FrameLimit => ctx.warn(format!(
                "no loop or song end within {} seconds; the song may be truncated",
                self.config.max_seconds
            )),
            Termination::TickLimit => ctx.warn(format!(
                "no loop or song end within {} ticks; the song may be truncated",
                self.config.tick_limit(sample_rate)
            )),
            Termination::RowLimit => ctx.warn(format!(
                "row limit of {} reached before a loop was detected; the song may be truncated",
                self.config.max_rows
            )),
            Termination::LoopDetected { .. } | Termination::EndOfSong => {}
        }

        let unresolved = ctx.samples.unresolved_pointers();
        if !unresolved.is_empty() {
            let listed: Vec<String> = unresolved
                .iter()
                .take(MAX_LISTED_POINTERS)
                .map(|p| format!("0x{:06X}", p))
                .collect();
            let more = unresolved.len().saturating_sub(MAX_LISTED_POINTERS);
            let suffix = if more > 0 {
                format!(" and {} more", more)
            } else {
                String::new()
            };
            ctx.warn(format!(
                "{} sample pointer(s) only ever read as zero and were not extracted: {}{}",
                unresolved.len(),
                listed.join(", "),
                suffix
            ));
        }

        if ctx.rows.is_empty() {
            ctx.warn("no rows were reconstructed");
        }
    }
}
