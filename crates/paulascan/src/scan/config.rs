//! Scan limits and tunables.

use serde::{Deserialize, Serialize};

use super::error::ScanError;
use crate::chip::period::PaulaClock;

/// Frames rendered between two snapshots.
pub const DEFAULT_CHUNK_FRAMES: usize = 128;
/// Default cap on rendered audio, in seconds.
pub const DEFAULT_MAX_SECONDS: u32 = 600;
/// Default cap on emitted rows.
pub const DEFAULT_MAX_ROWS: usize = 16_384;
/// Default cap on a single sample read (128 KiB).
pub const DEFAULT_MAX_SAMPLE_BYTES: u32 = 128 * 1024;
/// Samples of this many bytes or fewer are loop stubs and are skipped.
pub const DEFAULT_MIN_SAMPLE_BYTES: u32 = 4;
/// Audio used to calibrate the tempo estimate, in seconds.
pub const DEFAULT_TEMPO_WINDOW_SECONDS: u32 = 30;
/// Number of rows in a loop-detector window.
pub const DEFAULT_LOOP_WINDOW_ROWS: usize = 16;
/// Rows required before a loop match is honored.
pub const DEFAULT_LOOP_MIN_ROWS: usize = 128;

/// Configuration of a scan.
///
/// Deserializes from partial JSON; missing fields take their defaults.
///
/// # Examples
///
/// ```
/// use paulascan::scan::ScanConfig;
///
/// let mut config = ScanConfig::default();
/// config.set_max_seconds(120).set_max_rows(4096);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.frame_limit(44_100), 120 * 44_100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub chunk_frames: usize,
    pub max_seconds: u32,
    /// Explicit tick cap; derived from the frame cap when `None`
    pub max_ticks: Option<u64>,
    pub max_rows: usize,
    pub max_sample_bytes: u32,
    pub min_sample_bytes: u32,
    pub tempo_window_seconds: u32,
    pub loop_window_rows: usize,
    pub loop_min_rows: usize,
    /// Zero-filled reads tolerated per pointer before it is abandoned
    /// (`None` retries for the whole scan)
    pub zero_read_retry_limit: Option<u32>,
    /// Clock used when converting periods to notes and frequencies
    pub clock: PaulaClock,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            max_seconds: DEFAULT_MAX_SECONDS,
            max_ticks: None,
            max_rows: DEFAULT_MAX_ROWS,
            max_sample_bytes: DEFAULT_MAX_SAMPLE_BYTES,
            min_sample_bytes: DEFAULT_MIN_SAMPLE_BYTES,
            tempo_window_seconds: DEFAULT_TEMPO_WINDOW_SECONDS,
            loop_window_rows: DEFAULT_LOOP_WINDOW_ROWS,
            loop_min_rows: DEFAULT_LOOP_MIN_ROWS,
            zero_read_retry_limit: None,
            clock: PaulaClock::Pal,
        }
    }
}

impl ScanConfig {
    pub fn set_chunk_frames(&mut self, frames: usize) -> &mut Self {
        self.chunk_frames = frames;
        self
    }

    pub fn set_max_seconds(&mut self, seconds: u32) -> &mut Self {
        self.max_seconds = seconds;
        self
    }

    pub fn set_max_ticks(&mut self, ticks: Option<u64>) -> &mut Self {
        self.max_ticks = ticks;
        self
    }

    pub fn set_max_rows(&mut self, rows: usize) -> &mut Self {
        self.max_rows = rows;
        self
    }

    pub fn set_max_sample_bytes(&mut self, bytes: u32) -> &mut Self {
        self.max_sample_bytes = bytes;
        self
    }

    pub fn set_tempo_window_seconds(&mut self, seconds: u32) -> &mut Self {
        self.tempo_window_seconds = seconds;
        self
    }

    /// Set the loop-detector window and minimum row count.
    pub fn set_loop_detection(&mut self, window_rows: usize, min_rows: usize) -> &mut Self {
        self.loop_window_rows = window_rows;
        self.loop_min_rows = min_rows;
        self
    }

    /// Sets the zero-read retry limit.
    ///
    /// # Arguments
    /// * `limit` - Zero-filled reads tolerated per pointer (None for unbounded)
    pub fn set_zero_read_retry_limit(&mut self, limit: Option<u32>) -> &mut Self {
        self.zero_read_retry_limit = limit;
        self
    }

    pub fn set_clock(&mut self, clock: PaulaClock) -> &mut Self {
        self.clock = clock;
        self
    }

    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<(), ScanError> {
        let invalid = |field: &'static str, reason: &str| {
            Err(ScanError::InvalidConfig {
                field,
                reason: reason.to_string(),
            })
        };
        if self.chunk_frames == 0 {
            return invalid("chunk_frames", "must be greater than zero");
        }
        if self.max_seconds == 0 {
            return invalid("max_seconds", "must be greater than zero");
        }
        if self.max_ticks == Some(0) {
            return invalid("max_ticks", "must be greater than zero");
        }
        if self.max_rows == 0 {
            return invalid("max_rows", "must be greater than zero");
        }
        if self.max_sample_bytes <= self.min_sample_bytes {
            return invalid("max_sample_bytes", "must exceed min_sample_bytes");
        }
        if self.tempo_window_seconds == 0 {
            return invalid("tempo_window_seconds", "must be greater than zero");
        }
        if self.loop_window_rows == 0 {
            return invalid("loop_window_rows", "must be greater than zero");
        }
        if self.loop_min_rows < self.loop_window_rows {
            return invalid("loop_min_rows", "must be at least loop_window_rows");
        }
        Ok(())
    }

    /// Cap on cumulative rendered frames.
    pub fn frame_limit(&self, sample_rate: u32) -> u64 {
        self.max_seconds as u64 * sample_rate as u64
    }

    /// Cap on captured ticks.
    pub fn tick_limit(&self, sample_rate: u32) -> u64 {
        self.max_ticks.unwrap_or_else(|| {
            self.frame_limit(sample_rate) / self.chunk_frames.max(1) as u64 + 1
        })
    }

    /// Frames captured before the tempo estimate is made.
    pub fn tempo_window_frames(&self, sample_rate: u32) -> u64 {
        (self.tempo_window_seconds as u64 * sample_rate as u64).min(self.frame_limit(sample_rate))
    }
}
