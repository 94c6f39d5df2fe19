//! Tempo estimation.
//!
//! Replayers driven by the CIA-B timer encode the BPM in the timer reload
//! value: `bpm = round(1773447 / (timer + 1))`. The speed (ticks per row)
//! is not visible in any register and is estimated from the median spacing
//! of note triggers. Replayers driven by the vertical blank leave the CIA
//! timer unused or meaningless; for those the trigger spacing is measured
//! in vertical blanks instead.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::chip::TickSnapshot;
use crate::chip::event::{ChannelEvent, tick_events};

/// CIA ticks per minute divided by 24 rows per beat, PAL timing.
pub const CIA_BPM_DIVIDEND: u32 = 1_773_447;
pub const MIN_BPM: u32 = 32;
pub const MAX_BPM: u32 = 999;
pub const DEFAULT_BPM: u32 = 125;
pub const MIN_SPEED: u32 = 1;
pub const MAX_SPEED: u32 = 31;
pub const DEFAULT_SPEED: u32 = 6;
/// Vertical blank rate assumed when no snapshot reports one
pub const DEFAULT_VBLANK_HZ: u32 = 50;

/// Where the BPM of a `TempoEstimate` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempoSource {
    /// Dominant CIA timer value
    Cia,
    /// Trigger spacing measured in vertical blanks
    VBlank,
    /// Nothing usable was found
    Default,
}

/// Result of `estimate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoEstimate {
    pub bpm: u32,
    pub speed: u32,
    pub cia_reliable: bool,
    pub source: TempoSource,
    pub vblank_hz: u32,
    pub warnings: Vec<String>,
}

impl TempoEstimate {
    /// Rendered frames per row at this tempo.
    pub fn frames_per_row(&self, sample_rate: u32) -> f64 {
        match self.source {
            TempoSource::VBlank => {
                self.speed as f64 * sample_rate as f64 / self.vblank_hz.max(1) as f64
            }
            TempoSource::Cia | TempoSource::Default => {
                frames_per_row(self.bpm, self.speed, sample_rate)
            }
        }
    }
}

/// A tempo in effect from `row_index` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoChange {
    pub row_index: usize,
    pub bpm: u32,
    pub speed: u32,
}

/// BPM encoded by a CIA timer reload value.
pub fn cia_to_bpm(timer_value: u32) -> u32 {
    (CIA_BPM_DIVIDEND as f64 / (timer_value as f64 + 1.0)).round() as u32
}

/// Whether `bpm` is a plausible song tempo.
pub fn bpm_in_range(bpm: u32) -> bool {
    (MIN_BPM..=MAX_BPM).contains(&bpm)
}

/// Frames per row for a CIA tempo: one tick lasts `2.5 / bpm` seconds.
pub fn frames_per_row(bpm: u32, speed: u32, sample_rate: u32) -> f64 {
    speed as f64 * sample_rate as f64 * 2.5 / bpm.max(1) as f64
}

/// Most frequent nonzero value. Ties go to the value seen first.
pub fn dominant_value<I>(values: I) -> Option<u32>
where
    I: IntoIterator<Item = u32>,
{
    let mut tally: HashMap<u32, (usize, usize)> = HashMap::new();
    for (index, value) in values.into_iter().enumerate() {
        if value == 0 {
            continue;
        }
        tally.entry(value).or_insert((0, index)).0 += 1;
    }
    tally
        .into_iter()
        .max_by(|(_, (ca, ia)), (_, (cb, ib))| ca.cmp(cb).then(ib.cmp(ia)))
        .map(|(value, _)| value)
}

/// Frame indices of ticks where any channel was triggered.
///
/// The first tick is compared against a silent chip.
pub fn trigger_frames(ticks: &[TickSnapshot]) -> Vec<u64> {
    let silent = TickSnapshot::default();
    let mut previous = &silent;
    let mut frames = Vec::new();
    for tick in ticks {
        let triggered = tick_events(previous, tick)
            .iter()
            .any(|e| matches!(e, ChannelEvent::Trigger { .. }));
        if triggered {
            frames.push(tick.frame_index);
        }
        previous = tick;
    }
    frames
}

/// Frame distances between successive trigger ticks.
pub fn trigger_intervals(ticks: &[TickSnapshot]) -> Vec<u64> {
    trigger_frames(ticks)
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&d| d > 0)
        .collect()
}

/// Median of `values`; the mean of the two middle values for even counts.
pub fn median(values: &[u64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) as f64 / 2.0)
    } else {
        Some(sorted[mid] as f64)
    }
}

fn speed_in_range(speed: f64) -> Option<u32> {
    let rounded = speed.round();
    if rounded >= MIN_SPEED as f64 && rounded <= MAX_SPEED as f64 {
        Some(rounded as u32)
    } else {
        None
    }
}

/// Estimate BPM and speed from a run of ticks.
///
/// Never fails: when nothing usable is found the defaults (125 BPM,
/// speed 6) are returned with an explanatory warning.
pub fn estimate(ticks: &[TickSnapshot], sample_rate: u32) -> TempoEstimate {
    let sample_rate = sample_rate.max(1);
    let dominant_cia = dominant_value(ticks.iter().map(|t| t.cia_timer_value));
    let cia_bpm = dominant_cia.map(cia_to_bpm).filter(|&bpm| bpm_in_range(bpm));
    let vblank_hz =
        dominant_value(ticks.iter().map(|t| t.vblank_hz)).unwrap_or(DEFAULT_VBLANK_HZ);
    let median_interval = median(&trigger_intervals(ticks));
    let mut warnings = Vec::new();

    debug!(
        "tempo: dominant cia {:?}, vblank {} Hz, median trigger interval {:?} frames",
        dominant_cia, vblank_hz, median_interval
    );

    if let Some(bpm) = cia_bpm {
        let speed = median_interval
            .and_then(|m| speed_in_range(m * bpm as f64 / (sample_rate as f64 * 2.5)));
        let speed = match speed {
            Some(speed) => speed,
            None => {
                warnings.push(format!(
                    "speed could not be estimated from note trigger spacing at {} BPM; using default speed {}",
                    bpm, DEFAULT_SPEED
                ));
                DEFAULT_SPEED
            }
        };
        return TempoEstimate {
            bpm,
            speed,
            cia_reliable: true,
            source: TempoSource::Cia,
            vblank_hz,
            warnings,
        };
    }

    let frames_per_vblank = sample_rate as f64 / vblank_hz.max(1) as f64;
    let speed = median_interval.and_then(|m| speed_in_range(m / frames_per_vblank));
    match speed {
        Some(speed) => {
            let bpm = (vblank_hz as f64 * 2.5 / speed as f64).round() as u32;
            warnings.push(format!(
                "CIA timer is not a reliable tempo source (dominant value {:?}); estimated speed {} from {} Hz VBlank trigger spacing, bpm {}",
                dominant_cia, speed, vblank_hz, bpm
            ));
            TempoEstimate {
                bpm,
                speed,
                cia_reliable: false,
                source: TempoSource::VBlank,
                vblank_hz,
                warnings,
            }
        }
        None => {
            warnings.push(format!(
                "CIA timer is not a reliable tempo source (dominant value {:?}) and note trigger spacing gave no usable speed; using defaults {} BPM, speed {}",
                dominant_cia, DEFAULT_BPM, DEFAULT_SPEED
            ));
            TempoEstimate {
                bpm: DEFAULT_BPM,
                speed: DEFAULT_SPEED,
                cia_reliable: false,
                source: TempoSource::Default,
                vblank_hz,
                warnings,
            }
        }
    }
}

/// Follows CIA tempo changes row by row.
///
/// Only active when the initial estimate came from the CIA timer. The speed
/// is kept from the initial estimate.
#[derive(Debug, Clone)]
pub struct TempoTracker {
    sample_rate: u32,
    enabled: bool,
    bpm: u32,
    speed: u32,
    changes: Vec<TempoChange>,
}

impl TempoTracker {
    pub fn new(estimate: &TempoEstimate, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            enabled: estimate.cia_reliable,
            bpm: estimate.bpm,
            speed: estimate.speed,
            changes: vec![TempoChange {
                row_index: 0,
                bpm: estimate.bpm,
                speed: estimate.speed,
            }],
        }
    }

    /// Record the dominant CIA value of row `row_index`.
    ///
    /// # Returns
    ///
    /// The new frames-per-row if the tempo changed, None otherwise
    pub fn observe_row(&mut self, row_index: usize, cia_timer_value: u32) -> Option<f64> {
        if !self.enabled || cia_timer_value == 0 {
            return None;
        }
        let bpm = cia_to_bpm(cia_timer_value);
        if !bpm_in_range(bpm) || bpm == self.bpm {
            return None;
        }
        debug!("tempo change at row {}: {} -> {} BPM", row_index, self.bpm, bpm);
        self.bpm = bpm;
        self.changes.push(TempoChange {
            row_index,
            bpm,
            speed: self.speed,
        });
        Some(frames_per_row(bpm, self.speed, self.sample_rate))
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<TempoChange> {
        self.changes
    }
}
