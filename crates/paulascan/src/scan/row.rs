//! Row grouping.
//!
//! Ticks are grouped into rows on a fractional frame grid: row `k` covers
//! the ticks whose `frame_index` lies in `(origin + k * fpr, origin + (k + 1) * fpr]`.
//! A tick past the current row's end closes the row, so a note triggered at
//! the start of a row is never attributed to the row before it.

use serde::{Deserialize, Serialize};

use super::effect::{Effect, EffectType, classify};
use super::tempo::dominant_value;
use crate::chip::event::is_trigger;
use crate::chip::period::{Note, note_for_period};
use crate::chip::{CHANNELS, ChannelSnapshot, TickSnapshot};

/// Trailing groups of this many ticks or fewer are dropped by `finish`.
pub const MIN_TRAILING_TICKS: usize = 2;

/// One channel of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelRowEntry {
    pub period: u32,
    pub volume: u32,
    pub sample_pointer: u32,
    /// DMA position at the tick the entry was taken from
    pub sample_start_ptr: u32,
    pub sample_length_words: u32,
    /// Whether a note was triggered during the row
    pub triggered: bool,
    pub effect: Effect,
}

impl ChannelRowEntry {
    pub fn effect_type(&self) -> EffectType {
        self.effect.effect_type()
    }

    pub fn effect_param(&self) -> u8 {
        self.effect.param()
    }

    /// Tracker note for the entry's period.
    pub fn note(&self) -> Option<Note> {
        note_for_period(self.period)
    }
}

/// A reconstructed row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Row {
    pub channels: [ChannelRowEntry; CHANNELS],
    /// `frame_index` of the first tick in the row
    pub first_frame: u64,
    pub tick_count: usize,
    /// Most frequent nonzero CIA timer value in the row (0 if none)
    pub cia_timer_value: u32,
}

impl Row {
    /// Content key used by the loop detector: `period,pointer` per channel.
    pub fn fingerprint(&self) -> String {
        self.channels
            .iter()
            .map(|ch| format!("{},{}", ch.period, ch.sample_pointer))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Summarize one channel over a tick group.
///
/// Register values come from the last tick that triggered a note, or the
/// last tick if none did.
fn channel_entry(previous: &ChannelSnapshot, group: &[ChannelSnapshot]) -> ChannelRowEntry {
    let mut prev = previous;
    let mut chosen = None;
    for ch in group {
        if is_trigger(prev, ch) {
            chosen = Some(ch);
        }
        prev = ch;
    }
    let triggered = chosen.is_some();
    let Some(source) = chosen.or(group.last()) else {
        return ChannelRowEntry::default();
    };

    let periods: Vec<u32> = group.iter().map(|c| c.period).collect();
    let volumes: Vec<u32> = group.iter().map(|c| c.volume).collect();

    ChannelRowEntry {
        period: source.period,
        volume: source.volume,
        sample_pointer: source.sample_pointer,
        sample_start_ptr: source.playback_pointer,
        sample_length_words: source.sample_length_words,
        triggered,
        effect: classify(&periods, &volumes),
    }
}

/// Build a row from a tick group.
///
/// `previous` is the tick before the group (silent for the first row).
pub fn build_row(previous: &TickSnapshot, group: &[TickSnapshot]) -> Row {
    let channels = std::array::from_fn(|ch| {
        let series: Vec<ChannelSnapshot> = group.iter().map(|t| t.channels[ch]).collect();
        channel_entry(&previous.channels[ch], &series)
    });
    Row {
        channels,
        first_frame: group.first().map(|t| t.frame_index).unwrap_or(0),
        tick_count: group.len(),
        cia_timer_value: dominant_value(group.iter().map(|t| t.cia_timer_value)).unwrap_or(0),
    }
}

/// Streaming tick-to-row grouper.
#[derive(Debug, Clone)]
pub struct RowGrouper {
    frames_per_row: f64,
    row_end: f64,
    group: Vec<TickSnapshot>,
    before_group: TickSnapshot,
    last: TickSnapshot,
}

impl RowGrouper {
    /// Grouper whose first row starts at frame 0.
    pub fn new(frames_per_row: f64) -> Self {
        Self::with_origin(frames_per_row, 0)
    }

    /// Grouper whose first row starts at `origin_frame`.
    pub fn with_origin(frames_per_row: f64, origin_frame: u64) -> Self {
        let frames_per_row = frames_per_row.max(1.0);
        Self {
            frames_per_row,
            row_end: origin_frame as f64 + frames_per_row,
            group: Vec::new(),
            before_group: TickSnapshot::default(),
            last: TickSnapshot::default(),
        }
    }

    pub fn frames_per_row(&self) -> f64 {
        self.frames_per_row
    }

    /// Change the row length from the next row on.
    pub fn set_frames_per_row(&mut self, frames_per_row: f64) {
        self.frames_per_row = frames_per_row.max(1.0);
    }

    /// Add a tick.
    ///
    /// # Returns
    ///
    /// The completed row when `tick` lies past the current row's end
    pub fn push(&mut self, tick: TickSnapshot) -> Option<Row> {
        let mut completed = None;
        if tick.frame_index as f64 > self.row_end {
            if !self.group.is_empty() {
                completed = Some(self.take_row());
            }
            while tick.frame_index as f64 > self.row_end {
                self.row_end += self.frames_per_row;
            }
        }
        self.group.push(tick);
        self.last = tick;
        completed
    }

    /// Emit the pending group if it holds more than `MIN_TRAILING_TICKS` ticks.
    ///
    /// A group that reached the end of its row is complete and always
    /// emitted.
    pub fn finish(&mut self) -> Option<Row> {
        let complete = self
            .group
            .last()
            .is_some_and(|t| t.frame_index as f64 >= self.row_end);
        if complete || self.group.len() > MIN_TRAILING_TICKS {
            Some(self.take_row())
        } else {
            self.group.clear();
            None
        }
    }

    fn take_row(&mut self) -> Row {
        let row = build_row(&self.before_group, &self.group);
        self.before_group = self.last;
        self.group.clear();
        row
    }
}

/// Group a complete tick run into rows and classify every channel.
pub fn group_and_detect(ticks: &[TickSnapshot], frames_per_row: f64) -> Vec<Row> {
    let mut grouper = RowGrouper::new(frames_per_row);
    let mut rows: Vec<Row> = ticks.iter().filter_map(|t| grouper.push(*t)).collect();
    rows.extend(grouper.finish());
    rows
}
