//! Paula period utilities.
//!
//! Paula plays a sample by fetching one byte every `period` ticks of the
//! colour clock, so the byte rate is `clock / period`. This module converts
//! between periods, frequencies and tracker note names, and generates the
//! 12-EDO period table used as the tuning reference.
//!
//! # Examples
//!
//! ```rust
//! use paulascan::chip::period::{PaulaClock, note_for_period, period_to_hz};
//!
//! let hz = period_to_hz(428, PaulaClock::Pal.hz()).unwrap();
//! assert!((hz - 8287.13).abs() < 0.01);
//!
//! let note = note_for_period(428).unwrap();
//! assert_eq!(note.to_string(), "C-2");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// PAL colour clock in Hz.
pub const PAL_CLOCK_HZ: f64 = 3_546_895.0;

/// NTSC colour clock in Hz.
pub const NTSC_CLOCK_HZ: f64 = 3_579_545.0;

/// Period of C-2 in the tracker table; periods are measured against it.
pub const NEUTRAL_PERIOD: u32 = 428;

/// Period of C-1, the first note of tracker octave 1.
const C1_PERIOD: f64 = 856.0;

/// Lowest and highest octave in the generated period table.
pub const MIN_OCTAVE: u8 = 0;
pub const MAX_OCTAVE: u8 = 5;

const NOTE_NAMES: [&str; 12] = [
    "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
];

/// Amiga colour clock variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaulaClock {
    #[default]
    Pal,
    Ntsc,
}

impl PaulaClock {
    /// Clock frequency in Hz.
    pub fn hz(self) -> f64 {
        match self {
            PaulaClock::Pal => PAL_CLOCK_HZ,
            PaulaClock::Ntsc => NTSC_CLOCK_HZ,
        }
    }

    /// Guess the clock from the vertical blank rate (60 Hz means NTSC).
    pub fn from_vblank_hz(vblank_hz: u32) -> Self {
        if vblank_hz == 60 {
            PaulaClock::Ntsc
        } else {
            PaulaClock::Pal
        }
    }
}

impl fmt::Display for PaulaClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaulaClock::Pal => write!(f, "PAL"),
            PaulaClock::Ntsc => write!(f, "NTSC"),
        }
    }
}

/// Error enum used by the period utilities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeriodError {
    /// Period of zero (channel silent or uninitialized)
    ZeroPeriod,
    /// Non-finite or non-positive frequency or clock
    InvalidFrequency(f64),
}

impl fmt::Display for PeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodError::ZeroPeriod => write!(f, "period is zero"),
            PeriodError::InvalidFrequency(v) => write!(f, "invalid frequency: {}", v),
        }
    }
}

impl std::error::Error for PeriodError {}

/// A tracker note: octave plus semitone (0 = C, 11 = B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Note {
    pub octave: u8,
    pub semitone: u8,
}

impl Note {
    /// Semitones above C-0.
    pub fn index(&self) -> i32 {
        self.octave as i32 * 12 + self.semitone as i32
    }

    /// Ideal period of this note.
    pub fn period(&self) -> f64 {
        let from_c1 = self.index() - 12;
        C1_PERIOD / 2_f64.powf(from_c1 as f64 / 12.0)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NOTE_NAMES[self.semitone as usize % 12], self.octave)
    }
}

/// One entry of the generated period table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodEntry {
    pub note: Note,
    /// Integer period closest to the ideal one
    pub period: u32,
    /// Frequency the integer period plays the neutral sample at
    pub freq_hz: f64,
}

/// Convert a period to the sample byte rate in Hz.
pub fn period_to_hz(period: u32, clock_hz: f64) -> Result<f64, PeriodError> {
    if period == 0 {
        return Err(PeriodError::ZeroPeriod);
    }
    if !clock_hz.is_finite() || clock_hz <= 0.0 {
        return Err(PeriodError::InvalidFrequency(clock_hz));
    }
    Ok(clock_hz / period as f64)
}

/// Convert a byte rate in Hz to the nearest integer period.
pub fn hz_to_period(freq_hz: f64, clock_hz: f64) -> Result<u32, PeriodError> {
    if !freq_hz.is_finite() || freq_hz <= 0.0 {
        return Err(PeriodError::InvalidFrequency(freq_hz));
    }
    if !clock_hz.is_finite() || clock_hz <= 0.0 {
        return Err(PeriodError::InvalidFrequency(clock_hz));
    }
    let period = (clock_hz / freq_hz).round();
    if period < 1.0 {
        return Err(PeriodError::InvalidFrequency(freq_hz));
    }
    Ok(period.min(u32::MAX as f64) as u32)
}

/// Signed semitone distance from `base` to `other`.
///
/// Positive when `other` is higher in pitch (smaller period). Returns 0 if
/// either period is zero.
pub fn semitones_between(base: u32, other: u32) -> i32 {
    if base == 0 || other == 0 {
        return 0;
    }
    (12.0 * (base as f64 / other as f64).log2()).round() as i32
}

/// Nearest tracker note for `period`.
///
/// # Returns
///
/// None for a zero period or a pitch outside octaves `MIN_OCTAVE..=MAX_OCTAVE`
pub fn note_for_period(period: u32) -> Option<Note> {
    if period == 0 {
        return None;
    }
    let from_c1 = (12.0 * (C1_PERIOD / period as f64).log2()).round() as i32;
    let index = from_c1 + 12;
    if index < 0 {
        return None;
    }
    let octave = index / 12;
    if octave > MAX_OCTAVE as i32 {
        return None;
    }
    Some(Note {
        octave: octave as u8,
        semitone: (index % 12) as u8,
    })
}

/// Generate the 12-EDO period table for octaves `MIN_OCTAVE..=MAX_OCTAVE`.
///
/// Rows are octaves, columns semitones from C. Frequencies are computed for
/// the given clock.
pub fn generate_12edo_period_table(clock: PaulaClock) -> Vec<[PeriodEntry; 12]> {
    (MIN_OCTAVE..=MAX_OCTAVE)
        .map(|octave| {
            std::array::from_fn(|semitone| {
                let note = Note {
                    octave,
                    semitone: semitone as u8,
                };
                let period = (note.period().round() as u32).max(1);
                PeriodEntry {
                    note,
                    period,
                    freq_hz: clock.hz() / period as f64,
                }
            })
        })
        .collect()
}

/// Find the table entry whose period is closest in pitch to `period`.
pub fn find_closest_period(
    table: &[[PeriodEntry; 12]],
    period: u32,
) -> Result<PeriodEntry, PeriodError> {
    if period == 0 {
        return Err(PeriodError::ZeroPeriod);
    }
    let mut best: Option<(PeriodEntry, f64)> = None;
    for entry in table.iter().flatten() {
        let cents = (entry.period as f64 / period as f64).log2().abs() * 1200.0;
        if best.as_ref().is_none_or(|(_, c)| cents < *c) {
            best = Some((*entry, cents));
        }
    }
    best.map(|(e, _)| e).ok_or(PeriodError::ZeroPeriod)
}
