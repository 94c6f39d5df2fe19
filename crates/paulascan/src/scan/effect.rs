//! Effect classification.
//!
//! A channel's per-tick periods and volumes within one row are matched
//! against an ordered list of detectors: arpeggio, portamento, vibrato,
//! volume slide. The first match wins; no match means a plain note.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chip::period::semitones_between;

/// Largest semitone offset an arpeggio may use.
pub const MAX_ARPEGGIO_SEMITONES: i32 = 15;
/// Period jitter tolerated inside a portamento.
pub const PORTAMENTO_JITTER: u32 = 2;
/// Smallest change that counts as a slide.
pub const MIN_SLIDE_DELTA: u32 = 2;

/// Effect kind without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectType {
    None,
    Arpeggio,
    PortaUp,
    PortaDown,
    Vibrato,
    VolumeSlide,
}

impl EffectType {
    /// ProTracker command digit for this effect.
    pub fn tracker_command(&self) -> Option<char> {
        match self {
            EffectType::None => None,
            EffectType::Arpeggio => Some('0'),
            EffectType::PortaUp => Some('1'),
            EffectType::PortaDown => Some('2'),
            EffectType::Vibrato => Some('4'),
            EffectType::VolumeSlide => Some('A'),
        }
    }
}

/// A classified effect with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Effect {
    /// Plain note or sustain
    #[default]
    None,
    /// Cycle of semitone offsets above the base note
    Arpeggio { first: u8, second: u8 },
    /// Pitch rising (period decreasing) by `rate` per tick
    PortaUp { rate: u8 },
    /// Pitch falling (period increasing) by `rate` per tick
    PortaDown { rate: u8 },
    Vibrato { speed: u8, depth: u8 },
    /// Volume change per tick; at most one of `up`/`down` is nonzero
    VolumeSlide { up: u8, down: u8 },
}

impl Effect {
    pub fn effect_type(&self) -> EffectType {
        match self {
            Effect::None => EffectType::None,
            Effect::Arpeggio { .. } => EffectType::Arpeggio,
            Effect::PortaUp { .. } => EffectType::PortaUp,
            Effect::PortaDown { .. } => EffectType::PortaDown,
            Effect::Vibrato { .. } => EffectType::Vibrato,
            Effect::VolumeSlide { .. } => EffectType::VolumeSlide,
        }
    }

    /// Effect parameter byte in tracker encoding.
    ///
    /// Two-value effects put the first value in the upper nibble; a volume
    /// slide up uses the upper nibble and a slide down the lower one.
    pub fn param(&self) -> u8 {
        match *self {
            Effect::None => 0,
            Effect::Arpeggio { first, second } => (first << 4) | (second & 0x0F),
            Effect::PortaUp { rate } | Effect::PortaDown { rate } => rate,
            Effect::Vibrato { speed, depth } => (speed << 4) | (depth & 0x0F),
            Effect::VolumeSlide { up, down } => (up << 4) | (down & 0x0F),
        }
    }

    pub fn is_pitch_effect(&self) -> bool {
        matches!(
            self,
            Effect::Arpeggio { .. }
                | Effect::PortaUp { .. }
                | Effect::PortaDown { .. }
                | Effect::Vibrato { .. }
        )
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.effect_type().tracker_command() {
            Some(cmd) => write!(f, "{}{:02X}", cmd, self.param()),
            None => write!(f, "..."),
        }
    }
}

fn round_clamp(value: f64, max: u32) -> u8 {
    value.round().clamp(0.0, max as f64) as u8
}

/// Exact repetition of a cycle of 1 to 3 periods.
///
/// Offsets are measured from the largest period of the cycle (the base
/// note) and listed in cycle order starting after the base.
pub fn detect_arpeggio(periods: &[u32]) -> Option<Effect> {
    for cycle in 1..=3 {
        if periods.len() < cycle * 2 {
            break;
        }
        let pattern = &periods[..cycle];
        if pattern.contains(&0) {
            continue;
        }
        if !periods
            .iter()
            .enumerate()
            .all(|(i, &p)| p == pattern[i % cycle])
        {
            continue;
        }
        let (base_pos, base) = pattern
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0), |best, (i, p)| if p > best.1 { (i, p) } else { best });
        let offsets: Vec<i32> = (1..cycle)
            .map(|k| semitones_between(base, pattern[(base_pos + k) % cycle]))
            .collect();
        if offsets.iter().any(|o| o.abs() > MAX_ARPEGGIO_SEMITONES) {
            continue;
        }
        if offsets.iter().all(|&o| o == 0) {
            continue;
        }
        let first = offsets.first().copied().unwrap_or(0) as u8;
        let second = offsets.get(1).copied().unwrap_or(0) as u8;
        return Some(Effect::Arpeggio { first, second });
    }
    None
}

/// Monotonic period trend with a total change above `MIN_SLIDE_DELTA`.
pub fn detect_portamento(periods: &[u32]) -> Option<Effect> {
    if periods.len() < 2 || periods.contains(&0) {
        return None;
    }
    let first = periods[0];
    let last = periods[periods.len() - 1];
    let diff = first.abs_diff(last);
    if diff <= MIN_SLIDE_DELTA {
        return None;
    }
    let rising_period = last > first;
    let monotonic = periods.windows(2).all(|w| {
        if rising_period {
            w[1] + PORTAMENTO_JITTER >= w[0]
        } else {
            w[1] <= w[0] + PORTAMENTO_JITTER
        }
    });
    if !monotonic {
        return None;
    }
    let rate = round_clamp(diff as f64 / periods.len() as f64, 255);
    if rising_period {
        Some(Effect::PortaDown { rate })
    } else {
        Some(Effect::PortaUp { rate })
    }
}

/// Period oscillating around its mean.
pub fn detect_vibrato(periods: &[u32]) -> Option<Effect> {
    if periods.len() < 3 || periods.contains(&0) {
        return None;
    }
    let mean = periods.iter().map(|&p| p as f64).sum::<f64>() / periods.len() as f64;
    let max_deviation = periods
        .iter()
        .map(|&p| (p as f64 - mean).abs())
        .fold(0.0_f64, f64::max);
    if max_deviation <= 0.0 {
        return None;
    }
    // crossings are counted between strictly-above and strictly-below samples
    let mut crossings = 0_u32;
    let mut side = 0_i8;
    for &p in periods {
        let s = if (p as f64) > mean {
            1
        } else if (p as f64) < mean {
            -1
        } else {
            0
        };
        if s != 0 {
            if side != 0 && s != side {
                crossings += 1;
            }
            side = s;
        }
    }
    if crossings < 2 {
        return None;
    }
    Some(Effect::Vibrato {
        speed: round_clamp(crossings as f64 * 2.0, 15),
        depth: round_clamp(max_deviation / 4.0, 15),
    })
}

/// Volume change of more than `MIN_SLIDE_DELTA` from first to last tick.
pub fn detect_volume_slide(volumes: &[u32]) -> Option<Effect> {
    if volumes.len() < 2 {
        return None;
    }
    let first = volumes[0];
    let last = volumes[volumes.len() - 1];
    let delta = first.abs_diff(last);
    if delta <= MIN_SLIDE_DELTA {
        return None;
    }
    let rate = round_clamp(delta as f64 / volumes.len() as f64, 15);
    if last > first {
        Some(Effect::VolumeSlide { up: rate, down: 0 })
    } else {
        Some(Effect::VolumeSlide { up: 0, down: rate })
    }
}

/// Classify one channel's row.
pub fn classify(periods: &[u32], volumes: &[u32]) -> Effect {
    detect_arpeggio(periods)
        .or_else(|| detect_portamento(periods))
        .or_else(|| detect_vibrato(periods))
        .or_else(|| detect_volume_slide(volumes))
        .unwrap_or_default()
}
