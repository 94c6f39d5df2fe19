//! Tick sampler.
//!
//! Renders fixed-size chunks of silent audio and captures one
//! `TickSnapshot` after each chunk.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::chip::{ChipEmulator, TickSnapshot};

/// Why a sampler stopped producing ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerStop {
    /// The emulator rendered zero or fewer frames
    EndOfSong,
    /// The cumulative frame cap was reached
    FrameLimit,
    /// The tick cap was reached
    TickLimit,
}

/// Chunked renderer with frame and tick caps.
///
/// Once stopped, a sampler stays stopped; every further `next_tick` call
/// returns `None` without touching the emulator.
#[derive(Debug, Clone)]
pub struct TickSampler {
    chunk_frames: usize,
    max_frames: u64,
    max_ticks: u64,
    frames_rendered: u64,
    ticks_captured: u64,
    stop: Option<SamplerStop>,
}

impl TickSampler {
    /// Create a sampler.
    ///
    /// # Arguments
    ///
    /// * `chunk_frames` - Frames rendered per snapshot (128 in practice)
    /// * `max_frames` - Cap on cumulative rendered frames
    /// * `max_ticks` - Cap on captured snapshots
    pub fn new(chunk_frames: usize, max_frames: u64, max_ticks: u64) -> Self {
        Self {
            chunk_frames: chunk_frames.max(1),
            max_frames,
            max_ticks,
            frames_rendered: 0,
            ticks_captured: 0,
            stop: None,
        }
    }

    /// Render one chunk and capture a snapshot.
    ///
    /// The last chunk before the frame cap is shortened so that the cap is
    /// never exceeded.
    ///
    /// # Returns
    ///
    /// The snapshot, or None once the song ended or a cap was reached
    pub fn next_tick<E>(&mut self, emulator: &mut E) -> Option<TickSnapshot>
    where
        E: ChipEmulator + ?Sized,
    {
        if self.stop.is_some() {
            return None;
        }
        // an exhausted frame budget wins over a tick cap reached on the same tick
        let remaining = self.max_frames.saturating_sub(self.frames_rendered);
        if remaining == 0 {
            self.stop = Some(SamplerStop::FrameLimit);
            return None;
        }
        if self.ticks_captured >= self.max_ticks {
            self.stop = Some(SamplerStop::TickLimit);
            return None;
        }

        let request = (self.chunk_frames as u64).min(remaining) as usize;
        let produced = emulator.render_silent(request);
        if produced <= 0 {
            trace!(
                "render returned {} after {} frames, end of song",
                produced, self.frames_rendered
            );
            self.stop = Some(SamplerStop::EndOfSong);
            return None;
        }

        self.frames_rendered += produced as u64;
        self.ticks_captured += 1;
        let tick = TickSnapshot::capture(emulator, self.frames_rendered);
        trace!(
            "tick {} at frame {} (cia {})",
            self.ticks_captured, tick.frame_index, tick.cia_timer_value
        );
        Some(tick)
    }

    /// Capture ticks until the cumulative frame count reaches `until_frame`,
    /// `max_ticks` more ticks were captured, or the sampler stops.
    ///
    /// `on_tick` is called with the emulator after each capture so that
    /// memory can be read while the snapshot is current.
    pub fn capture_ticks<E, F>(
        &mut self,
        emulator: &mut E,
        until_frame: u64,
        max_ticks: u64,
        mut on_tick: F,
    ) -> Vec<TickSnapshot>
    where
        E: ChipEmulator + ?Sized,
        F: FnMut(&mut E, &TickSnapshot),
    {
        let mut ticks = Vec::new();
        while self.frames_rendered < until_frame && (ticks.len() as u64) < max_ticks {
            let Some(tick) = self.next_tick(emulator) else {
                break;
            };
            on_tick(emulator, &tick);
            ticks.push(tick);
        }
        ticks
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn ticks_captured(&self) -> u64 {
        self.ticks_captured
    }

    /// Stop reason, once the sampler has stopped
    pub fn stop_reason(&self) -> Option<SamplerStop> {
        self.stop
    }
}

/// Render chunks of `chunk_frames` and collect snapshots until `max_frames`
/// frames were rendered, `max_ticks` snapshots were captured, or the song
/// ended.
pub fn capture_ticks<E>(
    emulator: &mut E,
    chunk_frames: usize,
    max_frames: u64,
    max_ticks: u64,
) -> Vec<TickSnapshot>
where
    E: ChipEmulator + ?Sized,
{
    let mut sampler = TickSampler::new(chunk_frames, max_frames, max_ticks);
    sampler.capture_ticks(emulator, max_frames, max_ticks, |_, _| {})
}
