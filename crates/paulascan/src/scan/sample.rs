//! Sample extraction.
//!
//! PCM is read from chip memory the first time a channel plays a pointer
//! with DMA enabled. Zero-filled reads are not cached since replayers often
//! set up the DMA pointer before unpacking the waveform; the pointer is
//! simply read again on a later tick. Once cached, PCM never changes. Only
//! the loop fields and the typical period are refined afterwards.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::chip::event::{ChannelEvent, detect_events};
use crate::chip::period::NEUTRAL_PERIOD;
use crate::chip::{ChannelSnapshot, MemoryReader, TickSnapshot};

/// An instrument waveform extracted from chip memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pointer: u32,
    pcm: Vec<i8>,
    length_bytes: u32,
    loop_start_bytes: u32,
    loop_length_bytes: u32,
    typical_period: u32,
    period_observed: bool,
}

impl SampleRecord {
    /// Chip memory address the PCM was read from
    pub fn pointer(&self) -> u32 {
        self.pointer
    }

    /// Signed 8-bit PCM
    pub fn pcm(&self) -> &[i8] {
        &self.pcm
    }

    pub fn length_bytes(&self) -> u32 {
        self.length_bytes
    }

    /// Loop start offset within `pcm` (0 until refined)
    pub fn loop_start_bytes(&self) -> u32 {
        self.loop_start_bytes
    }

    /// Loop length latched by the chip (0 = no loop known)
    ///
    /// May reach past the end of the cached PCM when the read was capped
    /// or the latch points beyond the buffer.
    pub fn loop_length_bytes(&self) -> u32 {
        self.loop_length_bytes
    }

    /// Loop length cut to the end of the cached PCM.
    pub fn playable_loop_length_bytes(&self) -> u32 {
        self.loop_length_bytes
            .min(self.length_bytes.saturating_sub(self.loop_start_bytes))
    }

    pub fn has_loop(&self) -> bool {
        self.loop_length_bytes > 0
    }

    /// Best-known period this sample was played at
    ///
    /// `NEUTRAL_PERIOD` until a trigger period was observed.
    pub fn typical_period(&self) -> u32 {
        self.typical_period
    }

    pub fn period_observed(&self) -> bool {
        self.period_observed
    }

    fn observe_period(&mut self, period: u32) {
        if !self.period_observed && period > 0 {
            self.typical_period = period;
            self.period_observed = true;
        }
    }
}

/// Per-scan sample cache keyed by pointer.
///
/// Also tracks pointers whose reads came back zero-filled.
#[derive(Debug, Clone, Default)]
pub struct SampleCache {
    records: BTreeMap<u32, SampleRecord>,
    zero_reads: BTreeMap<u32, u32>,
    abandoned: BTreeSet<u32>,
}

impl SampleCache {
    pub fn get(&self, pointer: u32) -> Option<&SampleRecord> {
        self.records.get(&pointer)
    }

    pub fn contains(&self, pointer: u32) -> bool {
        self.records.contains_key(&pointer)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &SampleRecord)> {
        self.records.iter()
    }

    /// Number of zero-filled reads seen for `pointer`.
    pub fn zero_reads(&self, pointer: u32) -> u32 {
        self.zero_reads.get(&pointer).copied().unwrap_or(0)
    }

    pub fn is_abandoned(&self, pointer: u32) -> bool {
        self.abandoned.contains(&pointer)
    }

    /// Pointers that only ever read as zero.
    pub fn unresolved_pointers(&self) -> Vec<u32> {
        self.zero_reads
            .keys()
            .filter(|p| !self.records.contains_key(p))
            .copied()
            .collect()
    }

    /// Hand the records to the caller.
    pub fn into_records(self) -> BTreeMap<u32, SampleRecord> {
        self.records
    }

    fn insert_new(&mut self, record: SampleRecord) -> bool {
        if self.records.contains_key(&record.pointer) {
            return false;
        }
        self.records.insert(record.pointer, record);
        true
    }
}

/// Result of a `SampleExtractor::maybe_extract` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// A new record was cached
    Extracted,
    /// The pointer is already cached
    AlreadyCached,
    /// No pointer, no length or DMA off
    Skipped,
    /// Loop stub at or below the minimum size
    TooShort,
    /// Memory read as all zeros; will be retried
    ZeroData,
    /// Retry limit exhausted for this pointer
    Abandoned,
}

/// Reads PCM and maintains loop points in a `SampleCache`.
#[derive(Debug, Clone, Copy)]
pub struct SampleExtractor {
    max_bytes: u32,
    min_bytes: u32,
    retry_limit: Option<u32>,
}

impl Default for SampleExtractor {
    fn default() -> Self {
        Self::new(128 * 1024, 4, None)
    }
}

impl SampleExtractor {
    /// # Arguments
    ///
    /// * `max_bytes` - Read cap per sample
    /// * `min_bytes` - Samples of this many bytes or fewer are skipped
    /// * `retry_limit` - Zero-filled reads tolerated per pointer (None for unbounded)
    pub fn new(max_bytes: u32, min_bytes: u32, retry_limit: Option<u32>) -> Self {
        Self {
            max_bytes,
            min_bytes,
            retry_limit,
        }
    }

    /// Cache the sample `channel` is playing if it is new.
    pub fn maybe_extract<M>(
        &self,
        cache: &mut SampleCache,
        memory: &mut M,
        channel: &ChannelSnapshot,
    ) -> ExtractOutcome
    where
        M: MemoryReader + ?Sized,
    {
        let pointer = channel.sample_pointer;
        if pointer == 0 || channel.sample_length_words == 0 || !channel.dma_active {
            return ExtractOutcome::Skipped;
        }
        if cache.contains(pointer) {
            return ExtractOutcome::AlreadyCached;
        }
        if cache.is_abandoned(pointer) {
            return ExtractOutcome::Abandoned;
        }

        let length_bytes = channel.sample_length_bytes().min(self.max_bytes);
        if length_bytes <= self.min_bytes {
            return ExtractOutcome::TooShort;
        }

        let data = memory.read_memory(pointer, length_bytes as usize);
        if data.iter().all(|&b| b == 0) {
            let count = cache.zero_reads.entry(pointer).or_insert(0);
            *count += 1;
            trace!("sample 0x{:06X} reads as zero ({} times)", pointer, count);
            if let Some(limit) = self.retry_limit
                && *count >= limit
            {
                debug!(
                    "abandoning sample 0x{:06X} after {} zero reads",
                    pointer, count
                );
                cache.abandoned.insert(pointer);
                return ExtractOutcome::Abandoned;
            }
            return ExtractOutcome::ZeroData;
        }

        let loop_length_bytes = if channel.pending_length_words > 1 {
            channel.pending_length_words.saturating_mul(2)
        } else {
            0
        };
        let record = SampleRecord {
            pointer,
            pcm: data.into_iter().map(|b| b as i8).collect(),
            length_bytes,
            loop_start_bytes: 0,
            loop_length_bytes,
            typical_period: if channel.period > 0 {
                channel.period
            } else {
                NEUTRAL_PERIOD
            },
            period_observed: channel.period > 0,
        };
        debug!(
            "cached sample 0x{:06X}: {} bytes, loop length {}",
            pointer, length_bytes, loop_length_bytes
        );
        cache.insert_new(record);
        ExtractOutcome::Extracted
    }

    /// Detect a loop reload between two snapshots of the same channel.
    ///
    /// When the pointer moves forward while DMA stays on, the distance is
    /// the loop start within the previously cached buffer and the pending
    /// length latch is the loop length. Only records without a known loop
    /// start are refined.
    ///
    /// # Returns
    ///
    /// true if the record of the previous pointer was refined
    pub fn refine_loop(
        &self,
        cache: &mut SampleCache,
        previous: &ChannelSnapshot,
        current: &ChannelSnapshot,
    ) -> bool {
        if !previous.dma_active || !current.dma_active {
            return false;
        }
        self.apply_sample_change(
            cache,
            previous.sample_pointer,
            current.sample_pointer,
            current.pending_length_words,
        )
    }

    /// Loop refinement for a pointer move from `previous` to `current`
    /// with DMA running throughout.
    ///
    /// The latch is stored as-is; `SampleRecord::playable_loop_length_bytes`
    /// gives the part that lies inside the cached PCM.
    fn apply_sample_change(
        &self,
        cache: &mut SampleCache,
        previous: u32,
        current: u32,
        pending_length_words: u32,
    ) -> bool {
        if previous == 0 || current <= previous {
            return false;
        }
        let Some(record) = cache.records.get_mut(&previous) else {
            return false;
        };
        if record.loop_start_bytes != 0 {
            return false;
        }
        let offset = current - previous;
        if offset >= record.length_bytes {
            return false;
        }
        record.loop_start_bytes = offset;
        record.loop_length_bytes = if pending_length_words > 1 {
            pending_length_words.saturating_mul(2)
        } else {
            0
        };
        debug!(
            "sample 0x{:06X}: loop start {} length {}",
            record.pointer, record.loop_start_bytes, record.loop_length_bytes
        );
        true
    }

    /// Run loop refinement, extraction and period refinement for every
    /// channel of `current`.
    ///
    /// # Returns
    ///
    /// Number of newly cached samples
    pub fn observe_tick<M>(
        &self,
        cache: &mut SampleCache,
        memory: &mut M,
        previous: &TickSnapshot,
        current: &TickSnapshot,
    ) -> usize
    where
        M: MemoryReader + ?Sized,
    {
        let mut extracted = 0;
        for (index, (prev, cur)) in previous.channels.iter().zip(&current.channels).enumerate() {
            let events = detect_events(index as u8, prev, cur);
            let dma_held = prev.dma_active && cur.dma_active;
            for event in &events {
                if let ChannelEvent::SampleChange {
                    previous: from,
                    current: to,
                    pending_length_words,
                    ..
                } = *event
                    && dma_held
                {
                    self.apply_sample_change(cache, from, to, pending_length_words);
                }
            }
            if self.maybe_extract(cache, memory, cur) == ExtractOutcome::Extracted {
                extracted += 1;
            }
            for event in events {
                if let ChannelEvent::Trigger {
                    period,
                    sample_pointer,
                    ..
                } = event
                    && let Some(record) = cache.records.get_mut(&sample_pointer)
                {
                    record.observe_period(period);
                }
            }
        }
        extracted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::SparseMemory;

    fn channel(pointer: u32, words: u32, period: u32) -> ChannelSnapshot {
        ChannelSnapshot {
            period,
            volume: 64,
            dma_active: true,
            sample_pointer: pointer,
            playback_pointer: pointer,
            sample_length_words: words,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_read_is_retried_until_data_appears() {
        let extractor = SampleExtractor::default();
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        let ch = channel(0x1_0000, 8, 428);

        assert_eq!(
            extractor.maybe_extract(&mut cache, &mut memory, &ch),
            ExtractOutcome::ZeroData
        );
        assert!(cache.is_empty());
        assert_eq!(cache.unresolved_pointers(), vec![0x1_0000]);

        memory.write(0x1_0000, &[0x10, 0xF0, 0x20, 0xE0]);
        assert_eq!(
            extractor.maybe_extract(&mut cache, &mut memory, &ch),
            ExtractOutcome::Extracted
        );
        let record = cache.get(0x1_0000).unwrap();
        assert_eq!(record.length_bytes(), 16);
        assert_eq!(&record.pcm()[..4], &[16, -16, 32, -32]);
        assert_eq!(record.typical_period(), 428);
        assert!(cache.unresolved_pointers().is_empty());
    }

    #[test]
    fn test_cached_pcm_survives_later_zero_reads() {
        let extractor = SampleExtractor::default();
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        let ch = channel(0x2_0000, 8, 428);
        memory.write(0x2_0000, &[1; 16]);
        extractor.maybe_extract(&mut cache, &mut memory, &ch);

        memory.clear();
        assert_eq!(
            extractor.maybe_extract(&mut cache, &mut memory, &ch),
            ExtractOutcome::AlreadyCached
        );
        assert_eq!(cache.get(0x2_0000).unwrap().pcm(), &[1_i8; 16][..]);
    }

    #[test]
    fn test_short_and_inactive_samples_are_skipped() {
        let extractor = SampleExtractor::default();
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        memory.write(0x3000, &[9; 64]);

        assert_eq!(
            extractor.maybe_extract(&mut cache, &mut memory, &channel(0x3000, 2, 428)),
            ExtractOutcome::TooShort
        );
        let mut off = channel(0x3000, 32, 428);
        off.dma_active = false;
        assert_eq!(
            extractor.maybe_extract(&mut cache, &mut memory, &off),
            ExtractOutcome::Skipped
        );
        assert_eq!(
            extractor.maybe_extract(&mut cache, &mut memory, &channel(0, 32, 428)),
            ExtractOutcome::Skipped
        );
    }

    #[test]
    fn test_read_is_capped() {
        let extractor = SampleExtractor::new(64, 4, None);
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        memory.write(0x4000, &[3; 256]);
        extractor.maybe_extract(&mut cache, &mut memory, &channel(0x4000, 128, 428));
        assert_eq!(cache.get(0x4000).unwrap().length_bytes(), 64);
    }

    #[test]
    fn test_retry_limit_abandons_pointer() {
        let extractor = SampleExtractor::new(1024, 4, Some(2));
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        let ch = channel(0x5000, 8, 428);
        assert_eq!(
            extractor.maybe_extract(&mut cache, &mut memory, &ch),
            ExtractOutcome::ZeroData
        );
        assert_eq!(
            extractor.maybe_extract(&mut cache, &mut memory, &ch),
            ExtractOutcome::Abandoned
        );
        memory.write(0x5000, &[1; 16]);
        assert_eq!(
            extractor.maybe_extract(&mut cache, &mut memory, &ch),
            ExtractOutcome::Abandoned
        );
        assert_eq!(cache.zero_reads(0x5000), 2);
    }

    #[test]
    fn test_pointer_advance_sets_loop() {
        let extractor = SampleExtractor::default();
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        memory.write(0x1_0000, &[5; 2000]);

        let attack = channel(0x1_0000, 1000, 428);
        extractor.maybe_extract(&mut cache, &mut memory, &attack);
        assert_eq!(cache.get(0x1_0000).unwrap().loop_length_bytes(), 0);

        let mut tail = channel(0x1_0000 + 1200, 400, 428);
        tail.pending_length_words = 400;
        assert!(extractor.refine_loop(&mut cache, &attack, &tail));
        let record = cache.get(0x1_0000).unwrap();
        assert_eq!(record.loop_start_bytes(), 1200);
        assert_eq!(record.loop_length_bytes(), 800);

        // already refined
        let mut again = channel(0x1_0000 + 1400, 100, 428);
        again.pending_length_words = 100;
        assert!(!extractor.refine_loop(&mut cache, &attack, &again));
    }

    #[test]
    fn test_loop_latch_past_buffer_end_is_kept() {
        let extractor = SampleExtractor::default();
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        memory.write(0x1_0000, &[5; 64]);
        let attack = channel(0x1_0000, 32, 428);
        extractor.maybe_extract(&mut cache, &mut memory, &attack);

        let mut tail = channel(0x1_0000 + 32, 100, 428);
        tail.pending_length_words = 100;
        assert!(extractor.refine_loop(&mut cache, &attack, &tail));
        let record = cache.get(0x1_0000).unwrap();
        assert_eq!(record.loop_start_bytes(), 32);
        assert_eq!(record.loop_length_bytes(), 200);
        assert_eq!(record.playable_loop_length_bytes(), 32);
    }

    #[test]
    fn test_observe_tick_refines_loop_on_pointer_move() {
        let extractor = SampleExtractor::default();
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        memory.write(0x1_0000, &[5; 2000]);

        let mut previous = TickSnapshot::default();
        previous.channels[2] = channel(0x1_0000, 1000, 428);
        let mut current = previous;
        extractor.observe_tick(&mut cache, &mut memory, &TickSnapshot::default(), &previous);

        current.channels[2].sample_pointer = 0x1_0000 + 1200;
        current.channels[2].pending_length_words = 400;
        extractor.observe_tick(&mut cache, &mut memory, &previous, &current);
        let record = cache.get(0x1_0000).unwrap();
        assert_eq!(record.loop_start_bytes(), 1200);
        assert_eq!(record.loop_length_bytes(), 800);

        // the move is ignored when DMA was off on the previous tick
        let mut cache = SampleCache::default();
        previous.channels[2].dma_active = true;
        extractor.maybe_extract(&mut cache, &mut memory, &previous.channels[2]);
        previous.channels[2].dma_active = false;
        extractor.observe_tick(&mut cache, &mut memory, &previous, &current);
        assert_eq!(cache.get(0x1_0000).unwrap().loop_start_bytes(), 0);
    }

    #[test]
    fn test_loop_offset_beyond_buffer_is_ignored() {
        let extractor = SampleExtractor::default();
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        memory.write(0x1_0000, &[5; 64]);
        let attack = channel(0x1_0000, 32, 428);
        extractor.maybe_extract(&mut cache, &mut memory, &attack);

        let backwards = channel(0x0_8000, 32, 428);
        assert!(!extractor.refine_loop(&mut cache, &attack, &backwards));
        let far = channel(0x1_0000 + 64, 32, 428);
        assert!(!extractor.refine_loop(&mut cache, &attack, &far));
        assert_eq!(cache.get(0x1_0000).unwrap().loop_start_bytes(), 0);
    }

    #[test]
    fn test_typical_period_refined_on_first_trigger() {
        let extractor = SampleExtractor::default();
        let mut cache = SampleCache::default();
        let mut memory = SparseMemory::default();
        memory.write(0x6000, &[7; 32]);

        let mut previous = TickSnapshot::default();
        previous.channels[0] = channel(0x6000, 16, 0);
        let mut current = TickSnapshot::default();
        current.channels[0] = channel(0x6000, 16, 0);
        assert_eq!(
            extractor.observe_tick(&mut cache, &mut memory, &previous, &current),
            1
        );
        assert_eq!(cache.get(0x6000).unwrap().typical_period(), NEUTRAL_PERIOD);
        assert!(!cache.get(0x6000).unwrap().period_observed());

        previous = current;
        current.channels[0].period = 320;
        extractor.observe_tick(&mut cache, &mut memory, &previous, &current);
        assert_eq!(cache.get(0x6000).unwrap().typical_period(), 320);

        previous = current;
        current.channels[0].period = 500;
        extractor.observe_tick(&mut cache, &mut memory, &previous, &current);
        assert_eq!(cache.get(0x6000).unwrap().typical_period(), 320);
    }
}
