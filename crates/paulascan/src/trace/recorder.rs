//! Trace recording.

use super::command::TickRecord;
use super::document::{TraceBuilder, TraceDocument};
use crate::chip::{
    CHANNELS, ChannelSnapshot, ChipEmulator, CiaState, MemoryReader, SnapshotAccessor, SongInfo,
    SparseMemory,
};

/// Wraps an emulator and records everything read through it.
///
/// Every successful render appends a tick record. Memory reads append a
/// memory block whenever the data differs from what a replay would hold at
/// that point, so a replay of the trace reads exactly what the live
/// emulator returned.
///
/// # Examples
///
/// ```ignore
/// let mut recorder = TraceRecorder::new(uade);
/// let live = Scanner::new(ScanConfig::default()).scan(&mut recorder)?;
/// let bytes: Vec<u8> = (&recorder.into_document()).into();
/// std::fs::write("song.pscn", bytes)?;
/// ```
pub struct TraceRecorder<E> {
    inner: E,
    builder: TraceBuilder,
    shadow: SparseMemory,
}

impl<E> TraceRecorder<E>
where
    E: ChipEmulator,
{
    pub fn new(inner: E) -> Self {
        let mut builder = TraceBuilder::new(inner.sample_rate());
        builder
            .set_vblank_hz(inner.cia_state().vblank_hz)
            .set_song_info(inner.song_info());
        Self {
            inner,
            builder,
            shadow: SparseMemory::default(),
        }
    }

    /// Record the chunk size the scan renders with.
    pub fn set_chunk_frames(&mut self, chunk_frames: u32) -> &mut Self {
        self.builder.set_chunk_frames(chunk_frames);
        self
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn ticks_recorded(&self) -> usize {
        self.builder.tick_count()
    }

    /// Finish the recording.
    pub fn into_document(self) -> TraceDocument {
        self.builder.finalize()
    }

    /// Finish the recording and hand back the wrapped emulator.
    pub fn into_parts(self) -> (E, TraceDocument) {
        (self.inner, self.builder.finalize())
    }
}

impl<E> SnapshotAccessor for TraceRecorder<E>
where
    E: ChipEmulator,
{
    fn channel_snapshot(&self) -> [ChannelSnapshot; CHANNELS] {
        self.inner.channel_snapshot()
    }

    fn cia_state(&self) -> CiaState {
        self.inner.cia_state()
    }
}

impl<E> MemoryReader for TraceRecorder<E>
where
    E: ChipEmulator,
{
    fn read_memory(&mut self, addr: u32, len: usize) -> Vec<u8> {
        let data = self.inner.read_memory(addr, len);
        if self.shadow.read_memory(addr, data.len()) != data {
            self.shadow.write(addr, &data);
            self.builder.add_memory_block(addr, data.clone());
        }
        data
    }
}

impl<E> ChipEmulator for TraceRecorder<E>
where
    E: ChipEmulator,
{
    fn render_silent(&mut self, max_frames: usize) -> i32 {
        let frames = self.inner.render_silent(max_frames);
        if frames > 0 {
            self.builder.add_tick(TickRecord {
                frames,
                cia: self.inner.cia_state(),
                channels: self.inner.channel_snapshot(),
            });
        }
        frames
    }

    fn set_looping(&mut self, enabled: bool) {
        self.inner.set_looping(enabled);
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn song_info(&self) -> SongInfo {
        self.inner.song_info()
    }
}
