//! Trace replay.

use log::trace;

use super::command::{TickRecord, TraceCommand};
use super::document::TraceDocument;
use crate::chip::{
    CHANNELS, ChannelSnapshot, ChipEmulator, CiaState, MemoryReader, SnapshotAccessor, SongInfo,
    SparseMemory,
};

/// A `ChipEmulator` that plays back a recorded trace.
///
/// Each `render_silent` call consumes one tick record and applies the
/// memory blocks recorded with it. Past the last tick it reports the end of
/// the song, or starts over when looping is enabled.
#[derive(Debug, Clone)]
pub struct TraceEmulator {
    document: TraceDocument,
    cursor: usize,
    current: TickRecord,
    memory: SparseMemory,
    looping: bool,
}

impl TraceEmulator {
    pub fn new(document: TraceDocument) -> Self {
        let vblank_hz = document.header.vblank_hz;
        Self {
            document,
            cursor: 0,
            current: TickRecord {
                cia: CiaState {
                    timer_a_value: 0,
                    vblank_hz,
                },
                ..Default::default()
            },
            memory: SparseMemory::default(),
            looping: false,
        }
    }

    pub fn document(&self) -> &TraceDocument {
        &self.document
    }

    /// Rewind to the first tick and forget all memory.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.memory.clear();
    }

    /// Apply memory blocks up to the next tick, consume it, then apply the
    /// blocks recorded after it.
    fn advance(&mut self) -> Option<TickRecord> {
        let mut tick = None;
        while let Some(command) = self.document.commands.get(self.cursor) {
            match command {
                TraceCommand::Tick(record) => {
                    if tick.is_some() {
                        break;
                    }
                    tick = Some(*record);
                }
                TraceCommand::MemoryBlock(block) => {
                    self.memory.write(block.address, &block.data);
                }
                TraceCommand::EndOfData => break,
            }
            self.cursor += 1;
        }
        tick
    }
}

impl SnapshotAccessor for TraceEmulator {
    fn channel_snapshot(&self) -> [ChannelSnapshot; CHANNELS] {
        self.current.channels
    }

    fn cia_state(&self) -> CiaState {
        self.current.cia
    }
}

impl MemoryReader for TraceEmulator {
    fn read_memory(&mut self, addr: u32, len: usize) -> Vec<u8> {
        self.memory.read_memory(addr, len)
    }
}

impl ChipEmulator for TraceEmulator {
    fn render_silent(&mut self, max_frames: usize) -> i32 {
        let mut next = self.advance();
        if next.is_none() && self.looping && self.document.ticks().next().is_some() {
            trace!("trace exhausted, looping");
            self.rewind();
            next = self.advance();
        }
        match next {
            Some(record) => {
                self.current = record;
                record.frames.min(max_frames.min(i32::MAX as usize) as i32)
            }
            None => 0,
        }
    }

    fn set_looping(&mut self, enabled: bool) {
        self.looping = enabled;
    }

    fn sample_rate(&self) -> u32 {
        self.document.header.sample_rate
    }

    fn song_info(&self) -> SongInfo {
        self.document.header.info.clone()
    }
}
