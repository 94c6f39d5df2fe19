//! Trace commands.

use crate::binutil::{push_i32, push_u32};
use crate::chip::{CHANNELS, ChannelSnapshot, CiaState};

pub const OP_TICK: u8 = 0x01;
pub const OP_MEMORY_BLOCK: u8 = 0x02;
pub const OP_END_OF_DATA: u8 = 0x66;

/// Serialized size of one channel: seven u32 registers and a flag byte.
pub const CHANNEL_RECORD_SIZE: usize = 7 * 4 + 1;
/// Serialized size of a tick payload (without the opcode).
pub const TICK_PAYLOAD_SIZE: usize = 4 + 4 + 4 + CHANNELS * CHANNEL_RECORD_SIZE;

const FLAG_DMA_ACTIVE: u8 = 0x01;

/// Chip state after one rendered chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickRecord {
    /// Frames the emulator reported for the chunk
    pub frames: i32,
    pub cia: CiaState,
    pub channels: [ChannelSnapshot; CHANNELS],
}

/// Chip memory contents read during the preceding tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryBlock {
    pub address: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceCommand {
    Tick(TickRecord),
    MemoryBlock(MemoryBlock),
    EndOfData,
}

impl TraceCommand {
    pub fn opcode(&self) -> u8 {
        match self {
            TraceCommand::Tick(_) => OP_TICK,
            TraceCommand::MemoryBlock(_) => OP_MEMORY_BLOCK,
            TraceCommand::EndOfData => OP_END_OF_DATA,
        }
    }

    /// Serialize the command including its opcode.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.opcode()];
        match self {
            TraceCommand::Tick(tick) => {
                push_i32(&mut out, tick.frames);
                push_u32(&mut out, tick.cia.timer_a_value);
                push_u32(&mut out, tick.cia.vblank_hz);
                for ch in &tick.channels {
                    push_channel(&mut out, ch);
                }
            }
            TraceCommand::MemoryBlock(block) => {
                push_u32(&mut out, block.address);
                push_u32(&mut out, block.data.len() as u32);
                out.extend_from_slice(&block.data);
            }
            TraceCommand::EndOfData => {}
        }
        out
    }
}

fn push_channel(out: &mut Vec<u8>, ch: &ChannelSnapshot) {
    push_u32(out, ch.period);
    push_u32(out, ch.volume);
    push_u32(out, ch.sample_pointer);
    push_u32(out, ch.playback_pointer);
    push_u32(out, ch.sample_length_words);
    push_u32(out, ch.pending_period);
    push_u32(out, ch.pending_length_words);
    out.push(if ch.dma_active { FLAG_DMA_ACTIVE } else { 0 });
}

pub(crate) fn channel_from_fields(fields: [u32; 7], flags: u8) -> ChannelSnapshot {
    ChannelSnapshot {
        period: fields[0],
        volume: fields[1],
        dma_active: flags & FLAG_DMA_ACTIVE != 0,
        sample_pointer: fields[2],
        playback_pointer: fields[3],
        sample_length_words: fields[4],
        pending_period: fields[5],
        pending_length_words: fields[6],
    }
}

impl From<TickRecord> for TraceCommand {
    fn from(tick: TickRecord) -> Self {
        TraceCommand::Tick(tick)
    }
}

impl From<MemoryBlock> for TraceCommand {
    fn from(block: MemoryBlock) -> Self {
        TraceCommand::MemoryBlock(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_size() {
        let bytes = TraceCommand::Tick(TickRecord::default()).to_bytes();
        assert_eq!(bytes.len(), 1 + TICK_PAYLOAD_SIZE);
        assert_eq!(bytes[0], OP_TICK);
    }

    #[test]
    fn test_memory_block_layout() {
        let bytes = TraceCommand::MemoryBlock(MemoryBlock {
            address: 0x0001_2345,
            data: vec![0xAA, 0xBB],
        })
        .to_bytes();
        assert_eq!(bytes, vec![0x02, 0x45, 0x23, 0x01, 0x00, 0x02, 0, 0, 0, 0xAA, 0xBB]);
        assert_eq!(TraceCommand::EndOfData.to_bytes(), vec![0x66]);
    }
}
