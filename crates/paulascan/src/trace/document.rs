//! Trace document and builder.
//!
//! `TraceDocument` holds a parsed or recorded trace: the header and the
//! ordered command stream. `TraceBuilder` assembles documents and computes
//! the derived header fields in `finalize()`. Conversions to and from bytes
//! are provided through `From<&TraceDocument> for Vec<u8>` and
//! `TryFrom<&[u8]> for TraceDocument`.

use std::convert::TryFrom;

use super::command::{MemoryBlock, TickRecord, TraceCommand};
use super::parser;
use crate::binutil::{push_str, push_u32, write_u32};
use crate::chip::{SongInfo, SubsongRange};

pub const TRACE_IDENT: [u8; 4] = *b"PSCN";
pub const TRACE_VERSION: u32 = 0x0100;
/// Offset of the header-size field.
pub(crate) const HEADER_SIZE_OFFSET: usize = 0x08;

/// Trace file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    pub version: u32,
    pub sample_rate: u32,
    pub vblank_hz: u32,
    /// Frames the recording scan rendered per tick
    pub chunk_frames: u32,
    /// Number of tick commands, computed by `TraceBuilder::finalize`
    pub tick_count: u32,
    pub info: SongInfo,
}

impl Default for TraceHeader {
    fn default() -> Self {
        Self {
            version: TRACE_VERSION,
            sample_rate: 44_100,
            vblank_hz: 50,
            chunk_frames: 128,
            tick_count: 0,
            info: SongInfo::default(),
        }
    }
}

impl TraceHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&TRACE_IDENT);
        push_u32(&mut out, self.version);
        push_u32(&mut out, 0);
        push_u32(&mut out, self.sample_rate);
        push_u32(&mut out, self.vblank_hz);
        push_u32(&mut out, self.chunk_frames);
        push_u32(&mut out, self.tick_count);
        let subsong = self.info.subsong.unwrap_or_default();
        out.push(self.info.subsong.is_some() as u8);
        push_u32(&mut out, subsong.min);
        push_u32(&mut out, subsong.max);
        push_u32(&mut out, subsong.default);
        push_str(&mut out, self.info.player_name.as_deref());
        push_str(&mut out, self.info.format_name.as_deref());
        let size = out.len() as u32;
        write_u32(&mut out, HEADER_SIZE_OFFSET, size);
        out
    }
}

/// A complete trace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TraceDocument {
    pub header: TraceHeader,
    pub commands: Vec<TraceCommand>,
}

impl TraceDocument {
    /// Serialize header and commands.
    ///
    /// An end-of-data marker is appended if the command stream lacks one.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header.to_bytes();
        for command in &self.commands {
            out.extend_from_slice(&command.to_bytes());
        }
        if !matches!(self.commands.last(), Some(TraceCommand::EndOfData)) {
            out.extend_from_slice(&TraceCommand::EndOfData.to_bytes());
        }
        out
    }

    /// Iterate tick records in order.
    pub fn ticks(&self) -> impl Iterator<Item = &TickRecord> {
        self.commands.iter().filter_map(|c| match c {
            TraceCommand::Tick(tick) => Some(tick),
            _ => None,
        })
    }

    /// Total frames over all tick records.
    pub fn total_frames(&self) -> u64 {
        self.ticks().map(|t| t.frames.max(0) as u64).sum()
    }

    /// Number of memory blocks and their total size in bytes.
    pub fn memory_stats(&self) -> (usize, usize) {
        self.commands
            .iter()
            .filter_map(|c| match c {
                TraceCommand::MemoryBlock(block) => Some(block.data.len()),
                _ => None,
            })
            .fold((0, 0), |(n, bytes), len| (n + 1, bytes + len))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceCommand> {
        self.commands.iter()
    }
}

impl<'a> IntoIterator for &'a TraceDocument {
    type Item = &'a TraceCommand;
    type IntoIter = std::slice::Iter<'a, TraceCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// Builder for assembling a `TraceDocument`.
///
/// Methods return `&mut Self` to allow chaining. Call `finalize()` to
/// compute the tick count and terminate the command stream.
pub struct TraceBuilder {
    document: TraceDocument,
}

impl TraceBuilder {
    pub fn new(sample_rate: u32) -> Self {
        TraceBuilder {
            document: TraceDocument {
                header: TraceHeader {
                    sample_rate,
                    ..Default::default()
                },
                commands: Vec::new(),
            },
        }
    }

    pub fn set_vblank_hz(&mut self, vblank_hz: u32) -> &mut Self {
        self.document.header.vblank_hz = vblank_hz;
        self
    }

    pub fn set_chunk_frames(&mut self, chunk_frames: u32) -> &mut Self {
        self.document.header.chunk_frames = chunk_frames;
        self
    }

    pub fn set_song_info(&mut self, info: SongInfo) -> &mut Self {
        self.document.header.info = info;
        self
    }

    pub fn set_subsong(&mut self, subsong: SubsongRange) -> &mut Self {
        self.document.header.info.subsong = Some(subsong);
        self
    }

    pub fn add_tick(&mut self, tick: TickRecord) -> &mut Self {
        self.document.commands.push(tick.into());
        self
    }

    /// Append the contents of a memory range read after the last tick.
    pub fn add_memory_block(&mut self, address: u32, data: Vec<u8>) -> &mut Self {
        self.document
            .commands
            .push(MemoryBlock { address, data }.into());
        self
    }

    /// Number of ticks added so far.
    pub fn tick_count(&self) -> usize {
        self.document.ticks().count()
    }

    /// Finalize the builder and return the assembled `TraceDocument`.
    pub fn finalize(mut self) -> TraceDocument {
        self.document
            .commands
            .retain(|c| !matches!(c, TraceCommand::EndOfData));
        self.document.header.tick_count = self.document.ticks().count() as u32;
        self.document.commands.push(TraceCommand::EndOfData);
        self.document
    }
}

impl From<TraceDocument> for TraceBuilder {
    fn from(document: TraceDocument) -> Self {
        TraceBuilder { document }
    }
}

/// Parse raw trace bytes.
impl TryFrom<&[u8]> for TraceDocument {
    type Error = crate::binutil::ParseError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        parser::parse_trace(bytes)
    }
}

impl From<TraceDocument> for Vec<u8> {
    fn from(document: TraceDocument) -> Vec<u8> {
        document.to_bytes()
    }
}

impl From<&TraceDocument> for Vec<u8> {
    fn from(document: &TraceDocument) -> Vec<u8> {
        document.to_bytes()
    }
}
