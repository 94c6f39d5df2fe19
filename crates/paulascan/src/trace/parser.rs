//! Trace parser.
//!
//! Entry points:
//! - `parse_trace(bytes)` parses a whole trace into a `TraceDocument`.
//! - `parse_trace_header(bytes)` parses the header only and returns it with
//!   the offset of the first command.
//! - `parse_trace_command(bytes, off)` decodes a single command.
//!
//! Parsing is strict: short buffers, a wrong ident, an unsupported major
//! version and unknown opcodes are reported as `ParseError`.

use super::command::{
    CHANNEL_RECORD_SIZE, MemoryBlock, OP_END_OF_DATA, OP_MEMORY_BLOCK, OP_TICK, TICK_PAYLOAD_SIZE,
    TickRecord, TraceCommand, channel_from_fields,
};
use super::document::{HEADER_SIZE_OFFSET, TRACE_IDENT, TRACE_VERSION, TraceDocument, TraceHeader};
use crate::binutil::{
    ParseError, read_i32_le_at, read_slice, read_str_at, read_u8_at, read_u32_le_at,
};
use crate::chip::{CHANNELS, ChannelSnapshot, CiaState, SongInfo, SubsongRange};

/// Bytes before the variable-length strings.
const FIXED_HEADER_SIZE: usize = 0x29;

/// Parse a complete trace.
///
/// Parsing stops at the end-of-data command; trailing bytes are ignored. A
/// stream that ends without the marker is accepted as long as every command
/// in it is complete.
pub fn parse_trace(bytes: &[u8]) -> Result<TraceDocument, ParseError> {
    let (header, mut off) = parse_trace_header(bytes)?;
    let mut commands = Vec::new();
    while off < bytes.len() {
        let (command, consumed) = parse_trace_command(bytes, off)?;
        off += consumed;
        let end = command == TraceCommand::EndOfData;
        commands.push(command);
        if end {
            break;
        }
    }
    Ok(TraceDocument { header, commands })
}

/// Parse the trace header at the start of `bytes`.
///
/// # Returns
///
/// The header and the offset of the first command
pub fn parse_trace_header(bytes: &[u8]) -> Result<(TraceHeader, usize), ParseError> {
    if bytes.len() < FIXED_HEADER_SIZE {
        return Err(ParseError::HeaderTooShort("trace header".into()));
    }
    let mut ident = [0_u8; 4];
    ident.copy_from_slice(read_slice(bytes, 0, 4, "ident")?);
    if ident != TRACE_IDENT {
        return Err(ParseError::InvalidIdent(ident));
    }
    let version = read_u32_le_at(bytes, 0x04)?;
    if version >> 8 != TRACE_VERSION >> 8 {
        return Err(ParseError::UnsupportedVersion(version));
    }
    let header_size = read_u32_le_at(bytes, HEADER_SIZE_OFFSET)? as usize;

    let sample_rate = read_u32_le_at(bytes, 0x0C)?;
    let vblank_hz = read_u32_le_at(bytes, 0x10)?;
    let chunk_frames = read_u32_le_at(bytes, 0x14)?;
    let tick_count = read_u32_le_at(bytes, 0x18)?;
    let has_subsong = read_u8_at(bytes, 0x1C)? != 0;
    let subsong = has_subsong
        .then(|| -> Result<SubsongRange, ParseError> {
            Ok(SubsongRange {
                min: read_u32_le_at(bytes, 0x1D)?,
                max: read_u32_le_at(bytes, 0x21)?,
                default: read_u32_le_at(bytes, 0x25)?,
            })
        })
        .transpose()?;

    let mut off = FIXED_HEADER_SIZE;
    let (player_name, used) = read_str_at(bytes, off, "player_name")?;
    off += used;
    let (format_name, used) = read_str_at(bytes, off, "format_name")?;
    off += used;

    if header_size < off {
        return Err(ParseError::HeaderTooShort(format!(
            "header_size {} is smaller than the {} bytes read",
            header_size, off
        )));
    }
    if header_size > bytes.len() {
        return Err(ParseError::OffsetOutOfRange {
            offset: header_size,
            needed: 0,
            available: bytes.len(),
            context: Some("header_size".into()),
        });
    }

    let header = TraceHeader {
        version,
        sample_rate,
        vblank_hz,
        chunk_frames,
        tick_count,
        info: SongInfo {
            player_name,
            format_name,
            subsong,
        },
    };
    Ok((header, header_size))
}

/// Decode the command at `off`.
///
/// # Returns
///
/// The command and the number of bytes consumed including the opcode
pub fn parse_trace_command(bytes: &[u8], off: usize) -> Result<(TraceCommand, usize), ParseError> {
    let opcode = read_u8_at(bytes, off)?;
    let payload = off + 1;
    match opcode {
        OP_TICK => {
            let raw = read_slice(bytes, payload, TICK_PAYLOAD_SIZE, "tick")
                .map_err(|_| ParseError::UnexpectedEof)?;
            let frames = read_i32_le_at(raw, 0)?;
            let cia = CiaState {
                timer_a_value: read_u32_le_at(raw, 4)?,
                vblank_hz: read_u32_le_at(raw, 8)?,
            };
            let mut channels = [ChannelSnapshot::default(); CHANNELS];
            for (ch, slot) in channels.iter_mut().enumerate() {
                let base = 12 + ch * CHANNEL_RECORD_SIZE;
                let mut fields = [0_u32; 7];
                for (i, field) in fields.iter_mut().enumerate() {
                    *field = read_u32_le_at(raw, base + i * 4)?;
                }
                *slot = channel_from_fields(fields, read_u8_at(raw, base + 28)?);
            }
            Ok((
                TraceCommand::Tick(TickRecord {
                    frames,
                    cia,
                    channels,
                }),
                1 + TICK_PAYLOAD_SIZE,
            ))
        }
        OP_MEMORY_BLOCK => {
            let address = read_u32_le_at(bytes, payload)?;
            let len = read_u32_le_at(bytes, payload + 4)? as usize;
            let data = read_slice(bytes, payload + 8, len, "memory_block")?.to_vec();
            Ok((
                TraceCommand::MemoryBlock(MemoryBlock { address, data }),
                1 + 8 + len,
            ))
        }
        OP_END_OF_DATA => Ok((TraceCommand::EndOfData, 1)),
        other => Err(ParseError::UnknownOpcode { opcode: other, offset: off }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceBuilder;

    fn sample_document() -> TraceDocument {
        let mut tick = TickRecord {
            frames: 128,
            cia: CiaState {
                timer_a_value: 14_186,
                vblank_hz: 50,
            },
            ..Default::default()
        };
        tick.channels[1] = ChannelSnapshot {
            period: 428,
            volume: 48,
            dma_active: true,
            sample_pointer: 0x2_0000,
            playback_pointer: 0x2_0040,
            sample_length_words: 900,
            pending_period: 428,
            pending_length_words: 300,
        };
        let mut builder = TraceBuilder::new(44_100);
        builder
            .set_song_info(SongInfo {
                player_name: Some("ProTracker".into()),
                format_name: Some("MOD".into()),
                subsong: Some(SubsongRange {
                    min: 0,
                    max: 2,
                    default: 1,
                }),
            })
            .add_tick(tick)
            .add_memory_block(0x2_0000, vec![1, 2, 3, 4, 5]);
        builder.finalize()
    }

    #[test]
    fn test_parse_serialized_document() {
        let doc = sample_document();
        let bytes: Vec<u8> = (&doc).into();
        let parsed = TraceDocument::try_from(bytes.as_slice()).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(parsed.header.info.subsong.unwrap().max, 2);
    }

    #[test]
    fn test_rejects_bad_ident_and_version() {
        let mut bytes: Vec<u8> = (&sample_document()).into();
        bytes[0] = b'X';
        assert!(matches!(
            parse_trace(&bytes),
            Err(ParseError::InvalidIdent(_))
        ));

        let mut bytes: Vec<u8> = (&sample_document()).into();
        bytes[5] = 0x02;
        assert_eq!(
            parse_trace(&bytes).unwrap_err(),
            ParseError::UnsupportedVersion(0x0200)
        );
        assert!(matches!(
            parse_trace(b"PSCN"),
            Err(ParseError::HeaderTooShort(_))
        ));
    }

    #[test]
    fn test_truncated_tick_is_unexpected_eof() {
        let bytes: Vec<u8> = (&sample_document()).into();
        let (_, start) = parse_trace_header(&bytes).unwrap();
        let cut = &bytes[..start + 20];
        assert_eq!(parse_trace(cut).unwrap_err(), ParseError::UnexpectedEof);
    }

    #[test]
    fn test_unknown_opcode() {
        let bytes: Vec<u8> = (&sample_document()).into();
        let (_, start) = parse_trace_header(&bytes).unwrap();
        let mut broken = bytes[..start].to_vec();
        broken.push(0x7F);
        assert_eq!(
            parse_trace(&broken).unwrap_err(),
            ParseError::UnknownOpcode {
                opcode: 0x7F,
                offset: start
            }
        );
    }
}
