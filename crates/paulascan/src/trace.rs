//! Register traces.
//!
//! A trace is a recording of everything a scan observes from an emulator:
//! one tick record per rendered chunk and every chip memory block the scan
//! read. Traces make scans reproducible without the emulator. Record one
//! with `TraceRecorder`, serialize it with `Vec::<u8>::from(&document)`,
//! parse it back with `TraceDocument::try_from(bytes)` and scan it again
//! through `TraceEmulator`.
//!
//! File layout (little-endian):
//!
//! | offset | field |
//! |---|---|
//! | 0x00 | ident `PSCN` |
//! | 0x04 | version (`0x0100`) |
//! | 0x08 | header size in bytes |
//! | 0x0C | sample rate |
//! | 0x10 | vblank Hz |
//! | 0x14 | chunk frames |
//! | 0x18 | tick count |
//! | 0x1C | subsong flag (u8), min, max, default (u32 each) |
//! | 0x29 | player name, format name (u16 length + UTF-8) |
//!
//! The command stream follows the header and ends with `0x66`.
pub mod command;
pub mod document;
pub mod parser;
pub mod recorder;
pub mod replay;

pub use command::{MemoryBlock, TickRecord, TraceCommand};
pub use document::{TraceBuilder, TraceDocument, TraceHeader};
pub use parser::{parse_trace, parse_trace_command, parse_trace_header};
pub use recorder::TraceRecorder;
pub use replay::TraceEmulator;
