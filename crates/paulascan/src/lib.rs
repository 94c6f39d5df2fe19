#![doc = include_str!("../README.md")]
//! paulascan: tracker-style song reconstruction from Paula register traces
//!
//! `paulascan` fast-forwards an Amiga music emulator silently, samples the
//! Paula and CIA registers after every small chunk of audio, and rebuilds a
//! symbolic song from what it sees: rows of notes with effects, the
//! instrument waveforms read back from chip memory, and the tempo.
//!
//! Key pieces:
//! - `chip`: the emulator contract (`ChipEmulator`, register snapshots,
//!   chip memory) plus period/note conversion.
//! - `scan`: the `Scanner` and the phases it runs (tick sampling, sample
//!   extraction, tempo estimation, row grouping with effect detection and
//!   loop detection).
//! - `trace`: a compact binary recording of everything a scan reads, so a
//!   scan can be repeated without the emulator.
//!
//! Example: scanning a recorded trace
//!
//! ```rust
//! use paulascan::chip::{CHANNELS, ChannelSnapshot, CiaState};
//! use paulascan::scan::{ScanConfig, Scanner};
//! use paulascan::trace::{TickRecord, TraceBuilder, TraceEmulator};
//!
//! // A short trace: one note on channel 0, CIA timer at 125 BPM.
//! let mut builder = TraceBuilder::new(44_100);
//! builder.add_memory_block(0x1_0000, vec![0x40; 1024]);
//! for i in 0..200 {
//!     let mut channels = [ChannelSnapshot::default(); CHANNELS];
//!     channels[0] = ChannelSnapshot {
//!         period: 428,
//!         volume: 64,
//!         dma_active: true,
//!         sample_pointer: 0x1_0000,
//!         playback_pointer: 0x1_0000 + i,
//!         sample_length_words: 512,
//!         ..Default::default()
//!     };
//!     builder.add_tick(TickRecord {
//!         frames: 128,
//!         cia: CiaState { timer_a_value: 14_186, vblank_hz: 50 },
//!         channels,
//!     });
//! }
//!
//! let mut emulator = TraceEmulator::new(builder.finalize());
//! let result = Scanner::new(ScanConfig::default()).scan(&mut emulator).unwrap();
//!
//! assert_eq!(result.bpm, 125);
//! assert!(result.cia_reliable);
//! assert_eq!(result.rows[0].channels[0].period, 428);
//! ```
//!
//! Example: recording and serializing a trace
//!
//! ```rust
//! use paulascan::trace::{TraceBuilder, TraceDocument};
//!
//! let document = TraceBuilder::new(48_000).finalize();
//! let bytes: Vec<u8> = (&document).into();
//! let parsed: TraceDocument = bytes.as_slice().try_into().unwrap();
//! assert_eq!(parsed, document);
//! ```
mod binutil;
pub mod chip;
pub mod scan;
pub mod trace;

pub use binutil::ParseError;
pub use chip::{ChipEmulator, SongInfo};
pub use scan::{ScanConfig, ScanError, ScanResult, Scanner, Termination};
pub use trace::{TraceBuilder, TraceDocument, TraceEmulator, TraceRecorder};
