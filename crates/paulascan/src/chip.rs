//! Paula/CIA hardware model seen by the scanner.
//!
//! The scanner never looks inside the emulator. Everything it knows comes
//! through the register snapshot contract in `snapshot`, the chip memory
//! contract in `memory`, and the render/looping controls in `emulator`.
//! `event` derives note triggers from successive snapshots and `period`
//! converts Paula periods to frequencies and tracker notes.
pub mod emulator;
pub mod event;
pub mod memory;
pub mod period;
pub mod snapshot;

pub use emulator::{ChipEmulator, SongInfo, SubsongRange};
pub use memory::{MemoryReader, SparseMemory};
pub use snapshot::{CHANNELS, ChannelSnapshot, CiaState, SnapshotAccessor, TickSnapshot};
