//! Register-trace scanning.
//!
//! The `Scanner` drives a `ChipEmulator` forward in small chunks, captures
//! one `TickSnapshot` per chunk and reconstructs a tracker-style song from
//! the snapshots:
//!
//! - `sampler` renders chunks and captures snapshots
//! - `sample` extracts PCM from chip memory and refines loop points
//! - `tempo` estimates BPM and speed from CIA timer values or trigger spacing
//! - `row` groups ticks into rows and `effect` classifies each channel's row
//! - `loop_detect` stops the scan once the row stream repeats
//!
//! All state lives in a `ScanContext` owned by a single scan.
pub mod config;
pub mod context;
pub mod effect;
pub mod error;
pub mod loop_detect;
pub mod row;
pub mod sample;
pub mod sampler;
pub mod scanner;
pub mod tempo;

pub use config::ScanConfig;
pub use context::ScanContext;
pub use effect::{Effect, EffectType};
pub use error::ScanError;
pub use loop_detect::{LoopDetector, LoopMatch};
pub use row::{ChannelRowEntry, Row, RowGrouper, group_and_detect};
pub use sample::{ExtractOutcome, SampleCache, SampleExtractor, SampleRecord};
pub use sampler::{SamplerStop, TickSampler};
pub use scanner::{ScanResult, Scanner, Termination};
pub use tempo::{TempoChange, TempoEstimate, TempoSource, TempoTracker};
