//! Per-scan mutable state.

use log::warn;

use super::row::Row;
use super::sample::{SampleCache, SampleExtractor};
use crate::chip::{MemoryReader, TickSnapshot};

/// State owned by one scan and threaded through every phase.
///
/// The sample cache is written only through `observe_tick`.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    pub sample_rate: u32,
    /// Last tick passed to `observe_tick`
    pub previous: TickSnapshot,
    pub samples: SampleCache,
    pub rows: Vec<Row>,
    pub warnings: Vec<String>,
}

impl ScanContext {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    /// Record a diagnostic for the result and log it.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Run sample extraction for a freshly captured tick.
    pub fn observe_tick<M>(
        &mut self,
        extractor: &SampleExtractor,
        memory: &mut M,
        tick: &TickSnapshot,
    ) where
        M: MemoryReader + ?Sized,
    {
        extractor.observe_tick(&mut self.samples, memory, &self.previous, tick);
        self.previous = *tick;
    }

    /// Append a row and return its index.
    pub fn push_row(&mut self, row: Row) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }
}
