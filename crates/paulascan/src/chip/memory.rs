//! Chip memory access.
//!
//! This module provides the `MemoryReader` trait the sample extractor reads
//! PCM through, and `SparseMemory`, a paged backing store used by trace
//! replay and test emulators.
//!
//! # Examples
//!
//! ```
//! use paulascan::chip::{MemoryReader, SparseMemory};
//!
//! let mut memory = SparseMemory::default();
//! memory.write(0x1_0000, &[1, 2, 3, 4]);
//! assert_eq!(memory.read_memory(0x1_0002, 4), vec![3, 4, 0, 0]);
//! ```

use std::collections::HashMap;

/// Read access to emulated chip memory.
pub trait MemoryReader {
    /// Read `len` bytes starting at `addr`.
    ///
    /// # Arguments
    ///
    /// * `addr` - Chip memory address
    /// * `len` - Number of bytes to read
    ///
    /// # Returns
    ///
    /// Exactly `len` bytes. Unmapped memory reads as zero, so an all-zero
    /// result may also mean the replayer has not unpacked the data yet.
    fn read_memory(&mut self, addr: u32, len: usize) -> Vec<u8>;
}

/// Page size of `SparseMemory` in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Sparse paged memory (HashMap of 4 KiB pages)
///
/// Memory usage scales with the number of distinct pages written, not the
/// 24-bit Amiga address space. Pages that were never written read as zero.
#[derive(Debug, Clone, Default)]
pub struct SparseMemory {
    pages: HashMap<u32, Box<[u8; PAGE_SIZE]>>,
}

impl SparseMemory {
    /// Write `data` starting at `addr`, allocating pages as needed.
    ///
    /// Writes that run past `u32::MAX` are cut at the end of the address space.
    pub fn write(&mut self, addr: u32, data: &[u8]) {
        let mut offset = 0_usize;
        while offset < data.len() {
            let Some(cur) = addr.checked_add(offset as u32) else {
                break;
            };
            let page_index = cur / PAGE_SIZE as u32;
            let in_page = (cur as usize) % PAGE_SIZE;
            let count = (PAGE_SIZE - in_page).min(data.len() - offset);
            let page = self
                .pages
                .entry(page_index)
                .or_insert_with(|| Box::new([0_u8; PAGE_SIZE]));
            page[in_page..in_page + count].copy_from_slice(&data[offset..offset + count]);
            offset += count;
        }
    }

    /// Read a single byte (zero for unmapped addresses).
    pub fn read_byte(&self, addr: u32) -> u8 {
        let page_index = addr / PAGE_SIZE as u32;
        self.pages
            .get(&page_index)
            .map(|page| page[(addr as usize) % PAGE_SIZE])
            .unwrap_or(0)
    }

    /// Drop every page.
    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Number of allocated pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Check if no page has been written
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl MemoryReader for SparseMemory {
    fn read_memory(&mut self, addr: u32, len: usize) -> Vec<u8> {
        let mut out = vec![0_u8; len];
        let mut offset = 0_usize;
        while offset < len {
            let Some(cur) = addr.checked_add(offset as u32) else {
                break;
            };
            let in_page = (cur as usize) % PAGE_SIZE;
            let count = (PAGE_SIZE - in_page).min(len - offset);
            if let Some(page) = self.pages.get(&(cur / PAGE_SIZE as u32)) {
                out[offset..offset + count].copy_from_slice(&page[in_page..in_page + count]);
            }
            offset += count;
        }
        out
    }
}
