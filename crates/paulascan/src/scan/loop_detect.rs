//! Loop detection over row fingerprints.
//!
//! Every emitted row contributes one fingerprint. The key of the last
//! `window` fingerprints is looked up among the keys registered at earlier
//! positions; a hit means the song is repeating. After each lookup the key
//! of the window ending one row earlier is registered, so a window can only
//! ever match a strictly earlier position.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

/// Where a detected loop repeats from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopMatch {
    /// Index of the row at which the repetition was recognized
    pub detected_at_row: usize,
    /// First row of the earlier window that matched
    pub restart_row: usize,
}

#[derive(Debug, Clone)]
pub struct LoopDetector {
    window: usize,
    min_rows: usize,
    fingerprints: Vec<String>,
    /// window key -> index of the window's last row
    seen: HashMap<String, usize>,
    matched: Option<LoopMatch>,
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(16, 128)
    }
}

impl LoopDetector {
    /// # Arguments
    ///
    /// * `window` - Rows per window key
    /// * `min_rows` - Rows required before a match is honored
    pub fn new(window: usize, min_rows: usize) -> Self {
        Self {
            window: window.max(1),
            min_rows,
            fingerprints: Vec::new(),
            seen: HashMap::new(),
            matched: None,
        }
    }

    /// Append a row fingerprint.
    ///
    /// # Returns
    ///
    /// true if the song has looped and scanning should stop
    pub fn check_and_register(&mut self, fingerprint: impl Into<String>) -> bool {
        self.fingerprints.push(fingerprint.into());
        let rows = self.fingerprints.len();
        if rows < self.window {
            return false;
        }

        let key = self.window_key(rows);
        if rows >= self.min_rows
            && let Some(&end) = self.seen.get(&key)
        {
            let found = LoopMatch {
                detected_at_row: rows - 1,
                restart_row: end + 1 - self.window,
            };
            debug!(
                "loop detected at row {}, repeating from row {}",
                found.detected_at_row, found.restart_row
            );
            self.matched = Some(found);
            return true;
        }

        if rows > self.window {
            let previous = self.window_key(rows - 1);
            self.seen.entry(previous).or_insert(rows - 2);
        }
        false
    }

    fn window_key(&self, end_exclusive: usize) -> String {
        self.fingerprints[end_exclusive - self.window..end_exclusive].join("\n")
    }

    /// The detected loop, once `check_and_register` returned true
    pub fn matched(&self) -> Option<LoopMatch> {
        self.matched
    }

    pub fn rows_seen(&self) -> usize {
        self.fingerprints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(i: usize) -> String {
        format!("u{}", i)
    }

    #[test]
    fn test_repeating_block_after_intro() {
        let mut detector = LoopDetector::default();
        let mut stopped_at = None;
        for row in 0..2000 {
            let fp = if row < 200 {
                unique(row)
            } else {
                format!("b{}", (row - 200) % 20)
            };
            if detector.check_and_register(fp) {
                stopped_at = Some(row);
                break;
            }
        }
        let row = stopped_at.unwrap();
        assert!(row <= 200 + 16 + 20);
        assert!(row >= 128);
        assert_eq!(detector.matched().unwrap().restart_row, 200);
    }

    #[test]
    fn test_no_match_before_min_rows() {
        // a 16-row block repeating from the start matches early by construction
        let mut detector = LoopDetector::default();
        let mut stopped_at = None;
        for row in 0..1000 {
            if detector.check_and_register(format!("r{}", row % 40)) {
                stopped_at = Some(row);
                break;
            }
        }
        assert_eq!(stopped_at, Some(127));
    }

    #[test]
    fn test_never_matches_current_position() {
        let mut detector = LoopDetector::new(4, 4);
        for row in 0..100 {
            assert!(!detector.check_and_register(unique(row)));
        }
        assert_eq!(detector.rows_seen(), 100);
        assert!(detector.matched().is_none());
    }

    #[test]
    fn test_constant_rows_loop_once_allowed() {
        let mut detector = LoopDetector::new(4, 4);
        let hits: Vec<bool> = (0..6).map(|_| detector.check_and_register("x")).collect();
        // window ending at row 3 is registered on row 4 and matched on row 5
        assert_eq!(hits, vec![false, false, false, false, false, true]);
        assert_eq!(
            detector.matched(),
            Some(LoopMatch {
                detected_at_row: 5,
                restart_row: 0
            })
        );
    }
}
