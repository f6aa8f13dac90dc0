//! Memory of the last value pushed to the target for each coordinate.
//!
//! This is what makes change detection stateful across cycles. It records
//! the target's last known state, so it is never rebuilt from a snapshot.

use std::collections::HashMap;

use cellcast_core::{CellCoord, CellValue};

#[derive(Debug, Clone, Default)]
pub struct LastApplied {
    entries: HashMap<CellCoord, CellValue>,
}

impl LastApplied {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coord: CellCoord) -> Option<&CellValue> {
        self.entries.get(&coord)
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        self.entries.contains_key(&coord)
    }

    /// Record a confirmed send.
    pub fn record(&mut self, coord: CellCoord, value: CellValue) {
        self.entries.insert(coord, value);
    }

    /// Set the first-seen baseline. Never overwrites an existing entry.
    pub fn establish(&mut self, coord: CellCoord, value: CellValue) -> bool {
        if self.entries.contains_key(&coord) {
            return false;
        }
        self.entries.insert(coord, value);
        true
    }

    pub fn forget(&mut self, coord: CellCoord) -> Option<CellValue> {
        self.entries.remove(&coord)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_establish_does_not_overwrite() {
        let mut applied = LastApplied::new();
        let coord = CellCoord::new(0, 0);
        assert!(applied.establish(coord, "Alice".into()));
        assert!(!applied.establish(coord, "Bob".into()));
        assert_eq!(applied.get(coord), Some(&CellValue::from("Alice")));

        applied.record(coord, "Bob".into());
        assert_eq!(applied.get(coord), Some(&CellValue::from("Bob")));
    }

    #[test]
    fn test_forget() {
        let mut applied = LastApplied::new();
        let coord = CellCoord::new(3, 1);
        applied.record(coord, CellValue::Int(7));
        assert_eq!(applied.forget(coord), Some(CellValue::Int(7)));
        assert!(!applied.contains(coord));
        assert!(applied.is_empty());
    }
}
