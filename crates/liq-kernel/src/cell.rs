//! Delayed-finalization cells (component A): a value plus the block at
//! which it was last written. A write becomes visible only strictly after
//! the block it happened in — the one-block read-after-write barrier that
//! keeps ownership transfers, lease installs, and export-request flips from
//! being observed or re-mutated within the transaction that produced them.

use liq_core::error::LiqError;
use liq_core::types::BlockHeight;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelayedCell<T> {
    value: T,
    wrote_at: BlockHeight,
}

impl<T: Clone> DelayedCell<T> {
    /// Create a cell whose initial value is visible starting the block
    /// strictly after `current_block`.
    pub fn new(value: T, current_block: BlockHeight) -> Self {
        Self {
            value,
            wrote_at: current_block,
        }
    }

    /// Overwrite the cell's value. Fails if this cell was already written in
    /// `current_block` — a cell accepts at most one write per block.
    pub fn update_to(&mut self, value: T, current_block: BlockHeight) -> Result<(), LiqError> {
        if self.wrote_at == current_block {
            return Err(LiqError::Pending);
        }
        self.value = value;
        self.wrote_at = current_block;
        Ok(())
    }

    /// Return the value, but only once it has finalized (the write block is
    /// strictly less than `current_block`).
    pub fn finalized(&self, current_block: BlockHeight) -> Result<&T, LiqError> {
        if self.wrote_at < current_block {
            Ok(&self.value)
        } else {
            Err(LiqError::Pending)
        }
    }

    /// Return `true` if finalized and equal to `other`; `false` (never an
    /// error) if still pending.
    pub fn is_finalized_equal_to(&self, other: &T, current_block: BlockHeight) -> bool
    where
        T: PartialEq,
    {
        match self.finalized(current_block) {
            Ok(v) => v == other,
            Err(_) => false,
        }
    }

    /// The raw value, ignoring finalization — for internal bookkeeping only
    /// (e.g. computing max-expiry-per-key). Never expose this across a
    /// caller-facing authorization check.
    pub fn raw(&self) -> &T {
        &self.value
    }

    pub fn wrote_at(&self) -> BlockHeight {
        self.wrote_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_write_in_same_block_fails() {
        let mut cell = DelayedCell::new(1u32, 10);
        assert!(cell.update_to(2, 10).is_err());
        assert_eq!(*cell.raw(), 1);
    }

    #[test]
    fn write_in_later_block_succeeds() {
        let mut cell = DelayedCell::new(1u32, 10);
        assert!(cell.update_to(2, 11).is_ok());
        assert_eq!(*cell.raw(), 2);
    }

    #[test]
    fn finalized_only_after_strictly_later_block() {
        let cell = DelayedCell::new(5u32, 10);
        assert!(matches!(cell.finalized(10), Err(LiqError::Pending)));
        assert_eq!(*cell.finalized(11).unwrap(), 5);
    }

    #[test]
    fn is_finalized_equal_to_is_false_not_error_when_pending() {
        let cell = DelayedCell::new(5u32, 10);
        assert!(!cell.is_finalized_equal_to(&5, 10));
        assert!(cell.is_finalized_equal_to(&5, 11));
    }
}
