//! # TabuManager
//!
//! Short-term memory for tabu search. The manager keeps a bounded FIFO
//! history of recently touched indices; a candidate move is *tabu* while any
//! index it would touch is still in the history. This is what prevents the
//! search from cycling between a handful of solutions once it leaves a local
//! optimum.
//!
//! The manager itself is deliberately dumb: it only answers "is this move
//! tabu right now?". The aspiration override (accepting a tabu move anyway
//! because it would beat the best solution found so far) lives in the
//! neighborhoods, which know the candidate scores.
//!
//! ## Example
//!
//! ```rust
//! use coresel::moves::Move;
//! use coresel::tabu::TabuManager;
//!
//! let mut tabu = TabuManager::new(2).unwrap();
//! tabu.register(&Move::swap(4, 1));
//!
//! // Both touched indices are now protected.
//! assert!(tabu.is_tabu(&Move::deletion(4)));
//! assert!(tabu.is_tabu(&Move::addition(1)));
//! assert!(!tabu.is_tabu(&Move::addition(2)));
//! ```

use std::collections::VecDeque;

use crate::error::{Result, SearchError};
use crate::moves::Move;

/// A bounded FIFO history of recently touched indices.
///
/// Entries are `Option<usize>`: a registered index, or `None` for a pure
/// deletion. The sentinel keeps the history aging at a constant rate without
/// protecting the deleted index, so an item dropped from the subset may be
/// reconsidered immediately.
#[derive(Debug, Clone)]
pub struct TabuManager {
    history: VecDeque<Option<usize>>,
    capacity: usize,
}

impl TabuManager {
    /// Creates a manager remembering up to `capacity` history entries.
    ///
    /// Note that a swap registers two entries, one per touched index.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Configuration` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SearchError::Configuration(
                "tabu history size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Returns whether the move touches an index that is still in the history.
    pub fn is_tabu(&self, mv: &Move) -> bool {
        mv.involved()
            .iter()
            .any(|&index| self.history.contains(&Some(index)))
    }

    /// Records an applied move in the history, evicting the oldest entry
    /// when the history is full.
    ///
    /// Additions protect the added index, swaps protect both indices, and
    /// pure deletions record the sentinel only.
    pub fn register(&mut self, mv: &Move) {
        match *mv {
            Move::Addition { add } => self.push(Some(add)),
            Move::Deletion { .. } => self.push(None),
            Move::Swap { add, remove } => {
                self.push(Some(add));
                self.push(Some(remove));
            }
        }
    }

    /// Changes the history capacity, evicting the oldest entries if the
    /// current history no longer fits.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Configuration` if `capacity` is zero.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(SearchError::Configuration(
                "tabu history size must be at least 1".to_string(),
            ));
        }
        self.capacity = capacity;
        while self.history.len() > capacity {
            self.history.pop_front();
        }
        Ok(())
    }

    /// Forgets the entire history.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Returns the number of remembered entries.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Returns the history capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn push(&mut self, entry: Option<usize>) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero_capacity() {
        assert!(matches!(
            TabuManager::new(0),
            Err(SearchError::Configuration(_))
        ));
    }

    #[test]
    fn test_registered_indices_become_tabu() {
        let mut tabu = TabuManager::new(4).unwrap();
        assert!(!tabu.is_tabu(&Move::addition(5)));

        tabu.register(&Move::addition(5));
        assert!(tabu.is_tabu(&Move::deletion(5)));
        assert!(tabu.is_tabu(&Move::swap(2, 5)));
        assert!(!tabu.is_tabu(&Move::swap(2, 3)));
    }

    #[test]
    fn test_pure_deletion_registers_sentinel_only() {
        let mut tabu = TabuManager::new(4).unwrap();
        tabu.register(&Move::deletion(7));

        // The removed index may come back immediately, but the history aged.
        assert!(!tabu.is_tabu(&Move::addition(7)));
        assert_eq!(tabu.len(), 1);
    }

    #[test]
    fn test_swap_registers_both_indices() {
        let mut tabu = TabuManager::new(4).unwrap();
        tabu.register(&Move::swap(3, 8));

        assert!(tabu.is_tabu(&Move::addition(8)));
        assert!(tabu.is_tabu(&Move::deletion(3)));
        assert_eq!(tabu.len(), 2);
    }

    #[test]
    fn test_history_evicts_fifo() {
        let mut tabu = TabuManager::new(2).unwrap();
        tabu.register(&Move::addition(1));
        tabu.register(&Move::addition(2));
        tabu.register(&Move::addition(3));

        assert!(!tabu.is_tabu(&Move::deletion(1)));
        assert!(tabu.is_tabu(&Move::deletion(2)));
        assert!(tabu.is_tabu(&Move::deletion(3)));
    }

    #[test]
    fn test_set_capacity_truncates_oldest() {
        let mut tabu = TabuManager::new(4).unwrap();
        for i in 0..4 {
            tabu.register(&Move::addition(i));
        }

        tabu.set_capacity(2).unwrap();
        assert_eq!(tabu.len(), 2);
        assert!(!tabu.is_tabu(&Move::deletion(0)));
        assert!(!tabu.is_tabu(&Move::deletion(1)));
        assert!(tabu.is_tabu(&Move::deletion(2)));
        assert!(tabu.is_tabu(&Move::deletion(3)));

        assert!(tabu.set_capacity(0).is_err());
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut tabu = TabuManager::new(4).unwrap();
        tabu.register(&Move::swap(1, 2));
        assert!(!tabu.is_empty());

        tabu.clear();
        assert!(tabu.is_empty());
        assert!(!tabu.is_tabu(&Move::deletion(1)));
    }
}
