//! # Moves
//!
//! A [`Move`] is one reversible step between neighboring solutions: add an
//! index, remove an index, or swap one in for another. Neighborhoods generate
//! moves, searches apply them, and rejected candidates are rolled back with
//! [`Move::undo`].
//!
//! Applying a move and then undoing it restores the exact selected set, which
//! is what makes cheap candidate evaluation possible: neighborhoods walk all
//! candidates on a single working solution instead of cloning it per
//! candidate.
//!
//! ## Example
//!
//! ```rust
//! use coresel::moves::Move;
//! use coresel::solution::SubsetSolution;
//!
//! let mut solution = SubsetSolution::with_selection(5, [0, 1]).unwrap();
//! let mv = Move::swap(3, 0);
//!
//! mv.apply(&mut solution).unwrap();
//! assert!(solution.is_selected(3));
//!
//! mv.undo(&mut solution).unwrap();
//! assert!(solution.is_selected(0));
//! ```

use crate::error::Result;
use crate::solution::SubsetSolution;

/// A single reversible modification of a [`SubsetSolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Move {
    /// Select one currently unselected index, growing the subset by one.
    Addition { add: usize },
    /// Deselect one currently selected index, shrinking the subset by one.
    Deletion { remove: usize },
    /// Select `add` and deselect `remove`, keeping the subset size unchanged.
    Swap { add: usize, remove: usize },
}

impl Move {
    /// Creates an addition move.
    pub fn addition(add: usize) -> Self {
        Move::Addition { add }
    }

    /// Creates a deletion move.
    pub fn deletion(remove: usize) -> Self {
        Move::Deletion { remove }
    }

    /// Creates a swap move.
    pub fn swap(add: usize, remove: usize) -> Self {
        Move::Swap { add, remove }
    }

    /// Applies this move to the solution.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Solution` if the move does not fit the current
    /// partition, for example adding an index that is already selected. The
    /// solution is left unchanged in that case.
    pub fn apply(&self, solution: &mut SubsetSolution) -> Result<()> {
        match *self {
            Move::Addition { add } => solution.select(add),
            Move::Deletion { remove } => solution.deselect(remove),
            Move::Swap { add, remove } => solution.swap(add, remove),
        }
    }

    /// Reverts a previously applied instance of this move.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Solution` if the move was not actually applied
    /// to this solution state.
    pub fn undo(&self, solution: &mut SubsetSolution) -> Result<()> {
        match *self {
            Move::Addition { add } => solution.deselect(add),
            Move::Deletion { remove } => solution.select(remove),
            Move::Swap { add, remove } => solution.swap(remove, add),
        }
    }

    /// Returns the index this move selects, if any.
    pub fn added(&self) -> Option<usize> {
        match *self {
            Move::Addition { add } | Move::Swap { add, .. } => Some(add),
            Move::Deletion { .. } => None,
        }
    }

    /// Returns the index this move deselects, if any.
    pub fn removed(&self) -> Option<usize> {
        match *self {
            Move::Deletion { remove } | Move::Swap { remove, .. } => Some(remove),
            Move::Addition { .. } => None,
        }
    }

    /// Returns the indices this move touches: one for additions and
    /// deletions, two for swaps.
    pub fn involved(&self) -> Vec<usize> {
        match *self {
            Move::Addition { add } => vec![add],
            Move::Deletion { remove } => vec![remove],
            Move::Swap { add, remove } => vec![add, remove],
        }
    }

    /// Returns the subset size after applying this move to a subset of
    /// `size` items.
    pub fn resulting_size(&self, size: usize) -> usize {
        match *self {
            Move::Addition { .. } => size + 1,
            Move::Deletion { .. } => size.saturating_sub(1),
            Move::Swap { .. } => size,
        }
    }
}

/// A move together with the score of the solution it leads to.
///
/// Neighborhoods that both generate and rank candidates return these, so the
/// accepting search does not have to re-evaluate the objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluatedMove {
    pub mv: Move,
    pub score: f64,
}

impl EvaluatedMove {
    pub fn new(mv: Move, score: f64) -> Self {
        Self { mv, score }
    }
}
