//! # SubsetSolution
//!
//! A `SubsetSolution` partitions the item positions `0..total` of a dataset
//! into a *selected* set and an *unselected* remainder. It is the single
//! mutable state a search trajectory walks on: moves flip indices between
//! the two sets, evaluations read the selected set, and the best solution is
//! snapshotted with a plain [`Clone`].
//!
//! All mutators run in O(1). Both views are kept materialized at all times,
//! so neighborhood scans never pay for recomputing the remainder set.
//!
//! ## Example
//!
//! ```rust
//! use coresel::solution::SubsetSolution;
//!
//! let mut solution = SubsetSolution::with_selection(5, [0, 3]).unwrap();
//! assert_eq!(solution.num_selected(), 2);
//! assert!(solution.is_selected(3));
//!
//! solution.swap(4, 3).unwrap();
//! assert!(solution.is_selected(4));
//! assert!(!solution.is_selected(3));
//! ```

use crate::dataset::Dataset;
use crate::error::{Result, SearchError};
use crate::rng::RandomNumberGenerator;

/// Location of one index: which side of the partition it is on, and where
/// inside that side's backing vector it currently sits.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Slot {
    selected: bool,
    pos: usize,
}

/// A selected/unselected partition of the dataset positions `0..total`.
///
/// The two views returned by [`selected`](SubsetSolution::selected) and
/// [`unselected`](SubsetSolution::unselected) are unordered: mutators use
/// swap-removal to stay O(1), which shuffles positions within a view. Use
/// [`selected_sorted`](SubsetSolution::selected_sorted) when a canonical
/// ordering is needed, for example as a cache key or in a report.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubsetSolution {
    selected: Vec<usize>,
    unselected: Vec<usize>,
    slots: Vec<Slot>,
}

impl SubsetSolution {
    /// Creates a solution over `total` items with an empty selection.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Solution` if `total` is zero.
    pub fn new(total: usize) -> Result<Self> {
        if total == 0 {
            return Err(SearchError::Solution(
                "solution must cover at least one item".to_string(),
            ));
        }
        Ok(Self {
            selected: Vec::new(),
            unselected: (0..total).collect(),
            slots: (0..total)
                .map(|pos| Slot {
                    selected: false,
                    pos,
                })
                .collect(),
        })
    }

    /// Creates a solution over `total` items with the given initial selection.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Solution` if `total` is zero, an index is out of
    /// range, or the selection contains duplicates.
    pub fn with_selection<I>(total: usize, selection: I) -> Result<Self>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut solution = Self::new(total)?;
        for index in selection {
            solution.select(index)?;
        }
        Ok(solution)
    }

    /// Creates an empty solution covering every item of `dataset`.
    ///
    /// The dataset is validated first, so a search built on the returned
    /// solution never runs on an unusable dataset.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Dataset` if the dataset fails validation.
    pub fn for_dataset<D: Dataset + ?Sized>(dataset: &D) -> Result<Self> {
        dataset.validate()?;
        Self::new(dataset.size())
    }

    /// Creates a solution over `total` items with `size` randomly selected indices.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Solution` if `total` is zero or `size > total`.
    pub fn random(total: usize, size: usize, rng: &mut RandomNumberGenerator) -> Result<Self> {
        if size > total {
            return Err(SearchError::Solution(format!(
                "cannot select {} items out of {}",
                size, total
            )));
        }
        let mut solution = Self::new(total)?;
        while solution.num_selected() < size {
            // Drawing from the unselected view keeps every pick uniform.
            let index = solution.unselected[rng.gen_range(0..solution.unselected.len())];
            solution.select(index)?;
        }
        Ok(solution)
    }

    /// Returns the number of items in the underlying dataset.
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of currently selected items.
    pub fn num_selected(&self) -> usize {
        self.selected.len()
    }

    /// Returns the number of currently unselected items.
    pub fn num_unselected(&self) -> usize {
        self.unselected.len()
    }

    /// Returns the selected indices, in no particular order.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Returns the unselected indices, in no particular order.
    pub fn unselected(&self) -> &[usize] {
        &self.unselected
    }

    /// Returns the selected indices in ascending order.
    pub fn selected_sorted(&self) -> Vec<usize> {
        let mut sorted = self.selected.clone();
        sorted.sort_unstable();
        sorted
    }

    /// Returns whether `index` is currently selected.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn is_selected(&self, index: usize) -> bool {
        self.slots[index].selected
    }

    /// Returns where `index` currently sits within the view reported by
    /// [`is_selected`](Self::is_selected), or `None` when `index` is out of
    /// range. Positions are only stable between mutations.
    pub fn position(&self, index: usize) -> Option<usize> {
        self.slots.get(index).map(|slot| slot.pos)
    }

    /// Moves `index` from the unselected to the selected set.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Solution` if `index` is out of range or already
    /// selected.
    pub fn select(&mut self, index: usize) -> Result<()> {
        let slot = *self
            .slots
            .get(index)
            .ok_or_else(|| SearchError::Solution(index_out_of_range(index, self.total())))?;
        if slot.selected {
            return Err(SearchError::Solution(format!(
                "index {} is already selected",
                index
            )));
        }
        self.remove_from_unselected(slot.pos);
        self.slots[index] = Slot {
            selected: true,
            pos: self.selected.len(),
        };
        self.selected.push(index);
        Ok(())
    }

    /// Moves `index` from the selected to the unselected set.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Solution` if `index` is out of range or not
    /// currently selected.
    pub fn deselect(&mut self, index: usize) -> Result<()> {
        let slot = *self
            .slots
            .get(index)
            .ok_or_else(|| SearchError::Solution(index_out_of_range(index, self.total())))?;
        if !slot.selected {
            return Err(SearchError::Solution(format!(
                "index {} is not selected",
                index
            )));
        }
        self.remove_from_selected(slot.pos);
        self.slots[index] = Slot {
            selected: false,
            pos: self.unselected.len(),
        };
        self.unselected.push(index);
        Ok(())
    }

    /// Selects `add` and deselects `remove` in one step, keeping the subset
    /// size unchanged.
    ///
    /// The operation is atomic: both indices are validated before either set
    /// is touched.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Solution` if `add` is not unselected or `remove`
    /// is not selected.
    pub fn swap(&mut self, add: usize, remove: usize) -> Result<()> {
        let add_slot = self
            .slots
            .get(add)
            .ok_or_else(|| SearchError::Solution(index_out_of_range(add, self.total())))?;
        let remove_slot = self
            .slots
            .get(remove)
            .ok_or_else(|| SearchError::Solution(index_out_of_range(remove, self.total())))?;
        if add_slot.selected {
            return Err(SearchError::Solution(format!(
                "index {} is already selected",
                add
            )));
        }
        if !remove_slot.selected {
            return Err(SearchError::Solution(format!(
                "index {} is not selected",
                remove
            )));
        }
        self.select(add)?;
        self.deselect(remove)?;
        Ok(())
    }

    /// Returns a uniformly drawn selected index, or `None` when the selection
    /// is empty.
    pub fn random_selected(&self, rng: &mut RandomNumberGenerator) -> Option<usize> {
        rng.gen_index(self.selected.len()).map(|i| self.selected[i])
    }

    /// Returns a uniformly drawn unselected index, or `None` when every item
    /// is selected.
    pub fn random_unselected(&self, rng: &mut RandomNumberGenerator) -> Option<usize> {
        rng.gen_index(self.unselected.len())
            .map(|i| self.unselected[i])
    }

    /// Swap-removes the entry at `pos` from the unselected view and patches
    /// the slot of the element that moved into its place.
    fn remove_from_unselected(&mut self, pos: usize) {
        self.unselected.swap_remove(pos);
        if let Some(&moved) = self.unselected.get(pos) {
            self.slots[moved].pos = pos;
        }
    }

    /// Swap-removes the entry at `pos` from the selected view and patches the
    /// slot of the element that moved into its place.
    fn remove_from_selected(&mut self, pos: usize) {
        self.selected.swap_remove(pos);
        if let Some(&moved) = self.selected.get(pos) {
            self.slots[moved].pos = pos;
        }
    }
}

impl PartialEq for SubsetSolution {
    /// Two solutions are equal when they cover the same number of items and
    /// select the same set, regardless of internal ordering.
    fn eq(&self, other: &Self) -> bool {
        self.total() == other.total()
            && self.num_selected() == other.num_selected()
            && self.selected.iter().all(|&i| other.is_selected(i))
    }
}

impl Eq for SubsetSolution {}

fn index_out_of_range(index: usize, total: usize) -> String {
    format!("index {} is out of range for {} items", index, total)
}
