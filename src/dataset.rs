//! # Dataset
//!
//! The `Dataset` trait is the boundary between the search engine and the
//! data it selects from. The engine itself never inspects item content: it
//! only needs to know how many items exist, so that solutions can index them
//! as `0..size`. Objective functions are the ones that interpret indices.
//!
//! ## Example
//!
//! ```rust
//! use coresel::dataset::{Dataset, IndexedDataset};
//!
//! let dataset = IndexedDataset::from_names(vec![
//!     "accession-1".to_string(),
//!     "accession-2".to_string(),
//!     "accession-3".to_string(),
//! ]).unwrap();
//!
//! assert_eq!(dataset.size(), 3);
//! assert_eq!(dataset.item_name(1), Some("accession-2"));
//! ```

use crate::error::{Result, SearchError};

/// A collection of items a subset is selected from.
///
/// Items are addressed by their position `0..size()`. The ordering must be
/// stable for the duration of a search run: solutions, moves and cached
/// evaluations all refer to items by position.
pub trait Dataset: Send + Sync {
    /// Returns the number of items in the dataset.
    fn size(&self) -> usize;

    /// Returns the stable item positions, in order.
    fn indices(&self) -> Vec<usize> {
        (0..self.size()).collect()
    }

    /// Checks that the dataset is usable.
    ///
    /// Searches validate their dataset during construction and refuse to
    /// start on an invalid one.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Dataset` if the dataset is empty.
    fn validate(&self) -> Result<()> {
        if self.size() == 0 {
            Err(SearchError::Dataset(
                "dataset does not contain any items".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// A simple in-memory dataset of named items.
///
/// This is the default implementation used by tests and small drivers. Real
/// applications typically implement [`Dataset`] for whatever owns their data
/// (a distance matrix, a marker table, ...) and keep the item payload next to
/// the objective function.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexedDataset {
    names: Vec<String>,
}

impl IndexedDataset {
    /// Creates a dataset of `size` anonymous items named `item-0..item-{size-1}`.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Dataset` if `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(SearchError::Dataset(
                "dataset must contain at least one item".to_string(),
            ));
        }
        Ok(Self {
            names: (0..size).map(|i| format!("item-{}", i)).collect(),
        })
    }

    /// Creates a dataset from explicit item names.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Dataset` if `names` is empty or contains an
    /// empty name.
    pub fn from_names(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(SearchError::Dataset(
                "dataset must contain at least one item".to_string(),
            ));
        }
        if names.iter().any(|n| n.is_empty()) {
            return Err(SearchError::Dataset(
                "dataset item names must not be empty".to_string(),
            ));
        }
        Ok(Self { names })
    }

    /// Returns the name of the item at `index`, if it exists.
    pub fn item_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Returns the names of the items at the given positions, in the same order.
    ///
    /// Positions out of range are skipped. This is convenient for turning a
    /// final solution into a report.
    pub fn item_names(&self, indices: &[usize]) -> Vec<&str> {
        indices
            .iter()
            .filter_map(|&i| self.names.get(i).map(String::as_str))
            .collect()
    }
}

impl Dataset for IndexedDataset {
    fn size(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_anonymous_names() {
        let dataset = IndexedDataset::new(3).unwrap();
        assert_eq!(dataset.size(), 3);
        assert_eq!(dataset.item_name(0), Some("item-0"));
        assert_eq!(dataset.item_name(2), Some("item-2"));
        assert_eq!(dataset.item_name(3), None);
    }

    #[test]
    fn test_new_rejects_empty() {
        let result = IndexedDataset::new(0);
        assert!(matches!(result, Err(SearchError::Dataset(_))));
    }

    #[test]
    fn test_from_names_rejects_empty_name() {
        let result = IndexedDataset::from_names(vec!["a".to_string(), String::new()]);
        assert!(matches!(result, Err(SearchError::Dataset(_))));
    }

    #[test]
    fn test_indices_are_stable() {
        let dataset = IndexedDataset::new(4).unwrap();
        assert_eq!(dataset.indices(), vec![0, 1, 2, 3]);
        assert!(dataset.validate().is_ok());
    }

    #[test]
    fn test_item_names_skips_out_of_range() {
        let dataset =
            IndexedDataset::from_names(vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(dataset.item_names(&[1, 7, 0]), vec!["b", "a"]);
    }
}
