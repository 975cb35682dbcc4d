//! # Exhaustive Search
//!
//! Enumerates every subset whose size lies within the configured bounds and
//! keeps the best one. Successive subsets are produced by a revolving-door
//! generator, a minimal-change order in which each subset differs from its
//! predecessor by exactly one swap, so the working solution is advanced with
//! a single O(1) move instead of being rebuilt.
//!
//! Only tractable for small instances, but exact: it doubles as the
//! correctness oracle for the heuristic searches in integration tests, and as
//! the seed generator for [`LrSearch`](crate::search::LrSearch).
//!
//! ## Example
//!
//! ```rust
//! use coresel::neighborhood::SubsetBounds;
//! use coresel::objective::{CacheToken, ObjectiveFunction};
//! use coresel::search::{ExhaustiveSearch, Search, StopCriteria};
//! use coresel::solution::SubsetSolution;
//!
//! #[derive(Debug)]
//! struct WeightSum {
//!     weights: Vec<f64>,
//! }
//!
//! impl ObjectiveFunction for WeightSum {
//!     fn evaluate(&self, solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
//!         solution.selected().iter().map(|&index| self.weights[index]).sum()
//!     }
//! }
//!
//! let objective = WeightSum {
//!     weights: vec![3.0, 1.0, 4.0, 1.0, 5.0],
//! };
//! let solution = SubsetSolution::new(5).unwrap();
//! let bounds = SubsetBounds::new(1, 2).unwrap();
//!
//! let mut search =
//!     ExhaustiveSearch::new(solution, bounds, objective, StopCriteria::new()).unwrap();
//! search.start().unwrap();
//!
//! assert_eq!(search.best_score(), Some(9.0));
//! assert_eq!(
//!     search.best_solution().map(|s| s.selected_sorted()),
//!     Some(vec![2, 4])
//! );
//! ```

use std::time::Duration;

use tracing::trace;

use crate::error::{Result, SearchError};
use crate::neighborhood::{SizePreference, SubsetBounds};
use crate::objective::{checked_evaluate, ObjectiveFunction};
use crate::search::{
    Search, SearchCore, SearchListener, SearchStatus, StopCriteria, StopHandle, Termination,
};
use crate::solution::SubsetSolution;

/// Enumerates all size-`k` subsets of `{0, .., n-1}` in revolving-door order.
///
/// The generator owns the current subset as a sorted index array and mutates
/// it in place; [`advance`](RevolvingDoorGenerator::advance) reports which
/// index left and which one entered, so a caller tracking the subset in a
/// [`SubsetSolution`] can follow along with a single swap move. Finding the
/// successor costs O(k).
///
/// The order realizes the recursion `R(n, k) = R(n-1, k) ++ reverse(R(n-1,
/// k-1)) * {n}`: first all subsets without the last element, then, in reverse
/// order, all subsets containing it. Successors are computed by walking that
/// recursion top-down, alternating between successor and predecessor steps as
/// the reversed sublists flip direction.
#[derive(Debug, Clone)]
pub(crate) struct RevolvingDoorGenerator {
    total: usize,
    size: usize,
    indices: Vec<usize>,
    exhausted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Successor,
    Predecessor,
}

impl RevolvingDoorGenerator {
    /// Creates a generator positioned on the first subset, `{0, .., size-1}`.
    pub(crate) fn new(total: usize, size: usize) -> Result<Self> {
        if size > total {
            return Err(SearchError::Configuration(format!(
                "cannot enumerate subsets of size {} from {} items",
                size, total
            )));
        }
        Ok(Self {
            total,
            size,
            indices: (0..size).collect(),
            exhausted: false,
        })
    }

    /// The current subset, sorted ascending.
    pub(crate) fn current(&self) -> &[usize] {
        &self.indices
    }

    /// Steps to the next subset and returns the `(removed, added)` index
    /// pair, or `None` once the order is exhausted.
    pub(crate) fn advance(&mut self) -> Option<(usize, usize)> {
        if self.exhausted || self.size == 0 {
            self.exhausted = true;
            return None;
        }

        // Number of leading fixed points: indices[i] == i for i < fixed.
        // All prefix tests below reduce to comparisons against this count,
        // and it stays valid while we descend because only the final edit
        // mutates the array.
        let fixed = self
            .indices
            .iter()
            .enumerate()
            .take_while(|&(i, &v)| v == i)
            .count();

        let mut walk = Walk::Successor;
        let mut level = self.size - 1;
        let mut ceiling = self.total - 1;

        loop {
            match walk {
                Walk::Successor => {
                    if fixed >= level {
                        // Prefix below `level` is 0..level-1, so the subset
                        // is one of the two boundary forms at this level.
                        if self.indices[level] == ceiling {
                            self.exhausted = true;
                            return None;
                        }
                        let added = self.indices[level] + 1;
                        let removed = if level == 0 {
                            let removed = self.indices[0];
                            self.indices[0] = added;
                            removed
                        } else {
                            let removed = self.indices[level - 1];
                            self.indices[level - 1] = self.indices[level];
                            self.indices[level] = added;
                            removed
                        };
                        return Some((removed, added));
                    }
                    walk = Walk::Predecessor;
                    ceiling = self.indices[level] - 1;
                    level -= 1;
                }
                Walk::Predecessor => {
                    if self.indices[level] < ceiling {
                        ceiling = self.indices[level];
                        continue;
                    }
                    let tail_matches = if level == 0 {
                        true
                    } else {
                        self.indices[level - 1] == ceiling - 1 && fixed >= level - 1
                    };
                    if tail_matches {
                        let removed = self.indices[level];
                        let added = if level == 0 {
                            self.indices[0] = ceiling - 1;
                            ceiling - 1
                        } else {
                            self.indices[level - 1] = level - 1;
                            self.indices[level] = ceiling - 1;
                            level - 1
                        };
                        return Some((removed, added));
                    }
                    walk = Walk::Successor;
                    ceiling = self.indices[level] - 1;
                    level -= 1;
                }
            }
        }
    }
}

/// Sums `C(total, size)` over the enumerated size range, in floating point.
/// Only used for progress reporting, where overflow-free approximation wins
/// over exactness.
fn expected_evaluations(total: usize, bounds: SubsetBounds) -> f64 {
    (bounds.min()..=bounds.max())
        .map(|size| {
            (0..size).fold(1.0_f64, |acc, i| {
                acc * (total - i) as f64 / (i + 1) as f64
            })
        })
        .sum()
}

/// Brute-force search over all subsets within the size bounds.
///
/// One step is one evaluated subset. Natural termination (the full
/// enumeration) completes the search; stop criteria and external stop
/// requests are honored between evaluations and end it early with whatever
/// best was found.
pub struct ExhaustiveSearch<O: ObjectiveFunction> {
    core: SearchCore,
    solution: SubsetSolution,
    bounds: SubsetBounds,
    objective: O,
}

impl<O: ObjectiveFunction> ExhaustiveSearch<O> {
    /// Creates an exhaustive search over subsets of `solution`'s collection.
    ///
    /// The initial selection of `solution` is irrelevant; the enumeration
    /// visits every subset within `bounds` regardless.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `bounds` does not fit the
    /// collection size.
    pub fn new(
        solution: SubsetSolution,
        bounds: SubsetBounds,
        objective: O,
        criteria: StopCriteria,
    ) -> Result<Self> {
        bounds.validate_for(solution.total())?;
        Ok(Self {
            core: SearchCore::new("ExhaustiveSearch", criteria, SizePreference::default()),
            solution,
            bounds,
            objective,
        })
    }

    /// Sets the tie-break preference applied when two subsets score exactly
    /// equal. Defaults to preferring the smaller subset.
    pub fn with_size_preference(mut self, preference: SizePreference) -> Self {
        self.core.set_preference(preference);
        self
    }

    /// Resets the working solution to exactly the given selection.
    fn align_solution(&mut self, subset: &[usize]) -> Result<()> {
        for index in self.solution.selected().to_vec() {
            self.solution.deselect(index)?;
        }
        for &index in subset {
            self.solution.select(index)?;
        }
        Ok(())
    }

    fn run(&mut self) -> Result<Termination> {
        let total = self.solution.total();
        let expected = expected_evaluations(total, self.bounds);
        trace!(
            total,
            min = self.bounds.min(),
            max = self.bounds.max(),
            expected,
            "starting enumeration"
        );

        let mut evaluated = 0_u64;
        for size in self.bounds.min()..=self.bounds.max() {
            let mut generator = RevolvingDoorGenerator::new(total, size)?;
            self.align_solution(generator.current())?;
            loop {
                if let Some(reason) = self.core.should_stop() {
                    return Ok(Termination::Halted(reason));
                }
                let score = checked_evaluate(
                    &self.objective,
                    &self.solution,
                    Some(self.core.token()),
                )?;
                self.core.record_step();
                evaluated += 1;
                self.core.try_update_best(&self.solution, score, &self.objective);
                self.core.report_progress(evaluated as f64 / expected);
                match generator.advance() {
                    Some((removed, added)) => self.solution.swap(added, removed)?,
                    None => break,
                }
            }
        }
        Ok(Termination::Finished)
    }
}

impl<O: ObjectiveFunction> Search for ExhaustiveSearch<O> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn status(&self) -> SearchStatus {
        self.core.status()
    }

    fn start(&mut self) -> Result<()> {
        self.core.begin(false)?;
        let outcome = self.run();
        self.core.finish(outcome)
    }

    fn stop_handle(&self) -> StopHandle {
        self.core.stop_handle()
    }

    fn add_listener(&mut self, listener: Box<dyn SearchListener>) -> Result<()> {
        self.core.add_listener(listener)
    }

    fn best_solution(&self) -> Option<&SubsetSolution> {
        self.core.best_solution()
    }

    fn best_score(&self) -> Option<f64> {
        self.core.best_score()
    }

    fn steps(&self) -> u64 {
        self.core.steps()
    }

    fn runtime(&self) -> Option<Duration> {
        self.core.runtime()
    }

    fn best_found_time(&self) -> Option<Duration> {
        self.core.best_found_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::CacheToken;
    use std::collections::HashSet;

    #[derive(Debug)]
    struct WeightSum {
        weights: Vec<f64>,
    }

    impl ObjectiveFunction for WeightSum {
        fn evaluate(&self, solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
            solution.selected().iter().map(|&i| self.weights[i]).sum()
        }
    }

    fn collect_subsets(total: usize, size: usize) -> Vec<Vec<usize>> {
        let mut generator = RevolvingDoorGenerator::new(total, size).unwrap();
        let mut subsets = vec![generator.current().to_vec()];
        while generator.advance().is_some() {
            subsets.push(generator.current().to_vec());
        }
        subsets
    }

    fn binomial(n: usize, k: usize) -> usize {
        (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
    }

    #[test]
    fn test_revolving_door_order_for_five_choose_three() {
        // Hand-expanded from R(5,3) = R(4,3) ++ reverse(R(4,2)) * {5}.
        let expected = vec![
            vec![0, 1, 2],
            vec![0, 2, 3],
            vec![1, 2, 3],
            vec![0, 1, 3],
            vec![0, 3, 4],
            vec![1, 3, 4],
            vec![2, 3, 4],
            vec![0, 2, 4],
            vec![1, 2, 4],
            vec![0, 1, 4],
        ];
        assert_eq!(collect_subsets(5, 3), expected);
    }

    #[test]
    fn test_consecutive_subsets_differ_by_one_swap() {
        for &(total, size) in &[(6, 3), (7, 2), (5, 4), (8, 5)] {
            let mut generator = RevolvingDoorGenerator::new(total, size).unwrap();
            let mut previous: HashSet<usize> = generator.current().iter().copied().collect();
            let mut seen = HashSet::new();
            seen.insert(generator.current().to_vec());

            while let Some((removed, added)) = generator.advance() {
                let current: HashSet<usize> = generator.current().iter().copied().collect();
                assert!(previous.contains(&removed));
                assert!(!previous.contains(&added));
                assert!(current.contains(&added));
                assert!(!current.contains(&removed));
                assert_eq!(previous.difference(&current).count(), 1);
                assert_eq!(current.difference(&previous).count(), 1);

                // Array stays sorted and strictly increasing.
                assert!(generator.current().windows(2).all(|w| w[0] < w[1]));

                assert!(seen.insert(generator.current().to_vec()), "duplicate subset");
                previous = current;
            }
            assert_eq!(seen.len(), binomial(total, size));
        }
    }

    #[test]
    fn test_degenerate_sizes() {
        assert_eq!(collect_subsets(4, 4), vec![vec![0, 1, 2, 3]]);
        assert_eq!(
            collect_subsets(4, 1),
            vec![vec![0], vec![1], vec![2], vec![3]]
        );
        assert_eq!(collect_subsets(3, 0), vec![Vec::<usize>::new()]);
        assert!(RevolvingDoorGenerator::new(3, 4).is_err());
    }

    #[test]
    fn test_finds_global_optimum_over_size_range() {
        let objective = WeightSum {
            weights: vec![3.0, 1.0, 4.0, 1.0, 5.0],
        };
        let solution = SubsetSolution::new(5).unwrap();
        let bounds = SubsetBounds::new(1, 2).unwrap();
        let mut search =
            ExhaustiveSearch::new(solution, bounds, objective, StopCriteria::new()).unwrap();

        assert_eq!(search.status(), SearchStatus::Idle);
        search.start().unwrap();

        assert_eq!(search.status(), SearchStatus::Completed);
        assert_eq!(search.best_score(), Some(9.0));
        assert_eq!(
            search.best_solution().map(|s| s.selected_sorted()),
            Some(vec![2, 4])
        );
        // C(5,1) + C(5,2) evaluations.
        assert_eq!(search.steps(), 15);
    }

    #[test]
    fn test_smaller_subset_wins_exact_ties() {
        // {4} scores 5.0, as does {0, 1}; with the default preference the
        // singleton must be kept.
        let objective = WeightSum {
            weights: vec![2.0, 3.0, 1.0, 0.0, 5.0],
        };
        let solution = SubsetSolution::new(5).unwrap();
        let bounds = SubsetBounds::new(1, 2).unwrap();
        let mut search =
            ExhaustiveSearch::new(solution, bounds, objective, StopCriteria::new()).unwrap();
        search.start().unwrap();

        assert_eq!(search.best_score(), Some(5.0));
        assert_eq!(
            search.best_solution().map(|s| s.selected_sorted()),
            Some(vec![4])
        );
    }

    #[test]
    fn test_halts_on_step_limit() {
        let objective = WeightSum {
            weights: vec![1.0; 10],
        };
        let solution = SubsetSolution::new(10).unwrap();
        let bounds = SubsetBounds::fixed(4).unwrap();
        let criteria = StopCriteria::new().with_max_steps(3).unwrap();
        let mut search = ExhaustiveSearch::new(solution, bounds, objective, criteria).unwrap();
        search.start().unwrap();

        assert_eq!(search.status(), SearchStatus::Stopped);
        assert_eq!(search.steps(), 3);
        assert!(search.best_score().is_some());
    }

    #[test]
    fn test_rejects_bounds_exceeding_collection() {
        let objective = WeightSum {
            weights: vec![1.0; 3],
        };
        let solution = SubsetSolution::new(3).unwrap();
        let bounds = SubsetBounds::new(2, 5).unwrap();
        assert!(matches!(
            ExhaustiveSearch::new(solution, bounds, objective, StopCriteria::new()),
            Err(SearchError::Configuration(_))
        ));
    }

    #[test]
    fn test_single_shot() {
        let objective = WeightSum {
            weights: vec![1.0, 2.0, 3.0],
        };
        let solution = SubsetSolution::new(3).unwrap();
        let bounds = SubsetBounds::fixed(1).unwrap();
        let mut search =
            ExhaustiveSearch::new(solution, bounds, objective, StopCriteria::new()).unwrap();
        search.start().unwrap();
        assert!(matches!(
            search.start(),
            Err(SearchError::Configuration(_))
        ));
    }
}
