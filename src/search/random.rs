//! # Random Search
//!
//! Samples an independent uniformly random subset per step and keeps the best
//! one ever seen. No trajectory, no neighborhood: each step draws a size
//! within the bounds and a fresh selection of that size.
//!
//! Mostly useful as a baseline to compare the guided searches against. Since
//! there is no natural end to the sampling, a stop criterion that guarantees
//! termination is required.

use std::time::Duration;

use crate::error::{Result, SearchError};
use crate::neighborhood::{SizePreference, SubsetBounds};
use crate::objective::{checked_evaluate, ObjectiveFunction};
use crate::rng::RandomNumberGenerator;
use crate::search::{
    Search, SearchCore, SearchListener, SearchStatus, StopCriteria, StopHandle, Termination,
};
use crate::solution::SubsetSolution;

/// Uniform random sampling over subsets within the size bounds.
///
/// One step is one sampled and evaluated subset.
pub struct RandomSearch<O: ObjectiveFunction> {
    core: SearchCore,
    solution: SubsetSolution,
    bounds: SubsetBounds,
    objective: O,
    rng: RandomNumberGenerator,
}

impl<O: ObjectiveFunction> RandomSearch<O> {
    /// Creates a random search over subsets of `solution`'s collection.
    ///
    /// The initial selection of `solution` is irrelevant; it is resampled on
    /// every step.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `bounds` does not fit the
    /// collection size.
    pub fn new(
        solution: SubsetSolution,
        bounds: SubsetBounds,
        objective: O,
        rng: RandomNumberGenerator,
        criteria: StopCriteria,
    ) -> Result<Self> {
        bounds.validate_for(solution.total())?;
        Ok(Self {
            core: SearchCore::new("RandomSearch", criteria, SizePreference::default()),
            solution,
            bounds,
            objective,
            rng,
        })
    }

    /// Sets the tie-break preference applied when two subsets score exactly
    /// equal. Defaults to preferring the smaller subset.
    pub fn with_size_preference(mut self, preference: SizePreference) -> Self {
        self.core.set_preference(preference);
        self
    }

    /// Replaces the current selection by `size` uniformly drawn indices.
    fn resample(&mut self, size: usize) -> Result<()> {
        for index in self.solution.selected().to_vec() {
            self.solution.deselect(index)?;
        }
        for _ in 0..size {
            let index = self
                .solution
                .random_unselected(&mut self.rng)
                .ok_or_else(|| {
                    SearchError::Solution("ran out of unselected items while sampling".to_string())
                })?;
            self.solution.select(index)?;
        }
        Ok(())
    }

    fn run(&mut self) -> Result<Termination> {
        loop {
            if let Some(reason) = self.core.should_stop() {
                return Ok(Termination::Halted(reason));
            }
            let size = self.rng.gen_range(self.bounds.min()..=self.bounds.max());
            self.resample(size)?;
            let score =
                checked_evaluate(&self.objective, &self.solution, Some(self.core.token()))?;
            self.core.record_step();
            self.core.try_update_best(&self.solution, score, &self.objective);
        }
    }
}

impl<O: ObjectiveFunction> Search for RandomSearch<O> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn status(&self) -> SearchStatus {
        self.core.status()
    }

    fn start(&mut self) -> Result<()> {
        self.core.begin(true)?;
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

    #[derive(Debug)]
    struct WeightSum {
        weights: Vec<f64>,
    }

    impl ObjectiveFunction for WeightSum {
        fn evaluate(&self, solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
            solution.selected().iter().map(|&i| self.weights[i]).sum()
        }
    }

    #[test]
    fn test_requires_terminating_criteria() {
        let objective = WeightSum {
            weights: vec![1.0; 4],
        };
        let solution = SubsetSolution::new(4).unwrap();
        let bounds = SubsetBounds::fixed(2).unwrap();
        let rng = RandomNumberGenerator::from_seed(1);

        let mut search =
            RandomSearch::new(solution, bounds, objective, rng, StopCriteria::new()).unwrap();
        assert!(matches!(
            search.start(),
            Err(SearchError::Configuration(_))
        ));
        // The failed start must not have touched the lifecycle.
        assert_eq!(search.status(), SearchStatus::Idle);
        assert_eq!(search.steps(), 0);
    }

    #[test]
    fn test_min_progression_alone_is_not_terminating() {
        let objective = WeightSum {
            weights: vec![1.0; 4],
        };
        let solution = SubsetSolution::new(4).unwrap();
        let bounds = SubsetBounds::fixed(2).unwrap();
        let rng = RandomNumberGenerator::from_seed(1);
        let criteria = StopCriteria::new().with_min_progression(0.1).unwrap();

        let mut search = RandomSearch::new(solution, bounds, objective, rng, criteria).unwrap();
        assert!(matches!(
            search.start(),
            Err(SearchError::Configuration(_))
        ));
    }

    #[test]
    fn test_finds_best_pair_with_ample_budget() {
        let objective = WeightSum {
            weights: vec![1.0, 9.0, 2.0, 8.0, 3.0, 7.0],
        };
        let solution = SubsetSolution::new(6).unwrap();
        let bounds = SubsetBounds::fixed(2).unwrap();
        let rng = RandomNumberGenerator::from_seed(42);
        let criteria = StopCriteria::new().with_max_steps(2_000).unwrap();

        let mut search = RandomSearch::new(solution, bounds, objective, rng, criteria).unwrap();
        search.start().unwrap();

        assert_eq!(search.status(), SearchStatus::Stopped);
        assert_eq!(search.steps(), 2_000);
        assert_eq!(search.best_score(), Some(17.0));
        assert_eq!(
            search.best_solution().map(|s| s.selected_sorted()),
            Some(vec![1, 3])
        );
    }

    #[test]
    fn test_sampled_best_is_within_bounds() {
        let objective = WeightSum {
            weights: (0..8).map(|i| i as f64).collect(),
        };
        let solution = SubsetSolution::new(8).unwrap();
        let bounds = SubsetBounds::new(2, 4).unwrap();
        let rng = RandomNumberGenerator::from_seed(7);
        let criteria = StopCriteria::new().with_max_steps(100).unwrap();

        let mut search = RandomSearch::new(solution, bounds, objective, rng, criteria).unwrap();
        search.start().unwrap();

        let size = search.best_solution().map(|s| s.num_selected()).unwrap();
        assert!(bounds.contains(size));
        // All positive weights: the best draw fills the maximum size.
        assert_eq!(size, 4);
    }

    #[test]
    fn test_stop_requested_before_start_halts_immediately() {
        let objective = WeightSum {
            weights: vec![1.0; 4],
        };
        let solution = SubsetSolution::new(4).unwrap();
        let bounds = SubsetBounds::fixed(2).unwrap();
        let rng = RandomNumberGenerator::from_seed(1);
        let criteria = StopCriteria::new().with_max_steps(1_000).unwrap();

        let mut search = RandomSearch::new(solution, bounds, objective, rng, criteria).unwrap();
        search.stop_handle().stop();
        search.start().unwrap();

        assert_eq!(search.status(), SearchStatus::Stopped);
        assert_eq!(search.steps(), 0);
        assert_eq!(search.best_score(), None);
    }

    #[test]
    fn test_runtime_limit_ends_the_run() {
        let objective = WeightSum {
            weights: vec![1.0; 6],
        };
        let solution = SubsetSolution::new(6).unwrap();
        let bounds = SubsetBounds::new(1, 3).unwrap();
        let rng = RandomNumberGenerator::from_seed(3);
        let criteria = StopCriteria::new()
            .with_runtime(Duration::from_millis(20))
            .unwrap();

        let mut search = RandomSearch::new(solution, bounds, objective, rng, criteria).unwrap();
        search.start().unwrap();

        assert_eq!(search.status(), SearchStatus::Stopped);
        assert!(search.steps() > 0);
        assert!(search.runtime().is_some());
    }
}
