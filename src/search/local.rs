//! # Local Search
//!
//! Random descent: each step draws one random legal move from the
//! neighborhood, applies it, and keeps it only when it improves the current
//! solution (or scores exactly equal with a preferred subset size). Rejected
//! moves are undone, so the search walks a strictly non-worsening trajectory.
//!
//! Random descent does not know when it has reached a local optimum, it just
//! stops finding improvements. A stop criterion that guarantees termination
//! is therefore required.
//!
//! ## Example
//!
//! ```rust
//! use coresel::neighborhood::{ExactSingleNeighborhood, SubsetBounds};
//! use coresel::objective::{CacheToken, ObjectiveFunction};
//! use coresel::rng::RandomNumberGenerator;
//! use coresel::search::{LocalSearch, Search, StopCriteria};
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
//!     weights: vec![0.5, 2.0, 1.0, 4.0, 3.0],
//! };
//! let mut rng = RandomNumberGenerator::from_seed(42);
//! let solution = SubsetSolution::random(5, 2, &mut rng).unwrap();
//! let neighborhood = ExactSingleNeighborhood::new(SubsetBounds::fixed(2).unwrap());
//! let criteria = StopCriteria::new().with_max_steps(500).unwrap();
//!
//! let mut search = LocalSearch::new(solution, neighborhood, objective, rng, criteria).unwrap();
//! search.start().unwrap();
//!
//! assert_eq!(search.best_score(), Some(7.0));
//! ```

use std::time::Duration;

use crate::error::Result;
use crate::neighborhood::{improves, Neighborhood};
use crate::objective::{checked_evaluate, ObjectiveFunction};
use crate::rng::RandomNumberGenerator;
use crate::search::{
    Search, SearchCore, SearchListener, SearchStatus, StopCriteria, StopHandle, StopReason,
    Termination,
};
use crate::solution::SubsetSolution;

/// Stochastic hill climber over single-perturbation moves.
///
/// One step is one sampled move, whether it gets accepted or not.
pub struct LocalSearch<N: Neighborhood, O: ObjectiveFunction> {
    core: SearchCore,
    solution: SubsetSolution,
    neighborhood: N,
    objective: O,
    rng: RandomNumberGenerator,
}

impl<N: Neighborhood, O: ObjectiveFunction> LocalSearch<N, O> {
    /// Creates a local search descending from `solution`.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the neighborhood's bounds do not
    /// fit the collection size.
    pub fn new(
        solution: SubsetSolution,
        neighborhood: N,
        objective: O,
        rng: RandomNumberGenerator,
        criteria: StopCriteria,
    ) -> Result<Self> {
        neighborhood.bounds().validate_for(solution.total())?;
        let preference = neighborhood.size_preference();
        Ok(Self {
            core: SearchCore::new("LocalSearch", criteria, preference),
            solution,
            neighborhood,
            objective,
            rng,
        })
    }

    fn run(&mut self) -> Result<Termination> {
        let mut current =
            checked_evaluate(&self.objective, &self.solution, Some(self.core.token()))?;
        self.core.try_update_best(&self.solution, current, &self.objective);

        loop {
            if let Some(reason) = self.core.should_stop() {
                return Ok(Termination::Halted(reason));
            }
            let Some(mv) = self.neighborhood.random_move(&self.solution, &mut self.rng) else {
                self.core.emit_message("no legal moves from the current solution");
                return Ok(Termination::Finished);
            };

            let reference_size = self.solution.num_selected();
            mv.apply(&mut self.solution)?;
            let candidate =
                checked_evaluate(&self.objective, &self.solution, Some(self.core.token()))?;
            self.core.record_step();

            let accepted = improves(
                &self.objective,
                self.neighborhood.size_preference(),
                0.0,
                candidate,
                self.solution.num_selected(),
                current,
                reference_size,
            );
            if accepted {
                let delta = self.objective.improvement(candidate, current);
                current = candidate;
                self.core.try_update_best(&self.solution, candidate, &self.objective);
                // Moves that shrink the subset are allowed to make arbitrarily
                // small progress; everything else must clear the threshold.
                let shrank = self.solution.num_selected() < reference_size;
                if !shrank && self.core.below_min_progression(delta) {
                    return Ok(Termination::Halted(StopReason::MinProgression));
                }
            } else {
                mv.undo(&mut self.solution)?;
            }
        }
    }
}

impl<N: Neighborhood, O: ObjectiveFunction> Search for LocalSearch<N, O> {
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
