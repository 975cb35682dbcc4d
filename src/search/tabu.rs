//! # Tabu Search
//!
//! Greedy neighborhood search with short-term memory. Every step applies the
//! best admissible move, improving or not, which lets the search climb out of
//! local optima. The [`TabuManager`] history forbids moves touching recently
//! changed indices so the trajectory cannot immediately cycle back, and the
//! aspiration rule in the neighborhood overrides the history whenever a tabu
//! move would beat the best solution found so far.
//!
//! When every move is tabu and none aspires, the search has nowhere left to
//! go and completes normally. Other than that the trajectory never ends by
//! itself, so a stop criterion that guarantees termination is required.
//!
//! ## Example
//!
//! ```rust
//! use coresel::neighborhood::{ExactSingleNeighborhood, SubsetBounds};
//! use coresel::objective::{CacheToken, ObjectiveFunction};
//! use coresel::search::{Search, StopCriteria, TabuSearch};
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
//! let solution = SubsetSolution::with_selection(5, [0, 2]).unwrap();
//! let neighborhood = ExactSingleNeighborhood::new(SubsetBounds::fixed(2).unwrap());
//! let criteria = StopCriteria::new().with_max_steps(50).unwrap();
//!
//! let mut search = TabuSearch::new(solution, neighborhood, objective, 3, criteria).unwrap();
//! search.start().unwrap();
//!
//! assert_eq!(search.best_score(), Some(7.0));
//! ```

use std::time::Duration;

use crate::error::Result;
use crate::neighborhood::Neighborhood;
use crate::objective::{checked_evaluate, ObjectiveFunction};
use crate::search::{
    Search, SearchCore, SearchListener, SearchStatus, StopCriteria, StopHandle, StopReason,
    Termination,
};
use crate::solution::SubsetSolution;
use crate::tabu::TabuManager;

/// Best-admissible-move search with a bounded tabu history.
///
/// One step is one applied move.
pub struct TabuSearch<N: Neighborhood, O: ObjectiveFunction> {
    core: SearchCore,
    solution: SubsetSolution,
    neighborhood: N,
    objective: O,
    tabu: TabuManager,
}

impl<N: Neighborhood, O: ObjectiveFunction> TabuSearch<N, O> {
    /// Creates a tabu search starting from `solution`, remembering up to
    /// `tabu_capacity` recently touched indices.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `tabu_capacity` is zero or the
    /// neighborhood's bounds do not fit the collection size.
    pub fn new(
        solution: SubsetSolution,
        neighborhood: N,
        objective: O,
        tabu_capacity: usize,
        criteria: StopCriteria,
    ) -> Result<Self> {
        neighborhood.bounds().validate_for(solution.total())?;
        let tabu = TabuManager::new(tabu_capacity)?;
        let preference = neighborhood.size_preference();
        Ok(Self {
            core: SearchCore::new("TabuSearch", criteria, preference),
            solution,
            neighborhood,
            objective,
            tabu,
        })
    }

    fn run(&mut self) -> Result<Termination> {
        let score = checked_evaluate(&self.objective, &self.solution, Some(self.core.token()))?;
        self.core.try_update_best(&self.solution, score, &self.objective);

        loop {
            if let Some(reason) = self.core.should_stop() {
                return Ok(Termination::Halted(reason));
            }
            let candidate = self.neighborhood.best_move(
                &mut self.solution,
                &self.objective,
                Some(self.core.token()),
                Some(&self.tabu),
                self.core.best_score(),
            )?;
            let Some(evaluated) = candidate else {
                self.core
                    .emit_message("every remaining move is tabu; stopping");
                return Ok(Termination::Finished);
            };

            // Tabu search always moves, even when the best admissible move
            // makes things worse.
            evaluated.mv.apply(&mut self.solution)?;
            self.tabu.register(&evaluated.mv);
            self.core.record_step();

            if let Some(delta) =
                self.core
                    .try_update_best(&self.solution, evaluated.score, &self.objective)
            {
                if self.core.below_min_progression(delta) {
                    return Ok(Termination::Halted(StopReason::MinProgression));
                }
            }
        }
    }
}

impl<N: Neighborhood, O: ObjectiveFunction> Search for TabuSearch<N, O> {
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
