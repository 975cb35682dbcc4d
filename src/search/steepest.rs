//! # Steepest Descent
//!
//! Deterministic hill climbing: every step scans the whole neighborhood for
//! the single best move and applies it, until the best available move no
//! longer improves the current solution. That makes the end state a true
//! local optimum of the neighborhood, and the whole run reproducible without
//! any random source.
//!
//! Runs to completion on its own; stop criteria are optional extra brakes.

use std::time::Duration;

use crate::error::Result;
use crate::neighborhood::{improves, Neighborhood};
use crate::objective::{checked_evaluate, ObjectiveFunction};
use crate::search::{
    Search, SearchCore, SearchListener, SearchStatus, StopCriteria, StopHandle, StopReason,
    Termination,
};
use crate::solution::SubsetSolution;

/// Deterministic descent that always takes the best available move.
///
/// One step is one applied move; the final neighborhood scan that finds no
/// improvement is not counted.
pub struct SteepestDescentSearch<N: Neighborhood, O: ObjectiveFunction> {
    core: SearchCore,
    solution: SubsetSolution,
    neighborhood: N,
    objective: O,
}

impl<N: Neighborhood, O: ObjectiveFunction> SteepestDescentSearch<N, O> {
    /// Creates a steepest descent search starting from `solution`.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the neighborhood's bounds do not
    /// fit the collection size.
    pub fn new(
        solution: SubsetSolution,
        neighborhood: N,
        objective: O,
        criteria: StopCriteria,
    ) -> Result<Self> {
        neighborhood.bounds().validate_for(solution.total())?;
        let preference = neighborhood.size_preference();
        Ok(Self {
            core: SearchCore::new("SteepestDescentSearch", criteria, preference),
            solution,
            neighborhood,
            objective,
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
            let candidate = self.neighborhood.best_move(
                &mut self.solution,
                &self.objective,
                Some(self.core.token()),
                None,
                None,
            )?;
            let Some(evaluated) = candidate else {
                return Ok(Termination::Finished);
            };

            let reference_size = self.solution.num_selected();
            let candidate_size = evaluated.mv.resulting_size(reference_size);
            if !improves(
                &self.objective,
                self.neighborhood.size_preference(),
                0.0,
                evaluated.score,
                candidate_size,
                current,
                reference_size,
            ) {
                // Local optimum: the best neighbor is no better.
                return Ok(Termination::Finished);
            }

            evaluated.mv.apply(&mut self.solution)?;
            self.core.record_step();
            let delta = self.objective.improvement(evaluated.score, current);
            current = evaluated.score;
            self.core.try_update_best(&self.solution, current, &self.objective);

            let shrank = self.solution.num_selected() < reference_size;
            if !shrank && self.core.below_min_progression(delta) {
                return Ok(Termination::Halted(StopReason::MinProgression));
            }
        }
    }
}

impl<N: Neighborhood, O: ObjectiveFunction> Search for SteepestDescentSearch<N, O> {
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
