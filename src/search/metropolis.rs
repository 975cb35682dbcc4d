//! # Metropolis Search
//!
//! Simulated annealing at a fixed temperature. Each step draws one random
//! legal move: improvements are always accepted, moves that worsen the subset
//! size without compensation are always rejected, and everything in between
//! is accepted with probability `exp(delta / (T * k))`, where `delta` is the
//! (negative) score change, `T` the configured temperature and `k` the
//! scaling constant [`BOLTZMANN_CONSTANT`].
//!
//! Low temperatures approach random descent, high temperatures approach a
//! random walk. [`RemcSearch`](crate::search::RemcSearch) runs several of
//! these steps per replica across a whole temperature ladder; the acceptance
//! logic here is shared with its replicas.
//!
//! The walk never ends by itself, so a stop criterion that guarantees
//! termination is required.

use std::time::Duration;

use crate::error::{Result, SearchError};
use crate::neighborhood::Neighborhood;
use crate::objective::{checked_evaluate, CacheToken, ObjectiveFunction};
use crate::rng::RandomNumberGenerator;
use crate::search::{
    Search, SearchCore, SearchListener, SearchStatus, StopCriteria, StopHandle, Termination,
};
use crate::solution::SubsetSolution;

/// Scaling constant between temperatures and score deltas in the annealing
/// acceptance probability.
///
/// With temperatures in the hundreds this puts the interesting acceptance
/// range at score deltas around `1e-4`, which suits normalized objectives;
/// for other scales pick temperatures of the order `delta / BOLTZMANN_CONSTANT`.
pub const BOLTZMANN_CONSTANT: f64 = 7.213475e-7;

/// Performs one Metropolis acceptance step on `solution` at the given
/// temperature.
///
/// Returns `Ok(None)` when the solution has no legal neighbors, otherwise
/// whether the sampled move was accepted. On acceptance `current` is updated
/// to the new score; on rejection the move is undone.
pub(crate) fn metropolis_step<N: Neighborhood, O: ObjectiveFunction>(
    solution: &mut SubsetSolution,
    current: &mut f64,
    neighborhood: &N,
    objective: &O,
    token: Option<&CacheToken>,
    rng: &mut RandomNumberGenerator,
    temperature: f64,
) -> Result<Option<bool>> {
    let Some(mv) = neighborhood.random_move(solution, rng) else {
        return Ok(None);
    };
    let reference_size = solution.num_selected();
    mv.apply(solution)?;
    let candidate = checked_evaluate(objective, solution, token)?;

    let delta = objective.improvement(candidate, *current);
    let accepted = if delta > 0.0 {
        true
    } else if neighborhood
        .size_preference()
        .worsens(solution.num_selected(), reference_size)
    {
        // Growing the subset (under the default preference) must pay for
        // itself; annealing never excuses it.
        false
    } else {
        let probability = (delta / (temperature * BOLTZMANN_CONSTANT)).exp();
        rng.gen_bool(probability)
    };

    if accepted {
        *current = candidate;
    } else {
        mv.undo(solution)?;
    }
    Ok(Some(accepted))
}

/// Fixed-temperature annealing over single-perturbation moves.
///
/// One step is one sampled move, whether it gets accepted or not.
pub struct MetropolisSearch<N: Neighborhood, O: ObjectiveFunction> {
    core: SearchCore,
    solution: SubsetSolution,
    neighborhood: N,
    objective: O,
    rng: RandomNumberGenerator,
    temperature: f64,
}

impl<N: Neighborhood, O: ObjectiveFunction> MetropolisSearch<N, O> {
    /// Creates a Metropolis search walking from `solution` at `temperature`.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the temperature is not a positive
    /// finite number, or the neighborhood's bounds do not fit the collection
    /// size.
    pub fn new(
        solution: SubsetSolution,
        neighborhood: N,
        objective: O,
        rng: RandomNumberGenerator,
        temperature: f64,
        criteria: StopCriteria,
    ) -> Result<Self> {
        neighborhood.bounds().validate_for(solution.total())?;
        validate_temperature(temperature)?;
        let preference = neighborhood.size_preference();
        Ok(Self {
            core: SearchCore::new("MetropolisSearch", criteria, preference),
            solution,
            neighborhood,
            objective,
            rng,
            temperature,
        })
    }

    /// Returns the configured temperature.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    fn run(&mut self) -> Result<Termination> {
        let mut current =
            checked_evaluate(&self.objective, &self.solution, Some(self.core.token()))?;
        self.core.try_update_best(&self.solution, current, &self.objective);

        loop {
            if let Some(reason) = self.core.should_stop() {
                return Ok(Termination::Halted(reason));
            }
            let stepped = metropolis_step(
                &mut self.solution,
                &mut current,
                &self.neighborhood,
                &self.objective,
                Some(self.core.token()),
                &mut self.rng,
                self.temperature,
            )?;
            match stepped {
                None => {
                    self.core.emit_message("no legal moves from the current solution");
                    return Ok(Termination::Finished);
                }
                Some(accepted) => {
                    self.core.record_step();
                    if accepted {
                        self.core.try_update_best(&self.solution, current, &self.objective);
                    }
                }
            }
        }
    }
}

pub(crate) fn validate_temperature(temperature: f64) -> Result<()> {
    if !temperature.is_finite() || temperature <= 0.0 {
        Err(SearchError::Configuration(format!(
            "temperature must be a positive finite number, got {}",
            temperature
        )))
    } else {
        Ok(())
    }
}

impl<N: Neighborhood, O: ObjectiveFunction> Search for MetropolisSearch<N, O> {
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
