//! # Replica-Exchange Monte Carlo
//!
//! Runs several Metropolis replicas in parallel at temperatures linearly
//! interpolated across a ladder. Each round every replica advances by a fixed
//! step budget on its own copy of the solution, the per-replica bests are
//! merged into the shared best, and adjacent replicas then attempt to
//! exchange solutions along the ladder, alternating between even and odd
//! pairs each round.
//!
//! An exchange always happens when the colder replica is not worse;
//! otherwise it happens with probability `exp(delta_beta * delta_energy)`
//! over the inverse-temperature difference and the energy difference. Hot replicas
//! explore, cold replicas refine, and the exchanges let a promising solution
//! cool down gradually.
//!
//! Rounds repeat until a stop criterion fires, so a criterion that guarantees
//! termination is required.
//!
//! ## Example
//!
//! ```rust
//! use coresel::neighborhood::{ExactSingleNeighborhood, SubsetBounds};
//! use coresel::objective::{CacheToken, ObjectiveFunction};
//! use coresel::rng::RandomNumberGenerator;
//! use coresel::search::{RemcOptions, RemcSearch, Search, StopCriteria};
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
//!     weights: vec![1.0, 9.0, 2.0, 8.0, 3.0, 7.0],
//! };
//! let mut rng = RandomNumberGenerator::from_seed(42);
//! let solution = SubsetSolution::random(6, 2, &mut rng).unwrap();
//! let neighborhood = ExactSingleNeighborhood::new(SubsetBounds::fixed(2).unwrap());
//! let options = RemcOptions::new(4, 1.0, 100.0)
//!     .unwrap()
//!     .with_steps_per_round(50)
//!     .unwrap();
//! let criteria = StopCriteria::new().with_max_steps(20).unwrap();
//!
//! let mut search =
//!     RemcSearch::new(solution, neighborhood, objective, rng, criteria, options).unwrap();
//! search.start().unwrap();
//!
//! assert_eq!(search.best_score(), Some(17.0));
//! ```

use std::time::Duration;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, SearchError};
use crate::neighborhood::{improves, Neighborhood};
use crate::objective::{checked_evaluate, CacheToken, ObjectiveFunction};
use crate::rng::RandomNumberGenerator;
use crate::search::metropolis::{metropolis_step, validate_temperature, BOLTZMANN_CONSTANT};
use crate::search::{
    Search, SearchCore, SearchListener, SearchStatus, StopCriteria, StopHandle, StopReason,
    Termination,
};
use crate::solution::SubsetSolution;

const DEFAULT_REPLICAS: usize = 10;
const DEFAULT_MIN_TEMPERATURE: f64 = 50.0 * BOLTZMANN_CONSTANT;
const DEFAULT_MAX_TEMPERATURE: f64 = 200.0 * BOLTZMANN_CONSTANT;
const DEFAULT_STEPS_PER_ROUND: u64 = 500;

/// Replica count, temperature ladder and per-round step budget of a
/// [`RemcSearch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemcOptions {
    num_replicas: usize,
    min_temperature: f64,
    max_temperature: f64,
    steps_per_round: u64,
}

impl RemcOptions {
    /// Creates options with the given replica count and temperature range.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if fewer than two replicas are
    /// requested, a temperature is not positive and finite, or the minimum
    /// temperature exceeds the maximum.
    pub fn new(num_replicas: usize, min_temperature: f64, max_temperature: f64) -> Result<Self> {
        if num_replicas < 2 {
            return Err(SearchError::Configuration(format!(
                "replica exchange needs at least 2 replicas, got {}",
                num_replicas
            )));
        }
        validate_temperature(min_temperature)?;
        validate_temperature(max_temperature)?;
        if min_temperature > max_temperature {
            return Err(SearchError::Configuration(format!(
                "minimum temperature {} exceeds maximum {}",
                min_temperature, max_temperature
            )));
        }
        Ok(Self {
            num_replicas,
            min_temperature,
            max_temperature,
            steps_per_round: DEFAULT_STEPS_PER_ROUND,
        })
    }

    /// Sets how many Metropolis steps each replica performs per round.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `steps` is zero.
    pub fn with_steps_per_round(mut self, steps: u64) -> Result<Self> {
        if steps == 0 {
            return Err(SearchError::Configuration(
                "steps per round must be at least 1".to_string(),
            ));
        }
        self.steps_per_round = steps;
        Ok(self)
    }

    /// Returns the number of replicas on the ladder.
    pub fn num_replicas(&self) -> usize {
        self.num_replicas
    }

    /// Returns the coldest temperature on the ladder.
    pub fn min_temperature(&self) -> f64 {
        self.min_temperature
    }

    /// Returns the hottest temperature on the ladder.
    pub fn max_temperature(&self) -> f64 {
        self.max_temperature
    }

    /// Returns the per-replica step budget of one round.
    pub fn steps_per_round(&self) -> u64 {
        self.steps_per_round
    }
}

impl Default for RemcOptions {
    fn default() -> Self {
        Self {
            num_replicas: DEFAULT_REPLICAS,
            min_temperature: DEFAULT_MIN_TEMPERATURE,
            max_temperature: DEFAULT_MAX_TEMPERATURE,
            steps_per_round: DEFAULT_STEPS_PER_ROUND,
        }
    }
}

/// Probability of exchanging the solutions of two ladder neighbors.
///
/// Scores are converted to energies (lower is better); a colder replica that
/// is not worse always swaps, anything else swaps with probability
/// `exp(delta_beta * delta_energy)` where `beta = 1 / (k * T)`.
pub(crate) fn swap_probability(
    minimizing: bool,
    colder_score: f64,
    colder_temperature: f64,
    hotter_score: f64,
    hotter_temperature: f64,
) -> f64 {
    let energy = |score: f64| if minimizing { score } else { -score };
    let delta_energy = energy(colder_score) - energy(hotter_score);
    if delta_energy <= 0.0 {
        return 1.0;
    }
    let beta = |temperature: f64| 1.0 / (BOLTZMANN_CONSTANT * temperature);
    // The hotter side has the smaller inverse temperature, so this is
    // negative and the probability decays with the energy gap.
    let delta_beta = beta(hotter_temperature) - beta(colder_temperature);
    (delta_beta * delta_energy).exp()
}

/// One rung of the ladder: a solution walking at a fixed temperature,
/// tracking the best state it has visited.
struct Replica {
    solution: SubsetSolution,
    score: f64,
    best: SubsetSolution,
    best_score: f64,
    temperature: f64,
    rng: RandomNumberGenerator,
}

impl Replica {
    fn advance<N: Neighborhood, O: ObjectiveFunction>(
        &mut self,
        steps: u64,
        neighborhood: &N,
        objective: &O,
        token: &CacheToken,
    ) -> Result<()> {
        for _ in 0..steps {
            let stepped = metropolis_step(
                &mut self.solution,
                &mut self.score,
                neighborhood,
                objective,
                Some(token),
                &mut self.rng,
                self.temperature,
            )?;
            match stepped {
                None => break,
                Some(true) => {
                    if improves(
                        objective,
                        neighborhood.size_preference(),
                        0.0,
                        self.score,
                        self.solution.num_selected(),
                        self.best_score,
                        self.best.num_selected(),
                    ) {
                        self.best = self.solution.clone();
                        self.best_score = self.score;
                    }
                }
                Some(false) => {}
            }
        }
        Ok(())
    }
}

/// Parallel tempering over a ladder of Metropolis replicas.
///
/// One step is one round: every replica advances by the configured step
/// budget, the results are merged, and the ladder attempts its exchanges.
pub struct RemcSearch<N: Neighborhood, O: ObjectiveFunction> {
    core: SearchCore,
    solution: SubsetSolution,
    neighborhood: N,
    objective: O,
    rng: RandomNumberGenerator,
    options: RemcOptions,
}

impl<N: Neighborhood, O: ObjectiveFunction> RemcSearch<N, O> {
    /// Creates a replica-exchange search starting every replica from
    /// `solution`.
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
        options: RemcOptions,
    ) -> Result<Self> {
        neighborhood.bounds().validate_for(solution.total())?;
        let preference = neighborhood.size_preference();
        Ok(Self {
            core: SearchCore::new("RemcSearch", criteria, preference),
            solution,
            neighborhood,
            objective,
            rng,
            options,
        })
    }

    /// Returns the configured replica options.
    pub fn options(&self) -> &RemcOptions {
        &self.options
    }

    fn run(&mut self) -> Result<Termination> {
        let initial_score =
            checked_evaluate(&self.objective, &self.solution, Some(self.core.token()))?;
        self.core.try_update_best(&self.solution, initial_score, &self.objective);

        let count = self.options.num_replicas();
        let min = self.options.min_temperature();
        let max = self.options.max_temperature();
        let mut replicas: Vec<Replica> = (0..count)
            .map(|i| {
                let fraction = i as f64 / (count - 1) as f64;
                Replica {
                    solution: self.solution.clone(),
                    score: initial_score,
                    best: self.solution.clone(),
                    best_score: initial_score,
                    temperature: min + (max - min) * fraction,
                    rng: self.rng.fork(),
                }
            })
            .collect();
        debug!(
            replicas = count,
            min_temperature = min,
            max_temperature = max,
            steps_per_round = self.options.steps_per_round(),
            "initialized replica ladder"
        );

        let mut offset = 0;
        loop {
            if let Some(reason) = self.core.should_stop() {
                return Ok(Termination::Halted(reason));
            }

            // One round: all replicas advance concurrently, then we barrier
            // on the collect before inspecting any result.
            let steps = self.options.steps_per_round();
            let neighborhood = &self.neighborhood;
            let objective = &self.objective;
            let token = self.core.token();
            replicas
                .par_iter_mut()
                .map(|replica| replica.advance(steps, neighborhood, objective, token))
                .collect::<Result<Vec<()>>>()?;

            self.core.record_step();

            let mut round_delta = 0.0_f64;
            for replica in &replicas {
                if let Some(delta) =
                    self.core
                        .try_update_best(&replica.best, replica.best_score, &self.objective)
                {
                    round_delta = round_delta.max(delta);
                }
            }
            if self.core.below_min_progression(round_delta) {
                return Ok(Termination::Halted(StopReason::MinProgression));
            }

            // Adjacent exchanges, alternating the pairing offset each round
            // so every rung talks to both neighbors over time.
            for i in (offset..count - 1).step_by(2) {
                let probability = swap_probability(
                    self.objective.is_minimizing(),
                    replicas[i].score,
                    replicas[i].temperature,
                    replicas[i + 1].score,
                    replicas[i + 1].temperature,
                );
                if self.rng.gen_bool(probability) {
                    let (left, right) = replicas.split_at_mut(i + 1);
                    std::mem::swap(&mut left[i].solution, &mut right[0].solution);
                    std::mem::swap(&mut left[i].score, &mut right[0].score);
                }
            }
            offset = 1 - offset;
        }
    }
}

impl<N: Neighborhood, O: ObjectiveFunction> Search for RemcSearch<N, O> {
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
