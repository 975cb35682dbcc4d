//! # Mixed Replica Search
//!
//! Runs a heterogeneous population of replicas against the same problem.
//! Local-search and Metropolis replicas form a pool that is cycled in short
//! parallel rounds; tabu replicas are spawned on background threads and run
//! to their own completion criterion; one long-running LR replica constructs
//! a solution deterministically in the background. After every round the
//! pool results are merged into the shared best, and finished background
//! replicas are polled without blocking, merged, and replaced.
//!
//! Two maintenance mechanisms keep the population productive. When a replica
//! gets stuck it is replaced by a fresh Metropolis replica seeded with a
//! crossover child of two tournament-selected parents from the pool. When
//! global progression stalls below a threshold, or a boost interval derived
//! from the observed round durations elapses, fresh randomly seeded
//! local-search replicas are injected.
//!
//! Rounds repeat until a stop criterion fires, so a criterion that
//! guarantees termination is required. On exit every background replica is
//! stopped and its best solution folded into the final result.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use coresel::neighborhood::{ExactSingleNeighborhood, SubsetBounds};
//! use coresel::objective::{CacheToken, ObjectiveFunction};
//! use coresel::rng::RandomNumberGenerator;
//! use coresel::search::{MixedReplicaOptions, MixedReplicaSearch, Search, StopCriteria};
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
//! let options = MixedReplicaOptions::new(1, 2, 1).unwrap();
//! let criteria = StopCriteria::new()
//!     .with_runtime(Duration::from_millis(100))
//!     .unwrap();
//!
//! let mut search =
//!     MixedReplicaSearch::new(solution, neighborhood, objective, rng, criteria, options)
//!         .unwrap();
//! search.start().unwrap();
//!
//! assert_eq!(search.best_score(), Some(17.0));
//! ```

use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{Result, SearchError};
use crate::neighborhood::{improves, Neighborhood, SizePreference, SubsetBounds};
use crate::objective::{checked_evaluate, CacheToken, ObjectiveFunction};
use crate::rng::RandomNumberGenerator;
use crate::search::lr::{LrSearch, LrSeeding};
use crate::search::metropolis::{metropolis_step, validate_temperature, BOLTZMANN_CONSTANT};
use crate::search::tabu::TabuSearch;
use crate::search::{
    Search, SearchCore, SearchListener, SearchStatus, StopCriteria, StopHandle, StopReason,
    Termination,
};
use crate::solution::SubsetSolution;

const DEFAULT_LOCAL_REPLICAS: usize = 2;
const DEFAULT_METROPOLIS_REPLICAS: usize = 4;
const DEFAULT_TABU_REPLICAS: usize = 2;
const DEFAULT_TABU_CAPACITY: usize = 20;
const DEFAULT_TOURNAMENT_SIZE: usize = 2;
const DEFAULT_REPLICA_STEPS: u64 = 50;
const DEFAULT_MIN_TEMPERATURE: f64 = 50.0 * BOLTZMANN_CONSTANT;
const DEFAULT_MAX_TEMPERATURE: f64 = 200.0 * BOLTZMANN_CONSTANT;
const DEFAULT_TABU_STUCK_TIME: Duration = Duration::from_millis(500);
const DEFAULT_BOOST_FACTOR: usize = 2;
const DEFAULT_BOOST_PROGRESSION_THRESHOLD: f64 = 1e-7;
const DEFAULT_MIN_BOOST_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_BOOST_INTERVAL_FACTOR: f64 = 15.0;

/// Rounds without any improvement after which a pool replica counts as stuck.
const REPLICA_STUCK_ROUNDS: u32 = 2;

/// Look-ahead parameters of the background LR replica.
const LR_REPLICA_L: usize = 2;
const LR_REPLICA_R: usize = 1;

/// Population and maintenance parameters of a [`MixedReplicaSearch`].
#[derive(Debug, Clone, Copy)]
pub struct MixedReplicaOptions {
    local_replicas: usize,
    metropolis_replicas: usize,
    tabu_replicas: usize,
    tabu_capacity: usize,
    tournament_size: usize,
    replica_steps: u64,
    min_temperature: f64,
    max_temperature: f64,
    tabu_stuck_time: Duration,
    boost_factor: usize,
    boost_progression_threshold: f64,
    min_boost_interval: Duration,
    boost_interval_factor: f64,
}

impl MixedReplicaOptions {
    /// Creates options for a population with the given replica counts. All
    /// maintenance parameters start at their defaults.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when the non-tabu pool would be
    /// empty: at least one local-search or Metropolis replica is required.
    pub fn new(
        local_replicas: usize,
        metropolis_replicas: usize,
        tabu_replicas: usize,
    ) -> Result<Self> {
        if local_replicas + metropolis_replicas == 0 {
            return Err(SearchError::Configuration(
                "at least one local-search or Metropolis replica is required".to_string(),
            ));
        }
        Ok(Self {
            local_replicas,
            metropolis_replicas,
            tabu_replicas,
            tabu_capacity: DEFAULT_TABU_CAPACITY,
            tournament_size: DEFAULT_TOURNAMENT_SIZE,
            replica_steps: DEFAULT_REPLICA_STEPS,
            min_temperature: DEFAULT_MIN_TEMPERATURE,
            max_temperature: DEFAULT_MAX_TEMPERATURE,
            tabu_stuck_time: DEFAULT_TABU_STUCK_TIME,
            boost_factor: DEFAULT_BOOST_FACTOR,
            boost_progression_threshold: DEFAULT_BOOST_PROGRESSION_THRESHOLD,
            min_boost_interval: DEFAULT_MIN_BOOST_INTERVAL,
            boost_interval_factor: DEFAULT_BOOST_INTERVAL_FACTOR,
        })
    }

    /// Sets the tabu history capacity of tabu replicas.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `capacity` is zero.
    pub fn with_tabu_capacity(mut self, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SearchError::Configuration(
                "tabu history capacity must be positive".to_string(),
            ));
        }
        self.tabu_capacity = capacity;
        Ok(self)
    }

    /// Sets how many candidates compete in one parent tournament.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `size` is zero.
    pub fn with_tournament_size(mut self, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(SearchError::Configuration(
                "tournament size must be positive".to_string(),
            ));
        }
        self.tournament_size = size;
        Ok(self)
    }

    /// Sets the per-replica step budget of one pool round.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `steps` is zero.
    pub fn with_replica_steps(mut self, steps: u64) -> Result<Self> {
        if steps == 0 {
            return Err(SearchError::Configuration(
                "replica step budget must be positive".to_string(),
            ));
        }
        self.replica_steps = steps;
        Ok(self)
    }

    /// Sets the temperature range Metropolis replicas are drawn from.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if either temperature is not positive
    /// and finite, or if `min` exceeds `max`.
    pub fn with_temperature_range(mut self, min: f64, max: f64) -> Result<Self> {
        validate_temperature(min)?;
        validate_temperature(max)?;
        if min > max {
            return Err(SearchError::Configuration(format!(
                "minimum temperature {} exceeds maximum temperature {}",
                min, max
            )));
        }
        self.min_temperature = min;
        self.max_temperature = max;
        Ok(self)
    }

    /// Sets how long a tabu replica may go without improvement before it
    /// finishes and is replaced.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `limit` is zero.
    pub fn with_tabu_stuck_time(mut self, limit: Duration) -> Result<Self> {
        if limit.is_zero() {
            return Err(SearchError::Configuration(
                "tabu replica stuck time must be positive".to_string(),
            ));
        }
        self.tabu_stuck_time = limit;
        Ok(self)
    }

    /// Sets the pool-growth factor of one boost: a boost injects
    /// `factor * current pool size` fresh local-search replicas. Zero
    /// disables boosting.
    pub fn with_boost_factor(mut self, factor: usize) -> Self {
        self.boost_factor = factor;
        self
    }

    /// Sets the progression below which a round counts as stalled for
    /// boosting purposes.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `threshold` is negative or not
    /// finite.
    pub fn with_boost_progression_threshold(mut self, threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(SearchError::Configuration(format!(
                "boost progression threshold must be non-negative and finite, got {}",
                threshold
            )));
        }
        self.boost_progression_threshold = threshold;
        Ok(self)
    }

    /// Sets the time-based boost trigger: a boost fires whenever more than
    /// `max(min_interval, factor * average round duration)` has passed since
    /// the previous one.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `factor` is not positive and
    /// finite.
    pub fn with_boost_interval(mut self, min_interval: Duration, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(SearchError::Configuration(format!(
                "boost interval factor must be positive and finite, got {}",
                factor
            )));
        }
        self.min_boost_interval = min_interval;
        self.boost_interval_factor = factor;
        Ok(self)
    }

    /// Returns the number of local-search replicas in the initial pool.
    pub fn local_replicas(&self) -> usize {
        self.local_replicas
    }

    /// Returns the number of Metropolis replicas in the initial pool.
    pub fn metropolis_replicas(&self) -> usize {
        self.metropolis_replicas
    }

    /// Returns the number of background tabu replicas.
    pub fn tabu_replicas(&self) -> usize {
        self.tabu_replicas
    }

    /// Returns the tabu history capacity of tabu replicas.
    pub fn tabu_capacity(&self) -> usize {
        self.tabu_capacity
    }

    /// Returns the parent tournament size.
    pub fn tournament_size(&self) -> usize {
        self.tournament_size
    }

    /// Returns the per-replica step budget of one pool round.
    pub fn replica_steps(&self) -> u64 {
        self.replica_steps
    }

    /// Returns the lower end of the Metropolis temperature range.
    pub fn min_temperature(&self) -> f64 {
        self.min_temperature
    }

    /// Returns the upper end of the Metropolis temperature range.
    pub fn max_temperature(&self) -> f64 {
        self.max_temperature
    }

    /// Returns the improvement timeout of tabu replicas.
    pub fn tabu_stuck_time(&self) -> Duration {
        self.tabu_stuck_time
    }

    /// Returns the pool-growth factor of one boost.
    pub fn boost_factor(&self) -> usize {
        self.boost_factor
    }

    /// Returns the stall threshold for progression-triggered boosts.
    pub fn boost_progression_threshold(&self) -> f64 {
        self.boost_progression_threshold
    }

    /// Returns the minimum time between two boosts.
    pub fn min_boost_interval(&self) -> Duration {
        self.min_boost_interval
    }

    /// Returns the factor applied to the average round duration when
    /// deriving the boost interval.
    pub fn boost_interval_factor(&self) -> f64 {
        self.boost_interval_factor
    }
}

impl Default for MixedReplicaOptions {
    fn default() -> Self {
        Self {
            local_replicas: DEFAULT_LOCAL_REPLICAS,
            metropolis_replicas: DEFAULT_METROPOLIS_REPLICAS,
            tabu_replicas: DEFAULT_TABU_REPLICAS,
            tabu_capacity: DEFAULT_TABU_CAPACITY,
            tournament_size: DEFAULT_TOURNAMENT_SIZE,
            replica_steps: DEFAULT_REPLICA_STEPS,
            min_temperature: DEFAULT_MIN_TEMPERATURE,
            max_temperature: DEFAULT_MAX_TEMPERATURE,
            tabu_stuck_time: DEFAULT_TABU_STUCK_TIME,
            boost_factor: DEFAULT_BOOST_FACTOR,
            boost_progression_threshold: DEFAULT_BOOST_PROGRESSION_THRESHOLD,
            min_boost_interval: DEFAULT_MIN_BOOST_INTERVAL,
            boost_interval_factor: DEFAULT_BOOST_INTERVAL_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PoolKind {
    Local,
    Metropolis { temperature: f64 },
}

/// One member of the non-tabu pool: a solution advanced in rounds, tracking
/// the best state it has visited and how long it has been stuck.
struct PoolReplica {
    kind: PoolKind,
    solution: SubsetSolution,
    score: f64,
    best: SubsetSolution,
    best_score: f64,
    rng: RandomNumberGenerator,
    stalled_rounds: u32,
    dead_ended: bool,
}

impl PoolReplica {
    fn new(
        kind: PoolKind,
        solution: SubsetSolution,
        objective: &dyn ObjectiveFunction,
        token: &CacheToken,
        rng: RandomNumberGenerator,
    ) -> Result<Self> {
        let score = checked_evaluate(objective, &solution, Some(token))?;
        Ok(Self {
            kind,
            best: solution.clone(),
            best_score: score,
            solution,
            score,
            rng,
            stalled_rounds: 0,
            dead_ended: false,
        })
    }

    fn advance<N: Neighborhood, O: ObjectiveFunction>(
        &mut self,
        steps: u64,
        neighborhood: &N,
        objective: &O,
        token: &CacheToken,
    ) -> Result<()> {
        let entry_best = self.best_score;
        for _ in 0..steps {
            match self.kind {
                PoolKind::Local => {
                    let Some(mv) = neighborhood.random_move(&self.solution, &mut self.rng)
                    else {
                        self.dead_ended = true;
                        break;
                    };
                    let reference_size = self.solution.num_selected();
                    mv.apply(&mut self.solution)?;
                    let candidate =
                        checked_evaluate(objective, &self.solution, Some(token))?;
                    if improves(
                        objective,
                        neighborhood.size_preference(),
                        0.0,
                        candidate,
                        self.solution.num_selected(),
                        self.score,
                        reference_size,
                    ) {
                        self.score = candidate;
                    } else {
                        mv.undo(&mut self.solution)?;
                    }
                }
                PoolKind::Metropolis { temperature } => {
                    let stepped = metropolis_step(
                        &mut self.solution,
                        &mut self.score,
                        neighborhood,
                        objective,
                        Some(token),
                        &mut self.rng,
                        temperature,
                    )?;
                    if stepped.is_none() {
                        self.dead_ended = true;
                        break;
                    }
                }
            }
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
        if objective.improvement(self.best_score, entry_best) > 0.0 {
            self.stalled_rounds = 0;
        } else {
            self.stalled_rounds += 1;
        }
        Ok(())
    }
}

/// Picks the best of `size` uniformly drawn pool replicas. The pool must not
/// be empty.
fn tournament_pick<'a>(
    pool: &'a [PoolReplica],
    size: usize,
    rng: &mut RandomNumberGenerator,
    objective: &dyn ObjectiveFunction,
) -> &'a PoolReplica {
    let mut winner = &pool[rng.gen_range(0..pool.len())];
    for _ in 1..size {
        let challenger = &pool[rng.gen_range(0..pool.len())];
        if objective.improvement(challenger.score, winner.score) > 0.0 {
            winner = challenger;
        }
    }
    winner
}

/// Produces a child subset from two parents.
///
/// Each index of the smaller parent is kept with probability one half; the
/// remainder is filled from the larger parent with a wrap-around scan from a
/// random offset, skipping duplicates, until the child reaches the smaller
/// parent's size.
fn crossover(
    parent_a: &SubsetSolution,
    parent_b: &SubsetSolution,
    rng: &mut RandomNumberGenerator,
) -> Result<SubsetSolution> {
    let (smaller, larger) = if parent_a.num_selected() <= parent_b.num_selected() {
        (parent_a, parent_b)
    } else {
        (parent_b, parent_a)
    };
    let target = smaller.num_selected();

    let mut child = SubsetSolution::new(smaller.total())?;
    for &index in smaller.selected() {
        if rng.gen_bool(0.5) {
            child.select(index)?;
        }
    }
    let candidates = larger.selected();
    if !candidates.is_empty() {
        let start = rng.gen_range(0..candidates.len());
        for offset in 0..candidates.len() {
            if child.num_selected() >= target {
                break;
            }
            let index = candidates[(start + offset) % candidates.len()];
            if !child.is_selected(index) {
                child.select(index)?;
            }
        }
    }
    Ok(child)
}

type DetachedOutcome = (Option<SubsetSolution>, Option<f64>, Result<()>);

/// Handle to a replica running on its own thread. The outcome carries the
/// replica's best solution so it can be merged after the thread is joined.
struct DetachedSlot<'scope> {
    kind: &'static str,
    stop: StopHandle,
    handle: thread::ScopedJoinHandle<'scope, DetachedOutcome>,
}

fn spawn_tabu_replica<'scope, N, O>(
    scope: &'scope thread::Scope<'scope, '_>,
    neighborhood: &'scope N,
    objective: &'scope O,
    seed: SubsetSolution,
    options: &MixedReplicaOptions,
) -> Result<DetachedSlot<'scope>>
where
    N: Neighborhood,
    O: ObjectiveFunction,
{
    let criteria =
        StopCriteria::new().with_max_time_without_improvement(options.tabu_stuck_time)?;
    let mut search =
        TabuSearch::new(seed, neighborhood, objective, options.tabu_capacity, criteria)?;
    let stop = search.stop_handle();
    let handle = scope.spawn(move || {
        let result = search.start();
        let best = search.best_solution().cloned();
        let score = search.best_score();
        (best, score, result)
    });
    Ok(DetachedSlot {
        kind: "tabu",
        stop,
        handle,
    })
}

fn spawn_lr_replica<'scope, O>(
    scope: &'scope thread::Scope<'scope, '_>,
    objective: &'scope O,
    template: &SubsetSolution,
    bounds: SubsetBounds,
    preference: SizePreference,
    rng: RandomNumberGenerator,
) -> Result<DetachedSlot<'scope>>
where
    O: ObjectiveFunction,
{
    let mut search = LrSearch::new(
        template.clone(),
        bounds,
        objective,
        LR_REPLICA_L,
        LR_REPLICA_R,
        StopCriteria::new(),
    )?
    .with_seeding(LrSeeding::RandomPair(rng))
    .with_size_preference(preference);
    let stop = search.stop_handle();
    let handle = scope.spawn(move || {
        let result = search.start();
        let best = search.best_solution().cloned();
        let score = search.best_score();
        (best, score, result)
    });
    Ok(DetachedSlot {
        kind: "lr",
        stop,
        handle,
    })
}

/// Heterogeneous parallel search over a population of replicas.
///
/// One step is one round of the non-tabu pool.
pub struct MixedReplicaSearch<N: Neighborhood, O: ObjectiveFunction> {
    core: SearchCore,
    solution: SubsetSolution,
    neighborhood: N,
    objective: O,
    rng: RandomNumberGenerator,
    options: MixedReplicaOptions,
}

impl<N: Neighborhood, O: ObjectiveFunction> MixedReplicaSearch<N, O> {
    /// Creates a mixed replica search. The given solution seeds the first
    /// pool replica; every other replica starts from a random subset within
    /// the neighborhood's bounds.
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
        options: MixedReplicaOptions,
    ) -> Result<Self> {
        neighborhood.bounds().validate_for(solution.total())?;
        let preference = neighborhood.size_preference();
        Ok(Self {
            core: SearchCore::new("MixedReplicaSearch", criteria, preference),
            solution,
            neighborhood,
            objective,
            rng,
            options,
        })
    }

    /// Returns the configured population options.
    pub fn options(&self) -> &MixedReplicaOptions {
        &self.options
    }

    fn run(&mut self) -> Result<Termination> {
        let neighborhood = &self.neighborhood;
        let objective = &self.objective;
        let options = self.options;
        let bounds = neighborhood.bounds();
        let preference = neighborhood.size_preference();
        let template = &self.solution;
        let core = &mut self.core;
        let rng = &mut self.rng;
        let token = core.token().clone();

        // Build the non-tabu pool: the template seeds the first replica,
        // the rest start from random subsets. Metropolis temperatures are
        // spread linearly across the configured range.
        let mut pool: Vec<PoolReplica> =
            Vec::with_capacity(options.local_replicas + options.metropolis_replicas);
        let random_seed = |rng: &mut RandomNumberGenerator| -> Result<SubsetSolution> {
            let size = rng.gen_range(bounds.min()..=bounds.max());
            SubsetSolution::random(template.total(), size, rng)
        };
        for i in 0..options.local_replicas {
            let seed = if i == 0 {
                template.clone()
            } else {
                random_seed(rng)?
            };
            pool.push(PoolReplica::new(
                PoolKind::Local,
                seed,
                objective,
                &token,
                rng.fork(),
            )?);
        }
        let count = options.metropolis_replicas;
        for i in 0..count {
            let temperature = if count <= 1 {
                options.min_temperature
            } else {
                let fraction = i as f64 / (count - 1) as f64;
                options.min_temperature
                    + (options.max_temperature - options.min_temperature) * fraction
            };
            let seed = if pool.is_empty() && i == 0 {
                template.clone()
            } else {
                random_seed(rng)?
            };
            pool.push(PoolReplica::new(
                PoolKind::Metropolis { temperature },
                seed,
                objective,
                &token,
                rng.fork(),
            )?);
        }
        for replica in &pool {
            core.try_update_best(&replica.best, replica.best_score, objective);
        }
        debug!(
            local = options.local_replicas,
            metropolis = options.metropolis_replicas,
            tabu = options.tabu_replicas,
            "initialized mixed replica population"
        );

        thread::scope(|scope| {
            let mut tabu_slots: Vec<DetachedSlot> = Vec::with_capacity(options.tabu_replicas);
            for _ in 0..options.tabu_replicas {
                let seed = random_seed(rng)?;
                tabu_slots.push(spawn_tabu_replica(
                    scope,
                    neighborhood,
                    objective,
                    seed,
                    &options,
                )?);
            }
            // A growing LR replica needs room for its seed pair.
            let mut lr_slot = if bounds.max() >= 2 {
                Some(spawn_lr_replica(
                    scope,
                    objective,
                    template,
                    bounds,
                    preference,
                    rng.fork(),
                )?)
            } else {
                None
            };

            let mut rounds = || -> Result<Termination> {
                let mut last_boost = Instant::now();
                let mut boosted_since_improvement = false;
                let mut round_time_total = Duration::ZERO;
                let mut completed_rounds = 0u32;

                loop {
                    if let Some(reason) = core.should_stop() {
                        return Ok(Termination::Halted(reason));
                    }
                    let round_started = Instant::now();

                    // One round: the whole pool advances concurrently, then
                    // results are inspected only after the barrier.
                    let steps = options.replica_steps;
                    pool.par_iter_mut()
                        .map(|replica| replica.advance(steps, neighborhood, objective, &token))
                        .collect::<Result<Vec<()>>>()?;
                    core.record_step();

                    let mut round_delta = 0.0_f64;
                    for replica in pool.iter() {
                        if let Some(delta) =
                            core.try_update_best(&replica.best, replica.best_score, objective)
                        {
                            round_delta = round_delta.max(delta);
                        }
                    }

                    // Poll background tabu replicas without blocking.
                    // Finished ones are merged and replaced by a fresh tabu
                    // replica seeded with a crossover child.
                    let mut index = 0;
                    while index < tabu_slots.len() {
                        if !tabu_slots[index].handle.is_finished() {
                            index += 1;
                            continue;
                        }
                        let slot = tabu_slots.swap_remove(index);
                        let (best, score, result) = slot.handle.join().map_err(|_| {
                            SearchError::Worker("tabu replica thread panicked".to_string())
                        })?;
                        result?;
                        if let (Some(solution), Some(score)) = (best, score) {
                            if let Some(delta) = core.try_update_best(&solution, score, objective)
                            {
                                round_delta = round_delta.max(delta);
                            }
                        }
                        let first =
                            tournament_pick(&pool, options.tournament_size, rng, objective);
                        let second =
                            tournament_pick(&pool, options.tournament_size, rng, objective);
                        let child = crossover(&first.solution, &second.solution, rng)?;
                        tabu_slots.push(spawn_tabu_replica(
                            scope,
                            neighborhood,
                            objective,
                            child,
                            &options,
                        )?);
                        debug!("respawned tabu replica from crossover child");
                    }

                    let lr_finished = lr_slot
                        .as_ref()
                        .map_or(false, |slot| slot.handle.is_finished());
                    if lr_finished {
                        if let Some(slot) = lr_slot.take() {
                            let (best, score, result) = slot.handle.join().map_err(|_| {
                                SearchError::Worker("lr replica thread panicked".to_string())
                            })?;
                            result?;
                            if let (Some(solution), Some(score)) = (best, score) {
                                if let Some(delta) =
                                    core.try_update_best(&solution, score, objective)
                                {
                                    round_delta = round_delta.max(delta);
                                }
                            }
                            debug!("lr replica finished");
                        }
                    }

                    if core.below_min_progression(round_delta) {
                        return Ok(Termination::Halted(StopReason::MinProgression));
                    }

                    // Replace stuck pool replicas with Metropolis replicas
                    // seeded by crossover, at a random temperature.
                    let stuck: Vec<usize> = pool
                        .iter()
                        .enumerate()
                        .filter(|(_, replica)| {
                            replica.dead_ended
                                || (matches!(replica.kind, PoolKind::Local)
                                    && replica.stalled_rounds >= REPLICA_STUCK_ROUNDS)
                        })
                        .map(|(index, _)| index)
                        .collect();
                    for index in stuck {
                        let first =
                            tournament_pick(&pool, options.tournament_size, rng, objective);
                        let second =
                            tournament_pick(&pool, options.tournament_size, rng, objective);
                        let child = crossover(&first.solution, &second.solution, rng)?;
                        let temperature =
                            rng.gen_range(options.min_temperature..=options.max_temperature);
                        pool[index] = PoolReplica::new(
                            PoolKind::Metropolis { temperature },
                            child,
                            objective,
                            &token,
                            rng.fork(),
                        )?;
                        debug!(
                            replica = index,
                            temperature, "replaced stuck replica with crossover child"
                        );
                    }

                    round_time_total += round_started.elapsed();
                    completed_rounds += 1;
                    let average_round = round_time_total / completed_rounds;

                    if options.boost_factor > 0 {
                        let stalled = round_delta < options.boost_progression_threshold;
                        let interval = options
                            .min_boost_interval
                            .max(average_round.mul_f64(options.boost_interval_factor));
                        let boost_now = (stalled && !boosted_since_improvement)
                            || last_boost.elapsed() >= interval;
                        if boost_now {
                            let injected = options.boost_factor * pool.len();
                            for _ in 0..injected {
                                let seed = random_seed(rng)?;
                                pool.push(PoolReplica::new(
                                    PoolKind::Local,
                                    seed,
                                    objective,
                                    &token,
                                    rng.fork(),
                                )?);
                            }
                            core.emit_message(&format!(
                                "boosting the population with {} fresh local replicas",
                                injected
                            ));
                            last_boost = Instant::now();
                            if stalled {
                                boosted_since_improvement = true;
                            }
                        }
                        if !stalled {
                            boosted_since_improvement = false;
                        }
                    }
                }
            };
            let outcome = rounds();

            // Stop whatever is still running and fold every background
            // replica's best into the shared best, even when the rounds
            // ended with an error.
            for slot in &tabu_slots {
                slot.stop.stop();
            }
            if let Some(slot) = &lr_slot {
                slot.stop.stop();
            }
            let mut detached_error: Option<SearchError> = None;
            for slot in tabu_slots.into_iter().chain(lr_slot) {
                let DetachedSlot {
                    kind,
                    stop: _,
                    handle,
                } = slot;
                let error = match handle.join() {
                    Ok((best, score, result)) => {
                        if let (Some(solution), Some(score)) = (best, score) {
                            core.try_update_best(&solution, score, objective);
                        }
                        result.err()
                    }
                    Err(_) => Some(SearchError::Worker(format!(
                        "{} replica thread panicked",
                        kind
                    ))),
                };
                if let Some(error) = error {
                    if detached_error.is_none() {
                        detached_error = Some(error);
                    } else {
                        warn!("suppressing duplicate background replica error: {}", error);
                    }
                }
            }

            match (outcome, detached_error) {
                (Err(error), detached) => {
                    if let Some(suppressed) = detached {
                        warn!(
                            "suppressing background replica error behind the round error: {}",
                            suppressed
                        );
                    }
                    Err(error)
                }
                (Ok(_), Some(error)) => Err(error),
                (Ok(termination), None) => Ok(termination),
            }
        })
    }
}

impl<N: Neighborhood, O: ObjectiveFunction> Search for MixedReplicaSearch<N, O> {
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
