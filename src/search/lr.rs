//! # LR Search
//!
//! Deterministic look-ahead construction: every round performs the `l` best
//! single additions followed by the `r` best single deletions, each found by
//! full enumeration. With `l > r` the subset grows by `l - r` per round
//! towards the maximum size, with `l < r` it shrinks towards the minimum.
//! Taking more moves per round than strictly needed gives the search a
//! limited ability to look past greedy single-move choices (`l = 2, r = 1`
//! reconsiders one earlier pick every round).
//!
//! A growing search seeds from the best subset of size two, found either
//! exhaustively or by drawing a random pair; a shrinking search seeds from
//! the full collection (see [`LrSeeding`]). The classic greedy forward
//! selection is `l = 1, r = 0`, backward elimination is `l = 0, r = 1`.
//!
//! The search ends on its own: when the next round cannot land within the
//! size bounds, or when a round that started within bounds fails to improve,
//! in which case the whole round is rolled back first.
//!
//! ## Example
//!
//! ```rust
//! use coresel::neighborhood::SubsetBounds;
//! use coresel::objective::{CacheToken, ObjectiveFunction};
//! use coresel::search::{LrSearch, Search, StopCriteria};
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
//! let solution = SubsetSolution::new(6).unwrap();
//! let bounds = SubsetBounds::fixed(3).unwrap();
//!
//! // Greedy forward selection.
//! let mut search =
//!     LrSearch::new(solution, bounds, objective, 1, 0, StopCriteria::new()).unwrap();
//! search.start().unwrap();
//!
//! assert_eq!(search.best_score(), Some(24.0));
//! assert_eq!(
//!     search.best_solution().map(|s| s.selected_sorted()),
//!     Some(vec![1, 3, 5])
//! );
//! ```

use std::time::Duration;

use tracing::trace;

use crate::error::{Result, SearchError};
use crate::moves::{EvaluatedMove, Move};
use crate::neighborhood::{SizePreference, SubsetBounds};
use crate::objective::{checked_evaluate, CacheToken, ObjectiveFunction};
use crate::rng::RandomNumberGenerator;
use crate::search::exhaustive::RevolvingDoorGenerator;
use crate::search::{
    Search, SearchCore, SearchListener, SearchStatus, StopCriteria, StopHandle, Termination,
};
use crate::solution::SubsetSolution;

/// How an LR search picks its initial selection.
///
/// Growing searches default to [`ExhaustivePair`](LrSeeding::ExhaustivePair),
/// shrinking searches to [`FullSet`](LrSeeding::FullSet).
#[derive(Clone)]
pub enum LrSeeding {
    /// Evaluate every pair and start from the best one. Deterministic, costs
    /// `C(n, 2)` evaluations up front.
    ExhaustivePair,
    /// Start from two uniformly drawn indices.
    RandomPair(RandomNumberGenerator),
    /// Start from the full collection.
    FullSet,
}

/// Finds the single best move of one kind by evaluating every candidate.
fn best_single_move<O: ObjectiveFunction>(
    solution: &mut SubsetSolution,
    objective: &O,
    token: Option<&CacheToken>,
    candidates: &[usize],
    make: impl Fn(usize) -> Move,
) -> Result<Option<EvaluatedMove>> {
    let mut best: Option<EvaluatedMove> = None;
    for &index in candidates {
        let mv = make(index);
        mv.apply(solution)?;
        let score = objective.evaluate(solution, token);
        mv.undo(solution)?;

        if !score.is_finite() {
            trace!(?mv, score, "skipping candidate with non-finite score");
            continue;
        }
        let better = match &best {
            None => true,
            Some(incumbent) => objective.improvement(score, incumbent.score) > 0.0,
        };
        if better {
            best = Some(EvaluatedMove::new(mv, score));
        }
    }
    Ok(best)
}

/// Deterministic (l, r) construction search.
///
/// One step is one round of `l` additions and `r` deletions.
pub struct LrSearch<O: ObjectiveFunction> {
    core: SearchCore,
    solution: SubsetSolution,
    bounds: SubsetBounds,
    objective: O,
    l: usize,
    r: usize,
    seeding: LrSeeding,
}

impl<O: ObjectiveFunction> LrSearch<O> {
    /// Creates an LR search over subsets of `solution`'s collection.
    ///
    /// The initial selection of `solution` is irrelevant: a growing search
    /// (`l > r`) reseeds from a pair, a shrinking search (`l < r`) from the
    /// full collection.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `l` equals `r`, if `bounds` does
    /// not fit the collection size, or if a growing search is given a
    /// maximum subset size below the seed pair.
    pub fn new(
        solution: SubsetSolution,
        bounds: SubsetBounds,
        objective: O,
        l: usize,
        r: usize,
        criteria: StopCriteria,
    ) -> Result<Self> {
        if l == r {
            return Err(SearchError::Configuration(format!(
                "l and r must differ, got l = r = {}",
                l
            )));
        }
        bounds.validate_for(solution.total())?;
        if l > r && bounds.max() < 2 {
            return Err(SearchError::Configuration(
                "a growing LR search needs a maximum subset size of at least 2".to_string(),
            ));
        }
        let seeding = if l > r {
            LrSeeding::ExhaustivePair
        } else {
            LrSeeding::FullSet
        };
        Ok(Self {
            core: SearchCore::new("LrSearch", criteria, SizePreference::default()),
            solution,
            bounds,
            objective,
            l,
            r,
            seeding,
        })
    }

    /// Sets how the search picks its initial selection. Defaults to the
    /// exhaustive best pair when growing and the full collection when
    /// shrinking.
    pub fn with_seeding(mut self, seeding: LrSeeding) -> Self {
        self.seeding = seeding;
        self
    }

    /// Sets the tie-break preference applied when two subsets score exactly
    /// equal. Defaults to preferring the smaller subset.
    pub fn with_size_preference(mut self, preference: SizePreference) -> Self {
        self.core.set_preference(preference);
        self
    }

    /// Installs the initial selection according to the seeding strategy.
    fn seed(&mut self) -> Result<()> {
        for index in self.solution.selected().to_vec() {
            self.solution.deselect(index)?;
        }
        match &mut self.seeding {
            LrSeeding::FullSet => {
                for index in self.solution.unselected().to_vec() {
                    self.solution.select(index)?;
                }
            }
            LrSeeding::ExhaustivePair => {
                let mut generator = RevolvingDoorGenerator::new(self.solution.total(), 2)?;
                for &index in generator.current() {
                    self.solution.select(index)?;
                }
                let mut best_pair = [generator.current()[0], generator.current()[1]];
                let mut best_score = checked_evaluate(
                    &self.objective,
                    &self.solution,
                    Some(self.core.token()),
                )?;
                while let Some((removed, added)) = generator.advance() {
                    self.solution.swap(added, removed)?;
                    let score = checked_evaluate(
                        &self.objective,
                        &self.solution,
                        Some(self.core.token()),
                    )?;
                    if self.objective.improvement(score, best_score) > 0.0 {
                        best_score = score;
                        best_pair = [generator.current()[0], generator.current()[1]];
                    }
                }
                for index in self.solution.selected().to_vec() {
                    self.solution.deselect(index)?;
                }
                for &index in &best_pair {
                    self.solution.select(index)?;
                }
            }
            LrSeeding::RandomPair(rng) => {
                for _ in 0..2 {
                    let index = self.solution.random_unselected(rng).ok_or_else(|| {
                        SearchError::Solution(
                            "ran out of unselected items while seeding".to_string(),
                        )
                    })?;
                    self.solution.select(index)?;
                }
            }
        }
        Ok(())
    }

    fn run(&mut self) -> Result<Termination> {
        self.seed()?;
        let mut current =
            checked_evaluate(&self.objective, &self.solution, Some(self.core.token()))?;
        if self.bounds.contains(self.solution.num_selected()) {
            self.core.try_update_best(&self.solution, current, &self.objective);
        }

        loop {
            if let Some(reason) = self.core.should_stop() {
                return Ok(Termination::Halted(reason));
            }
            let round_start_score = current;
            let round_start_size = self.solution.num_selected();
            let mut applied: Vec<Move> = Vec::with_capacity(self.l + self.r);

            for _ in 0..self.l {
                let candidates = self.solution.unselected().to_vec();
                let Some(evaluated) = best_single_move(
                    &mut self.solution,
                    &self.objective,
                    Some(self.core.token()),
                    &candidates,
                    Move::addition,
                )?
                else {
                    break;
                };
                evaluated.mv.apply(&mut self.solution)?;
                current = evaluated.score;
                applied.push(evaluated.mv);
                if self.bounds.contains(self.solution.num_selected()) {
                    self.core.try_update_best(&self.solution, current, &self.objective);
                }
            }
            for _ in 0..self.r {
                let candidates = self.solution.selected().to_vec();
                let Some(evaluated) = best_single_move(
                    &mut self.solution,
                    &self.objective,
                    Some(self.core.token()),
                    &candidates,
                    Move::deletion,
                )?
                else {
                    break;
                };
                evaluated.mv.apply(&mut self.solution)?;
                current = evaluated.score;
                applied.push(evaluated.mv);
                if self.bounds.contains(self.solution.num_selected()) {
                    self.core.try_update_best(&self.solution, current, &self.objective);
                }
            }
            self.core.record_step();

            // A round that starts within bounds and fails to improve is
            // rolled back entirely; rounds passing through out-of-bounds
            // sizes are forced onward regardless.
            let delta = self.objective.improvement(current, round_start_score);
            if delta <= 0.0 && self.bounds.contains(round_start_size) {
                for mv in applied.iter().rev() {
                    mv.undo(&mut self.solution)?;
                }
                return Ok(Termination::Finished);
            }

            let size = self.solution.num_selected();
            if self.l > self.r {
                if size + (self.l - self.r) > self.bounds.max() {
                    return Ok(Termination::Finished);
                }
            } else if size < self.bounds.min() + (self.r - self.l) {
                return Ok(Termination::Finished);
            }
        }
    }
}

impl<O: ObjectiveFunction> Search for LrSearch<O> {
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
