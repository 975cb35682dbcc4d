//! # Neighborhoods
//!
//! A neighborhood defines which solutions are "one step away" from the
//! current one, and how to pick a step. All neighborhoods in this module
//! operate on single perturbations: one addition, one deletion, or one swap,
//! constrained by configured subset size bounds.
//!
//! Two strategies are provided:
//!
//! * [`ExactSingleNeighborhood`] scans every legal move, evaluating each
//!   candidate by applying it, scoring the solution, and undoing it again.
//!   With `s` selected and `u` unselected items this costs `s + u + s*u`
//!   evaluations, so it is thorough but quadratic.
//! * [`MstratNeighborhood`] uses the MSTRAT heuristic: it picks the single
//!   best addition and the single best deletion in two linear scans, then
//!   combines them into the best of addition, deletion, or swap. Linear cost,
//!   usually near-exact quality.
//!
//! Both also generate uniformly random legal moves for trajectory searches
//! like random descent and Metropolis.
//!
//! Neighborhoods are aware of tabu restrictions: when handed a
//! [`TabuManager`](crate::tabu::TabuManager), they skip tabu candidates
//! unless the aspiration rule fires (the candidate would beat the best
//! solution found so far by more than a small margin).

use std::fmt::Debug;

use crate::error::{Result, SearchError};
use crate::moves::{EvaluatedMove, Move};
use crate::objective::{CacheToken, ObjectiveFunction};
use crate::rng::RandomNumberGenerator;
use crate::solution::SubsetSolution;
use crate::tabu::TabuManager;

pub mod exact;
pub mod heuristic;

pub use exact::ExactSingleNeighborhood;
pub use heuristic::MstratNeighborhood;

/// Default aspiration margin of the exact neighborhood: a tabu move is
/// admissible when it improves the best known score by more than this.
pub const MIN_TABU_ASPIRATION_DELTA: f64 = 1e-9;

/// Default aspiration margin of the MSTRAT heuristic neighborhood.
pub const MIN_TABU_ASPIRATION_PROG: f64 = 1e-9;

/// How to break ties between candidates with exactly equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SizePreference {
    /// Prefer the smaller subset on equal score. This is the default: a
    /// smaller core with the same quality is the better core.
    #[default]
    PreferSmaller,
    /// Prefer the larger subset on equal score.
    PreferLarger,
    /// Never break ties on size; the first candidate found wins.
    Indifferent,
}

impl SizePreference {
    /// Returns whether a candidate of `candidate_size` beats a reference of
    /// `reference_size` under this preference, given equal scores.
    pub fn breaks_tie(&self, candidate_size: usize, reference_size: usize) -> bool {
        match self {
            SizePreference::PreferSmaller => candidate_size < reference_size,
            SizePreference::PreferLarger => candidate_size > reference_size,
            SizePreference::Indifferent => false,
        }
    }

    /// Returns whether moving from `reference_size` to `candidate_size` goes
    /// against this preference.
    pub fn worsens(&self, candidate_size: usize, reference_size: usize) -> bool {
        match self {
            SizePreference::PreferSmaller => candidate_size > reference_size,
            SizePreference::PreferLarger => candidate_size < reference_size,
            SizePreference::Indifferent => false,
        }
    }
}

/// Inclusive subset size bounds enforced by a neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubsetBounds {
    min: usize,
    max: usize,
}

impl SubsetBounds {
    /// Creates bounds requiring `min <= size <= max`.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Configuration` if `min` is zero or exceeds `max`.
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if min == 0 {
            return Err(SearchError::Configuration(
                "minimum subset size must be at least 1".to_string(),
            ));
        }
        if min > max {
            return Err(SearchError::Configuration(format!(
                "minimum subset size {} exceeds maximum {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Creates bounds pinning the subset to an exact size.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Configuration` if `size` is zero.
    pub fn fixed(size: usize) -> Result<Self> {
        Self::new(size, size)
    }

    /// Returns the minimum allowed subset size.
    pub fn min(&self) -> usize {
        self.min
    }

    /// Returns the maximum allowed subset size.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Returns whether `size` lies within the bounds.
    pub fn contains(&self, size: usize) -> bool {
        size >= self.min && size <= self.max
    }

    /// Checks the bounds against a dataset of `total` items.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Configuration` if the maximum exceeds `total`.
    pub fn validate_for(&self, total: usize) -> Result<()> {
        if self.max > total {
            Err(SearchError::Configuration(format!(
                "maximum subset size {} exceeds the dataset size {}",
                self.max, total
            )))
        } else {
            Ok(())
        }
    }
}

/// Generates and ranks single-perturbation moves around a solution.
pub trait Neighborhood: Debug + Send + Sync {
    /// Returns the subset size bounds this neighborhood enforces.
    fn bounds(&self) -> SubsetBounds;

    /// Returns the tie-break preference used when ranking candidates.
    fn size_preference(&self) -> SizePreference;

    /// Finds the best admissible move around `solution`.
    ///
    /// Candidates are evaluated by applying them to the working solution,
    /// scoring it, and undoing the move again; the solution is guaranteed to
    /// be back in its entry state when this returns. The returned move is
    /// *not* applied; callers decide whether to take the step.
    ///
    /// When `tabu` is given, tabu candidates are skipped unless they beat
    /// `best_score` by more than the neighborhood's aspiration margin.
    /// Candidates with non-finite scores are always skipped.
    ///
    /// Returns `Ok(None)` when no admissible move exists.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Solution` if the working solution rejects an
    /// apply or undo, which indicates it was mutated concurrently.
    fn best_move(
        &self,
        solution: &mut SubsetSolution,
        objective: &dyn ObjectiveFunction,
        token: Option<&CacheToken>,
        tabu: Option<&TabuManager>,
        best_score: Option<f64>,
    ) -> Result<Option<EvaluatedMove>>;

    /// Draws a uniformly random legal move, or `None` when the solution has
    /// no legal neighbors under the size bounds.
    fn random_move(&self, solution: &SubsetSolution, rng: &mut RandomNumberGenerator)
        -> Option<Move>;
}

impl<N: Neighborhood + ?Sized> Neighborhood for &N {
    fn bounds(&self) -> SubsetBounds {
        (**self).bounds()
    }

    fn size_preference(&self) -> SizePreference {
        (**self).size_preference()
    }

    fn best_move(
        &self,
        solution: &mut SubsetSolution,
        objective: &dyn ObjectiveFunction,
        token: Option<&CacheToken>,
        tabu: Option<&TabuManager>,
        best_score: Option<f64>,
    ) -> Result<Option<EvaluatedMove>> {
        (**self).best_move(solution, objective, token, tabu, best_score)
    }

    fn random_move(
        &self,
        solution: &SubsetSolution,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Move> {
        (**self).random_move(solution, rng)
    }
}

/// Compares a candidate against a reference under the objective orientation
/// and size preference. The candidate wins when it improves the score by
/// more than `min_delta`, or scores exactly equal and wins the size
/// tie-break.
pub(crate) fn improves(
    objective: &dyn ObjectiveFunction,
    preference: SizePreference,
    min_delta: f64,
    candidate_score: f64,
    candidate_size: usize,
    reference_score: f64,
    reference_size: usize,
) -> bool {
    let delta = objective.improvement(candidate_score, reference_score);
    if delta > min_delta {
        return true;
    }
    if candidate_score == reference_score {
        return preference.breaks_tie(candidate_size, reference_size);
    }
    false
}

/// Validates an aspiration margin supplied through a neighborhood builder.
pub(crate) fn validate_aspiration_delta(delta: f64) -> Result<()> {
    if !delta.is_finite() || delta < 0.0 {
        Err(SearchError::Configuration(format!(
            "aspiration margin must be finite and non-negative, got {}",
            delta
        )))
    } else {
        Ok(())
    }
}

/// Applies the tabu and aspiration rules to a scored candidate.
///
/// A candidate is admissible when no tabu manager is installed, when it is
/// not tabu, or when it would improve on the best known score by more than
/// `aspiration_delta`.
pub(crate) fn admissible(
    mv: &Move,
    score: f64,
    objective: &dyn ObjectiveFunction,
    tabu: Option<&TabuManager>,
    best_score: Option<f64>,
    aspiration_delta: f64,
) -> bool {
    match tabu {
        None => true,
        Some(manager) if !manager.is_tabu(mv) => true,
        Some(_) => match best_score {
            Some(best) => objective.improvement(score, best) > aspiration_delta,
            None => false,
        },
    }
}

/// Draws one uniformly random legal move under the given bounds.
///
/// Every legal move kind is drawn with equal probability; the concrete
/// indices are then drawn uniformly within the kind. When every item is
/// selected only deletions remain, and when the bounds pin the size only
/// swaps remain.
pub(crate) fn random_single_move(
    solution: &SubsetSolution,
    bounds: SubsetBounds,
    rng: &mut RandomNumberGenerator,
) -> Option<Move> {
    let size = solution.num_selected();
    let can_add = size < bounds.max() && solution.num_unselected() > 0;
    let can_remove = size > bounds.min();
    let can_swap = size > 0 && solution.num_unselected() > 0;

    let mut kinds: Vec<u8> = Vec::with_capacity(3);
    if can_add {
        kinds.push(0);
    }
    if can_remove {
        kinds.push(1);
    }
    if can_swap {
        kinds.push(2);
    }

    let kind = kinds[rng.gen_index(kinds.len())?];
    match kind {
        0 => solution.random_unselected(rng).map(Move::addition),
        1 => solution.random_selected(rng).map(Move::deletion),
        _ => {
            let add = solution.random_unselected(rng)?;
            let remove = solution.random_selected(rng)?;
            Some(Move::swap(add, remove))
        }
    }
}
