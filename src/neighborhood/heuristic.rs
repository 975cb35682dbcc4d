//! # MSTRAT Heuristic Neighborhood
//!
//! A linear-cost alternative to the exact scan, after the MSTRAT strategy
//! for core collection refinement. Instead of ranking every swap, it picks
//! the single best *addition* and the single best *deletion* in two
//! independent linear passes, then considers only three candidates: the
//! addition alone, the deletion alone, or both combined into one swap.
//!
//! With `s` selected and `u` unselected items one step costs `u + s + 1`
//! evaluations instead of the exact neighborhood's `u + s + s*u`. The
//! deletion is always chosen from the *original* selected set, never the
//! just-added index, so the swap genuinely exchanges two distinct items.

use tracing::trace;

use crate::error::Result;
use crate::moves::{EvaluatedMove, Move};
use crate::objective::{CacheToken, ObjectiveFunction};
use crate::rng::RandomNumberGenerator;
use crate::solution::SubsetSolution;
use crate::tabu::TabuManager;

use super::{
    admissible, improves, random_single_move, validate_aspiration_delta, Neighborhood,
    SizePreference, SubsetBounds, MIN_TABU_ASPIRATION_PROG,
};

/// Heuristic neighborhood considering the best addition, the best deletion,
/// and their combination as a swap.
#[derive(Debug, Clone)]
pub struct MstratNeighborhood {
    bounds: SubsetBounds,
    preference: SizePreference,
    aspiration_delta: f64,
}

impl MstratNeighborhood {
    /// Creates a neighborhood enforcing the given size bounds, preferring
    /// smaller subsets on ties and with the default aspiration margin.
    pub fn new(bounds: SubsetBounds) -> Self {
        Self {
            bounds,
            preference: SizePreference::default(),
            aspiration_delta: MIN_TABU_ASPIRATION_PROG,
        }
    }

    /// Sets the tie-break preference.
    pub fn with_size_preference(mut self, preference: SizePreference) -> Self {
        self.preference = preference;
        self
    }

    /// Sets the aspiration margin: a tabu candidate is admissible when it
    /// beats the best known score by more than this.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Configuration` if the margin is negative or
    /// non-finite.
    pub fn with_aspiration_delta(mut self, delta: f64) -> Result<Self> {
        validate_aspiration_delta(delta)?;
        self.aspiration_delta = delta;
        Ok(self)
    }

    /// Scans the given moves and returns the one with the best score.
    ///
    /// All moves in one scan lead to the same subset size, so ranking is on
    /// score alone. Non-finite scores are skipped.
    fn best_of_scan(
        &self,
        moves: impl Iterator<Item = Move>,
        solution: &mut SubsetSolution,
        objective: &dyn ObjectiveFunction,
        token: Option<&CacheToken>,
    ) -> Result<Option<EvaluatedMove>> {
        let mut best: Option<EvaluatedMove> = None;
        for mv in moves {
            mv.apply(solution)?;
            let score = objective.evaluate(solution, token);
            mv.undo(solution)?;
            if !score.is_finite() {
                trace!(?mv, score, "skipping candidate with non-finite score");
                continue;
            }
            let replace = match &best {
                None => true,
                Some(current) => objective.improvement(score, current.score) > 0.0,
            };
            if replace {
                best = Some(EvaluatedMove::new(mv, score));
            }
        }
        Ok(best)
    }
}

impl Neighborhood for MstratNeighborhood {
    fn bounds(&self) -> SubsetBounds {
        self.bounds
    }

    fn size_preference(&self) -> SizePreference {
        self.preference
    }

    fn best_move(
        &self,
        solution: &mut SubsetSolution,
        objective: &dyn ObjectiveFunction,
        token: Option<&CacheToken>,
        tabu: Option<&TabuManager>,
        best_score: Option<f64>,
    ) -> Result<Option<EvaluatedMove>> {
        let size = solution.num_selected();
        let additions: Vec<usize> = solution.unselected().to_vec();
        let deletions: Vec<usize> = solution.selected().to_vec();

        // Additions are scanned even at the maximum size: the winner may
        // still enter as half of a size-preserving swap.
        let best_addition = self.best_of_scan(
            additions.iter().map(|&a| Move::addition(a)),
            solution,
            objective,
            token,
        )?;
        let best_deletion = self.best_of_scan(
            deletions.iter().map(|&d| Move::deletion(d)),
            solution,
            objective,
            token,
        )?;

        let mut candidates: Vec<EvaluatedMove> = Vec::with_capacity(3);

        if size < self.bounds.max() {
            if let Some(addition) = best_addition {
                candidates.push(addition);
            }
        }
        if size > self.bounds.min() {
            if let Some(deletion) = best_deletion {
                candidates.push(deletion);
            }
        }
        if let (Some(Move::Addition { add }), Some(Move::Deletion { remove })) = (
            best_addition.map(|m| m.mv),
            best_deletion.map(|m| m.mv),
        ) {
            let swap = Move::swap(add, remove);
            swap.apply(solution)?;
            let score = objective.evaluate(solution, token);
            swap.undo(solution)?;
            if score.is_finite() {
                candidates.push(EvaluatedMove::new(swap, score));
            }
        }

        let mut incumbent: Option<EvaluatedMove> = None;
        for candidate in candidates {
            if !admissible(
                &candidate.mv,
                candidate.score,
                objective,
                tabu,
                best_score,
                self.aspiration_delta,
            ) {
                continue;
            }
            let better = match &incumbent {
                None => true,
                Some(current) => improves(
                    objective,
                    self.preference,
                    0.0,
                    candidate.score,
                    candidate.mv.resulting_size(size),
                    current.score,
                    current.mv.resulting_size(size),
                ),
            };
            if better {
                incumbent = Some(candidate);
            }
        }

        trace!(found = incumbent.is_some(), "heuristic neighborhood scan finished");
        Ok(incumbent)
    }

    fn random_move(
        &self,
        solution: &SubsetSolution,
        rng: &mut RandomNumberGenerator,
    ) -> Option<Move> {
        random_single_move(solution, self.bounds, rng)
    }
}
