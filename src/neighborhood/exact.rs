//! # Exact Single-Perturbation Neighborhood
//!
//! Scans *every* legal addition, deletion and swap around the current
//! solution and returns the best admissible one. With `s` selected and `u`
//! unselected items this evaluates `u + s + s*u` candidates, each through an
//! apply-evaluate-undo cycle on the working solution. Use this when solution
//! quality matters more than step latency; the MSTRAT heuristic in
//! [`heuristic`](crate::neighborhood::heuristic) is the linear alternative.

use tracing::trace;

use crate::error::Result;
use crate::moves::{EvaluatedMove, Move};
use crate::objective::{CacheToken, ObjectiveFunction};
use crate::rng::RandomNumberGenerator;
use crate::solution::SubsetSolution;
use crate::tabu::TabuManager;

use super::{
    admissible, improves, random_single_move, validate_aspiration_delta, Neighborhood,
    SizePreference, SubsetBounds, MIN_TABU_ASPIRATION_DELTA,
};

/// Exhaustively scans all single-perturbation moves.
#[derive(Debug, Clone)]
pub struct ExactSingleNeighborhood {
    bounds: SubsetBounds,
    preference: SizePreference,
    aspiration_delta: f64,
}

impl ExactSingleNeighborhood {
    /// Creates a neighborhood enforcing the given size bounds, preferring
    /// smaller subsets on ties and with the default aspiration margin.
    pub fn new(bounds: SubsetBounds) -> Self {
        Self {
            bounds,
            preference: SizePreference::default(),
            aspiration_delta: MIN_TABU_ASPIRATION_DELTA,
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

    /// Evaluates one candidate move and folds it into the running best.
    #[allow(clippy::too_many_arguments)]
    fn consider(
        &self,
        mv: Move,
        solution: &mut SubsetSolution,
        objective: &dyn ObjectiveFunction,
        token: Option<&CacheToken>,
        tabu: Option<&TabuManager>,
        best_score: Option<f64>,
        incumbent: &mut Option<EvaluatedMove>,
    ) -> Result<()> {
        mv.apply(solution)?;
        let score = objective.evaluate(solution, token);
        mv.undo(solution)?;

        if !score.is_finite() {
            trace!(?mv, score, "skipping candidate with non-finite score");
            return Ok(());
        }
        if !admissible(&mv, score, objective, tabu, best_score, self.aspiration_delta) {
            return Ok(());
        }

        let size = mv.resulting_size(solution.num_selected());
        let better = match incumbent {
            None => true,
            Some(current) => improves(
                objective,
                self.preference,
                0.0,
                score,
                size,
                current.score,
                current.mv.resulting_size(solution.num_selected()),
            ),
        };
        if better {
            *incumbent = Some(EvaluatedMove::new(mv, score));
        }
        Ok(())
    }
}

impl Neighborhood for ExactSingleNeighborhood {
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
        // The views reorder while moves are applied and undone, so the
        // candidate index lists are snapshotted up front.
        let additions: Vec<usize> = if size < self.bounds.max() {
            solution.unselected().to_vec()
        } else {
            Vec::new()
        };
        let deletions: Vec<usize> = if size > self.bounds.min() {
            solution.selected().to_vec()
        } else {
            Vec::new()
        };
        let swap_removals: Vec<usize> = solution.selected().to_vec();
        let swap_additions: Vec<usize> = solution.unselected().to_vec();

        let mut incumbent: Option<EvaluatedMove> = None;

        for &add in &additions {
            self.consider(
                Move::addition(add),
                solution,
                objective,
                token,
                tabu,
                best_score,
                &mut incumbent,
            )?;
        }
        for &remove in &deletions {
            self.consider(
                Move::deletion(remove),
                solution,
                objective,
                token,
                tabu,
                best_score,
                &mut incumbent,
            )?;
        }
        for &add in &swap_additions {
            for &remove in &swap_removals {
                self.consider(
                    Move::swap(add, remove),
                    solution,
                    objective,
                    token,
                    tabu,
                    best_score,
                    &mut incumbent,
                )?;
            }
        }

        trace!(
            candidates = additions.len() + deletions.len() + swap_additions.len() * swap_removals.len(),
            found = incumbent.is_some(),
            "exact neighborhood scan finished"
        );
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
