//! # ObjectiveFunction
//!
//! The `ObjectiveFunction` trait defines the optimization problem: it scores
//! a [`SubsetSolution`](crate::solution::SubsetSolution) and declares whether
//! lower or higher scores are better. Searches never interpret scores beyond
//! comparing them through [`ObjectiveFunction::improvement`], so any finite
//! scale works.
//!
//! Evaluations may optionally receive a [`CacheToken`]. The token identifies
//! one search run; caching objectives use it to scope their entries so that
//! results from a previous run (or a concurrently running replica search)
//! can never leak into another.
//!
//! ## Example
//!
//! ```rust
//! use coresel::objective::ObjectiveFunction;
//! use coresel::solution::SubsetSolution;
//! use coresel::objective::CacheToken;
//!
//! #[derive(Debug)]
//! struct WeightSum {
//!     weights: Vec<f64>,
//! }
//!
//! impl ObjectiveFunction for WeightSum {
//!     fn evaluate(&self, solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
//!         solution.selected().iter().map(|&i| self.weights[i]).sum()
//!     }
//! }
//!
//! let objective = WeightSum { weights: vec![1.0, 2.0, 3.0] };
//! let solution = SubsetSolution::with_selection(3, [0, 2]).unwrap();
//! assert_eq!(objective.evaluate(&solution, None), 4.0);
//! ```

use crate::error::{Result, SearchError};
use crate::rng::ThreadLocalRng;
use crate::solution::SubsetSolution;

/// Identifies one search run for evaluation caching purposes.
///
/// A fresh token is generated every time a search starts, so cached entries
/// from different runs never collide even when several searches share one
/// caching objective. Tokens are cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheToken(String);

impl CacheToken {
    /// Generates a new unique token.
    pub fn fresh() -> Self {
        CacheToken(format!(
            "run-{:016x}",
            ThreadLocalRng::gen_range(0..u64::MAX)
        ))
    }

    /// Returns the token identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Scores subset solutions.
///
/// Implementations must be deterministic for a fixed selected set within one
/// run: searches cache and compare scores under that assumption. Scores must
/// be finite; non-finite values abort the evaluating search with
/// `SearchError::Evaluation` when they reach an acceptance decision.
pub trait ObjectiveFunction: Send + Sync {
    /// Returns whether lower scores are better. Defaults to maximization.
    fn is_minimizing(&self) -> bool {
        false
    }

    /// Computes the score of a solution.
    ///
    /// # Arguments
    ///
    /// * `solution` - The solution to score.
    /// * `token` - The active run's cache token, if the search enabled caching.
    fn evaluate(&self, solution: &SubsetSolution, token: Option<&CacheToken>) -> f64;

    /// Returns how much `candidate` improves on `reference` in this
    /// objective's orientation. Positive values mean improvement.
    fn improvement(&self, candidate: f64, reference: f64) -> f64 {
        if self.is_minimizing() {
            reference - candidate
        } else {
            candidate - reference
        }
    }
}

impl<O: ObjectiveFunction + ?Sized> ObjectiveFunction for &O {
    fn is_minimizing(&self) -> bool {
        (**self).is_minimizing()
    }

    fn evaluate(&self, solution: &SubsetSolution, token: Option<&CacheToken>) -> f64 {
        (**self).evaluate(solution, token)
    }

    fn improvement(&self, candidate: f64, reference: f64) -> f64 {
        (**self).improvement(candidate, reference)
    }
}

/// Evaluates a solution and rejects non-finite scores.
///
/// Searches use this wherever a score is about to be stored or acted upon.
pub(crate) fn checked_evaluate(
    objective: &dyn ObjectiveFunction,
    solution: &SubsetSolution,
    token: Option<&CacheToken>,
) -> Result<f64> {
    let score = objective.evaluate(solution, token);
    if score.is_finite() {
        Ok(score)
    } else {
        Err(SearchError::Evaluation(format!(
            "objective produced a non-finite score ({}) for a subset of size {}",
            score,
            solution.num_selected()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CountSelected {
        minimizing: bool,
    }

    impl ObjectiveFunction for CountSelected {
        fn is_minimizing(&self) -> bool {
            self.minimizing
        }

        fn evaluate(&self, solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
            solution.num_selected() as f64
        }
    }

    #[derive(Debug)]
    struct AlwaysNan;

    impl ObjectiveFunction for AlwaysNan {
        fn evaluate(&self, _solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
            f64::NAN
        }
    }

    #[test]
    fn test_improvement_orientation() {
        let maximizing = CountSelected { minimizing: false };
        assert_eq!(maximizing.improvement(3.0, 1.0), 2.0);
        assert_eq!(maximizing.improvement(1.0, 3.0), -2.0);

        let minimizing = CountSelected { minimizing: true };
        assert_eq!(minimizing.improvement(1.0, 3.0), 2.0);
        assert_eq!(minimizing.improvement(3.0, 1.0), -2.0);
    }

    #[test]
    fn test_checked_evaluate_accepts_finite() {
        let objective = CountSelected { minimizing: false };
        let solution = SubsetSolution::with_selection(4, [0, 1]).unwrap();
        let score = checked_evaluate(&objective, &solution, None).unwrap();
        assert_eq!(score, 2.0);
    }

    #[test]
    fn test_checked_evaluate_rejects_nan() {
        let solution = SubsetSolution::with_selection(4, [0, 1]).unwrap();
        let result = checked_evaluate(&AlwaysNan, &solution, None);
        assert!(matches!(result, Err(SearchError::Evaluation(_))));
    }

    #[test]
    fn test_cache_tokens_are_unique() {
        let a = CacheToken::fresh();
        let b = CacheToken::fresh();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("run-"));
    }
}
