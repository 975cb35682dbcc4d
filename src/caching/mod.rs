//! # Caching Module
//!
//! This module provides caching mechanisms for objective evaluations to
//! improve performance. Caching pays off for expensive objectives because
//! searches revisit solutions frequently: candidate moves are applied,
//! evaluated and undone, and undo patterns bring back recently seen subsets.
//!
//! Cache entries are keyed by the selected set *and* the run token passed to
//! [`ObjectiveFunction::evaluate`], so evaluations from different runs never
//! collide. Evaluations performed without a token bypass the cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::objective::{CacheToken, ObjectiveFunction};
use crate::solution::SubsetSolution;

/// Cache key for one evaluation: the run it belongs to and the canonically
/// ordered selected set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SelectionKey {
    run: String,
    selected: Vec<usize>,
}

impl SelectionKey {
    fn new(token: &CacheToken, solution: &SubsetSolution) -> Self {
        Self {
            run: token.as_str().to_string(),
            selected: solution.selected_sorted(),
        }
    }
}

/// A wrapper around an objective that caches evaluations.
///
/// This wrapper caches the results of evaluations to avoid redundant
/// calculations. The cache is shared and locked per lookup, which is the
/// right trade-off for sequential searches; parallel replica searches should
/// prefer [`ThreadLocalCachedObjective`].
#[derive(Debug, Clone)]
pub struct CachedObjective<O>
where
    O: ObjectiveFunction,
{
    /// The wrapped objective
    objective: O,
    /// The cache of evaluations
    cache: Arc<Mutex<HashMap<SelectionKey, f64>>>,
}

impl<O> CachedObjective<O>
where
    O: ObjectiveFunction,
{
    /// Creates a new cached objective wrapping the given objective.
    pub fn new(objective: O) -> Self {
        Self {
            objective,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns a reference to the wrapped objective.
    pub fn inner(&self) -> &O {
        &self.objective
    }

    /// Returns the number of cached evaluations.
    pub fn cache_size(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Clears the cache.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }
}

impl<O> ObjectiveFunction for CachedObjective<O>
where
    O: ObjectiveFunction,
{
    fn is_minimizing(&self) -> bool {
        self.objective.is_minimizing()
    }

    fn evaluate(&self, solution: &SubsetSolution, token: Option<&CacheToken>) -> f64 {
        let Some(token) = token else {
            // No run token, nothing to scope the entry to.
            return self.objective.evaluate(solution, None);
        };

        let key = SelectionKey::new(token, solution);

        let mut cache = self.cache.lock().unwrap();

        if let Some(score) = cache.get(&key) {
            return *score;
        }

        let score = self.objective.evaluate(solution, Some(token));
        cache.insert(key, score);

        score
    }
}

/// A thread-local cache for objective evaluations.
///
/// This cache is designed to be used in parallel contexts where each thread
/// has its own cache to avoid contention.
#[derive(Debug)]
pub struct ThreadLocalEvaluationCache {
    /// The cache of evaluations
    cache: thread_local::ThreadLocal<RefCell<HashMap<SelectionKey, f64>>>,
}

impl ThreadLocalEvaluationCache {
    /// Creates a new empty thread-local cache.
    pub fn new() -> Self {
        Self {
            cache: thread_local::ThreadLocal::new(),
        }
    }

    /// Gets a cached evaluation if available.
    fn get(&self, key: &SelectionKey) -> Option<f64> {
        self.cache
            .get()
            .and_then(|cell| cell.try_borrow().ok())
            .and_then(|cache| cache.get(key).copied())
    }

    /// Inserts an evaluation into the cache.
    fn insert(&self, key: SelectionKey, value: f64) {
        let cell = self.cache.get_or(|| RefCell::new(HashMap::new()));
        if let Ok(mut cache) = cell.try_borrow_mut() {
            cache.insert(key, value);
        }
    }

    /// Clears the cache for the current thread.
    pub fn clear(&self) {
        if let Some(cell) = self.cache.get() {
            if let Ok(mut cache) = cell.try_borrow_mut() {
                cache.clear();
            }
        }
    }

    /// Returns the number of cached evaluations for the current thread.
    pub fn len(&self) -> usize {
        self.cache
            .get()
            .and_then(|cell| cell.try_borrow().ok())
            .map_or(0, |cache| cache.len())
    }

    /// Returns `true` if the cache for the current thread is empty.
    pub fn is_empty(&self) -> bool {
        self.cache
            .get()
            .and_then(|cell| cell.try_borrow().ok())
            .map_or(true, |cache| cache.is_empty())
    }
}

impl Default for ThreadLocalEvaluationCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A wrapper around an objective that uses a thread-local cache.
///
/// This wrapper is designed for parallel replica searches where each worker
/// thread keeps its own cache to avoid lock contention. The price is that
/// replicas do not share cached scores across threads.
#[derive(Debug, Clone)]
pub struct ThreadLocalCachedObjective<O>
where
    O: ObjectiveFunction,
{
    /// The wrapped objective
    objective: O,
    /// The thread-local cache of evaluations
    cache: Arc<ThreadLocalEvaluationCache>,
}

impl<O> ThreadLocalCachedObjective<O>
where
    O: ObjectiveFunction,
{
    /// Creates a new thread-local cached objective wrapping the given objective.
    pub fn new(objective: O) -> Self {
        Self {
            objective,
            cache: Arc::new(ThreadLocalEvaluationCache::new()),
        }
    }

    /// Returns a reference to the wrapped objective.
    pub fn inner(&self) -> &O {
        &self.objective
    }

    /// Clears the cache for the current thread.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Returns the number of cached evaluations for the current thread.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

impl<O> ObjectiveFunction for ThreadLocalCachedObjective<O>
where
    O: ObjectiveFunction,
{
    fn is_minimizing(&self) -> bool {
        self.objective.is_minimizing()
    }

    fn evaluate(&self, solution: &SubsetSolution, token: Option<&CacheToken>) -> f64 {
        let Some(token) = token else {
            return self.objective.evaluate(solution, None);
        };

        let key = SelectionKey::new(token, solution);

        if let Some(score) = self.cache.get(&key) {
            return score;
        }

        let score = self.objective.evaluate(solution, Some(token));
        self.cache.insert(key, score);

        score
    }
}
