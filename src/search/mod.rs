//! # Search
//!
//! Search algorithms that explore the space of subset solutions, together with
//! the shared lifecycle plumbing they are built on: a status state machine,
//! configurable stop criteria, cooperative cancellation and listener
//! notification.
//!
//! Every algorithm implements the [`Search`] trait. A search is single-shot:
//! construct it fully configured, optionally attach listeners, call
//! [`start`](Search::start) once, and read the best solution afterwards.
//! Algorithms without a natural end (random sampling, annealing, tabu) refuse
//! to start unless at least one time or step based stop criterion is set.
//!
//! During a run, listeners receive exactly one `search_started`, then any
//! number of `new_best_solution` / `search_progress` / `search_message`
//! notifications, and finally exactly one terminal notification:
//! `search_completed`, `search_stopped` or `search_failed`.
//!
//! ## Example
//!
//! ```rust
//! use coresel::neighborhood::{ExactSingleNeighborhood, SubsetBounds};
//! use coresel::objective::{CacheToken, ObjectiveFunction};
//! use coresel::rng::RandomNumberGenerator;
//! use coresel::search::{Search, SteepestDescentSearch, StopCriteria};
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
//!     weights: vec![0.5, 2.0, 1.0, 4.0, 3.0],
//! };
//! let mut rng = RandomNumberGenerator::from_seed(42);
//! let solution = SubsetSolution::random(5, 2, &mut rng).unwrap();
//! let neighborhood = ExactSingleNeighborhood::new(SubsetBounds::fixed(2).unwrap());
//!
//! let mut search =
//!     SteepestDescentSearch::new(solution, neighborhood, objective, StopCriteria::new()).unwrap();
//! search.start().unwrap();
//!
//! assert_eq!(
//!     search.best_solution().map(|s| s.selected_sorted()),
//!     Some(vec![3, 4])
//! );
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::error::{Result, SearchError};
use crate::neighborhood::SizePreference;
use crate::objective::{CacheToken, ObjectiveFunction};
use crate::solution::SubsetSolution;

pub mod exhaustive;
pub mod local;
pub mod lr;
pub mod metropolis;
pub mod mixed;
pub mod random;
pub mod remc;
pub mod steepest;
pub mod tabu;

pub use exhaustive::ExhaustiveSearch;
pub use local::LocalSearch;
pub use lr::{LrSearch, LrSeeding};
pub use metropolis::{MetropolisSearch, BOLTZMANN_CONSTANT};
pub use mixed::{MixedReplicaOptions, MixedReplicaSearch};
pub use random::RandomSearch;
pub use remc::{RemcOptions, RemcSearch};
pub use steepest::SteepestDescentSearch;
pub use tabu::TabuSearch;

/// Minimum amount by which a new evaluation must beat the current best before
/// the best-solution snapshot is replaced. Guards against floating-point
/// churn; score ties are instead resolved through the size preference.
pub(crate) const MIN_EVALUATION_DELTA: f64 = 1e-12;

/// Smallest progress increment that is reported to listeners.
const PROGRESS_RESOLUTION: f64 = 0.01;

/// The lifecycle state of a search.
///
/// A search starts `Idle`, moves to `Running` when [`Search::start`] is
/// called, and ends in exactly one of the three terminal states. Both
/// `Completed` (natural termination) and `Stopped` (a stop criterion fired or
/// an external stop was requested) are normal outcomes; `Failed` indicates an
/// error surfaced mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Idle,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SearchStatus::Idle => "idle",
            SearchStatus::Running => "running",
            SearchStatus::Completed => "completed",
            SearchStatus::Stopped => "stopped",
            SearchStatus::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Why a search stopped before exhausting its own algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An external stop was requested through a [`StopHandle`].
    StopRequested,
    /// The configured wall-clock runtime limit was reached.
    RuntimeLimit,
    /// The configured maximum number of steps was reached.
    StepLimit,
    /// No improvement was found for longer than the configured stuck time.
    ImprovementTimeLimit,
    /// The latest improvement fell below the configured minimum progression.
    MinProgression,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopReason::StopRequested => "stop requested",
            StopReason::RuntimeLimit => "maximum runtime reached",
            StopReason::StepLimit => "maximum number of steps reached",
            StopReason::ImprovementTimeLimit => "maximum time without improvement reached",
            StopReason::MinProgression => "improvement below minimum progression",
        };
        write!(f, "{}", label)
    }
}

/// How a run ended, as reported by an algorithm's main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    /// The algorithm exhausted its own search process.
    Finished,
    /// A stop criterion or an external stop request ended the run.
    Halted(StopReason),
}

/// A cloneable handle used to request cancellation of a running search.
///
/// The request is cooperative: the search observes the flag at step or round
/// boundaries and finishes its current unit of work before terminating with
/// status [`SearchStatus::Stopped`].
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests that the associated search stops.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives notifications about the progress of a single search run.
///
/// All methods have empty default implementations, so implementors only
/// override the notifications they care about. Callbacks are invoked from the
/// thread driving the search, in the order guaranteed by the module
/// documentation.
pub trait SearchListener: Send {
    /// Called once, immediately after the search has moved to
    /// [`SearchStatus::Running`].
    fn search_started(&mut self, _search: &str) {}

    /// Called once if the search terminated naturally.
    fn search_completed(&mut self, _search: &str) {}

    /// Called once if the search was halted by a stop criterion or an
    /// external stop request.
    fn search_stopped(&mut self, _search: &str) {}

    /// Called once if the search aborted with an error. The best solution
    /// found before the failure remains available on the search.
    fn search_failed(&mut self, _search: &str, _error: &SearchError) {}

    /// Called whenever the best-known solution is replaced.
    fn new_best_solution(&mut self, _search: &str, _solution: &SubsetSolution, _score: f64) {}

    /// Called with a fraction in `[0, 1]` by searches that can quantify how
    /// much of their work is done.
    fn search_progress(&mut self, _search: &str, _progress: f64) {}

    /// Called with free-form diagnostic messages.
    fn search_message(&mut self, _search: &str, _message: &str) {}
}

/// Stop criteria shared by all searches.
///
/// All criteria are optional; an empty set means the search only ends when
/// its algorithm does. Criteria are polled cooperatively at step or round
/// boundaries, so limits are advisory rather than exact.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use coresel::search::StopCriteria;
///
/// let criteria = StopCriteria::new()
///     .with_runtime(Duration::from_secs(10))
///     .unwrap()
///     .with_max_steps(50_000)
///     .unwrap();
///
/// assert!(criteria.guarantees_termination());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopCriteria {
    runtime: Option<Duration>,
    max_steps: Option<u64>,
    max_time_without_improvement: Option<Duration>,
    min_progression: Option<f64>,
}

impl StopCriteria {
    /// Creates an empty criteria set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the total wall-clock runtime of the search.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `limit` is zero.
    pub fn with_runtime(mut self, limit: Duration) -> Result<Self> {
        if limit.is_zero() {
            return Err(SearchError::Configuration(
                "runtime limit must be positive".to_string(),
            ));
        }
        self.runtime = Some(limit);
        Ok(self)
    }

    /// Limits the number of steps the search performs. What constitutes one
    /// step is documented per algorithm.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `steps` is zero.
    pub fn with_max_steps(mut self, steps: u64) -> Result<Self> {
        if steps == 0 {
            return Err(SearchError::Configuration(
                "maximum number of steps must be positive".to_string(),
            ));
        }
        self.max_steps = Some(steps);
        Ok(self)
    }

    /// Stops the search when no new best solution has been found for the
    /// given amount of time.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `limit` is zero.
    pub fn with_max_time_without_improvement(mut self, limit: Duration) -> Result<Self> {
        if limit.is_zero() {
            return Err(SearchError::Configuration(
                "maximum time without improvement must be positive".to_string(),
            ));
        }
        self.max_time_without_improvement = Some(limit);
        Ok(self)
    }

    /// Stops the search when an accepted improvement is smaller than the
    /// given threshold. Only meaningful for searches that monitor their own
    /// per-step progression; ignored by the others.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `min` is not a positive finite
    /// number.
    pub fn with_min_progression(mut self, min: f64) -> Result<Self> {
        if !min.is_finite() || min <= 0.0 {
            return Err(SearchError::Configuration(format!(
                "minimum progression must be positive and finite, got {}",
                min
            )));
        }
        self.min_progression = Some(min);
        Ok(self)
    }

    pub fn runtime(&self) -> Option<Duration> {
        self.runtime
    }

    pub fn max_steps(&self) -> Option<u64> {
        self.max_steps
    }

    pub fn max_time_without_improvement(&self) -> Option<Duration> {
        self.max_time_without_improvement
    }

    pub fn min_progression(&self) -> Option<f64> {
        self.min_progression
    }

    /// Returns `true` if these criteria bound the runtime of any search,
    /// through a time or step limit. A minimum progression alone does not
    /// qualify: a search that never improves would never trigger it.
    pub fn guarantees_termination(&self) -> bool {
        self.runtime.is_some()
            || self.max_steps.is_some()
            || self.max_time_without_improvement.is_some()
    }
}

/// Common interface of all subset searches.
pub trait Search {
    /// The name of the search, as reported to listeners and logs.
    fn name(&self) -> &str;

    /// The current lifecycle status.
    fn status(&self) -> SearchStatus;

    /// Runs the search to completion on the calling thread.
    ///
    /// Searches are single-shot: calling `start` a second time fails with a
    /// `Configuration` error. Configuration problems are reported
    /// synchronously before any listener is notified; failures occurring
    /// mid-run are reported through `search_failed` and returned.
    fn start(&mut self) -> Result<()>;

    /// Returns a handle through which the running search can be asked to
    /// stop. Handles may be cloned and sent to other threads.
    fn stop_handle(&self) -> StopHandle;

    /// Registers a listener. Fails once the search has been started.
    fn add_listener(&mut self, listener: Box<dyn SearchListener>) -> Result<()>;

    /// The best solution found so far, if any.
    fn best_solution(&self) -> Option<&SubsetSolution>;

    /// The evaluation of the best solution found so far, if any.
    fn best_score(&self) -> Option<f64>;

    /// The number of steps performed.
    fn steps(&self) -> u64;

    /// Time spent running, up to now for a running search or until
    /// termination for a finished one. `None` before the search started.
    fn runtime(&self) -> Option<Duration>;

    /// Time between the start of the run and the moment the current best
    /// solution was found. `None` while no solution has been reported.
    fn best_found_time(&self) -> Option<Duration>;
}

/// Shared run state embedded by every search implementation: status machine,
/// stop criteria, best-solution tracking and listener fan-out.
pub(crate) struct SearchCore {
    name: String,
    status: SearchStatus,
    criteria: StopCriteria,
    preference: SizePreference,
    stop_flag: Arc<AtomicBool>,
    listeners: Mutex<Vec<Box<dyn SearchListener>>>,
    token: CacheToken,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    steps: u64,
    best: Option<SubsetSolution>,
    best_score: Option<f64>,
    best_found_at: Option<Instant>,
    last_progress: f64,
}

impl SearchCore {
    pub(crate) fn new(name: &str, criteria: StopCriteria, preference: SizePreference) -> Self {
        Self {
            name: name.to_string(),
            status: SearchStatus::Idle,
            criteria,
            preference,
            stop_flag: Arc::new(AtomicBool::new(false)),
            listeners: Mutex::new(Vec::new()),
            token: CacheToken::fresh(),
            started_at: None,
            finished_at: None,
            steps: 0,
            best: None,
            best_score: None,
            best_found_at: None,
            last_progress: 0.0,
        }
    }

    /// Moves the search to `Running` and notifies listeners.
    ///
    /// Performed checks are synchronous configuration validation: they fail
    /// without touching the status or notifying anyone.
    pub(crate) fn begin(&mut self, requires_criteria: bool) -> Result<()> {
        if self.status != SearchStatus::Idle {
            return Err(SearchError::Configuration(format!(
                "{} has already been started; searches are single-shot",
                self.name
            )));
        }
        if requires_criteria && !self.criteria.guarantees_termination() {
            return Err(SearchError::Configuration(format!(
                "{} has no natural termination; set a runtime, step or stuck-time limit",
                self.name
            )));
        }
        self.token = CacheToken::fresh();
        self.started_at = Some(Instant::now());
        self.status = SearchStatus::Running;
        info!(search = %self.name, "search started");
        self.notify(|l| l.search_started(&self.name));
        Ok(())
    }

    /// Maps the outcome of an algorithm's main loop to the matching terminal
    /// status and listener notification.
    pub(crate) fn finish(&mut self, outcome: Result<Termination>) -> Result<()> {
        match outcome {
            Ok(Termination::Finished) => {
                self.finish_completed();
                Ok(())
            }
            Ok(Termination::Halted(reason)) => {
                self.finish_stopped(reason);
                Ok(())
            }
            Err(error) => {
                self.finish_failed(&error);
                Err(error)
            }
        }
    }

    fn finish_completed(&mut self) {
        self.finished_at = Some(Instant::now());
        self.status = SearchStatus::Completed;
        info!(
            search = %self.name,
            steps = self.steps,
            best = ?self.best_score,
            "search completed"
        );
        self.notify(|l| l.search_completed(&self.name));
    }

    fn finish_stopped(&mut self, reason: StopReason) {
        self.finished_at = Some(Instant::now());
        self.status = SearchStatus::Stopped;
        info!(
            search = %self.name,
            steps = self.steps,
            best = ?self.best_score,
            %reason,
            "search stopped"
        );
        self.emit_message(&format!("stopping: {}", reason));
        self.notify(|l| l.search_stopped(&self.name));
    }

    fn finish_failed(&mut self, error: &SearchError) {
        self.finished_at = Some(Instant::now());
        self.status = SearchStatus::Failed;
        error!(search = %self.name, %error, "search failed");
        self.notify(|l| l.search_failed(&self.name, error));
    }

    pub(crate) fn add_listener(&mut self, listener: Box<dyn SearchListener>) -> Result<()> {
        if self.status != SearchStatus::Idle {
            return Err(SearchError::Configuration(format!(
                "listeners can only be added before {} is started",
                self.name
            )));
        }
        self.listeners.lock().unwrap().push(listener);
        Ok(())
    }

    /// Checks the external stop flag and all configured time and step based
    /// criteria. Returns the first one that fired.
    pub(crate) fn should_stop(&self) -> Option<StopReason> {
        if self.stop_flag.load(Ordering::SeqCst) {
            return Some(StopReason::StopRequested);
        }
        let started = self.started_at?;
        if let Some(limit) = self.criteria.runtime() {
            if started.elapsed() >= limit {
                return Some(StopReason::RuntimeLimit);
            }
        }
        if let Some(limit) = self.criteria.max_steps() {
            if self.steps >= limit {
                return Some(StopReason::StepLimit);
            }
        }
        if let Some(limit) = self.criteria.max_time_without_improvement() {
            let reference = self.best_found_at.unwrap_or(started);
            if reference.elapsed() >= limit {
                return Some(StopReason::ImprovementTimeLimit);
            }
        }
        None
    }

    /// Returns `true` if a minimum progression is configured and `delta`
    /// falls short of it.
    pub(crate) fn below_min_progression(&self, delta: f64) -> bool {
        match self.criteria.min_progression() {
            Some(min) => delta < min,
            None => false,
        }
    }

    /// Replaces the best-solution snapshot if `score` improves on it by more
    /// than [`MIN_EVALUATION_DELTA`], or ties it exactly with a size
    /// preferred by the configured tie-break. Returns the improvement over
    /// the previous best when the snapshot was replaced (infinite for the
    /// first snapshot, zero for a tie-break), `None` otherwise.
    pub(crate) fn try_update_best(
        &mut self,
        solution: &SubsetSolution,
        score: f64,
        objective: &dyn ObjectiveFunction,
    ) -> Option<f64> {
        let delta = match (self.best_score, self.best.as_ref()) {
            (Some(current), Some(best)) => {
                let delta = objective.improvement(score, current);
                let tie = score == current
                    && self
                        .preference
                        .breaks_tie(solution.num_selected(), best.num_selected());
                if delta > MIN_EVALUATION_DELTA {
                    delta
                } else if tie {
                    0.0
                } else {
                    return None;
                }
            }
            _ => f64::INFINITY,
        };
        self.best = Some(solution.clone());
        self.best_score = Some(score);
        self.best_found_at = Some(Instant::now());
        debug!(
            search = %self.name,
            score,
            size = solution.num_selected(),
            "new best solution"
        );
        self.notify(|l| l.new_best_solution(&self.name, solution, score));
        Some(delta)
    }

    /// Reports search progress, throttled to increments of at least one
    /// percent so listeners are not flooded.
    pub(crate) fn report_progress(&mut self, progress: f64) {
        let progress = progress.clamp(0.0, 1.0);
        let jump = progress - self.last_progress;
        if jump >= PROGRESS_RESOLUTION || (progress >= 1.0 && self.last_progress < 1.0) {
            self.last_progress = progress;
            self.notify(|l| l.search_progress(&self.name, progress));
        }
    }

    /// Sends a diagnostic message to all listeners.
    pub(crate) fn emit_message(&self, message: &str) {
        debug!(search = %self.name, "{}", message);
        self.notify(|l| l.search_message(&self.name, message));
    }

    fn notify<F>(&self, f: F)
    where
        F: Fn(&mut dyn SearchListener),
    {
        let mut listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter_mut() {
            f(listener.as_mut());
        }
    }

    pub(crate) fn record_step(&mut self) {
        self.steps += 1;
    }

    pub(crate) fn set_preference(&mut self, preference: SizePreference) {
        self.preference = preference;
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn status(&self) -> SearchStatus {
        self.status
    }

    pub(crate) fn token(&self) -> &CacheToken {
        &self.token
    }

    pub(crate) fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop_flag))
    }

    pub(crate) fn best_solution(&self) -> Option<&SubsetSolution> {
        self.best.as_ref()
    }

    pub(crate) fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub(crate) fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn runtime(&self) -> Option<Duration> {
        let started = self.started_at?;
        Some(match self.finished_at {
            Some(end) => end.duration_since(started),
            None => started.elapsed(),
        })
    }

    pub(crate) fn best_found_time(&self) -> Option<Duration> {
        Some(self.best_found_at?.duration_since(self.started_at?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::SubsetSolution;

    /// Test objective: scores are irrelevant, only the orientation matters.
    #[derive(Debug)]
    struct Maximize;

    impl ObjectiveFunction for Maximize {
        fn evaluate(&self, _solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
            0.0
        }
    }

    #[derive(Debug)]
    struct Minimize;

    impl ObjectiveFunction for Minimize {
        fn is_minimizing(&self) -> bool {
            true
        }

        fn evaluate(&self, _solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
            0.0
        }
    }

    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn attach(core: &mut SearchCore) -> Arc<Mutex<Vec<String>>> {
            let events = Arc::new(Mutex::new(Vec::new()));
            core.add_listener(Box::new(Recorder {
                events: Arc::clone(&events),
            }))
            .unwrap();
            events
        }
    }

    impl SearchListener for Recorder {
        fn search_started(&mut self, _search: &str) {
            self.events.lock().unwrap().push("started".to_string());
        }

        fn search_completed(&mut self, _search: &str) {
            self.events.lock().unwrap().push("completed".to_string());
        }

        fn search_stopped(&mut self, _search: &str) {
            self.events.lock().unwrap().push("stopped".to_string());
        }

        fn search_failed(&mut self, _search: &str, _error: &SearchError) {
            self.events.lock().unwrap().push("failed".to_string());
        }

        fn new_best_solution(&mut self, _search: &str, _solution: &SubsetSolution, score: f64) {
            self.events.lock().unwrap().push(format!("best:{}", score));
        }

        fn search_progress(&mut self, _search: &str, progress: f64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("progress:{}", progress));
        }

        fn search_message(&mut self, _search: &str, _message: &str) {
            self.events.lock().unwrap().push("message".to_string());
        }
    }

    fn idle_core() -> SearchCore {
        SearchCore::new("TestSearch", StopCriteria::new(), SizePreference::PreferSmaller)
    }

    #[test]
    fn test_stop_criteria_validation() {
        assert!(StopCriteria::new().with_runtime(Duration::ZERO).is_err());
        assert!(StopCriteria::new().with_max_steps(0).is_err());
        assert!(StopCriteria::new()
            .with_max_time_without_improvement(Duration::ZERO)
            .is_err());
        assert!(StopCriteria::new().with_min_progression(0.0).is_err());
        assert!(StopCriteria::new().with_min_progression(-1.0).is_err());
        assert!(StopCriteria::new().with_min_progression(f64::NAN).is_err());

        let criteria = StopCriteria::new()
            .with_runtime(Duration::from_secs(1))
            .unwrap()
            .with_max_steps(10)
            .unwrap()
            .with_max_time_without_improvement(Duration::from_millis(100))
            .unwrap()
            .with_min_progression(1e-6)
            .unwrap();
        assert_eq!(criteria.runtime(), Some(Duration::from_secs(1)));
        assert_eq!(criteria.max_steps(), Some(10));
        assert_eq!(
            criteria.max_time_without_improvement(),
            Some(Duration::from_millis(100))
        );
        assert_eq!(criteria.min_progression(), Some(1e-6));
    }

    #[test]
    fn test_guarantees_termination() {
        assert!(!StopCriteria::new().guarantees_termination());
        assert!(!StopCriteria::new()
            .with_min_progression(0.1)
            .unwrap()
            .guarantees_termination());
        assert!(StopCriteria::new()
            .with_runtime(Duration::from_secs(1))
            .unwrap()
            .guarantees_termination());
        assert!(StopCriteria::new()
            .with_max_steps(5)
            .unwrap()
            .guarantees_termination());
    }

    #[test]
    fn test_begin_rejects_unbounded_search_when_criteria_required() {
        let mut core = idle_core();
        let events = Recorder::attach(&mut core);

        let result = core.begin(true);
        assert!(matches!(result, Err(SearchError::Configuration(_))));
        assert_eq!(core.status(), SearchStatus::Idle);
        assert!(events.lock().unwrap().is_empty());

        // The same core starts fine once no criteria are required.
        core.begin(false).unwrap();
        assert_eq!(core.status(), SearchStatus::Running);
    }

    #[test]
    fn test_searches_are_single_shot() {
        let mut core = idle_core();
        core.begin(false).unwrap();
        core.finish(Ok(Termination::Finished)).unwrap();
        assert!(matches!(
            core.begin(false),
            Err(SearchError::Configuration(_))
        ));
    }

    #[test]
    fn test_listener_order_for_completed_run() {
        let mut core = idle_core();
        let events = Recorder::attach(&mut core);

        core.begin(false).unwrap();
        let solution = SubsetSolution::with_selection(5, [0, 1]).unwrap();
        core.try_update_best(&solution, 2.0, &Maximize);
        core.finish(Ok(Termination::Finished)).unwrap();

        assert_eq!(core.status(), SearchStatus::Completed);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["started".to_string(), "best:2".to_string(), "completed".to_string()]
        );
    }

    #[test]
    fn test_stopped_run_emits_message_before_terminal_event() {
        let mut core = idle_core();
        let events = Recorder::attach(&mut core);

        core.begin(false).unwrap();
        core.finish(Ok(Termination::Halted(StopReason::RuntimeLimit)))
            .unwrap();

        assert_eq!(core.status(), SearchStatus::Stopped);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["started".to_string(), "message".to_string(), "stopped".to_string()]
        );
    }

    #[test]
    fn test_failed_run_reports_error_and_keeps_best() {
        let mut core = idle_core();
        let events = Recorder::attach(&mut core);

        core.begin(false).unwrap();
        let solution = SubsetSolution::with_selection(5, [0]).unwrap();
        core.try_update_best(&solution, 1.0, &Maximize);

        let outcome: Result<Termination> =
            Err(SearchError::Worker("replica panicked".to_string()));
        assert!(core.finish(outcome).is_err());

        assert_eq!(core.status(), SearchStatus::Failed);
        assert_eq!(core.best_score(), Some(1.0));
        assert_eq!(
            *events.lock().unwrap(),
            vec!["started".to_string(), "best:1".to_string(), "failed".to_string()]
        );
    }

    #[test]
    fn test_add_listener_rejected_once_running() {
        let mut core = idle_core();
        core.begin(false).unwrap();
        let result = core.add_listener(Box::new(Recorder {
            events: Arc::new(Mutex::new(Vec::new())),
        }));
        assert!(matches!(result, Err(SearchError::Configuration(_))));
    }

    #[test]
    fn test_best_update_threshold_and_tie_break() {
        let mut core = idle_core();
        core.begin(false).unwrap();

        let three = SubsetSolution::with_selection(6, [0, 1, 2]).unwrap();
        let two = SubsetSolution::with_selection(6, [0, 1]).unwrap();
        let four = SubsetSolution::with_selection(6, [0, 1, 2, 3]).unwrap();

        // First evaluation is always accepted, with infinite improvement.
        assert_eq!(core.try_update_best(&three, 1.0, &Maximize), Some(f64::INFINITY));

        // Sub-threshold churn is ignored.
        assert_eq!(core.try_update_best(&three, 1.0 + 1e-13, &Maximize), None);

        // Clear improvement is accepted and reported as a delta.
        let delta = core.try_update_best(&three, 1.5, &Maximize).unwrap();
        assert!((delta - 0.5).abs() < 1e-9);

        // An exact score tie with a smaller subset wins under PreferSmaller.
        assert_eq!(core.try_update_best(&two, 1.5, &Maximize), Some(0.0));
        assert_eq!(core.best_solution().map(|s| s.num_selected()), Some(2));

        // A tie with a larger subset does not.
        assert_eq!(core.try_update_best(&four, 1.5, &Maximize), None);
        assert_eq!(core.best_solution().map(|s| s.num_selected()), Some(2));
    }

    #[test]
    fn test_best_update_respects_minimizing_objectives() {
        let mut core = idle_core();
        core.begin(false).unwrap();
        let solution = SubsetSolution::with_selection(4, [0, 1]).unwrap();

        core.try_update_best(&solution, 5.0, &Minimize);
        assert_eq!(core.try_update_best(&solution, 6.0, &Minimize), None);
        let delta = core.try_update_best(&solution, 4.0, &Minimize).unwrap();
        assert!((delta - 1.0).abs() < 1e-9);
        assert_eq!(core.best_score(), Some(4.0));
    }

    #[test]
    fn test_should_stop_on_external_request() {
        let mut core = idle_core();
        core.begin(false).unwrap();
        assert_eq!(core.should_stop(), None);

        let handle = core.stop_handle();
        assert!(!handle.is_stop_requested());
        handle.stop();
        assert!(handle.is_stop_requested());
        assert_eq!(core.should_stop(), Some(StopReason::StopRequested));
    }

    #[test]
    fn test_should_stop_on_step_limit() {
        let criteria = StopCriteria::new().with_max_steps(2).unwrap();
        let mut core = SearchCore::new("TestSearch", criteria, SizePreference::PreferSmaller);
        core.begin(true).unwrap();

        assert_eq!(core.should_stop(), None);
        core.record_step();
        assert_eq!(core.should_stop(), None);
        core.record_step();
        assert_eq!(core.should_stop(), Some(StopReason::StepLimit));
        assert_eq!(core.steps(), 2);
    }

    #[test]
    fn test_should_stop_on_runtime_limit() {
        let criteria = StopCriteria::new()
            .with_runtime(Duration::from_millis(1))
            .unwrap();
        let mut core = SearchCore::new("TestSearch", criteria, SizePreference::PreferSmaller);
        core.begin(true).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(core.should_stop(), Some(StopReason::RuntimeLimit));
    }

    #[test]
    fn test_should_stop_on_stuck_time() {
        let criteria = StopCriteria::new()
            .with_max_time_without_improvement(Duration::from_millis(1))
            .unwrap();
        let mut core = SearchCore::new("TestSearch", criteria, SizePreference::PreferSmaller);
        core.begin(true).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(core.should_stop(), Some(StopReason::ImprovementTimeLimit));
    }

    #[test]
    fn test_min_progression_threshold() {
        let criteria = StopCriteria::new().with_min_progression(0.1).unwrap();
        let core = SearchCore::new("TestSearch", criteria, SizePreference::PreferSmaller);
        assert!(core.below_min_progression(0.05));
        assert!(!core.below_min_progression(0.2));
        assert!(!core.below_min_progression(f64::INFINITY));

        let unconfigured = idle_core();
        assert!(!unconfigured.below_min_progression(0.0));
    }

    #[test]
    fn test_progress_reports_are_throttled() {
        let mut core = idle_core();
        let events = Recorder::attach(&mut core);
        core.begin(false).unwrap();

        core.report_progress(0.005);
        core.report_progress(0.02);
        core.report_progress(0.025);
        core.report_progress(1.0);

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "started".to_string(),
                "progress:0.02".to_string(),
                "progress:1".to_string()
            ]
        );
    }

    #[test]
    fn test_runtime_is_frozen_after_termination() {
        let mut core = idle_core();
        assert_eq!(core.runtime(), None);
        core.begin(false).unwrap();
        core.finish(Ok(Termination::Finished)).unwrap();
        let frozen = core.runtime().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(core.runtime().unwrap(), frozen);
    }

    #[test]
    fn test_best_found_time_tracks_latest_best() {
        let mut core = idle_core();
        assert_eq!(core.best_found_time(), None);
        core.begin(false).unwrap();
        let solution = SubsetSolution::with_selection(3, [0]).unwrap();
        core.try_update_best(&solution, 1.0, &Maximize);
        assert!(core.best_found_time().is_some());
        assert!(core.best_found_time().unwrap() <= core.runtime().unwrap());
    }
}
