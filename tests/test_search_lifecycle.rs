use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use coresel::{
    error::{Result, SearchError},
    neighborhood::{ExactSingleNeighborhood, SubsetBounds},
    objective::{CacheToken, ObjectiveFunction},
    rng::RandomNumberGenerator,
    search::{
        LocalSearch, LrSearch, MixedReplicaOptions, MixedReplicaSearch, RandomSearch, RemcOptions,
        RemcSearch, Search, SearchListener, SearchStatus, SteepestDescentSearch, StopCriteria,
    },
    solution::SubsetSolution,
};

#[derive(Debug, Clone)]
struct WeightSum {
    weights: Vec<f64>,
}

impl ObjectiveFunction for WeightSum {
    fn evaluate(&self, solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
        solution
            .selected()
            .iter()
            .map(|&index| self.weights[index])
            .sum()
    }
}

// An objective that only ever produces NaN; searches must refuse to work
// with it rather than propagate the poison.
#[derive(Debug)]
struct BrokenObjective;

impl ObjectiveFunction for BrokenObjective {
    fn evaluate(&self, _solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
        f64::NAN
    }
}

// Scores like WeightSum until the evaluation budget runs out, then turns
// non-finite. The counter is shared by every replica of a parallel search,
// so the poison strikes in the middle of a round.
#[derive(Debug)]
struct FailingAfter {
    budget: usize,
    evaluations: AtomicUsize,
    weights: Vec<f64>,
}

impl FailingAfter {
    fn new(budget: usize, weights: Vec<f64>) -> Self {
        Self {
            budget,
            evaluations: AtomicUsize::new(0),
            weights,
        }
    }
}

impl ObjectiveFunction for FailingAfter {
    fn evaluate(&self, solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
        if self.evaluations.fetch_add(1, Ordering::SeqCst) >= self.budget {
            return f64::NAN;
        }
        solution
            .selected()
            .iter()
            .map(|&index| self.weights[index])
            .sum()
    }
}

// Records every notification a search emits, in emission order.
struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
    best_scores: Arc<Mutex<Vec<f64>>>,
}

impl EventLog {
    fn attach<S: Search>(search: &mut S) -> (Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<f64>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let best_scores = Arc::new(Mutex::new(Vec::new()));
        search
            .add_listener(Box::new(EventLog {
                events: Arc::clone(&events),
                best_scores: Arc::clone(&best_scores),
            }))
            .unwrap();
        (events, best_scores)
    }
}

impl SearchListener for EventLog {
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
        self.events.lock().unwrap().push("best".to_string());
        self.best_scores.lock().unwrap().push(score);
    }

    fn search_progress(&mut self, _search: &str, _progress: f64) {
        self.events.lock().unwrap().push("progress".to_string());
    }

    fn search_message(&mut self, _search: &str, _message: &str) {
        self.events.lock().unwrap().push("message".to_string());
    }
}

fn terminal_count(events: &[String]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event.as_str(), "completed" | "stopped" | "failed"))
        .count()
}

#[test]
fn test_completed_search_notifies_listeners_in_order() -> Result<()> {
    let objective = WeightSum {
        weights: vec![2.0, 9.0, 4.0, 7.0, 1.0],
    };
    let solution = SubsetSolution::with_selection(5, [0, 4])?;
    let neighborhood = ExactSingleNeighborhood::new(SubsetBounds::fixed(2)?);
    let mut search =
        SteepestDescentSearch::new(solution, neighborhood, objective, StopCriteria::new())?;
    let (events, best_scores) = EventLog::attach(&mut search);

    search.start()?;

    // {0, 4} -> {0, 1} -> {1, 3}: the initial snapshot plus two improvements.
    assert_eq!(search.status(), SearchStatus::Completed);
    assert_eq!(search.steps(), 2);
    assert_eq!(search.best_score(), Some(16.0));
    assert_eq!(
        *events.lock().unwrap(),
        vec!["started", "best", "best", "best", "completed"]
    );
    assert_eq!(*best_scores.lock().unwrap(), vec![3.0, 11.0, 16.0]);
    assert!(search.best_found_time().unwrap() <= search.runtime().unwrap());
    Ok(())
}

#[test]
fn test_stopped_search_emits_message_then_stopped() -> Result<()> {
    let objective = WeightSum {
        weights: (0..8).map(|index| index as f64).collect(),
    };
    let rng = RandomNumberGenerator::from_seed(21);
    let criteria = StopCriteria::new().with_max_steps(25)?;
    let mut search = RandomSearch::new(
        SubsetSolution::new(8)?,
        SubsetBounds::fixed(3)?,
        objective,
        rng,
        criteria,
    )?;
    let (events, best_scores) = EventLog::attach(&mut search);

    search.start()?;
    let events = events.lock().unwrap();

    assert_eq!(search.status(), SearchStatus::Stopped);
    assert_eq!(search.steps(), 25);
    assert_eq!(events.first().map(String::as_str), Some("started"));
    assert_eq!(terminal_count(&events), 1);
    // The stop reason is announced just before the terminal notification.
    let tail: Vec<&str> = events[events.len() - 2..].iter().map(String::as_str).collect();
    assert_eq!(tail, vec!["message", "stopped"]);

    // Best-solution reports never regress for a maximizing objective.
    let best_scores = best_scores.lock().unwrap();
    assert!(!best_scores.is_empty());
    assert!(best_scores.windows(2).all(|pair| pair[1] > pair[0]));
    Ok(())
}

#[test]
fn test_failed_search_reports_the_error_exactly_once() -> Result<()> {
    let solution = SubsetSolution::with_selection(6, [0, 1])?;
    let neighborhood = ExactSingleNeighborhood::new(SubsetBounds::fixed(2)?);
    let rng = RandomNumberGenerator::from_seed(2);
    let criteria = StopCriteria::new().with_max_steps(10)?;
    let mut search = LocalSearch::new(solution, neighborhood, BrokenObjective, rng, criteria)?;
    let (events, _) = EventLog::attach(&mut search);

    let result = search.start();

    match result {
        Err(SearchError::Evaluation(_)) => {}
        other => panic!("expected an evaluation error, got {:?}", other),
    }
    assert_eq!(search.status(), SearchStatus::Failed);
    assert!(search.best_solution().is_none());
    assert_eq!(search.best_score(), None);
    assert_eq!(*events.lock().unwrap(), vec!["started", "failed"]);
    Ok(())
}

#[test]
fn test_remc_midrun_failure_surfaces_exactly_once() -> Result<()> {
    // Enough budget for the initial evaluation, far too little for the
    // first round of 3 x 50 replica steps.
    let objective = FailingAfter::new(20, (0..8).map(|index| index as f64).collect());
    let mut rng = RandomNumberGenerator::from_seed(33);
    let solution = SubsetSolution::random(8, 3, &mut rng)?;
    let neighborhood = ExactSingleNeighborhood::new(SubsetBounds::fixed(3)?);
    let options = RemcOptions::new(3, 0.001, 0.1)?.with_steps_per_round(50)?;
    let criteria = StopCriteria::new().with_max_steps(100)?;
    let mut search = RemcSearch::new(solution, neighborhood, objective, rng, criteria, options)?;
    let (events, _) = EventLog::attach(&mut search);

    let result = search.start();

    match result {
        Err(SearchError::Evaluation(_)) => {}
        other => panic!("expected an evaluation error, got {:?}", other),
    }
    assert_eq!(search.status(), SearchStatus::Failed);
    // One best snapshot from the initial evaluation, then the poisoned
    // round fails the run: no partial-round results leak out.
    assert_eq!(*events.lock().unwrap(), vec!["started", "best", "failed"]);
    // The best found before the failure is not discarded.
    assert!(search.best_score().is_some());
    Ok(())
}

#[test]
fn test_mixed_midrun_failure_joins_background_replicas() -> Result<()> {
    let objective = FailingAfter::new(50, (0..8).map(|index| index as f64).collect());
    let mut rng = RandomNumberGenerator::from_seed(34);
    let solution = SubsetSolution::random(8, 3, &mut rng)?;
    let neighborhood = ExactSingleNeighborhood::new(SubsetBounds::fixed(3)?);
    let options = MixedReplicaOptions::new(1, 2, 1)?
        .with_replica_steps(25)?
        .with_tabu_stuck_time(Duration::from_millis(50))?;
    // Generous limit; the poisoned objective must end the run long before.
    let criteria = StopCriteria::new().with_runtime(Duration::from_secs(10))?;
    let mut search =
        MixedReplicaSearch::new(solution, neighborhood, objective, rng, criteria, options)?;
    let (events, _) = EventLog::attach(&mut search);

    let result = search.start();

    match result {
        Err(SearchError::Evaluation(_)) => {}
        other => panic!("expected an evaluation error, got {:?}", other),
    }
    assert_eq!(search.status(), SearchStatus::Failed);
    // start() returns only after the tabu and LR threads are joined, so a
    // prompt return is the join guarantee.
    assert!(search.runtime().unwrap() < Duration::from_secs(5));
    let events = events.lock().unwrap();
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(events.last().map(String::as_str), Some("failed"));
    assert!(search.best_score().is_some());
    Ok(())
}

#[test]
fn test_configuration_errors_are_synchronous() -> Result<()> {
    // Size bounds are validated at construction.
    assert!(SubsetBounds::new(0, 3).is_err());
    assert!(SubsetBounds::new(5, 2).is_err());

    // Bounds exceeding the collection size are rejected by the search.
    let oversized = RandomSearch::new(
        SubsetSolution::new(10)?,
        SubsetBounds::new(2, 20)?,
        WeightSum {
            weights: vec![1.0; 10],
        },
        RandomNumberGenerator::from_seed(1),
        StopCriteria::new().with_max_steps(10)?,
    );
    assert!(matches!(oversized, Err(SearchError::Configuration(_))));

    // LR needs an asymmetric pair of sub-move counts.
    let balanced = LrSearch::new(
        SubsetSolution::new(10)?,
        SubsetBounds::new(2, 5)?,
        WeightSum {
            weights: vec![1.0; 10],
        },
        2,
        2,
        StopCriteria::new(),
    );
    assert!(matches!(balanced, Err(SearchError::Configuration(_))));

    // A sampling search without a terminating criterion fails on start,
    // before any listener hears anything.
    let mut unbounded = RandomSearch::new(
        SubsetSolution::new(10)?,
        SubsetBounds::fixed(3)?,
        WeightSum {
            weights: vec![1.0; 10],
        },
        RandomNumberGenerator::from_seed(1),
        StopCriteria::new(),
    )?;
    let (events, _) = EventLog::attach(&mut unbounded);
    match unbounded.start() {
        Err(SearchError::Configuration(message)) => {
            assert!(message.contains("no natural termination"));
        }
        other => panic!("expected a configuration error, got {:?}", other),
    }
    assert_eq!(unbounded.status(), SearchStatus::Idle);
    assert_eq!(unbounded.steps(), 0);
    assert_eq!(unbounded.runtime(), None);
    assert!(events.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn test_stop_handle_halts_a_search_from_another_thread() -> Result<()> {
    let objective = WeightSum {
        weights: (0..12).map(|index| index as f64).collect(),
    };
    let rng = RandomNumberGenerator::from_seed(13);
    // Generous limit; the external stop request must end the run long before.
    let criteria = StopCriteria::new().with_runtime(Duration::from_secs(10))?;
    let mut search = RandomSearch::new(
        SubsetSolution::new(12)?,
        SubsetBounds::new(2, 5)?,
        objective,
        rng,
        criteria,
    )?;
    let (events, _) = EventLog::attach(&mut search);

    let handle = search.stop_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        handle.stop();
    });
    search.start()?;
    stopper.join().unwrap();

    assert_eq!(search.status(), SearchStatus::Stopped);
    assert!(search.steps() > 0);
    assert!(search.runtime().unwrap() < Duration::from_secs(5));
    let events = events.lock().unwrap();
    assert_eq!(events.last().map(String::as_str), Some("stopped"));
    assert_eq!(terminal_count(&events), 1);
    Ok(())
}

#[test]
fn test_searches_are_single_shot() -> Result<()> {
    let objective = WeightSum {
        weights: vec![5.0, 1.0, 3.0],
    };
    let solution = SubsetSolution::with_selection(3, [0])?;
    let neighborhood = ExactSingleNeighborhood::new(SubsetBounds::fixed(1)?);
    let mut search =
        SteepestDescentSearch::new(solution, neighborhood, objective, StopCriteria::new())?;
    let (events, _) = EventLog::attach(&mut search);

    search.start()?;
    assert_eq!(search.status(), SearchStatus::Completed);

    match search.start() {
        Err(SearchError::Configuration(message)) => {
            assert!(message.contains("single-shot"));
        }
        other => panic!("expected a configuration error, got {:?}", other),
    }
    // The rejected restart must not emit anything.
    assert_eq!(search.status(), SearchStatus::Completed);
    let events = events.lock().unwrap();
    assert_eq!(
        events.iter().filter(|event| *event == "started").count(),
        1
    );
    assert_eq!(terminal_count(&events), 1);
    Ok(())
}
