use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use coresel::{
    neighborhood::{ExactSingleNeighborhood, MstratNeighborhood, Neighborhood, SubsetBounds},
    objective::{CacheToken, ObjectiveFunction},
    rng::RandomNumberGenerator,
    search::{
        ExhaustiveSearch, LocalSearch, RandomSearch, RemcOptions, RemcSearch, Search,
        SteepestDescentSearch, StopCriteria, TabuSearch,
    },
    solution::SubsetSolution,
};

#[derive(Debug, Clone)]
struct TraitSum {
    weights: Vec<f64>,
}

impl TraitSum {
    fn new(size: usize) -> Self {
        // Irregular but deterministic weights.
        Self {
            weights: (0..size).map(|i| ((i * 37) % 101) as f64 / 101.0).collect(),
        }
    }
}

impl ObjectiveFunction for TraitSum {
    fn evaluate(&self, solution: &SubsetSolution, _token: Option<&CacheToken>) -> f64 {
        solution
            .selected()
            .iter()
            .map(|&index| self.weights[index])
            .sum()
    }
}

fn bench_neighborhood_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighborhood_scan");

    // Compare the exact full scan against the MSTRAT heuristic at growing
    // collection sizes, with the subset held at 20% of the collection.
    for size in [50, 200, 800].iter() {
        let subset = size / 5;
        let objective = TraitSum::new(*size);
        let bounds = SubsetBounds::fixed(subset).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(42);
        let mut solution = SubsetSolution::random(*size, subset, &mut rng).unwrap();

        let exact = ExactSingleNeighborhood::new(bounds);
        group.bench_with_input(BenchmarkId::new("exact", size), size, |b, _| {
            b.iter(|| {
                exact
                    .best_move(black_box(&mut solution), &objective, None, None, None)
                    .unwrap()
            })
        });

        let heuristic = MstratNeighborhood::new(bounds);
        group.bench_with_input(BenchmarkId::new("mstrat", size), size, |b, _| {
            b.iter(|| {
                heuristic
                    .best_move(black_box(&mut solution), &objective, None, None, None)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_single_trajectory_searches(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_trajectory");
    let size = 200;
    let subset = 20;
    let objective = TraitSum::new(size);
    let bounds = SubsetBounds::fixed(subset).unwrap();

    // Searches are single-shot, so each iteration builds a fresh one.
    group.bench_function("random_2000_steps", |b| {
        b.iter(|| {
            let mut rng = RandomNumberGenerator::from_seed(1);
            let solution = SubsetSolution::random(size, subset, &mut rng).unwrap();
            let criteria = StopCriteria::new().with_max_steps(2_000).unwrap();
            let mut search =
                RandomSearch::new(solution, bounds, objective.clone(), rng, criteria).unwrap();
            search.start().unwrap();
            black_box(search.best_score())
        })
    });

    group.bench_function("local_2000_steps", |b| {
        b.iter(|| {
            let mut rng = RandomNumberGenerator::from_seed(2);
            let solution = SubsetSolution::random(size, subset, &mut rng).unwrap();
            let neighborhood = MstratNeighborhood::new(bounds);
            let criteria = StopCriteria::new().with_max_steps(2_000).unwrap();
            let mut search =
                LocalSearch::new(solution, neighborhood, objective.clone(), rng, criteria).unwrap();
            search.start().unwrap();
            black_box(search.best_score())
        })
    });

    group.bench_function("steepest_to_optimum", |b| {
        b.iter(|| {
            let mut rng = RandomNumberGenerator::from_seed(3);
            let solution = SubsetSolution::random(size, subset, &mut rng).unwrap();
            let neighborhood = ExactSingleNeighborhood::new(bounds);
            let mut search = SteepestDescentSearch::new(
                solution,
                neighborhood,
                objective.clone(),
                StopCriteria::new(),
            )
            .unwrap();
            search.start().unwrap();
            black_box(search.best_score())
        })
    });

    group.bench_function("tabu_200_steps", |b| {
        b.iter(|| {
            let mut rng = RandomNumberGenerator::from_seed(4);
            let solution = SubsetSolution::random(size, subset, &mut rng).unwrap();
            let neighborhood = ExactSingleNeighborhood::new(bounds);
            let criteria = StopCriteria::new().with_max_steps(200).unwrap();
            let mut search =
                TabuSearch::new(solution, neighborhood, objective.clone(), 50, criteria).unwrap();
            search.start().unwrap();
            black_box(search.best_score())
        })
    });

    group.finish();
}

fn bench_exhaustive_enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("exhaustive_enumeration");

    // Complete enumeration of all subsets of size 4.
    for size in [12, 16, 20].iter() {
        let objective = TraitSum::new(*size);
        let bounds = SubsetBounds::fixed(4).unwrap();

        group.bench_with_input(BenchmarkId::new("choose_4", size), size, |b, &size| {
            b.iter(|| {
                let solution = SubsetSolution::new(size).unwrap();
                let mut search = ExhaustiveSearch::new(
                    solution,
                    bounds,
                    objective.clone(),
                    StopCriteria::new(),
                )
                .unwrap();
                let result = search.start();
                assert!(result.is_ok());
                black_box(search.best_score())
            })
        });
    }

    group.finish();
}

fn bench_replica_exchange(c: &mut Criterion) {
    let mut group = c.benchmark_group("replica_exchange");
    let size = 200;
    let subset = 20;
    let objective = TraitSum::new(size);
    let bounds = SubsetBounds::fixed(subset).unwrap();

    // Five rounds of parallel tempering at growing ladder widths.
    for replicas in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("five_rounds", replicas),
            replicas,
            |b, &replicas| {
                b.iter(|| {
                    let mut rng = RandomNumberGenerator::from_seed(5);
                    let solution = SubsetSolution::random(size, subset, &mut rng).unwrap();
                    let neighborhood = MstratNeighborhood::new(bounds);
                    let options = RemcOptions::new(replicas, 1e-8, 1e-4)
                        .unwrap()
                        .with_steps_per_round(100)
                        .unwrap();
                    let criteria = StopCriteria::new().with_max_steps(5).unwrap();
                    let mut search = RemcSearch::new(
                        solution,
                        neighborhood,
                        objective.clone(),
                        rng,
                        criteria,
                        options,
                    )
                    .unwrap();
                    let result = search.start();
                    assert!(result.is_ok());
                    black_box(search.best_score())
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_neighborhood_scan,
    bench_single_trajectory_searches,
    bench_exhaustive_enumeration,
    bench_replica_exchange
);
criterion_main!(benches);
