//! Policy Benchmarks
//!
//! Benchmarks for the per-request decision path:
//! - Q-network forward pass at different hidden widths
//! - Epsilon-greedy decisions on each branch
//! - Arg-max over score vectors
//!
//! ## Performance Targets
//! - Forward pass (hidden 128): < 50µs
//! - Exploration decision: < 1µs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use vmsched_core::StateRequest;
use vmsched_rl::{greedy_action, EpsilonGreedy, EpsilonSchedule, FixedScores, QNetwork, ValueEstimator};

fn bench_network_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("network_forward");
    let state = [0.5, 0.2, 1500.0];

    for hidden in [32, 128, 256] {
        let net = QNetwork::seeded(5, hidden, Some(42)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(hidden), &net, |b, net| {
            b.iter(|| net.evaluate(black_box(&state)));
        });
    }
    group.finish();
}

fn bench_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("decide");
    group.throughput(Throughput::Elements(1));
    let request = StateRequest::new(0.5, 0.2, 1500.0);
    let net = QNetwork::seeded(5, 128, Some(42)).unwrap();

    for (name, epsilon) in [("explore", 1.0), ("exploit", 0.0)] {
        let mut policy =
            EpsilonGreedy::new(5, EpsilonSchedule::fixed(epsilon).unwrap(), Some(7)).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| policy.decide(black_box(&request), &net));
        });
    }
    group.finish();
}

fn bench_greedy_action(c: &mut Criterion) {
    let mut group = c.benchmark_group("greedy_action");

    for size in [5, 20, 100] {
        let scores: Vec<f64> = (0..size).map(|i| ((i * 37) % 11) as f64).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &scores, |b, scores| {
            b.iter(|| greedy_action(black_box(scores)));
        });
    }
    group.finish();
}

fn bench_fixed_scores_decide(c: &mut Criterion) {
    let request = StateRequest::new(0.5, 0.2, 1500.0);
    let estimator = FixedScores::new(vec![0.2, 0.9, 0.1, 0.4, 0.3]);
    let mut policy = EpsilonGreedy::new(5, EpsilonSchedule::fixed(0.1).unwrap(), Some(7)).unwrap();

    c.bench_function("decide_fixed_scores", |b| {
        b.iter(|| policy.decide(black_box(&request), &estimator));
    });
}

criterion_group!(
    benches,
    bench_network_forward,
    bench_decide,
    bench_greedy_action,
    bench_fixed_scores_decide
);
criterion_main!(benches);
