// Benchmarking the optimal tree search
// on synthetic binary data
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use optitree::data::BoolMatrix;
use optitree::{DataManager, Objective, SearchConfig, TreeSearch};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// data generating
// function
fn create_data(n_rows: usize, n_attributes: usize) -> (Vec<bool>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(42);
    let data: Vec<bool> = (0..n_rows * n_attributes).map(|_| rng.gen_bool(0.5)).collect();
    let labels: Vec<usize> = (0..n_rows).map(|_| usize::from(rng.gen_bool(0.5))).collect();
    (data, labels)
}

pub fn depth_three_search(c: &mut Criterion) {
    // sample size
    let n_rows = 200usize;
    let n_attributes = 14usize;

    // prepare data
    let (data, labels) = create_data(n_rows, n_attributes);
    let matrix = BoolMatrix::new(&data, n_rows, n_attributes);
    let dm = DataManager::new(&matrix, &labels, None).unwrap();
    let objective = Objective::Error;

    let mut group = c.benchmark_group("optimal_search");

    println!("\nBenchmarking on a {} x {} matrix:\n", n_rows, n_attributes);
    group.bench_function("depth_three_with_depth_two_solver", |b| {
        b.iter(|| {
            let config = SearchConfig {
                max_depth: 3,
                min_support: 2,
                ..Default::default()
            };
            let mut search = TreeSearch::new(black_box(&dm), config, &objective).unwrap();
            search.run().unwrap();
        })
    });
    group.bench_function("depth_three_general_expansion", |b| {
        b.iter(|| {
            let config = SearchConfig {
                max_depth: 3,
                min_support: 2,
                use_depth_two: false,
                ..Default::default()
            };
            let mut search = TreeSearch::new(black_box(&dm), config, &objective).unwrap();
            search.run().unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, depth_three_search);
criterion_main!(benches);
