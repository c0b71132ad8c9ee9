//! Quantization error over long training runs

use ndarray::Array2;
use proxima_cluster::{RelationalNeuralGas, Trainable};

use super::common::*;

const CENTRES: [[f64; 2]; 3] = [[0.0, 0.0], [10.0, 0.0], [5.0, 9.0]];

#[test]
fn test_quantization_error_decreases_on_separated_clusters() {
    init_test_env();
    let data = squared_distances(&clustered_points(&CENTRES, 10, 42));

    let mut gas = RelationalNeuralGas::with_seed(3, 30, 42).unwrap();
    gas.set_logging(true);
    gas.train(data.view(), 100).unwrap();

    let errors = gas.logged_quantization_error();
    assert_eq!(errors.len(), 100);
    assert!(errors[99] <= errors[0], "{} > {}", errors[99], errors[0]);
    assert!(errors.iter().all(|e| e.is_finite()));
}

#[test]
fn test_clusters_are_recovered() {
    init_test_env();
    let data = squared_distances(&clustered_points(&CENTRES, 10, 7));

    // every prototype starts on one point of a different cluster
    let initial = Array2::from_shape_fn((3, 30), |(i, j)| if j == 10 * i { 1.0 } else { 0.0 });
    let mut gas = RelationalNeuralGas::with_prototypes(initial).unwrap();
    gas.train(data.view(), 100).unwrap();

    let labels = gas.assign(data.view()).unwrap();
    let expected: Vec<usize> = (0..30).map(|j| j / 10).collect();
    assert_eq!(labels, expected);
}

#[test]
fn test_two_clusters_from_random_start() {
    init_test_env();
    let data = squared_distances(&clustered_points(&CENTRES[..2], 10, 9));

    let mut gas = RelationalNeuralGas::with_seed(2, 20, 9).unwrap();
    gas.train(data.view(), 100).unwrap();
    let labels = gas.assign(data.view()).unwrap();

    assert!(labels[..10].iter().all(|&label| label == labels[0]));
    assert!(labels[10..].iter().all(|&label| label == labels[10]));
    assert_ne!(labels[0], labels[10]);
}

#[test]
fn test_sharded_quantization_log_matches_serial() {
    init_test_env();
    let data = squared_distances(&clustered_points(&CENTRES, 6, 3));
    let initial = initial_prototypes(3, 18, 3);
    let serial = train_serial(&data, &initial, 100, None);

    let run = ShardedRun::uniform(
        proxima_cluster::Span::partition(18, 3),
        proxima_cluster::Span::partition(3, 3),
        100,
    );
    for outcome in train_sharded(&data, &initial, &run) {
        let outcome = outcome.unwrap();
        assert_eq!(outcome.logged_error.len(), 100);
        assert!(outcome.logged_error[99] <= outcome.logged_error[0]);
        for (a, b) in outcome
            .logged_error
            .iter()
            .zip(serial.logged_quantization_error())
        {
            assert!((a - b).abs() < 1e-9 * b.abs().max(1.0));
        }
    }
}
