//! Serial relational neural gas

use ndarray::{s, Array2};
use proxima_cluster::{ClusterConfig, ClusteringError, RelationalNeuralGas, Trainable, TrainingPhase};

use super::common::*;

#[test]
fn test_chain_example_scenario() {
    init_test_env();
    let data = chain_dissimilarities();

    let mut gas = RelationalNeuralGas::with_seed(2, 4, 2025).unwrap();
    gas.train(data.view(), 10).unwrap();

    assert_eq!(gas.prototypes().dim(), (2, 4));
    assert_rows_sum_to_one(gas.prototypes());

    let labels = gas.assign(data.view()).unwrap();
    assert_eq!(labels[0], labels[1]);
    assert_eq!(labels[2], labels[3]);
    assert_ne!(labels[0], labels[2]);

    let mut again = RelationalNeuralGas::with_seed(2, 4, 2025).unwrap();
    again.train(data.view(), 10).unwrap();
    assert_eq!(again.assign(data.view()).unwrap(), labels);
}

#[test]
fn test_rows_sum_to_one_after_training() {
    init_test_env();
    let data = squared_distances(&random_points(20, 7));

    for (prototypes, iterations) in [(1, 5), (3, 25), (6, 40)] {
        let mut gas = RelationalNeuralGas::with_seed(prototypes, 20, 3).unwrap();
        gas.train(data.view(), iterations).unwrap();
        assert_rows_sum_to_one(gas.prototypes());
    }
}

#[test]
fn test_boundary_errors() {
    init_test_env();
    let data = chain_dissimilarities();

    let mut gas = RelationalNeuralGas::with_seed(2, 4, 1).unwrap();
    assert!(matches!(
        gas.train(data.view(), 0),
        Err(ClusteringError::InvalidArgument(_))
    ));
    assert!(matches!(
        RelationalNeuralGas::with_seed(0, 4, 1),
        Err(ClusteringError::InvalidArgument(_))
    ));
    assert!(matches!(
        gas.train(data.slice(s![..3, ..]), 5),
        Err(ClusteringError::DimensionMismatch { .. })
    ));

    let mut crowded = RelationalNeuralGas::with_seed(3, 2, 1).unwrap();
    let small = ndarray::array![[0.0, 1.0], [1.0, 0.0]];
    assert!(matches!(
        crowded.train(small.view(), 5),
        Err(ClusteringError::DimensionMismatch { .. })
    ));

    // a failed request leaves the prototypes untouched
    let before = gas.prototypes().clone();
    let _ = gas.train_with_lambda(data.view(), 5, -2.0);
    assert_eq!(gas.prototypes(), &before);
}

#[test]
fn test_logging_toggle() {
    init_test_env();
    let data = chain_dissimilarities();
    let mut gas = RelationalNeuralGas::with_seed(2, 4, 5).unwrap();

    gas.set_logging(true);
    assert!(!gas.logging());

    gas.train(data.view(), 8).unwrap();
    assert!(gas.logging());
    assert_eq!(gas.logged_prototypes().len(), 8);
    assert_eq!(gas.logged_quantization_error().len(), 8);

    // each snapshot is the state the following iteration started from
    for window in gas.logged_prototypes().windows(2) {
        assert_rows_sum_to_one(&window[1]);
    }
}

#[test]
fn test_explicit_lambda_changes_result() {
    init_test_env();
    let data = squared_distances(&random_points(12, 4));
    let initial = initial_prototypes(3, 12, 8);

    let default = train_serial(&data, &initial, 3, None);
    let explicit = train_serial(&data, &initial, 3, Some(1.5));
    let wide = train_serial(&data, &initial, 3, Some(6.0));

    // the default range is half the prototype count
    assert!(max_abs_diff(default.prototypes().view(), explicit.prototypes().view()) < 1e-15);
    assert!(max_abs_diff(default.prototypes().view(), wide.prototypes().view()) > 1e-6);
}

#[test]
fn test_assign_new_points() {
    init_test_env();
    let points = clustered_points(&[[0.0, 0.0], [8.0, 8.0]], 6, 11);
    let data = squared_distances(&points);

    let mut gas = RelationalNeuralGas::with_seed(2, 12, 6).unwrap();
    gas.train(data.view(), 50).unwrap();
    let training_labels = gas.assign(data.view()).unwrap();

    // dissimilarities of two new points to the 12 training points
    let queries = ndarray::array![[0.2, -0.1], [7.9, 8.3]];
    let query = Array2::from_shape_fn((2, 12), |(q, j)| {
        let diff = &queries.row(q) - &points.row(j);
        diff.dot(&diff)
    });
    let labels = gas.assign(query.view()).unwrap();

    assert_eq!(labels[0], training_labels[0]);
    assert_eq!(labels[1], training_labels[6]);
    assert_ne!(labels[0], labels[1]);
}

#[test]
fn test_from_config_and_phase() {
    init_test_env();
    let config = ClusterConfig::from_toml_str(
        r#"
        [training]
        iterations = 12
        logging = true
        seed = 31
        "#,
    )
    .unwrap();

    let mut gas = RelationalNeuralGas::from_config(&config, 2, 4).unwrap();
    assert_eq!(gas.phase(), TrainingPhase::Uninitialized);

    gas.train(chain_dissimilarities().view(), config.training.iterations)
        .unwrap();
    assert_eq!(gas.phase(), TrainingPhase::Converged);
    assert_eq!(gas.logged_quantization_error().len(), 12);
}
