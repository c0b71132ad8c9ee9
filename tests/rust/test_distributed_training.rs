//! Sharded relational neural gas over the in-process runtime

use ndarray::{s, Array1, Array2};
use proxima_cluster::clustering::ShardInfo;
use proxima_cluster::{
    ClusteringError, Communicator, Distributed, LocalCluster, ReduceOp, RelationalNeuralGas,
    SingleProcess, Span, Trainable, TrainingPhase,
};

use super::common::*;

const TOLERANCE: f64 = 1e-9;

fn spans(lengths: &[usize]) -> Vec<Span> {
    let mut offset = 0;
    lengths
        .iter()
        .map(|&len| {
            let span = Span { offset, len };
            offset += len;
            span
        })
        .collect()
}

fn outcomes(results: Vec<Result<WorkerOutcome, ClusteringError>>) -> Vec<WorkerOutcome> {
    results
        .into_iter()
        .enumerate()
        .map(|(rank, result)| result.unwrap_or_else(|e| panic!("rank {} failed: {}", rank, e)))
        .collect()
}

fn assert_matches_serial(
    outcomes: &[WorkerOutcome],
    serial: &RelationalNeuralGas,
    data: &Array2<f64>,
) {
    let serial_labels = serial.assign(data.view()).unwrap();

    for (rank, outcome) in outcomes.iter().enumerate() {
        let diff = max_abs_diff(outcome.prototypes.view(), serial.prototypes().view());
        assert!(diff < TOLERANCE, "rank {} deviates by {}", rank, diff);
        assert_rows_sum_to_one(&outcome.prototypes);
        assert_eq!(outcome.labels, serial_labels);

        assert_eq!(
            outcome.logged_error.len(),
            serial.logged_quantization_error().len()
        );
        for (a, b) in outcome
            .logged_error
            .iter()
            .zip(serial.logged_quantization_error())
        {
            assert!((a - b).abs() < TOLERANCE * b.abs().max(1.0));
        }

        assert_eq!(
            outcome.logged_prototypes.len(),
            serial.logged_prototypes().len()
        );
        for (a, b) in outcome
            .logged_prototypes
            .iter()
            .zip(serial.logged_prototypes())
        {
            assert!(max_abs_diff(a.view(), b.view()) < TOLERANCE);
        }
    }
}

#[test]
fn test_two_way_partition_matches_serial() {
    init_test_env();
    let data = squared_distances(&random_points(12, 1));
    let initial = initial_prototypes(3, 12, 10);
    let serial = train_serial(&data, &initial, 20, None);

    for split in [6, 1, 11] {
        let run = ShardedRun::uniform(spans(&[split, 12 - split]), spans(&[2, 1]), 20);
        let outcomes = outcomes(train_sharded(&data, &initial, &run));
        assert_matches_serial(&outcomes, &serial, &data);
    }
}

#[test]
fn test_three_way_uneven_partition_matches_serial() {
    init_test_env();
    let data = squared_distances(&random_points(15, 2));
    let initial = initial_prototypes(4, 15, 20);
    let serial = train_serial(&data, &initial, 30, None);

    let run = ShardedRun::uniform(spans(&[7, 5, 3]), spans(&[1, 2, 1]), 30);
    let outcomes = outcomes(train_sharded(&data, &initial, &run));
    assert_matches_serial(&outcomes, &serial, &data);

    assert_eq!(outcomes[0].owned.nrows(), 1);
    assert_eq!(outcomes[1].owned.nrows(), 2);
    let diff = max_abs_diff(
        outcomes[1].owned.view(),
        serial.prototypes().slice(s![1..3, ..]),
    );
    assert!(diff < TOLERANCE);
}

#[test]
fn test_worker_without_prototypes_participates() {
    init_test_env();
    let data = squared_distances(&random_points(10, 3));
    let initial = initial_prototypes(3, 10, 30);
    let serial = train_serial(&data, &initial, 15, None);

    let run = ShardedRun::uniform(spans(&[4, 3, 3]), spans(&[2, 0, 1]), 15);
    let outcomes = outcomes(train_sharded(&data, &initial, &run));
    assert_matches_serial(&outcomes, &serial, &data);
    assert_eq!(outcomes[1].owned.dim(), (0, 10));
}

#[test]
fn test_worker_without_columns_participates() {
    init_test_env();
    let data = squared_distances(&random_points(8, 4));
    let initial = initial_prototypes(2, 8, 40);
    let serial = train_serial(&data, &initial, 10, None);

    let run = ShardedRun::uniform(spans(&[5, 0, 3]), spans(&[1, 1, 0]), 10);
    let outcomes = outcomes(train_sharded(&data, &initial, &run));
    assert_matches_serial(&outcomes, &serial, &data);
}

#[test]
fn test_iterations_and_lambda_are_negotiated() {
    init_test_env();
    let data = squared_distances(&random_points(10, 5));
    let initial = initial_prototypes(2, 10, 50);
    let serial = train_serial(&data, &initial, 12, Some(3.0));

    let mut run = ShardedRun::uniform(spans(&[5, 5]), spans(&[1, 1]), 12);
    run.iterations = vec![12, 4];
    run.lambda = vec![None, Some(3.0)];
    let outcomes = outcomes(train_sharded(&data, &initial, &run));

    assert_matches_serial(&outcomes, &serial, &data);
    assert!(outcomes.iter().all(|o| o.logged_error.len() == 12));
}

#[test]
fn test_logging_requires_every_worker() {
    init_test_env();
    let data = squared_distances(&random_points(6, 6));
    let initial = initial_prototypes(2, 6, 60);

    let mut run = ShardedRun::uniform(spans(&[3, 3]), spans(&[1, 1]), 5);
    run.logging = vec![true, false];
    let outcomes = outcomes(train_sharded(&data, &initial, &run));

    for outcome in &outcomes {
        assert!(!outcome.logging);
        assert!(outcome.logged_error.is_empty());
        assert!(outcome.logged_prototypes.is_empty());
    }
}

#[test]
fn test_inconsistent_shards_fail_every_worker() {
    init_test_env();
    let data = chain_dissimilarities();

    // columns do not cover the matrix
    let results = LocalCluster::run(2, Some(TIMEOUT), |comm| {
        let mut gas = RelationalNeuralGas::with_seed(1, 4, comm.rank() as u64)?;
        gas.train_distributed(&comm, data.slice(s![.., ..1]), 5, None)
    })
    .unwrap();
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(ClusteringError::DimensionMismatch { .. }))));

    // more prototypes than data points
    let results = LocalCluster::run(2, Some(TIMEOUT), |comm| {
        let mut gas = RelationalNeuralGas::with_seed(3, 4, comm.rank() as u64)?;
        let columns = data.slice(s![.., comm.rank() * 2..comm.rank() * 2 + 2]);
        gas.train_distributed(&comm, columns, 5, None)
    })
    .unwrap();
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(ClusteringError::DimensionMismatch { .. }))));

    // nobody owns a prototype
    let results = LocalCluster::run(2, Some(TIMEOUT), |comm| {
        let mut gas = RelationalNeuralGas::from_shard(Array2::zeros((0, 4)))?;
        let columns = data.slice(s![.., comm.rank() * 2..comm.rank() * 2 + 2]);
        gas.train_distributed(&comm, columns, 5, None)
    })
    .unwrap();
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(ClusteringError::InvalidArgument(_)))));
}

#[test]
fn test_dimension_disagreement_is_protocol_error() {
    init_test_env();
    let results = LocalCluster::run(2, Some(TIMEOUT), |comm| {
        let dimension = 4 + comm.rank();
        let data = Array2::<f64>::zeros((dimension, 2));
        let mut gas = RelationalNeuralGas::with_seed(1, dimension, 9)?;
        gas.train_distributed(&comm, data.view(), 5, None)
    })
    .unwrap();

    assert!(results.iter().all(|r| r.as_ref().unwrap_err().is_protocol()));
}

#[test]
fn test_local_rejection_does_not_deadlock() {
    init_test_env();
    let data = chain_dissimilarities();

    // no timeout: a rank that bailed out alone would hang its peers forever
    let results = LocalCluster::run(3, None, |comm| {
        let mut gas = RelationalNeuralGas::with_seed(1, 4, comm.rank() as u64)?;
        let lambda = if comm.rank() == 2 { Some(-1.0) } else { None };
        gas.train_distributed(&comm, data.slice(s![.., ..1]), 5, lambda)
    })
    .unwrap();

    assert!(results[0].as_ref().unwrap_err().is_protocol());
    assert!(results[1].as_ref().unwrap_err().is_protocol());
    assert!(matches!(results[2], Err(ClusteringError::InvalidArgument(_))));
}

#[test]
fn test_retraining_rebuilds_process_map() {
    init_test_env();
    let data = squared_distances(&random_points(9, 7));

    let results = LocalCluster::run(3, Some(TIMEOUT), |comm| {
        let rank = comm.rank();
        let mut gas = RelationalNeuralGas::with_seed(1, 9, rank as u64 + 100)?;
        gas.train_distributed(&comm, data.slice(s![.., rank * 3..rank * 3 + 3]), 5, None)?;
        let first = gas.process_map().cloned();

        let shard = if rank == 0 {
            data.slice(s![.., ..7])
        } else {
            data.slice(s![.., 6 + rank..7 + rank])
        };
        gas.train_distributed(&comm, shard, 5, None)?;
        Ok::<_, ClusteringError>((first, gas.process_map().cloned(), gas.phase()))
    })
    .unwrap();

    for result in results {
        let (first, second, phase) = result.unwrap();
        assert_eq!(first.unwrap().columns, spans(&[3, 3, 3]));
        assert_eq!(second.unwrap().columns, spans(&[7, 1, 1]));
        assert_eq!(phase, TrainingPhase::Converged);
    }
}

#[test]
fn test_single_process_communicator_matches_serial() {
    init_test_env();
    let data = chain_dissimilarities();
    let initial = initial_prototypes(2, 4, 70);
    let serial = train_serial(&data, &initial, 10, None);

    let mut gas = RelationalNeuralGas::with_prototypes(initial).unwrap();
    gas.set_logging(true);
    gas.train_distributed(&SingleProcess, data.view(), 10, None)
        .unwrap();

    assert_eq!(gas.prototypes(), serial.prototypes());
    assert_eq!(
        gas.logged_quantization_error_distributed(&SingleProcess)
            .unwrap(),
        serial.logged_quantization_error()
    );
    assert_eq!(
        gas.assign_distributed(&SingleProcess, data.view()).unwrap(),
        serial.assign(data.view()).unwrap()
    );
}

#[test]
fn test_blank_assign_keeps_workers_in_lockstep() {
    init_test_env();
    let data = squared_distances(&random_points(8, 8));
    let initial = initial_prototypes(2, 8, 80);
    let serial = train_serial(&data, &initial, 10, None);

    let results = LocalCluster::run(2, Some(TIMEOUT), |comm| {
        let rank = comm.rank();
        let rows = initial.slice(s![rank..rank + 1, ..]).to_owned();
        let mut gas = RelationalNeuralGas::from_shard(rows)?;
        gas.train_distributed(&comm, data.slice(s![.., rank * 4..rank * 4 + 4]), 10, None)?;

        if rank == 1 {
            gas.assign_distributed(&comm, data.view()).map(Some)
        } else {
            gas.participate_assign(&comm).map(|_| None)
        }
    })
    .unwrap();

    assert!(results[0].as_ref().unwrap().is_none());
    assert_eq!(
        results[1].as_ref().unwrap().as_ref().unwrap(),
        &serial.assign(data.view()).unwrap()
    );
}

#[test]
fn test_peer_leaving_mid_training_stops_run() {
    init_test_env();
    let data = squared_distances(&random_points(8, 9));
    let initial = initial_prototypes(2, 8, 90);

    let results = LocalCluster::run(2, Some(TIMEOUT), |comm| -> Result<_, ClusteringError> {
        let rank = comm.rank();
        let rows = initial.slice(s![rank..rank + 1, ..]).to_owned();
        let columns = data.slice(s![.., rank * 4..rank * 4 + 4]);

        if rank == 0 {
            let mut gas = RelationalNeuralGas::from_shard(rows)?;
            gas.set_logging(true);
            let before = gas.prototypes().clone();
            let result = gas.train_distributed(&comm, columns, 5, None);
            return Ok(Some((result, before, gas)));
        }

        // negotiation, prototype exchange and the first iteration, then leave
        comm.all_reduce(&true, ReduceOp::Product)?;
        comm.all_reduce(&5usize, ReduceOp::Max)?;
        comm.all_reduce(&0.0f64, ReduceOp::Max)?;
        comm.all_reduce(&true, ReduceOp::Product)?;
        comm.all_gather(&ShardInfo {
            columns: 4,
            prototypes: 1,
            dimension: 8,
        })?;
        comm.all_gather(&rows)?;
        comm.all_reduce(&Array1::<f64>::zeros(2), ReduceOp::Sum)?;
        comm.all_gather(&(Array2::<f64>::from_elem((2, 4), 0.5), 0.0f64))?;
        Ok(None)
    })
    .unwrap();

    assert!(results[1].as_ref().unwrap().is_none());
    let (result, before, gas) = results.into_iter().next().unwrap().unwrap().unwrap();

    assert!(result.unwrap_err().is_protocol());
    assert_eq!(gas.phase(), TrainingPhase::Stopped);
    assert!(!gas.logging());
    assert!(gas.logged_quantization_error().is_empty());
    assert!(gas.logged_prototypes().is_empty());
    assert_eq!(gas.prototypes(), &before);
    assert!(gas.process_map().is_none());
}
