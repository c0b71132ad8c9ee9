/*
 * Copyright 2025 Vijaykumar Singh
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! proxima-cluster-train - train relational neural gas on a dissimilarity matrix
//!
//! Reads a square matrix (JSON array of rows), trains either in this process
//! or sharded over several local workers, and writes prototypes, the
//! assignment of every input point and, when requested, the training log as
//! JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use proxima_cluster::clustering::rank_seed;
use proxima_cluster::{
    ClusterConfig, ClusteringError, Communicator, Distributed, LocalCluster, LocalCommunicator,
    RelationalNeuralGas, Span, Trainable,
};

#[derive(Parser)]
#[command(name = "proxima-cluster-train")]
#[command(about = "Train relational neural gas prototypes on a dissimilarity matrix")]
struct Args {
    /// JSON file holding the NxN dissimilarity matrix as an array of rows
    #[arg(short, long)]
    input: PathBuf,

    /// Output JSON file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of prototypes
    #[arg(short = 'k', long)]
    prototypes: usize,

    #[arg(short = 't', long)]
    iterations: Option<usize>,

    /// Initial neighbourhood range (default: half the prototype count)
    #[arg(short, long)]
    lambda: Option<f64>,

    /// Local workers to shard the matrix over; 0 uses one per CPU
    #[arg(short, long)]
    workers: Option<usize>,

    /// Record prototypes and quantization error of every iteration
    #[arg(long)]
    log: bool,

    #[arg(long)]
    seed: Option<u64>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct TrainingReport {
    prototypes: Vec<Vec<f64>>,
    iterations: usize,
    assignments: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantization_error: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logged_prototypes: Option<Vec<Vec<Vec<f64>>>>,
}

fn rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}

fn read_matrix(path: &Path) -> Result<Array2<f64>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let values: Vec<Vec<f64>> = serde_json::from_str(&source)
        .with_context(|| format!("{} is not a JSON array of rows", path.display()))?;

    let ncols = values.first().map(Vec::len).unwrap_or(0);
    if let Some(index) = values.iter().position(|row| row.len() != ncols) {
        bail!("row {} has {} entries, expected {}", index, values[index].len(), ncols);
    }
    let nrows = values.len();
    Ok(Array2::from_shape_vec((nrows, ncols), values.into_iter().flatten().collect())?)
}

fn train_single(
    config: &ClusterConfig,
    data: &Array2<f64>,
    prototypes: usize,
) -> Result<TrainingReport> {
    let mut gas = RelationalNeuralGas::from_config(config, prototypes, data.ncols())?;
    let iterations = config.training.iterations;
    match config.training.lambda {
        Some(lambda) => gas.train_with_lambda(data.view(), iterations, lambda)?,
        None => gas.train(data.view(), iterations)?,
    }

    let logged = gas.logging();
    Ok(TrainingReport {
        prototypes: rows(gas.prototypes()),
        iterations,
        assignments: gas.assign(data.view())?,
        quantization_error: logged.then(|| gas.logged_quantization_error().to_vec()),
        logged_prototypes: logged.then(|| gas.logged_prototypes().iter().map(rows).collect()),
    })
}

fn train_sharded(
    config: &ClusterConfig,
    data: &Array2<f64>,
    prototypes: usize,
    workers: usize,
) -> Result<TrainingReport> {
    let base_seed = config
        .training
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen());
    let columns = Span::partition(data.ncols(), workers);
    let rows_per_worker = Span::partition(prototypes, workers);
    let iterations = config.training.iterations;

    let worker = |comm: LocalCommunicator| -> Result<Option<TrainingReport>, ClusteringError> {
        let rank = comm.rank();
        let mut rng = StdRng::seed_from_u64(rank_seed(base_seed, rank));
        let mut gas = RelationalNeuralGas::shard(rows_per_worker[rank].len, data.ncols(), &mut rng)?;
        gas.set_logging(config.training.logging);

        let shard = data.slice(s![.., columns[rank].range()]);
        gas.train_distributed(&comm, shard, iterations, config.training.lambda)?;

        let full = gas.prototypes_distributed(&comm)?;
        let errors = gas.logged_quantization_error_distributed(&comm)?;
        let history = gas.logged_prototypes_distributed(&comm)?;

        if rank == 0 {
            let assignments = gas.assign_distributed(&comm, data.view())?;
            let logged = !errors.is_empty();
            Ok(Some(TrainingReport {
                prototypes: rows(&full),
                iterations,
                assignments,
                quantization_error: logged.then_some(errors),
                logged_prototypes: logged.then(|| history.iter().map(rows).collect()),
            }))
        } else {
            gas.participate_assign(&comm)?;
            Ok(None)
        }
    };

    let results = LocalCluster::run(workers, config.network.collective_timeout(), worker)?;

    let mut report = None;
    for (rank, result) in results.into_iter().enumerate() {
        if let Some(worker_report) = result.with_context(|| format!("worker {} failed", rank))? {
            report = Some(worker_report);
        }
    }
    report.context("rank 0 produced no report")
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClusterConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ClusterConfig::default(),
    };
    if let Some(iterations) = args.iterations {
        config.training.iterations = iterations;
    }
    if args.lambda.is_some() {
        config.training.lambda = args.lambda;
    }
    if args.seed.is_some() {
        config.training.seed = args.seed;
    }
    if args.log {
        config.training.logging = true;
    }
    if let Some(workers) = args.workers {
        config.network.workers = if workers == 0 { num_cpus::get() } else { workers };
    }
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let data = read_matrix(&args.input)?;
    info!(
        "📥 Loaded {}x{} dissimilarity matrix from {}",
        data.nrows(),
        data.ncols(),
        args.input.display()
    );

    let workers = config.network.workers;
    let report = if workers > 1 {
        train_sharded(&config, &data, args.prototypes, workers)?
    } else {
        train_single(&config, &data, args.prototypes)?
    };

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("💾 Wrote {} prototypes to {}", report.prototypes.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
