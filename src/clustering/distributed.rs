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

//! Distributed relational neural gas
//!
//! The dissimilarity matrix is sharded by columns and the prototypes by rows.
//! Every iteration each process works on the full replicated prototype matrix
//! against its own columns:
//!
//! 1. `raw = P · D_local`, then the per-row correction terms are all-reduced
//!    (sum), because each process only sees part of every row's inner product
//! 2. the local columns are ranked and replaced by rank weights
//! 3. the weight blocks of all processes are all-gathered and concatenated in
//!    rank order into the next prototype matrix, which is then row-normalized
//!
//! These two collectives are the only synchronization points of an iteration.
//! After the last iteration every process keeps only the rows it owns.

use ndarray::{s, Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, info, warn};

use super::recorder::{merge_min_errors, stack_histories, TrainingLog};
use super::relational_neuralgas::{check_request, RelationalNeuralGas};
use super::Distributed;
use crate::compute::matrix::{concat_columns, normalize_rows, stack_rows};
use crate::compute::rank::{annealed_lambda, apply_rank_weights, rank_weights};
use crate::compute::relational::{
    nearest_prototypes, partial_corrections, quantization_error, query_distances, raw_product,
    subtract_corrections,
};
use crate::core::{ClusteringError, Result};
use crate::network::{Communicator, ReduceOp};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Distinct, reproducible seed for each rank derived from one base seed
pub fn rank_seed(base: u64, rank: usize) -> u64 {
    base.wrapping_add((rank as u64).wrapping_mul(GOLDEN_GAMMA))
}

/// Contiguous block of indices owned by one process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Split `0..total` into `parts` contiguous spans whose lengths differ by
    /// at most one, longer spans first
    pub fn partition(total: usize, parts: usize) -> Vec<Span> {
        if parts == 0 {
            return Vec::new();
        }
        let base = total / parts;
        let extra = total % parts;
        cumulative((0..parts).map(|part| base + usize::from(part < extra)))
    }
}

/// What one process announces about its shard during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    /// Data columns held by the process
    pub columns: usize,
    /// Prototype rows owned by the process
    pub prototypes: usize,
    /// Prototype dimension (global number of data points) seen by the process
    pub dimension: usize,
}

/// Column and prototype ownership of every rank
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMap {
    pub columns: Vec<Span>,
    pub prototypes: Vec<Span>,
    pub dimension: usize,
}

impl ProcessMap {
    /// Derive cumulative offsets from the gathered shard announcements and
    /// validate that they describe one consistent problem.
    ///
    /// Every process runs this on the same input and so reaches the same
    /// verdict.
    pub fn from_shards(shards: &[ShardInfo]) -> Result<Self> {
        let dimension = match shards.first() {
            Some(first) => first.dimension,
            None => return Err(ClusteringError::protocol("no process announced a shard")),
        };
        if let Some((rank, shard)) = shards
            .iter()
            .enumerate()
            .find(|(_, shard)| shard.dimension != dimension)
        {
            return Err(ClusteringError::protocol(format!(
                "rank {} holds prototypes of dimension {}, rank 0 of dimension {}",
                rank, shard.dimension, dimension
            )));
        }

        let columns = cumulative(shards.iter().map(|shard| shard.columns));
        let prototypes = cumulative(shards.iter().map(|shard| shard.prototypes));
        let map = Self {
            columns,
            prototypes,
            dimension,
        };

        if map.total_columns() != dimension {
            return Err(ClusteringError::dimension_mismatch(
                format!("{} data columns over all processes", dimension),
                map.total_columns(),
            ));
        }
        if map.total_prototypes() == 0 {
            return Err(ClusteringError::invalid_argument(
                "number of prototypes must be greater than zero",
            ));
        }
        if dimension < map.total_prototypes() {
            return Err(ClusteringError::dimension_mismatch(
                format!("at least {} data points", map.total_prototypes()),
                dimension,
            ));
        }
        Ok(map)
    }

    pub fn size(&self) -> usize {
        self.columns.len()
    }

    pub fn total_columns(&self) -> usize {
        self.columns.last().map(Span::end).unwrap_or(0)
    }

    pub fn total_prototypes(&self) -> usize {
        self.prototypes.last().map(Span::end).unwrap_or(0)
    }
}

fn cumulative(lengths: impl Iterator<Item = usize>) -> Vec<Span> {
    let mut offset = 0;
    lengths
        .map(|len| {
            let span = Span { offset, len };
            offset += len;
            span
        })
        .collect()
}

/// Progress of a trainer through a distributed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingPhase {
    #[default]
    Uninitialized,
    ProcessInfoSynced,
    Training { iteration: usize },
    Converged,
    /// A collective failed after negotiation; the previous model is kept
    Stopped,
}

/// Negotiated parameters of one distributed run
struct Negotiated {
    iterations: usize,
    lambda: f64,
    logging: bool,
    map: ProcessMap,
}

impl RelationalNeuralGas {
    fn check_shard(
        &self,
        data: ArrayView2<f64>,
        iterations: usize,
        lambda: Option<f64>,
    ) -> Result<()> {
        check_request(iterations, lambda)?;
        if data.nrows() != self.prototypes.ncols() {
            return Err(ClusteringError::dimension_mismatch(
                format!("{} data rows", self.prototypes.ncols()),
                data.nrows(),
            ));
        }
        Ok(())
    }

    fn negotiate<C: Communicator>(
        &self,
        comm: &C,
        data: ArrayView2<f64>,
        iterations: usize,
        lambda: Option<f64>,
    ) -> Result<Negotiated> {
        let local = self.check_shard(data, iterations, lambda);
        if !comm.all_reduce(&local.is_ok(), ReduceOp::Product)? {
            local?;
            return Err(ClusteringError::protocol(
                "a peer rejected the training request",
            ));
        }

        let iterations = comm.all_reduce(&iterations, ReduceOp::Max)?;
        let lambda = comm.all_reduce(&lambda.unwrap_or(0.0), ReduceOp::Max)?;
        let logging = comm.all_reduce(&self.logging, ReduceOp::Product)?;

        let shard = ShardInfo {
            columns: data.ncols(),
            prototypes: self.prototypes.nrows(),
            dimension: self.prototypes.ncols(),
        };
        let map = ProcessMap::from_shards(&comm.all_gather(&shard)?)?;

        let lambda = if lambda > 0.0 {
            lambda
        } else {
            map.total_prototypes() as f64 * 0.5
        };

        Ok(Negotiated {
            iterations,
            lambda,
            logging,
            map,
        })
    }

    /// Iterations of a negotiated run. The trainer's prototypes, self terms
    /// and log are only replaced once every collective has succeeded.
    fn run_negotiated<C: Communicator>(
        &mut self,
        comm: &C,
        data: ArrayView2<f64>,
        negotiated: Negotiated,
    ) -> Result<()> {
        let rank = comm.rank();
        let Negotiated {
            iterations,
            lambda: lambda0,
            logging,
            map,
        } = negotiated;

        let prototypes = map.total_prototypes();
        let columns = map.columns[rank];
        let owned = map.prototypes[rank];

        let mut log = TrainingLog::new();
        if logging {
            log.reserve(iterations);
        }

        if rank == 0 {
            info!(
                "🧠 Training distributed relational neural gas: {} processes, {} prototypes, {} data points, {} iterations, lambda={}",
                comm.size(),
                prototypes,
                map.dimension,
                iterations,
                lambda0
            );
        }
        debug!(rank, ?columns, ?owned, "process shard");

        let blocks = comm.all_gather(&self.prototypes)?;
        let mut full = stack_rows(&blocks, map.dimension)?;

        for iteration in 0..iterations {
            self.phase = TrainingPhase::Training { iteration };

            let lambda = annealed_lambda(lambda0, iteration, iterations);
            let weights = rank_weights(prototypes, lambda);

            let mut adapt = raw_product(full.view(), data);
            let partial = partial_corrections(full.view(), adapt.view(), columns.offset);
            let corrections = comm.all_reduce(&partial, ReduceOp::Sum)?;
            subtract_corrections(&mut adapt, corrections.view());

            let snapshot = if logging {
                Some(full.slice(s![owned.range(), ..]).to_owned())
            } else {
                None
            };
            let partial_error = if logging {
                quantization_error(adapt.view())
            } else {
                0.0
            };

            apply_rank_weights(&mut adapt, &weights);

            let gathered: Vec<(Array2<f64>, f64)> = comm.all_gather(&(adapt, partial_error))?;
            let (blocks, errors): (Vec<Array2<f64>>, Vec<f64>) = gathered.into_iter().unzip();
            full = concat_columns(&blocks, prototypes)?;

            let skipped = normalize_rows(&mut full);
            if skipped > 0 {
                warn!(rank, iteration, skipped, "prototype rows with zero weight left unnormalized");
            }

            if let Some(snapshot) = snapshot {
                let error: f64 = errors.iter().sum();
                log.record(snapshot, error);
                debug!(rank, iteration, lambda, quantization_error = error, "distributed iteration");
            } else {
                debug!(rank, iteration, lambda, "distributed iteration");
            }
        }

        let raw = raw_product(full.view(), data);
        let partial = partial_corrections(full.view(), raw.view(), columns.offset);
        let self_terms = comm.all_reduce(&partial, ReduceOp::Sum)?;

        self.prototypes = full.slice(s![owned.range(), ..]).to_owned();
        self.self_terms = self_terms.slice(s![owned.range()]).to_owned();
        self.log = log;
        self.process_map = Some(map);
        self.phase = TrainingPhase::Converged;

        if rank == 0 {
            info!("✅ Distributed training complete after {} iterations", iterations);
        }
        Ok(())
    }

    /// All owned rows and self terms of the group, stacked in rank order
    fn gather_model<C: Communicator>(&self, comm: &C) -> Result<(Array2<f64>, Array1<f64>)> {
        let gathered = comm.all_gather(&(self.prototypes.clone(), self.self_terms.clone()))?;
        let (blocks, terms): (Vec<Array2<f64>>, Vec<Array1<f64>>) = gathered.into_iter().unzip();
        let prototypes = stack_rows(&blocks, self.prototypes.ncols())?;
        let self_terms = terms.iter().flat_map(|t| t.iter().copied()).collect();
        Ok((prototypes, self_terms))
    }
}

impl Distributed for RelationalNeuralGas {
    fn train_distributed<C: Communicator>(
        &mut self,
        comm: &C,
        data: ArrayView2<f64>,
        iterations: usize,
        lambda: Option<f64>,
    ) -> Result<()> {
        let negotiated = self.negotiate(comm, data, iterations, lambda)?;
        self.phase = TrainingPhase::ProcessInfoSynced;

        self.run_negotiated(comm, data, negotiated).map_err(|e| {
            warn!(rank = comm.rank(), error = %e, "distributed training stopped");
            self.phase = TrainingPhase::Stopped;
            self.log.clear();
            e
        })
    }

    fn prototypes_distributed<C: Communicator>(&self, comm: &C) -> Result<Array2<f64>> {
        let blocks = comm.all_gather(&self.prototypes)?;
        stack_rows(&blocks, self.prototypes.ncols())
    }

    fn logged_prototypes_distributed<C: Communicator>(&self, comm: &C) -> Result<Vec<Array2<f64>>> {
        let histories = comm.all_gather(&self.log.prototypes().to_vec())?;
        stack_histories(&histories, self.prototypes.ncols())
    }

    fn logged_quantization_error_distributed<C: Communicator>(&self, comm: &C) -> Result<Vec<f64>> {
        let logs = comm.all_gather(&self.log.quantization_error().to_vec())?;
        Ok(merge_min_errors(&logs))
    }

    fn assign_distributed<C: Communicator>(
        &self,
        comm: &C,
        query: ArrayView2<f64>,
    ) -> Result<Vec<usize>> {
        let (prototypes, self_terms) = self.gather_model(comm)?;
        if prototypes.nrows() == 0 {
            return Err(ClusteringError::invalid_argument(
                "number of prototypes must be greater than zero",
            ));
        }
        if query.ncols() != prototypes.ncols() {
            return Err(ClusteringError::dimension_mismatch(
                format!("{} columns", prototypes.ncols()),
                query.ncols(),
            ));
        }

        let distances = query_distances(prototypes.view(), self_terms.view(), query);
        Ok(nearest_prototypes(distances.view()))
    }

    fn participate_assign<C: Communicator>(&self, comm: &C) -> Result<()> {
        self.gather_model(comm).map(|_| ())
    }
}
