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

//! Relational neural gas
//!
//! Batch neural gas driven only by a square dissimilarity matrix. Each
//! prototype is a vector of convex-combination coefficients over the training
//! points, so distances to the data are evaluated through the relational
//! identity in [`crate::compute::relational`]. Every iteration ranks all
//! prototypes per data point, replaces the distances by annealed rank weights
//! `exp(-rank / lambda)` and row-normalizes the result into the new
//! prototypes.

use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::distributed::{ProcessMap, TrainingPhase};
use super::recorder::TrainingLog;
use super::Trainable;
use crate::compute::matrix::{normalize_rows, random_prototypes, random_uniform};
use crate::compute::rank::{annealed_lambda, apply_rank_weights, rank_weights};
use crate::compute::relational::{
    adapt_matrix, nearest_prototypes, partial_corrections, quantization_error, query_distances,
    raw_product,
};
use crate::core::{ClusterConfig, ClusteringError, Result};

/// Relational neural gas trainer
///
/// In single-process use the trainer holds all K prototypes. As a member of a
/// process group (see [`crate::clustering::Distributed`]) it holds only the
/// rows this process owns, which may be none.
#[derive(Debug, Clone)]
pub struct RelationalNeuralGas {
    /// Owned prototype rows (K x N)
    pub(super) prototypes: Array2<f64>,
    /// Cached `0.5 * a_i' D a_i` per owned prototype, refreshed after training
    pub(super) self_terms: Array1<f64>,
    pub(super) logging: bool,
    pub(super) log: TrainingLog,
    pub(super) phase: TrainingPhase,
    /// Ownership map negotiated by the last distributed run
    pub(super) process_map: Option<ProcessMap>,
}

impl RelationalNeuralGas {
    /// Create `prototypes` random prototypes over `dimension` data points
    pub fn new(prototypes: usize, dimension: usize) -> Result<Self> {
        Self::with_rng(prototypes, dimension, &mut StdRng::from_entropy())
    }

    pub fn with_seed(prototypes: usize, dimension: usize, seed: u64) -> Result<Self> {
        Self::with_rng(prototypes, dimension, &mut StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: Rng>(prototypes: usize, dimension: usize, rng: &mut R) -> Result<Self> {
        Ok(Self::from_matrix(random_prototypes(prototypes, dimension, rng)?))
    }

    /// Start from the given coefficient rows; every row is normalized to sum to one
    pub fn with_prototypes(prototypes: Array2<f64>) -> Result<Self> {
        if prototypes.nrows() == 0 {
            return Err(ClusteringError::invalid_argument(
                "number of prototypes must be greater than zero",
            ));
        }
        Self::from_shard(prototypes)
    }

    /// Random local rows for one member of a process group. `prototypes` may
    /// be zero for a process that only contributes data columns.
    pub fn shard<R: Rng>(prototypes: usize, dimension: usize, rng: &mut R) -> Result<Self> {
        if dimension == 0 {
            return Err(ClusteringError::invalid_argument(
                "prototype dimension must be greater than zero",
            ));
        }
        let mut rows = random_uniform(prototypes, dimension, rng);
        normalize_rows(&mut rows);
        Ok(Self::from_matrix(rows))
    }

    /// Given local rows for one member of a process group; may be empty
    pub fn from_shard(mut prototypes: Array2<f64>) -> Result<Self> {
        if prototypes.ncols() == 0 {
            return Err(ClusteringError::invalid_argument(
                "prototype dimension must be greater than zero",
            ));
        }
        normalize_rows(&mut prototypes);
        Ok(Self::from_matrix(prototypes))
    }

    /// Seeded from `training.seed` with logging taken from `training.logging`
    pub fn from_config(config: &ClusterConfig, prototypes: usize, dimension: usize) -> Result<Self> {
        let mut trainer = match config.training.seed {
            Some(seed) => Self::with_seed(prototypes, dimension, seed)?,
            None => Self::new(prototypes, dimension)?,
        };
        trainer.logging = config.training.logging;
        Ok(trainer)
    }

    fn from_matrix(prototypes: Array2<f64>) -> Self {
        let self_terms = Array1::zeros(prototypes.nrows());
        Self {
            prototypes,
            self_terms,
            logging: false,
            log: TrainingLog::new(),
            phase: TrainingPhase::Uninitialized,
            process_map: None,
        }
    }

    /// Train with an explicit initial neighbourhood range
    pub fn train_with_lambda(
        &mut self,
        data: ArrayView2<f64>,
        iterations: usize,
        lambda: f64,
    ) -> Result<()> {
        self.fit(data, iterations, Some(lambda))
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn process_map(&self) -> Option<&ProcessMap> {
        self.process_map.as_ref()
    }

    pub fn training_log(&self) -> &TrainingLog {
        &self.log
    }

    /// Cached self terms of the owned prototypes
    pub fn self_terms(&self) -> &Array1<f64> {
        &self.self_terms
    }

    fn fit(&mut self, data: ArrayView2<f64>, iterations: usize, lambda: Option<f64>) -> Result<()> {
        check_request(iterations, lambda)?;

        let prototypes = self.prototypes.nrows();
        if prototypes == 0 {
            return Err(ClusteringError::invalid_argument(
                "number of prototypes must be greater than zero",
            ));
        }
        if data.nrows() != data.ncols() {
            return Err(ClusteringError::dimension_mismatch(
                "square dissimilarity matrix",
                format!("{}x{}", data.nrows(), data.ncols()),
            ));
        }
        if data.nrows() != self.prototypes.ncols() {
            return Err(ClusteringError::dimension_mismatch(
                format!("{} data points", self.prototypes.ncols()),
                data.nrows(),
            ));
        }
        if data.nrows() < prototypes {
            return Err(ClusteringError::dimension_mismatch(
                format!("at least {} data points", prototypes),
                data.nrows(),
            ));
        }

        let lambda0 = lambda.unwrap_or(prototypes as f64 * 0.5);
        self.log.clear();
        if self.logging {
            self.log.reserve(iterations);
        }

        info!(
            "🧠 Training relational neural gas: {} prototypes, {} data points, {} iterations, lambda={}",
            prototypes,
            data.nrows(),
            iterations,
            lambda0
        );

        for iteration in 0..iterations {
            self.phase = TrainingPhase::Training { iteration };

            let lambda = annealed_lambda(lambda0, iteration, iterations);
            let weights = rank_weights(prototypes, lambda);

            let mut adapt = adapt_matrix(self.prototypes.view(), data);
            if self.logging {
                let error = quantization_error(adapt.view());
                self.log.record(self.prototypes.clone(), error);
                debug!(iteration, lambda, quantization_error = error, "relational iteration");
            } else {
                debug!(iteration, lambda, "relational iteration");
            }

            apply_rank_weights(&mut adapt, &weights);
            let skipped = normalize_rows(&mut adapt);
            if skipped > 0 {
                warn!(iteration, skipped, "prototype rows with zero weight left unnormalized");
            }
            self.prototypes = adapt;
        }

        let raw = raw_product(self.prototypes.view(), data);
        self.self_terms = partial_corrections(self.prototypes.view(), raw.view(), 0);
        self.phase = TrainingPhase::Converged;

        info!("✅ Relational neural gas training complete after {} iterations", iterations);
        Ok(())
    }
}

/// Checks on a training request that do not depend on the data
pub(super) fn check_request(iterations: usize, lambda: Option<f64>) -> Result<()> {
    if iterations == 0 {
        return Err(ClusteringError::invalid_argument(
            "iterations must be greater than zero",
        ));
    }
    if let Some(lambda) = lambda {
        if !(lambda > 0.0) || !lambda.is_finite() {
            return Err(ClusteringError::invalid_argument(format!(
                "lambda must be greater than zero, got {}",
                lambda
            )));
        }
    }
    Ok(())
}

impl Trainable for RelationalNeuralGas {
    fn train(&mut self, data: ArrayView2<f64>, iterations: usize) -> Result<()> {
        self.fit(data, iterations, None)
    }

    fn assign(&self, query: ArrayView2<f64>) -> Result<Vec<usize>> {
        if self.prototypes.nrows() == 0 {
            return Err(ClusteringError::invalid_argument(
                "number of prototypes must be greater than zero",
            ));
        }
        if query.ncols() != self.prototypes.ncols() {
            return Err(ClusteringError::dimension_mismatch(
                format!("{} columns", self.prototypes.ncols()),
                query.ncols(),
            ));
        }

        let distances = query_distances(self.prototypes.view(), self.self_terms.view(), query);
        Ok(nearest_prototypes(distances.view()))
    }

    fn prototypes(&self) -> &Array2<f64> {
        &self.prototypes
    }

    fn set_logging(&mut self, enabled: bool) {
        self.logging = enabled;
    }

    fn logging(&self) -> bool {
        self.logging && !self.log.is_empty()
    }

    fn logged_prototypes(&self) -> &[Array2<f64>] {
        self.log.prototypes()
    }

    fn logged_quantization_error(&self) -> &[f64] {
        self.log.quantization_error()
    }
}
