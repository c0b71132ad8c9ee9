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

//! Batch neural gas over explicit feature vectors
//!
//! The vector-space counterpart of [`super::RelationalNeuralGas`]: prototypes
//! are points in feature space, distances come from a [`DistanceCompute`]
//! strategy owned by the trainer, and every iteration moves each prototype to
//! the rank-weighted mean of all data points.

use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::distributed::TrainingPhase;
use super::recorder::TrainingLog;
use super::Trainable;
use crate::compute::distance::{DistanceCompute, SquaredEuclideanDistance};
use crate::compute::matrix::{is_numerical_zero, random_uniform};
use crate::compute::rank::{annealed_lambda, apply_rank_weights, rank_weights};
use crate::compute::relational::{column_min_sum, nearest_prototypes};
use crate::core::{ClusteringError, Result};

/// Batch neural gas trainer, generic over its distance metric
#[derive(Debug, Clone)]
pub struct NeuralGas<M: DistanceCompute = SquaredEuclideanDistance> {
    metric: M,
    prototypes: Array2<f64>,
    logging: bool,
    log: TrainingLog,
    phase: TrainingPhase,
}

impl<M: DistanceCompute> NeuralGas<M> {
    /// `prototypes` random points in the unit cube of `dimension` features
    pub fn new(metric: M, prototypes: usize, dimension: usize) -> Result<Self> {
        Self::with_rng(metric, prototypes, dimension, &mut StdRng::from_entropy())
    }

    pub fn with_seed(metric: M, prototypes: usize, dimension: usize, seed: u64) -> Result<Self> {
        Self::with_rng(metric, prototypes, dimension, &mut StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: Rng>(
        metric: M,
        prototypes: usize,
        dimension: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if prototypes == 0 {
            return Err(ClusteringError::invalid_argument(
                "number of prototypes must be greater than zero",
            ));
        }
        if dimension == 0 {
            return Err(ClusteringError::invalid_argument(
                "prototype size must be greater than zero",
            ));
        }
        Ok(Self::with_matrix(metric, random_uniform(prototypes, dimension, rng)))
    }

    /// Start from explicit prototype points
    pub fn with_prototypes(metric: M, prototypes: Array2<f64>) -> Result<Self> {
        if prototypes.nrows() == 0 || prototypes.ncols() == 0 {
            return Err(ClusteringError::invalid_argument(format!(
                "prototype matrix must not be empty, got {}x{}",
                prototypes.nrows(),
                prototypes.ncols()
            )));
        }
        Ok(Self::with_matrix(metric, prototypes))
    }

    fn with_matrix(metric: M, prototypes: Array2<f64>) -> Self {
        Self {
            metric,
            prototypes,
            logging: false,
            log: TrainingLog::new(),
            phase: TrainingPhase::Uninitialized,
        }
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn train_with_lambda(
        &mut self,
        data: ArrayView2<f64>,
        iterations: usize,
        lambda: f64,
    ) -> Result<()> {
        self.fit(data, iterations, lambda)
    }

    /// Sum over data points of the distance to the nearest prototype
    pub fn quantization_error(&self, data: ArrayView2<f64>) -> f64 {
        let distances = self.metric.distance_matrix(self.prototypes.view(), data);
        column_min_sum(distances.view()).abs()
    }

    fn fit(&mut self, data: ArrayView2<f64>, iterations: usize, lambda0: f64) -> Result<()> {
        let prototypes = self.prototypes.nrows();
        if iterations == 0 {
            return Err(ClusteringError::invalid_argument(
                "iterations must be greater than zero",
            ));
        }
        if !(lambda0 > 0.0) || !lambda0.is_finite() {
            return Err(ClusteringError::invalid_argument(format!(
                "lambda must be greater than zero, got {}",
                lambda0
            )));
        }
        if data.ncols() != self.prototypes.ncols() {
            return Err(ClusteringError::dimension_mismatch(
                format!("{} features", self.prototypes.ncols()),
                data.ncols(),
            ));
        }
        if data.nrows() < prototypes {
            return Err(ClusteringError::dimension_mismatch(
                format!("at least {} data points", prototypes),
                data.nrows(),
            ));
        }

        self.log.clear();
        if self.logging {
            self.log.reserve(iterations);
        }

        info!(
            "🧠 Training neural gas ({:?}): {} prototypes, {} data points, {} iterations",
            self.metric.metric(),
            prototypes,
            data.nrows(),
            iterations
        );

        for iteration in 0..iterations {
            self.phase = TrainingPhase::Training { iteration };

            let lambda = annealed_lambda(lambda0, iteration, iterations);
            let weights = rank_weights(prototypes, lambda);

            let mut adapt = self.metric.distance_matrix(self.prototypes.view(), data);
            apply_rank_weights(&mut adapt, &weights);

            let norms = adapt.sum_axis(Axis(1));
            let mut next = adapt.dot(&data);
            for (mut row, &norm) in next.rows_mut().into_iter().zip(norms.iter()) {
                if !is_numerical_zero(norm) {
                    row.mapv_inplace(|value| value / norm);
                }
            }
            self.prototypes = next;

            if self.logging {
                let error = self.quantization_error(data);
                self.log.record(self.prototypes.clone(), error);
                debug!(iteration, lambda, quantization_error = error, "neural gas iteration");
            }
        }

        self.phase = TrainingPhase::Converged;
        Ok(())
    }
}

impl<M: DistanceCompute> Trainable for NeuralGas<M> {
    fn train(&mut self, data: ArrayView2<f64>, iterations: usize) -> Result<()> {
        let lambda = self.prototypes.nrows() as f64 * 0.5;
        self.fit(data, iterations, lambda)
    }

    fn assign(&self, query: ArrayView2<f64>) -> Result<Vec<usize>> {
        if query.ncols() != self.prototypes.ncols() {
            return Err(ClusteringError::dimension_mismatch(
                format!("{} features", self.prototypes.ncols()),
                query.ncols(),
            ));
        }
        let distances = self.metric.distance_matrix(self.prototypes.view(), query);
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
