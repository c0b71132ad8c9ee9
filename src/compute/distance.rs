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

//! Distance strategies for vector-space prototypes
//!
//! Each metric maps prototypes (K x d) and data (N x d) to a K x N distance
//! matrix. Trainers own their metric by value and call it per iteration.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Squared Euclidean distance (L2²)
    SquaredEuclidean,
    /// Manhattan distance (L1 norm)
    Manhattan,
}

/// Batched prototype-to-data distance computation
pub trait DistanceCompute: Send + Sync {
    /// Distance matrix with one row per prototype and one column per data row
    fn distance_matrix(&self, prototypes: ArrayView2<f64>, data: ArrayView2<f64>) -> Array2<f64>;

    /// Get the metric type
    fn metric(&self) -> DistanceMetric;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredEuclideanDistance;

impl DistanceCompute for SquaredEuclideanDistance {
    fn distance_matrix(&self, prototypes: ArrayView2<f64>, data: ArrayView2<f64>) -> Array2<f64> {
        // ‖p‖² + ‖x‖² − 2·p·x, clamped against rounding below zero
        let prototype_norms = prototypes.map_axis(Axis(1), |row| row.dot(&row));
        let data_norms = data.map_axis(Axis(1), |row| row.dot(&row));

        let mut distances = prototypes.dot(&data.t());
        for ((i, j), value) in distances.indexed_iter_mut() {
            *value = (prototype_norms[i] + data_norms[j] - 2.0 * *value).max(0.0);
        }
        distances
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::SquaredEuclidean
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManhattanDistance;

impl DistanceCompute for ManhattanDistance {
    fn distance_matrix(&self, prototypes: ArrayView2<f64>, data: ArrayView2<f64>) -> Array2<f64> {
        Array2::from_shape_fn((prototypes.nrows(), data.nrows()), |(i, j)| {
            prototypes
                .row(i)
                .iter()
                .zip(data.row(j).iter())
                .map(|(a, b)| (a - b).abs())
                .sum()
        })
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Manhattan
    }
}

/// Create a distance computer for the given metric
pub fn create_distance_computer(metric: DistanceMetric) -> Box<dyn DistanceCompute> {
    match metric {
        DistanceMetric::SquaredEuclidean => Box::new(SquaredEuclideanDistance),
        DistanceMetric::Manhattan => Box::new(ManhattanDistance),
    }
}
