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

//! Ranking and annealing primitives for neural gas updates

use ndarray::{Array1, Array2, ArrayView1};
use std::cmp::Ordering;

/// Floor the neighbourhood range anneals towards
pub const FINAL_LAMBDA: f64 = 0.01;

/// Ascending order for distance values; NaN sorts after every number
#[inline]
fn compare_distance(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// Permutation that sorts `values` ascending.
///
/// The sort is stable, so equal values keep their original index order. This
/// decides which prototype wins a tie and keeps training deterministic.
pub fn rank_index(values: ArrayView1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| compare_distance(values[a], values[b]));
    order
}

/// Index of the smallest value, lowest index on ties
pub fn arg_min(values: ArrayView1<f64>) -> Option<usize> {
    rank_index(values).first().copied()
}

/// Geometric annealing: `lambda0 * (0.01 / lambda0)^(iteration / iterations)`
pub fn annealed_lambda(lambda0: f64, iteration: usize, iterations: usize) -> f64 {
    lambda0 * (FINAL_LAMBDA / lambda0).powf(iteration as f64 / iterations as f64)
}

/// Neighbourhood weights `exp(-r / lambda)` for rank positions `0..count`
pub fn rank_weights(count: usize, lambda: f64) -> Array1<f64> {
    Array1::from_shape_fn(count, |rank| (-(rank as f64) / lambda).exp())
}

/// Replace every column of distances by the neighbourhood weight of each
/// row's rank within that column
pub fn apply_rank_weights(distances: &mut Array2<f64>, weights: &Array1<f64>) {
    debug_assert_eq!(distances.nrows(), weights.len());
    for mut column in distances.columns_mut() {
        let order = rank_index(column.view());
        for (rank, &row) in order.iter().enumerate() {
            column[row] = weights[rank];
        }
    }
}
