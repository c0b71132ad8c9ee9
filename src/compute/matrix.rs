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

//! Dense matrix helpers shared by the trainers
//!
//! Prototype matrices are row oriented: one prototype per row, one column per
//! data point (relational) or feature (vector space).

use ndarray::{concatenate, Array2, ArrayView2, Axis};
use rand::Rng;

use crate::core::{ClusteringError, Result};

/// Values within machine epsilon of zero are treated as zero
#[inline]
pub fn is_numerical_zero(value: f64) -> bool {
    value.abs() <= f64::EPSILON
}

/// Create `count` x `dimension` uniform [0, 1) prototypes with rows summing to one
pub fn random_prototypes<R: Rng>(count: usize, dimension: usize, rng: &mut R) -> Result<Array2<f64>> {
    if count == 0 {
        return Err(ClusteringError::invalid_argument(
            "number of prototypes must be greater than zero",
        ));
    }
    if dimension == 0 {
        return Err(ClusteringError::invalid_argument(
            "prototype dimension must be greater than zero",
        ));
    }

    let mut prototypes = random_uniform(count, dimension, rng);
    normalize_rows(&mut prototypes);
    Ok(prototypes)
}

/// `rows` x `cols` matrix of independent uniform [0, 1) entries
pub fn random_uniform<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen::<f64>())
}

/// Divide every row by its sum. Rows with a numerically zero sum are left
/// untouched; the number of such rows is returned.
pub fn normalize_rows(matrix: &mut Array2<f64>) -> usize {
    let mut skipped = 0;
    for mut row in matrix.rows_mut() {
        let sum = row.sum();
        if is_numerical_zero(sum) {
            skipped += 1;
            continue;
        }
        row.mapv_inplace(|value| value / sum);
    }
    skipped
}

/// Stack row blocks (rank order) into one matrix with `ncols` columns
pub fn stack_rows(blocks: &[Array2<f64>], ncols: usize) -> Result<Array2<f64>> {
    if blocks.is_empty() {
        return Ok(Array2::zeros((0, ncols)));
    }
    let views: Vec<ArrayView2<f64>> = blocks.iter().map(|block| block.view()).collect();
    concatenate(Axis(0), &views).map_err(|e| {
        ClusteringError::dimension_mismatch(format!("row blocks with {} columns", ncols), e)
    })
}

/// Concatenate column blocks (rank order) into one matrix with `nrows` rows
pub fn concat_columns(blocks: &[Array2<f64>], nrows: usize) -> Result<Array2<f64>> {
    if blocks.is_empty() {
        return Ok(Array2::zeros((nrows, 0)));
    }
    let views: Vec<ArrayView2<f64>> = blocks.iter().map(|block| block.view()).collect();
    concatenate(Axis(1), &views).map_err(|e| {
        ClusteringError::dimension_mismatch(format!("column blocks with {} rows", nrows), e)
    })
}

/// Maximum deviation of any row sum from one, ignoring rows that sum to zero
pub fn max_row_sum_deviation(matrix: ArrayView2<f64>) -> f64 {
    matrix
        .rows()
        .into_iter()
        .map(|row| row.sum())
        .filter(|sum| !is_numerical_zero(*sum))
        .map(|sum| (sum - 1.0).abs())
        .fold(0.0, f64::max)
}
