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

//! Relational (pseudo-Euclidean) distances between prototypes and data
//!
//! Prototypes are convex combinations `w_i = Σ_n α_in x_n` of data points that
//! are only known through their pairwise dissimilarities `D`. The squared
//! distance to data point `j` follows from
//!
//! ```text
//! ‖x_j − w_i‖² = (D·α_i)_j − ½·α_iᵀ·D·α_i
//! ```
//!
//! The second term (the *correction*) depends on the whole row `α_i`. When the
//! columns of `D` are sharded, every shard contributes a partial correction
//! that has to be summed before it is subtracted, which is why the computation
//! is split into [`raw_product`], [`partial_corrections`] and
//! [`subtract_corrections`].

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::rank::arg_min;

/// `P · D` for prototypes (K x N) and a block of data columns (N x w)
pub fn raw_product(prototypes: ArrayView2<f64>, data: ArrayView2<f64>) -> Array2<f64> {
    prototypes.dot(&data)
}

/// `½ · Σ_j P[i, offset + j] · raw[i, j]` for every prototype row.
///
/// `column_offset` is the global index of the first data column in `raw`.
pub fn partial_corrections(
    prototypes: ArrayView2<f64>,
    raw: ArrayView2<f64>,
    column_offset: usize,
) -> Array1<f64> {
    let width = raw.ncols();
    let block = prototypes.slice(s![.., column_offset..column_offset + width]);

    let mut corrections = Array1::zeros(raw.nrows());
    for (i, correction) in corrections.iter_mut().enumerate() {
        *correction = 0.5 * block.row(i).dot(&raw.row(i));
    }
    corrections
}

/// Subtract one correction per row, turning `raw` into squared distances
pub fn subtract_corrections(raw: &mut Array2<f64>, corrections: ArrayView1<f64>) {
    debug_assert_eq!(raw.nrows(), corrections.len());
    for (mut row, &correction) in raw.rows_mut().into_iter().zip(corrections.iter()) {
        row.mapv_inplace(|value| value - correction);
    }
}

/// Squared relational distances (K x N) for a full square dissimilarity matrix
pub fn adapt_matrix(prototypes: ArrayView2<f64>, data: ArrayView2<f64>) -> Array2<f64> {
    let mut adapt = raw_product(prototypes, data);
    let corrections = partial_corrections(prototypes, adapt.view(), 0);
    subtract_corrections(&mut adapt, corrections.view());
    adapt
}

/// Sum over columns of the smallest entry of each column
pub fn column_min_sum(distances: ArrayView2<f64>) -> f64 {
    if distances.nrows() == 0 || distances.ncols() == 0 {
        return 0.0;
    }
    distances
        .fold_axis(Axis(0), f64::INFINITY, |&acc, &value| acc.min(value))
        .sum()
}

/// `½ · Σ_j min_i adapt[i, j]`
pub fn quantization_error(adapt: ArrayView2<f64>) -> f64 {
    0.5 * column_min_sum(adapt)
}

/// Relational distances (K x M) from every prototype to M query points.
///
/// `query` holds one row of dissimilarities to the N training points per
/// query point; `corrections` are the prototypes' cached correction terms.
pub fn query_distances(
    prototypes: ArrayView2<f64>,
    corrections: ArrayView1<f64>,
    query: ArrayView2<f64>,
) -> Array2<f64> {
    let mut distances = prototypes.dot(&query.t());
    subtract_corrections(&mut distances, corrections);
    distances
}

/// For every column the row index of the nearest prototype
pub fn nearest_prototypes(distances: ArrayView2<f64>) -> Vec<usize> {
    distances
        .columns()
        .into_iter()
        .map(|column| arg_min(column).unwrap_or(0))
        .collect()
}
