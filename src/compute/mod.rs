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

//! Numeric kernels for prototype-based clustering
//!
//! - [`matrix`]: prototype initialisation, row normalisation, block stacking
//! - [`rank`]: stable ranking, annealing schedule, neighbourhood weights
//! - [`relational`]: pseudo-Euclidean distances over dissimilarity matrices
//! - [`distance`]: vector-space distance strategies
//!
//! Kernels are infallible; shapes are validated by the public trainer API.

pub mod distance;
pub mod matrix;
pub mod rank;
pub mod relational;

pub use distance::*;
pub use matrix::{is_numerical_zero, normalize_rows, random_prototypes};
pub use rank::{annealed_lambda, apply_rank_weights, rank_index, rank_weights};
