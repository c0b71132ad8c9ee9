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

//! Per-iteration training history

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::compute::matrix::stack_rows;
use crate::core::{ClusteringError, Result};

/// Prototype snapshots and quantization errors, one entry per iteration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrainingLog {
    prototypes: Vec<Array2<f64>>,
    quantization_error: Vec<f64>,
}

impl TrainingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.prototypes.clear();
        self.quantization_error.clear();
    }

    /// Reserve room for `iterations` further entries
    pub fn reserve(&mut self, iterations: usize) {
        self.prototypes.reserve(iterations);
        self.quantization_error.reserve(iterations);
    }

    pub fn record(&mut self, prototypes: Array2<f64>, quantization_error: f64) {
        self.prototypes.push(prototypes);
        self.quantization_error.push(quantization_error);
    }

    pub fn len(&self) -> usize {
        self.quantization_error.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantization_error.is_empty()
    }

    pub fn prototypes(&self) -> &[Array2<f64>] {
        &self.prototypes
    }

    pub fn quantization_error(&self) -> &[f64] {
        &self.quantization_error
    }
}

/// Merge quantization error logs of several processes by taking, per
/// iteration, the smallest value any process recorded.
///
/// Logs may differ in length; an index is merged over the logs that reach it.
pub fn merge_min_errors(logs: &[Vec<f64>]) -> Vec<f64> {
    let length = logs.iter().map(Vec::len).max().unwrap_or(0);
    (0..length)
        .map(|index| {
            logs.iter()
                .filter_map(|log| log.get(index).copied())
                .fold(f64::INFINITY, f64::min)
        })
        .collect()
}

/// Reassemble global snapshots from per-process histories of owned rows.
///
/// Every history must cover the same iterations; the rows of each snapshot
/// are stacked in rank order.
pub fn stack_histories(histories: &[Vec<Array2<f64>>], ncols: usize) -> Result<Vec<Array2<f64>>> {
    let length = match histories.first() {
        Some(first) => first.len(),
        None => return Ok(Vec::new()),
    };
    if let Some((rank, history)) = histories
        .iter()
        .enumerate()
        .find(|(_, history)| history.len() != length)
    {
        return Err(ClusteringError::protocol(format!(
            "rank {} logged {} iterations, rank 0 logged {}",
            rank,
            history.len(),
            length
        )));
    }

    (0..length)
        .map(|iteration| {
            let blocks: Vec<Array2<f64>> = histories
                .iter()
                .map(|history| history[iteration].clone())
                .collect();
            stack_rows(&blocks, ncols)
        })
        .collect()
}
