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

//! Prototype-based clustering
//!
//! Trainers share one capability trait, [`Trainable`], for single-process
//! training, assignment and log access. Trainers that can also run sharded
//! over a process group implement [`Distributed`], whose operations are all
//! collective: every process of the group must call them in the same order.

pub mod distributed;
pub mod neuralgas;
pub mod recorder;
pub mod relational_neuralgas;

use ndarray::{Array2, ArrayView2};

use crate::core::Result;
use crate::network::Communicator;

pub use distributed::{rank_seed, ProcessMap, ShardInfo, Span, TrainingPhase};
pub use neuralgas::NeuralGas;
pub use recorder::TrainingLog;
pub use relational_neuralgas::RelationalNeuralGas;

/// Single-process training and querying
pub trait Trainable {
    /// Run `iterations` annealing steps with the default neighbourhood range
    fn train(&mut self, data: ArrayView2<f64>, iterations: usize) -> Result<()>;

    /// Index of the nearest prototype for every query row.
    ///
    /// Relational trainers subtract each prototype's cached self term
    /// `½·αᵀDα` from `P · queryᵗ`. The cache is zero until the first `train`,
    /// so an untrained model ranks by the raw `P · queryᵗ` product.
    fn assign(&self, query: ArrayView2<f64>) -> Result<Vec<usize>>;

    /// Prototype matrix, one prototype per row
    fn prototypes(&self) -> &Array2<f64>;

    fn set_logging(&mut self, enabled: bool);

    /// True when logging is enabled and the last training run logged at
    /// least one iteration
    fn logging(&self) -> bool;

    fn logged_prototypes(&self) -> &[Array2<f64>];

    fn logged_quantization_error(&self) -> &[f64];

    fn prototype_count(&self) -> usize {
        self.prototypes().nrows()
    }

    fn dimension(&self) -> usize {
        self.prototypes().ncols()
    }
}

/// Collective training over a column-sharded dataset
pub trait Distributed {
    /// Train on this process's columns of the dissimilarity matrix.
    ///
    /// `iterations` and `lambda` are negotiated as the maximum over all
    /// processes; logging is enabled only if every process enabled it.
    fn train_distributed<C: Communicator>(
        &mut self,
        comm: &C,
        data: ArrayView2<f64>,
        iterations: usize,
        lambda: Option<f64>,
    ) -> Result<()>;

    /// Global prototype matrix, rows stacked in rank order
    fn prototypes_distributed<C: Communicator>(&self, comm: &C) -> Result<Array2<f64>>;

    fn logged_prototypes_distributed<C: Communicator>(&self, comm: &C) -> Result<Vec<Array2<f64>>>;

    /// Quantization error history of the last run, identical on every rank.
    ///
    /// Each iteration records the sum over all ranks of the error of their
    /// own data columns against the full prototype set, which equals the
    /// serial value. It is not the error of the locally owned prototype rows
    /// alone. Histories are merged with an element-wise minimum.
    fn logged_quantization_error_distributed<C: Communicator>(&self, comm: &C) -> Result<Vec<f64>>;

    /// Nearest prototype, in the global prototype numbering, for every query row
    fn assign_distributed<C: Communicator>(
        &self,
        comm: &C,
        query: ArrayView2<f64>,
    ) -> Result<Vec<usize>>;

    /// Join the collective of an `assign_distributed` call made by a peer
    fn participate_assign<C: Communicator>(&self, comm: &C) -> Result<()>;
}
