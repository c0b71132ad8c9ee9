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

//! # proxima-cluster - Relational Prototype Clustering
//!
//! Prototype-based vector quantization driven by pairwise dissimilarities,
//! with a data-sharded training mode that keeps one consistent prototype
//! matrix across a group of cooperating processes.
//!
//! ## Modules
//!
//! - [`compute`]: numeric kernels (initialization, ranking, relational distances)
//! - [`network`]: blocking collectives and an in-process runtime for them
//! - [`clustering`]: relational neural gas (serial and distributed) and batch neural gas
//! - [`core`]: configuration and error types
//!
//! ## Example
//!
//! ```no_run
//! use ndarray::array;
//! use proxima_cluster::{RelationalNeuralGas, Trainable};
//!
//! let dissimilarities = array![
//!     [0.0, 1.0, 4.0, 9.0],
//!     [1.0, 0.0, 1.0, 4.0],
//!     [4.0, 1.0, 0.0, 1.0],
//!     [9.0, 4.0, 1.0, 0.0],
//! ];
//! let mut gas = RelationalNeuralGas::with_seed(2, 4, 42)?;
//! gas.train(dissimilarities.view(), 10)?;
//! let labels = gas.assign(dissimilarities.view())?;
//! # Ok::<(), proxima_cluster::ClusteringError>(())
//! ```

pub mod clustering;
pub mod compute;
pub mod core;
pub mod network;

pub use crate::clustering::{
    Distributed, NeuralGas, ProcessMap, RelationalNeuralGas, Span, Trainable, TrainingLog,
    TrainingPhase,
};
pub use crate::core::{ClusterConfig, ClusteringError, ConfigError, Result};
pub use crate::network::{Communicator, LocalCluster, LocalCommunicator, ReduceOp, SingleProcess};
