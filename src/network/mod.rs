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

//! Process-group communication for distributed training
//!
//! [`collective`] defines the blocking collectives the trainers rely on;
//! [`local`] provides an in-process runtime that runs one worker per thread.

pub mod collective;
pub mod local;

pub use collective::{Communicator, ReduceOp, Reducible, SingleProcess};
pub use local::{LocalCluster, LocalCommunicator};
