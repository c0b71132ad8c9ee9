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

//! Collective communication between cooperating training processes
//!
//! The distributed trainer only ever needs two blocking collectives:
//! `all_gather` (every process receives every process's value, ordered by
//! rank) and `all_reduce` (every process receives the same combination of all
//! values). Every process must enter the same collectives in the same order.

use ndarray::Array1;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::{ClusteringError, Result};

/// Associative combination applied by [`Communicator::all_reduce`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Product,
}

/// Values that can be combined by a reduction
pub trait Reducible: Serialize + DeserializeOwned + Clone {
    fn reduce(&self, other: &Self, op: ReduceOp) -> Result<Self>;
}

impl Reducible for f64 {
    fn reduce(&self, other: &Self, op: ReduceOp) -> Result<Self> {
        Ok(match op {
            ReduceOp::Sum => self + other,
            ReduceOp::Max => self.max(*other),
            ReduceOp::Product => self * other,
        })
    }
}

impl Reducible for usize {
    fn reduce(&self, other: &Self, op: ReduceOp) -> Result<Self> {
        match op {
            ReduceOp::Sum => self.checked_add(*other),
            ReduceOp::Max => Some((*self).max(*other)),
            ReduceOp::Product => self.checked_mul(*other),
        }
        .ok_or_else(|| ClusteringError::protocol(format!("{:?} reduction overflowed", op)))
    }
}

impl Reducible for bool {
    /// Product is logical AND; sum and max are logical OR
    fn reduce(&self, other: &Self, op: ReduceOp) -> Result<Self> {
        Ok(match op {
            ReduceOp::Product => *self && *other,
            ReduceOp::Sum | ReduceOp::Max => *self || *other,
        })
    }
}

impl Reducible for Array1<f64> {
    fn reduce(&self, other: &Self, op: ReduceOp) -> Result<Self> {
        if self.len() != other.len() {
            return Err(ClusteringError::protocol(format!(
                "cannot reduce vectors of length {} and {}",
                self.len(),
                other.len()
            )));
        }
        Ok(match op {
            ReduceOp::Sum => self + other,
            ReduceOp::Max => ndarray::Zip::from(self)
                .and(other)
                .map_collect(|a, b| a.max(*b)),
            ReduceOp::Product => self * other,
        })
    }
}

/// Blocking collective operations over a fixed, rank-ordered process group
pub trait Communicator {
    /// Rank of this process, `0..size()`
    fn rank(&self) -> usize;

    /// Number of processes in the group
    fn size(&self) -> usize;

    /// Every process's `value`, indexed by rank
    fn all_gather<T>(&self, value: &T) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned + Clone;

    /// Combination of every process's `value`.
    ///
    /// Values are folded in rank order, so every process obtains a
    /// bit-identical result.
    fn all_reduce<T: Reducible>(&self, value: &T, op: ReduceOp) -> Result<T> {
        let mut gathered = self.all_gather(value)?.into_iter();
        let first = gathered
            .next()
            .ok_or_else(|| ClusteringError::protocol("all_reduce over an empty group"))?;
        gathered.try_fold(first, |acc, next| acc.reduce(&next, op))
    }
}

/// Trivial group containing only the calling process
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather<T>(&self, value: &T) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        Ok(vec![value.clone()])
    }
}
