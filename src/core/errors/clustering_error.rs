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

//! Core clustering error type

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ConfigError;

/// Main error type for training, assignment and collective operations
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
pub enum ClusteringError {
    /// Zero-sized parameters, non-positive lambda or iterations
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Matrix shapes that do not fit together
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Collective failures: timeout, disconnect, out-of-order or undecodable
    /// messages, inconsistent process configuration
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClusteringError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ClusteringError::InvalidArgument(message.into())
    }

    pub fn dimension_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        ClusteringError::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        ClusteringError::Protocol(message.into())
    }

    /// True for errors raised by the collective layer rather than by local validation
    pub fn is_protocol(&self) -> bool {
        matches!(self, ClusteringError::Protocol(_))
    }
}
