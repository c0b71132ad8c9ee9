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

//! Configuration for training runs and the local collective runtime
//!
//! Configuration is read from TOML, optionally layered with environment
//! overrides of the form `PROXIMA_CLUSTER__TRAINING__ITERATIONS=200`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::ConfigError;

/// Environment prefix for layered configuration overrides
pub const ENV_PREFIX: &str = "PROXIMA_CLUSTER";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub training: TrainingConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of annealing iterations
    pub iterations: usize,
    /// Initial neighbourhood range; defaults to half the prototype count
    pub lambda: Option<f64>,
    /// Record prototypes and quantization error for every iteration
    pub logging: bool,
    /// Seed for prototype initialisation; entropy when absent
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of local workers the data is sharded over
    pub workers: usize,
    /// Collective timeout; blocks indefinitely when absent
    pub collective_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            lambda: None,
            logging: false,
            seed: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            collective_timeout_ms: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NetworkConfig {
    pub fn collective_timeout(&self) -> Option<Duration> {
        self.collective_timeout_ms.map(Duration::from_millis)
    }
}

impl ClusterConfig {
    /// Parse a TOML document; missing sections fall back to defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ClusterConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file (optional) and `PROXIMA_CLUSTER__*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ClusterConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.training.iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "training.iterations".to_string(),
                value: "0".to_string(),
            });
        }
        if let Some(lambda) = self.training.lambda {
            if !(lambda > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: "training.lambda".to_string(),
                    value: lambda.to_string(),
                });
            }
        }
        if self.network.workers == 0 {
            return Err(ConfigError::ValidationFailed(
                "network.workers must be at least 1".to_string(),
            ));
        }
        if self.network.collective_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "network.collective_timeout_ms must be positive; omit it to block".to_string(),
            ));
        }
        Ok(())
    }
}
