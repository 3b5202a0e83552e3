// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime configuration, loadable from JSON.

use anyhow::{Context, Result};
use khora_io::StreamingConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration for a [`Runtime`](crate::Runtime).
///
/// Every field has a default, so a config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory assets are streamed from.
    pub asset_root: PathBuf,
    /// Default `env_logger` filter. `RUST_LOG` takes precedence.
    pub log_filter: String,
    /// Number of async worker threads.
    pub async_worker_threads: usize,
    /// Upper bound on threads running async task callbacks.
    pub max_blocking_threads: usize,
    /// Settings of the asset streaming engine.
    pub streaming: StreamingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            asset_root: PathBuf::from("assets"),
            log_filter: "info".to_string(),
            async_worker_threads: cores,
            max_blocking_threads: cores * 2,
            streaming: StreamingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse runtime configuration")
    }

    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runtime configuration '{}'", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Invalid runtime configuration in '{}'", path.display()))
    }
}
