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

//! Streams the named assets, processes them, and exits once every goal has
//! finished.

use anyhow::{bail, Result};
use clap::Parser;
use khora_sdk::prelude::*;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Parser)]
#[command(name = "khora-runtime", version, about = "Streams assets through the Khora runtime")]
struct Cli {
    /// JSON runtime configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured asset root.
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// Process assets on the main thread instead of a worker thread.
    #[arg(long)]
    on_main_thread: bool,

    /// Seconds to wait for all assets before giving up.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Asset names, relative to the asset root.
    #[arg(required = true)]
    assets: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(root) = cli.asset_root {
        config.asset_root = root;
    }
    init_logging(&config.log_filter);

    let mut runtime = Runtime::new(config)?;
    runtime.init()?;

    let handles: Vec<GoalHandle> = cli
        .assets
        .iter()
        .map(|name| {
            let asset = name.clone();
            let goal = StreamGoal::new(name.clone(), move |bytes| {
                log::info!("Streamed '{asset}' ({} bytes)", bytes.len());
            })
            .route_to_owning_thread(cli.on_main_thread);
            runtime.stream(goal)
        })
        .collect();

    let deadline = Instant::now() + Duration::from_secs(cli.timeout);
    while !handles.iter().all(GoalHandle::is_finished) {
        if Instant::now() >= deadline {
            bail!("Timed out after {}s waiting for assets", cli.timeout);
        }
        runtime.tick_measured()?;
        thread::sleep(FRAME);
    }
    runtime.shutdown()?;

    let failed: Vec<&str> = handles
        .iter()
        .filter(|h| h.status() != GoalStatus::Complete)
        .map(GoalHandle::name)
        .collect();
    if !failed.is_empty() {
        bail!("{} of {} assets failed: {}", failed.len(), handles.len(), failed.join(", "));
    }
    log::info!("All {} assets processed", handles.len());
    Ok(())
}
