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

//! The [`Runtime`] facade: one owning thread, one scheduler, one streaming
//! engine and the worker pool behind async tasks.

use crate::config::RuntimeConfig;
use anyhow::{Context, Result};
use khora_core::vfs::AssetStorage;
use khora_core::{FrameClock, OwningThread};
use khora_io::{AssetStreamingEngine, DirectoryStorage, GoalHandle, StreamGoal};
use khora_scheduler::{Scheduler, TokioSubmitter};
use std::sync::Arc;

/// Wires the scheduler, the asset streaming engine and the async worker pool
/// to the thread that created it.
///
/// The thread calling [`Runtime::new`] becomes the owning thread: it is the
/// only one that can [`tick`](Runtime::tick), and sync tasks run there.
pub struct Runtime {
    config: RuntimeConfig,
    owner: OwningThread,
    workers: Option<tokio::runtime::Runtime>,
    scheduler: Scheduler,
    streaming: AssetStreamingEngine,
    clock: FrameClock,
}

impl Runtime {
    /// Creates a runtime streaming from `config.asset_root`.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let storage = Arc::new(DirectoryStorage::new(config.asset_root.clone()));
        Self::with_storage(config, storage)
    }

    /// Creates a runtime streaming from a custom storage backend.
    pub fn with_storage(config: RuntimeConfig, storage: Arc<dyn AssetStorage>) -> Result<Self> {
        let workers = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.async_worker_threads.max(1))
            .max_blocking_threads(config.max_blocking_threads.max(1))
            .thread_name("khora-async-worker")
            .build()
            .context("Failed to build the async worker pool")?;

        let owner = OwningThread::claim();
        let submitter = Arc::new(TokioSubmitter::new(workers.handle().clone()));
        let scheduler = Scheduler::new(owner.id(), submitter);
        let streaming =
            AssetStreamingEngine::new(storage, scheduler.clone(), config.streaming.clone());

        Ok(Self {
            config,
            owner,
            workers: Some(workers),
            scheduler,
            streaming,
            clock: FrameClock::new(),
        })
    }

    /// Starts the streaming thread.
    pub fn init(&mut self) -> Result<()> {
        self.streaming
            .init()
            .context("Failed to start asset streaming")?;
        self.clock = FrameClock::new();
        log::info!(
            "Khora runtime initialised (assets: '{}', {} async workers)",
            self.config.asset_root.display(),
            self.config.async_worker_threads.max(1)
        );
        Ok(())
    }

    /// Runs the sync tasks due after `elapsed` seconds. Returns how many ran.
    pub fn tick(&mut self, elapsed: f64) -> Result<usize> {
        let executed = self.scheduler.run_all_sync_tasks(&self.owner, elapsed)?;
        Ok(executed)
    }

    /// Like [`tick`](Self::tick), with the time since the previous tick.
    pub fn tick_measured(&mut self) -> Result<usize> {
        let elapsed = self.clock.lap();
        self.tick(elapsed)
    }

    /// Queues a streaming goal.
    pub fn stream(&self, goal: StreamGoal) -> GoalHandle {
        self.streaming.submit(goal)
    }

    /// The scheduler, for sync and async tasks.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The asset streaming engine.
    pub fn streaming(&self) -> &AssetStreamingEngine {
        &self.streaming
    }

    /// The owning thread token.
    pub fn owner(&self) -> &OwningThread {
        &self.owner
    }

    /// The configuration the runtime was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Stops streaming and releases the worker pool.
    ///
    /// Async tasks still running are left to finish in the background.
    pub fn shutdown(&mut self) -> Result<()> {
        self.streaming
            .shutdown()
            .context("Failed to stop asset streaming")?;
        if let Some(workers) = self.workers.take() {
            workers.shutdown_background();
            log::info!("Khora runtime shut down");
        }
        Ok(())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Runtime shutdown failed: {e:#}");
        }
    }
}
