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

//! The asset streaming engine.
//!
//! Goals are pushed into an unbounded channel from any thread. One dedicated
//! thread pulls them in FIFO order, performs the blocking read through the
//! [`AssetStorage`], and hands the bytes to the [`Scheduler`]: as a sync task
//! when the goal asks for the owning thread, as an async task otherwise.
//! Reading one goal at a time keeps I/O contention bounded and the read order
//! deterministic.

use crate::error::StreamingError;
use crate::goal::{GoalHandle, GoalStatus, StreamGoal};
use crossbeam_channel::{Receiver, Sender};
use khora_core::task::panic_message;
use khora_core::vfs::AssetStorage;
use khora_scheduler::Scheduler;
use serde::Deserialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Configuration for the [`AssetStreamingEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Name given to the dedicated streaming thread.
    pub thread_name: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            thread_name: "khora-asset-streaming".to_string(),
        }
    }
}

/// A cloneable producer handle for the goal queue.
///
/// Lets any thread enqueue goals without borrowing the engine.
#[derive(Debug, Clone)]
pub struct GoalQueue {
    goal_tx: Sender<StreamGoal>,
}

impl GoalQueue {
    /// Enqueues a goal built with the [`StreamGoal`] builder.
    pub fn submit(&self, goal: StreamGoal) -> GoalHandle {
        let handle = goal.handle();
        log::trace!("Queueing stream goal '{}'", goal.name());
        if let Err(e) = self.goal_tx.send(goal) {
            // Only possible once the engine itself is gone.
            log::error!("Dropping stream goal '{}': streaming engine is gone", e.0.name());
            e.0.into_failure()
                .error("asset streaming engine is shut down".to_string());
        }
        handle
    }

    /// Enqueues a goal for `name`.
    ///
    /// `process` receives the complete bytes, on the owning thread when
    /// `route_to_owning_thread` is set and on a worker thread otherwise.
    pub fn add_goal<P>(
        &self,
        name: impl Into<String>,
        route_to_owning_thread: bool,
        process: P,
        on_missing: Option<Box<dyn FnOnce() + Send + 'static>>,
        on_error: Option<Box<dyn FnOnce(String) + Send + 'static>>,
    ) -> GoalHandle
    where
        P: FnOnce(Vec<u8>) + Send + 'static,
    {
        let mut goal = StreamGoal::new(name, process).route_to_owning_thread(route_to_owning_thread);
        if let Some(handler) = on_missing {
            goal = goal.on_missing(handler);
        }
        if let Some(handler) = on_error {
            goal = goal.on_error(handler);
        }
        self.submit(goal)
    }
}

// The dedicated reader thread and the channel that tells it to stop.
struct StreamingWorker {
    finish_tx: Sender<()>,
    join_handle: JoinHandle<()>,
}

/// Streams named resources on a dedicated thread.
pub struct AssetStreamingEngine {
    config: StreamingConfig,
    storage: Arc<dyn AssetStorage>,
    scheduler: Scheduler,
    queue: GoalQueue,
    goal_rx: Receiver<StreamGoal>,
    worker: Option<StreamingWorker>,
}

impl AssetStreamingEngine {
    /// Creates the engine. Call [`init`](Self::init) to start streaming;
    /// goals added before that wait in the queue.
    pub fn new(storage: Arc<dyn AssetStorage>, scheduler: Scheduler, config: StreamingConfig) -> Self {
        let (goal_tx, goal_rx) = crossbeam_channel::unbounded();
        Self {
            config,
            storage,
            scheduler,
            queue: GoalQueue { goal_tx },
            goal_rx,
            worker: None,
        }
    }

    /// Starts the dedicated streaming thread.
    pub fn init(&mut self) -> Result<(), StreamingError> {
        if self.worker.is_some() {
            return Err(StreamingError::AlreadyRunning);
        }

        let (finish_tx, finish_rx) = crossbeam_channel::bounded(1);
        let goal_rx = self.goal_rx.clone();
        let storage = self.storage.clone();
        let scheduler = self.scheduler.clone();

        let join_handle = std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                log::info!("Asset streaming thread started.");
                loop {
                    crossbeam_channel::select! {
                        recv(goal_rx) -> msg => {
                            let Ok(goal) = msg else { break };
                            if finish_rx.try_recv().is_ok() {
                                break;
                            }
                            process_goal(storage.as_ref(), &scheduler, goal);
                        },
                        recv(finish_rx) -> _msg => break,
                    }
                }
                log::info!("Asset streaming thread stopped.");
            })
            .map_err(StreamingError::ThreadSpawn)?;

        self.worker = Some(StreamingWorker {
            finish_tx,
            join_handle,
        });
        Ok(())
    }

    /// Stops the streaming thread.
    ///
    /// A goal already being read is finished; goals still queued are
    /// abandoned without invoking any of their handlers.
    pub fn shutdown(&mut self) -> Result<(), StreamingError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let _ = worker.finish_tx.send(());
        let joined = worker.join_handle.join();

        let abandoned = self.goal_rx.try_iter().count();
        if abandoned > 0 {
            log::warn!("Asset streaming shut down with {abandoned} queued goals abandoned");
        }

        joined.map_err(|_| StreamingError::WorkerPanicked)
    }

    /// Whether the streaming thread is running.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Number of goals waiting to be read.
    pub fn queued_goals(&self) -> usize {
        self.goal_rx.len()
    }

    /// A producer handle usable from other threads.
    pub fn goal_queue(&self) -> GoalQueue {
        self.queue.clone()
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// See [`GoalQueue::submit`].
    pub fn submit(&self, goal: StreamGoal) -> GoalHandle {
        self.queue.submit(goal)
    }

    /// See [`GoalQueue::add_goal`].
    pub fn add_goal<P>(
        &self,
        name: impl Into<String>,
        route_to_owning_thread: bool,
        process: P,
        on_missing: Option<Box<dyn FnOnce() + Send + 'static>>,
        on_error: Option<Box<dyn FnOnce(String) + Send + 'static>>,
    ) -> GoalHandle
    where
        P: FnOnce(Vec<u8>) + Send + 'static,
    {
        self.queue
            .add_goal(name, route_to_owning_thread, process, on_missing, on_error)
    }
}

impl Drop for AssetStreamingEngine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Asset streaming shutdown failed: {e}");
        }
    }
}

/// Reads one goal and routes the outcome.
fn process_goal(storage: &dyn AssetStorage, scheduler: &Scheduler, goal: StreamGoal) {
    goal.mark(GoalStatus::Reading);

    if goal.name().is_empty() {
        goal.into_failure()
            .error("cannot stream a resource with an empty name".to_string());
        return;
    }

    let read = panic::catch_unwind(AssertUnwindSafe(|| storage.try_read(goal.name())));
    let data = match read {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            log::debug!("Stream goal '{}' not found", goal.name());
            goal.into_failure().missing();
            return;
        }
        Ok(Err(e)) => {
            goal.into_failure().error(e.to_string());
            return;
        }
        Err(payload) => {
            goal.into_failure().error(panic_message(payload.as_ref()));
            return;
        }
    };

    log::trace!("Stream goal '{}' read {} bytes", goal.name(), data.len());
    goal.mark(GoalStatus::Dispatched);
    let to_owning_thread = goal.routes_to_owning_thread();
    let (job, failure) = goal.into_dispatch(data);

    let dispatched = panic::catch_unwind(AssertUnwindSafe(|| {
        if to_owning_thread {
            scheduler.schedule_sync_task(job, 0.0);
        } else {
            scheduler.start_async_task(job, false);
        }
    }));
    if let Err(payload) = dispatched {
        failure.error(panic_message(payload.as_ref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use khora_core::OwningThread;
    use khora_scheduler::ManualSubmitter;

    fn engine(storage: MemoryStorage) -> (OwningThread, AssetStreamingEngine) {
        let owner = OwningThread::claim();
        let scheduler = Scheduler::new(owner.id(), Arc::new(ManualSubmitter::new()));
        let engine = AssetStreamingEngine::new(Arc::new(storage), scheduler, StreamingConfig::default());
        (owner, engine)
    }

    #[test]
    fn init_twice_is_rejected() {
        let (_owner, mut engine) = engine(MemoryStorage::new());
        engine.init().unwrap();
        assert!(engine.is_running());
        assert!(matches!(engine.init(), Err(StreamingError::AlreadyRunning)));
        engine.shutdown().unwrap();
        assert!(!engine.is_running());
    }

    #[test]
    fn goals_wait_until_init() {
        let (_owner, engine) = engine(MemoryStorage::new());
        let handle = engine.add_goal("a", true, |_| {}, None, None);
        assert_eq!(engine.queued_goals(), 1);
        assert_eq!(handle.status(), GoalStatus::Queued);
    }

    #[test]
    fn shutdown_abandons_queued_goals() {
        let (_owner, mut engine) = engine(MemoryStorage::new());
        let handle = engine.add_goal("never-read", false, |_| {}, None, None);
        engine.init().unwrap();
        engine.shutdown().unwrap();
        // Whether or not it was picked up before the stop signal, nothing is left queued.
        assert_eq!(engine.queued_goals(), 0);
        assert!(matches!(
            handle.status(),
            GoalStatus::Queued | GoalStatus::Missing
        ));
    }

    #[test]
    fn empty_name_is_routed_to_error_handler() {
        let storage = MemoryStorage::new();
        let owner = OwningThread::claim();
        let scheduler = Scheduler::new(owner.id(), Arc::new(ManualSubmitter::new()));
        let (tx, rx) = crossbeam_channel::bounded(1);
        let goal = StreamGoal::new("", |_| {}).on_error(move |msg| tx.send(msg).unwrap());
        let handle = goal.handle();

        process_goal(&storage, &scheduler, goal);

        assert!(rx.try_recv().unwrap().contains("empty name"));
        assert_eq!(handle.status(), GoalStatus::Failed);
    }
}
