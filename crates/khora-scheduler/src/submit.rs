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

//! Work submitters: where async task bodies actually run.

use crate::error::SchedulerError;
use crate::lock;
use khora_core::task::{Job, TaskPriority, WorkSubmitter};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use tokio::runtime::Handle;

/// Runs jobs on the blocking pool of a tokio runtime.
///
/// The blocking pool grows on demand, which matches the "unbounded pool of
/// transient workers" the async tasks expect. Tokio has no notion of thread
/// priority, so the [`TaskPriority`] hint is only logged.
#[derive(Debug, Clone)]
pub struct TokioSubmitter {
    handle: Handle,
}

impl TokioSubmitter {
    /// Creates a submitter bound to the given runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Creates a submitter bound to the runtime of the calling context.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::NoRuntime(e.to_string()))
    }
}

impl WorkSubmitter for TokioSubmitter {
    fn submit(&self, priority: TaskPriority, job: Job) {
        log::trace!("Submitting {priority:?} job to the tokio blocking pool");
        let job = PendingJob {
            job: Some(job),
            priority,
        };
        // Detached: completion is observed through the task state, not the handle.
        drop(self.handle.spawn_blocking(move || job.run()));
    }
}

/// A submitted job that reports being dropped without running, which is
/// what tokio does with work spawned after its runtime has shut down.
struct PendingJob {
    job: Option<Job>,
    priority: TaskPriority,
}

impl PendingJob {
    fn run(mut self) {
        if let Some(job) = self.job.take() {
            job();
        }
    }
}

impl Drop for PendingJob {
    fn drop(&mut self) {
        if self.job.is_some() {
            log::warn!(
                "{:?} async job dropped without running: the tokio runtime is shut down",
                self.priority
            );
        }
    }
}

/// Holds submitted jobs until the host explicitly runs them.
///
/// Useful for hosts that want async work to happen at a well-defined point
/// of their frame, and for deterministic tests of task chaining.
#[derive(Default)]
pub struct ManualSubmitter {
    queue: Mutex<VecDeque<(TaskPriority, Job)>>,
}

impl ManualSubmitter {
    /// Creates an empty submitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to be run.
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Priorities of the waiting jobs, oldest first.
    pub fn pending_priorities(&self) -> Vec<TaskPriority> {
        lock(&self.queue).iter().map(|(priority, _)| *priority).collect()
    }

    /// Runs the oldest waiting job on the calling thread.
    ///
    /// Returns `false` when nothing was waiting.
    pub fn run_next(&self) -> bool {
        // The lock is released before the job runs so the job may submit more work.
        let next = lock(&self.queue).pop_front();
        match next {
            Some((_, job)) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs until the queue is empty, including jobs submitted by the
    /// jobs being run. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl fmt::Debug for ManualSubmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualSubmitter")
            .field("pending", &self.pending())
            .finish()
    }
}

impl WorkSubmitter for ManualSubmitter {
    fn submit(&self, priority: TaskPriority, job: Job) {
        lock(&self.queue).push_back((priority, job));
    }
}
