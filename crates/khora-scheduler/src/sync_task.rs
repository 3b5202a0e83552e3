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

use crate::lock;
use crate::scheduler::SchedulerShared;
use khora_core::task::Job;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncPhase {
    Prepared,
    Queued,
    Complete,
}

struct SyncTaskState {
    callback: Option<Job>,
    remaining: f64,
    phase: SyncPhase,
}

/// Result of advancing a queued task by one frame.
pub(crate) enum Advance {
    /// Not due yet; keep it queued.
    Wait,
    /// Due now; the callback must be invoked exactly once.
    Due(Job),
    /// Already consumed; drop it from the queue.
    Discard,
}

/// A callback that runs on the owning thread once its delay has elapsed.
///
/// Returned by the scheduler so callers can inspect or re-time the task while
/// it waits.
pub struct SyncTask {
    state: Mutex<SyncTaskState>,
    scheduler: Weak<SchedulerShared>,
}

impl SyncTask {
    pub(crate) fn prepared(callback: Job, delay: f64, scheduler: Weak<SchedulerShared>) -> Self {
        Self {
            state: Mutex::new(SyncTaskState {
                callback: Some(callback),
                remaining: delay,
                phase: SyncPhase::Prepared,
            }),
            scheduler,
        }
    }

    /// Seconds left before the task becomes due. Zero or below means due.
    pub fn remaining_delay(&self) -> f64 {
        lock(&self.state).remaining
    }

    /// Re-times a task that has not run yet.
    pub fn set_delay(&self, delay: f64) {
        lock(&self.state).remaining = delay;
    }

    /// Whether the task is waiting in the scheduler's queue.
    pub fn is_queued(&self) -> bool {
        lock(&self.state).phase == SyncPhase::Queued
    }

    /// Whether the callback has been invoked.
    pub fn is_complete(&self) -> bool {
        lock(&self.state).phase == SyncPhase::Complete
    }

    /// Queues a prepared task on its scheduler.
    ///
    /// Returns `false` when the task is already queued or has already run, or
    /// when its scheduler no longer exists.
    pub fn schedule(self: &Arc<Self>) -> bool {
        let Some(scheduler) = self.scheduler.upgrade() else {
            log::warn!("Cannot schedule sync task: its scheduler has been dropped");
            return false;
        };

        {
            let mut state = lock(&self.state);
            if state.phase != SyncPhase::Prepared {
                return false;
            }
            state.phase = SyncPhase::Queued;
        }

        scheduler.enqueue(self.clone());
        true
    }

    /// Subtracts `elapsed` and hands out the callback once the task is due.
    pub(crate) fn advance(&self, elapsed: f64) -> Advance {
        let mut state = lock(&self.state);
        if state.phase != SyncPhase::Queued {
            return Advance::Discard;
        }

        state.remaining -= elapsed;
        if state.remaining > 0.0 {
            return Advance::Wait;
        }

        state.phase = SyncPhase::Complete;
        match state.callback.take() {
            Some(callback) => Advance::Due(callback),
            None => Advance::Discard,
        }
    }
}

impl fmt::Debug for SyncTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("SyncTask")
            .field("remaining", &state.remaining)
            .field("phase", &state.phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(delay: f64) -> Arc<SyncTask> {
        let task = SyncTask::prepared(Box::new(|| {}), delay, Weak::new());
        // Stand in for the scheduler accepting it.
        lock(&task.state).phase = SyncPhase::Queued;
        Arc::new(task)
    }

    #[test]
    fn advance_waits_until_delay_is_consumed() {
        let task = detached(1.0);
        assert!(matches!(task.advance(0.4), Advance::Wait));
        assert!((task.remaining_delay() - 0.6).abs() < 1e-9);
        assert!(matches!(task.advance(0.6), Advance::Due(_)));
        assert!(task.is_complete());
        assert!(matches!(task.advance(0.1), Advance::Discard));
    }

    #[test]
    fn negative_delay_is_due_immediately() {
        let task = detached(-3.0);
        assert!(matches!(task.advance(0.0), Advance::Due(_)));
    }

    #[test]
    fn schedule_without_scheduler_fails() {
        let task = Arc::new(SyncTask::prepared(Box::new(|| {}), 0.0, Weak::new()));
        assert!(!task.schedule());
        assert!(!task.is_queued());
    }
}
