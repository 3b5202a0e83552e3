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

//! The frame-driven task scheduler.

use crate::async_task::AsyncTask;
use crate::error::SchedulerError;
use crate::lock;
use crate::sync_task::{Advance, SyncTask};
use crossbeam_channel::{Receiver, Sender};
use khora_core::task::{run_guarded, TaskPriority, WorkSubmitter};
use khora_core::{OwnerId, OwningThread};
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

pub(crate) struct SchedulerShared {
    owner: OwnerId,
    submitter: Arc<dyn WorkSubmitter>,
    /// New sync tasks from any thread, in insertion order.
    inbox_tx: Sender<Arc<SyncTask>>,
    inbox_rx: Receiver<Arc<SyncTask>>,
    /// Tasks carried over between frames. Only touched while draining.
    pending: Mutex<Vec<Arc<SyncTask>>>,
}

impl SchedulerShared {
    pub(crate) fn enqueue(&self, task: Arc<SyncTask>) {
        // Both channel ends live in `self`, so the send cannot fail.
        let _ = self.inbox_tx.send(task);
    }
}

/// Schedules sync tasks for the owning thread and async tasks for workers.
///
/// Sync tasks can be scheduled from any thread, but only run inside
/// [`run_all_sync_tasks`](Scheduler::run_all_sync_tasks), which the owning
/// thread calls once per frame. Async tasks are handed to the
/// [`WorkSubmitter`] given at construction.
///
/// The scheduler is a cheap handle: clones share the same queues.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl Scheduler {
    /// Creates a scheduler whose sync tasks belong to `owner`.
    pub fn new(owner: OwnerId, submitter: Arc<dyn WorkSubmitter>) -> Self {
        let (inbox_tx, inbox_rx) = crossbeam_channel::unbounded();
        log::debug!("Scheduler created for owner {}", owner.get());
        Self {
            shared: Arc::new(SchedulerShared {
                owner,
                submitter,
                inbox_tx,
                inbox_rx,
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The owning thread this scheduler drains sync tasks for.
    pub fn owner(&self) -> OwnerId {
        self.shared.owner
    }

    /// The facility async tasks are submitted to.
    pub fn submitter(&self) -> &Arc<dyn WorkSubmitter> {
        &self.shared.submitter
    }

    /// Creates a sync task without queueing it.
    ///
    /// Call [`SyncTask::schedule`] to queue it later.
    pub fn prepare_sync_task<F>(&self, callback: F, delay: f64) -> Arc<SyncTask>
    where
        F: FnOnce() + Send + 'static,
    {
        Arc::new(SyncTask::prepared(
            Box::new(callback),
            delay,
            Arc::downgrade(&self.shared),
        ))
    }

    /// Queues `callback` to run on the owning thread after `delay` seconds.
    ///
    /// A delay of zero or less runs it on the next frame. Safe to call from
    /// any thread, including from inside another sync task.
    pub fn schedule_sync_task<F>(&self, callback: F, delay: f64) -> Arc<SyncTask>
    where
        F: FnOnce() + Send + 'static,
    {
        let task = self.prepare_sync_task(callback, delay);
        task.schedule();
        task
    }

    /// Number of sync tasks queued and not yet run.
    pub fn pending_sync_tasks(&self) -> usize {
        let carried = lock(&self.shared.pending)
            .iter()
            .filter(|task| task.is_queued())
            .count();
        carried + self.shared.inbox_rx.len()
    }

    /// Advances every queued sync task by `elapsed` seconds and runs the ones
    /// that became due, in insertion order.
    ///
    /// A panicking callback is logged and counted as run; it never stops the
    /// remaining tasks. Tasks that are not due keep their relative order.
    /// Tasks scheduled while this runs, including from inside a callback,
    /// are not part of the current pass and wait for the next frame, even
    /// when their delay is zero.
    ///
    /// Returns how many callbacks were invoked.
    pub fn run_all_sync_tasks(
        &self,
        owner: &OwningThread,
        elapsed: f64,
    ) -> Result<usize, SchedulerError> {
        if owner.id() != self.shared.owner {
            return Err(SchedulerError::NotOwningThread {
                expected: self.shared.owner,
                found: owner.id(),
            });
        }

        let mut queued = mem::take(&mut *lock(&self.shared.pending));
        queued.extend(self.shared.inbox_rx.try_iter());

        let mut survivors = Vec::with_capacity(queued.len());
        let mut executed = 0;
        for task in queued {
            match task.advance(elapsed) {
                Advance::Wait => survivors.push(task),
                Advance::Due(callback) => {
                    let _ = run_guarded("Handling sync task", callback);
                    executed += 1;
                }
                Advance::Discard => {}
            }
        }

        let mut pending = lock(&self.shared.pending);
        // A nested drain from inside a callback may have left tasks behind; they are newer.
        survivors.append(&mut pending);
        *pending = survivors;

        if executed > 0 {
            log::trace!("Ran {executed} sync tasks, {} still waiting", pending.len());
        }
        Ok(executed)
    }

    /// Creates an async task and launches it immediately.
    ///
    /// Unimportant tasks are submitted with [`TaskPriority::Low`].
    pub fn start_async_task<F>(&self, callback: F, important: bool) -> AsyncTask
    where
        F: FnOnce() + Send + 'static,
    {
        let task = AsyncTask::new(
            Box::new(callback),
            None,
            TaskPriority::from_important(important),
            self.shared.submitter.clone(),
        );
        task.run();
        task
    }

    /// Creates an async task without launching it, optionally chained to
    /// `follow_up`.
    pub fn add_async_task<F>(&self, callback: F, follow_up: Option<AsyncTask>) -> AsyncTask
    where
        F: FnOnce() + Send + 'static,
    {
        AsyncTask::new(
            Box::new(callback),
            follow_up,
            TaskPriority::Low,
            self.shared.submitter.clone(),
        )
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("owner", &self.shared.owner)
            .field("pending_sync_tasks", &self.pending_sync_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::ManualSubmitter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scheduler() -> (OwningThread, Scheduler, Arc<ManualSubmitter>) {
        let owner = OwningThread::claim();
        let submitter = Arc::new(ManualSubmitter::new());
        let scheduler = Scheduler::new(owner.id(), submitter.clone());
        (owner, scheduler, submitter)
    }

    #[test]
    fn foreign_owner_cannot_drain() {
        let (_owner, scheduler, _) = scheduler();
        let intruder = OwningThread::claim();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        scheduler.schedule_sync_task(
            move || {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            },
            0.0,
        );

        let err = scheduler.run_all_sync_tasks(&intruder, 0.0).unwrap_err();
        assert!(matches!(err, SchedulerError::NotOwningThread { .. }));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_sync_tasks(), 1);
    }

    #[test]
    fn prepared_task_only_runs_once_scheduled() {
        let (owner, scheduler, _) = scheduler();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let task = scheduler.prepare_sync_task(
            move || {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            },
            0.0,
        );

        assert_eq!(scheduler.run_all_sync_tasks(&owner, 1.0).unwrap(), 0);
        assert!(task.schedule());
        assert!(!task.schedule(), "double schedule must be rejected");
        assert_eq!(scheduler.run_all_sync_tasks(&owner, 0.0).unwrap(), 1);
        assert!(task.is_complete());
        assert!(!task.schedule());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retimed_task_respects_new_delay() {
        let (owner, scheduler, _) = scheduler();
        let task = scheduler.schedule_sync_task(|| {}, 0.0);
        task.set_delay(5.0);

        assert_eq!(scheduler.run_all_sync_tasks(&owner, 1.0).unwrap(), 0);
        assert!((task.remaining_delay() - 4.0).abs() < 1e-9);
        assert_eq!(scheduler.run_all_sync_tasks(&owner, 4.0).unwrap(), 1);
    }

    #[test]
    fn start_async_task_uses_priority_hint() {
        let (_owner, scheduler, submitter) = scheduler();
        let important = scheduler.start_async_task(|| {}, true);
        let background = scheduler.start_async_task(|| {}, false);

        assert_eq!(important.priority(), TaskPriority::Normal);
        assert_eq!(background.priority(), TaskPriority::Low);
        assert_eq!(
            submitter.pending_priorities(),
            vec![TaskPriority::Normal, TaskPriority::Low]
        );
    }

    #[test]
    fn add_async_task_does_not_launch() {
        let (_owner, scheduler, submitter) = scheduler();
        let task = scheduler.add_async_task(|| {}, None);
        assert!(!task.has_started());
        assert_eq!(submitter.pending(), 0);
    }
}
