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

//! Async tasks: callbacks run on worker threads, optionally chained.
//!
//! Each task moves through `Unstarted → Running → Done` exactly once. A task
//! may carry a follow-up, which is started as soon as the task finishes, so a
//! sequence of tasks forms a singly-linked chain of pending work.
//!
//! All state lives behind a mutex private to the task. Chain walks lock one
//! node at a time and iterate instead of recursing, so unrelated chains never
//! contend and long chains cannot overflow the stack.

use crate::lock;
use khora_core::task::{run_guarded, Job, TaskPriority, WorkSubmitter};
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

enum TaskState {
    Unstarted {
        job: Option<Job>,
        follow_up: Option<AsyncTask>,
    },
    Running {
        follow_up: Option<AsyncTask>,
    },
    /// The follow-up stays linked so later chain walks can reach it.
    Done {
        follow_up: Option<AsyncTask>,
    },
}

impl TaskState {
    fn name(&self) -> &'static str {
        match self {
            TaskState::Unstarted { .. } => "Unstarted",
            TaskState::Running { .. } => "Running",
            TaskState::Done { .. } => "Done",
        }
    }
}

struct AsyncTaskInner {
    priority: TaskPriority,
    submitter: Arc<dyn WorkSubmitter>,
    state: Mutex<TaskState>,
}

/// Where a chain walk stopped.
enum ChainStep {
    Descend(AsyncTask),
    Absorb,
    Followed,
    Launch,
}

/// A handle to a callback that runs on a worker thread.
///
/// Handles are cheap to clone; all clones refer to the same task.
#[derive(Clone)]
pub struct AsyncTask {
    inner: Arc<AsyncTaskInner>,
}

impl AsyncTask {
    pub(crate) fn new(
        job: Job,
        follow_up: Option<AsyncTask>,
        priority: TaskPriority,
        submitter: Arc<dyn WorkSubmitter>,
    ) -> Self {
        Self {
            inner: Arc::new(AsyncTaskInner {
                priority,
                submitter,
                state: Mutex::new(TaskState::Unstarted {
                    job: Some(job),
                    follow_up,
                }),
            }),
        }
    }

    /// The scheduling hint this task is submitted with.
    pub fn priority(&self) -> TaskPriority {
        self.inner.priority
    }

    /// Whether the task has been launched (it may also have finished).
    pub fn has_started(&self) -> bool {
        !matches!(*lock(&self.inner.state), TaskState::Unstarted { .. })
    }

    /// Whether the task's callback has returned or panicked.
    pub fn is_done(&self) -> bool {
        matches!(*lock(&self.inner.state), TaskState::Done { .. })
    }

    /// Whether both handles refer to the same task.
    pub fn ptr_eq(&self, other: &AsyncTask) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Launches the task on a worker thread.
    ///
    /// Only an unstarted task is launched; calling this on a running or
    /// finished task does nothing, so a callback never executes twice.
    pub fn run(&self) {
        let job = {
            let mut state = lock(&self.inner.state);
            match mem::replace(&mut *state, TaskState::Done { follow_up: None }) {
                TaskState::Unstarted { job, follow_up } => {
                    *state = TaskState::Running { follow_up };
                    job
                }
                other => {
                    log::trace!("Ignoring run() on a task in state {}", other.name());
                    *state = other;
                    return;
                }
            }
        };

        let task = self.clone();
        self.inner
            .submitter
            .submit(self.inner.priority, Box::new(move || task.execute(job)));
    }

    /// Worker-thread body: run the job, mark done, start the follow-up.
    fn execute(&self, job: Option<Job>) {
        if let Some(job) = job {
            let _ = run_guarded("Running asynchronous task", job);
        }

        let follow_up = {
            let mut state = lock(&self.inner.state);
            let follow_up = match mem::replace(&mut *state, TaskState::Done { follow_up: None }) {
                TaskState::Running { follow_up } => follow_up,
                other => {
                    log::warn!("Asynchronous task finished in state {}", other.name());
                    None
                }
            };
            *state = TaskState::Done {
                follow_up: follow_up.clone(),
            };
            follow_up
        };

        if let Some(next) = follow_up {
            next.run();
        }
    }

    /// Arranges for `item` to run once this task and every follow-up already
    /// attached to it have finished.
    ///
    /// An existing follow-up is never overwritten: `item` is appended behind
    /// the last task of the chain. If that last task has already finished,
    /// `item` is launched immediately.
    pub fn follow_with(&self, item: AsyncTask) {
        let mut node = self.clone();
        loop {
            let next = {
                let mut state = lock(&node.inner.state);
                match &mut *state {
                    TaskState::Unstarted {
                        follow_up: Some(next),
                        ..
                    }
                    | TaskState::Running {
                        follow_up: Some(next),
                    }
                    | TaskState::Done {
                        follow_up: Some(next),
                    } => Some(next.clone()),
                    TaskState::Unstarted { follow_up, .. } | TaskState::Running { follow_up } => {
                        *follow_up = Some(item);
                        return;
                    }
                    TaskState::Done { follow_up: None } => None,
                }
            };

            match next {
                Some(next) => node = next,
                None => {
                    item.run();
                    return;
                }
            }
        }
    }

    /// Replaces the pending tail of this chain with `item`, or follows it.
    ///
    /// Walks to the last task of the chain, finished links included, then:
    /// - tail not started: the tail takes over `item`'s callback and
    ///   follow-up in place, and the tail is returned;
    /// - tail running: `item` becomes its follow-up and is returned;
    /// - tail finished: `item` is launched immediately and returned.
    ///
    /// Repeated calls before the pending tail starts therefore collapse into
    /// a single execution carrying the latest callback.
    pub fn replace_or_follow_with(&self, item: AsyncTask) -> AsyncTask {
        let mut node = self.clone();
        loop {
            let step = {
                let mut state = lock(&node.inner.state);
                match &mut *state {
                    TaskState::Unstarted {
                        follow_up: Some(next),
                        ..
                    }
                    | TaskState::Running {
                        follow_up: Some(next),
                    }
                    | TaskState::Done {
                        follow_up: Some(next),
                    } => ChainStep::Descend(next.clone()),
                    TaskState::Unstarted { .. } => ChainStep::Absorb,
                    TaskState::Running { follow_up } => {
                        *follow_up = Some(item.clone());
                        ChainStep::Followed
                    }
                    TaskState::Done { follow_up: None } => ChainStep::Launch,
                }
            };

            match step {
                ChainStep::Descend(next) => node = next,
                ChainStep::Absorb => {
                    if node.ptr_eq(&item) {
                        return node;
                    }
                    // Only one task lock is held at a time: the payload leaves
                    // `item` before the tail is locked again.
                    let Some((job, follow_up)) = item.take_unstarted() else {
                        log::warn!("Replacement task already started; keeping the pending task");
                        return node;
                    };
                    match node.absorb(job, follow_up) {
                        Ok(()) => return node,
                        // The tail moved on meanwhile; walk again from it.
                        Err((job, follow_up)) => item.restore(job, follow_up),
                    }
                }
                ChainStep::Followed => return item,
                ChainStep::Launch => {
                    item.run();
                    return item;
                }
            }
        }
    }

    /// Moves the payload out of an unstarted task, leaving it empty.
    fn take_unstarted(&self) -> Option<(Option<Job>, Option<AsyncTask>)> {
        let mut state = lock(&self.inner.state);
        match &mut *state {
            TaskState::Unstarted { job, follow_up } => Some((job.take(), follow_up.take())),
            _ => None,
        }
    }

    /// Installs a payload into this task if it is still an unstarted tail.
    fn absorb(
        &self,
        job: Option<Job>,
        follow_up: Option<AsyncTask>,
    ) -> Result<(), (Option<Job>, Option<AsyncTask>)> {
        let mut state = lock(&self.inner.state);
        match &mut *state {
            TaskState::Unstarted {
                job: slot,
                follow_up: next,
            } if next.is_none() => {
                *slot = job;
                *next = follow_up;
                Ok(())
            }
            _ => Err((job, follow_up)),
        }
    }

    /// Gives back a payload taken by [`take_unstarted`](Self::take_unstarted).
    fn restore(&self, job: Option<Job>, follow_up: Option<AsyncTask>) {
        let mut state = lock(&self.inner.state);
        match &mut *state {
            TaskState::Unstarted {
                job: slot,
                follow_up: next,
            } => {
                *slot = job;
                *next = follow_up;
            }
            other => log::warn!(
                "Replacement task was started while being absorbed (state {}); its callback is dropped",
                other.name()
            ),
        }
    }
}

impl fmt::Debug for AsyncTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncTask")
            .field("priority", &self.inner.priority)
            .field("state", &lock(&self.inner.state).name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::ManualSubmitter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(
        submitter: &Arc<ManualSubmitter>,
        counter: &Arc<AtomicUsize>,
    ) -> AsyncTask {
        let counter = counter.clone();
        AsyncTask::new(
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            None,
            TaskPriority::Low,
            submitter.clone(),
        )
    }

    #[test]
    fn new_task_is_unstarted() {
        let submitter = Arc::new(ManualSubmitter::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&submitter, &counter);

        assert!(!task.has_started());
        assert!(!task.is_done());
        assert_eq!(submitter.pending(), 0);
        assert_eq!(format!("{task:?}"), "AsyncTask { priority: Low, state: \"Unstarted\" }");
    }

    #[test]
    fn run_transitions_through_running_to_done() {
        let submitter = Arc::new(ManualSubmitter::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&submitter, &counter);

        task.run();
        assert!(task.has_started());
        assert!(!task.is_done());

        submitter.run_pending();
        assert!(task.is_done());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_after_done_does_not_execute_again() {
        let submitter = Arc::new(ManualSubmitter::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&submitter, &counter);

        task.run();
        submitter.run_pending();
        task.run();
        assert_eq!(submitter.pending(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_follow_with_queues_behind_the_first() {
        let submitter = Arc::new(ManualSubmitter::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let make = |label: &'static str| {
            let order = order.clone();
            AsyncTask::new(
                Box::new(move || order.lock().unwrap().push(label)),
                None,
                TaskPriority::Low,
                submitter.clone(),
            )
        };

        let head = make("head");
        head.follow_with(make("first"));
        head.follow_with(make("second"));
        head.run();
        submitter.run_pending();

        assert_eq!(*order.lock().unwrap(), vec!["head", "first", "second"]);
    }

    #[test]
    fn replacing_with_itself_is_a_no_op() {
        let submitter = Arc::new(ManualSubmitter::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&submitter, &counter);

        let result = task.replace_or_follow_with(task.clone());
        assert!(result.ptr_eq(&task));

        task.run();
        submitter.run_pending();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn started_replacement_is_not_absorbed() {
        let submitter = Arc::new(ManualSubmitter::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let pending = counting_task(&submitter, &counter);
        let already_running = counting_task(&submitter, &counter);
        already_running.run();

        let result = pending.replace_or_follow_with(already_running.clone());
        assert!(result.ptr_eq(&pending));

        pending.run();
        submitter.run_pending();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
