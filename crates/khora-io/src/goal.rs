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

//! Streaming goals: "load this resource, then do this with the bytes".

use khora_core::task::{run_guarded, Job};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Callback receiving the complete bytes of a streamed resource.
pub type ProcessFn = Box<dyn FnOnce(Vec<u8>) + Send + 'static>;
/// Callback invoked when the resource does not exist.
pub type MissingFn = Box<dyn FnOnce() + Send + 'static>;
/// Callback receiving an error message.
pub type ErrorFn = Box<dyn FnOnce(String) + Send + 'static>;

/// Where a goal currently is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GoalStatus {
    /// Waiting in the streaming queue.
    Queued = 0,
    /// The streaming thread is reading the resource.
    Reading = 1,
    /// Bytes were read and processing has been scheduled.
    Dispatched = 2,
    /// The process callback returned.
    Complete = 3,
    /// The resource does not exist.
    Missing = 4,
    /// Reading, dispatching or processing failed.
    Failed = 5,
}

impl GoalStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => GoalStatus::Queued,
            1 => GoalStatus::Reading,
            2 => GoalStatus::Dispatched,
            3 => GoalStatus::Complete,
            4 => GoalStatus::Missing,
            _ => GoalStatus::Failed,
        }
    }

    /// Whether the goal has reached a final state.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            GoalStatus::Complete | GoalStatus::Missing | GoalStatus::Failed
        )
    }
}

#[derive(Debug)]
struct StatusCell(AtomicU8);

impl StatusCell {
    fn get(&self) -> GoalStatus {
        GoalStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, status: GoalStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}

/// An observer for a submitted goal.
#[derive(Debug, Clone)]
pub struct GoalHandle {
    name: Arc<str>,
    route_to_owning_thread: bool,
    status: Arc<StatusCell>,
}

impl GoalHandle {
    /// The resource name the goal streams.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether processing happens on the owning thread.
    pub fn routes_to_owning_thread(&self) -> bool {
        self.route_to_owning_thread
    }

    /// The goal's current status.
    pub fn status(&self) -> GoalStatus {
        self.status.get()
    }

    /// Whether the goal reached a final state.
    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }
}

/// A request to stream one named resource.
///
/// Built with [`StreamGoal::new`] and the chained setters, then handed to
/// [`AssetStreamingEngine::submit`](crate::AssetStreamingEngine::submit).
pub struct StreamGoal {
    name: Arc<str>,
    route_to_owning_thread: bool,
    process_data: ProcessFn,
    sync_follow_up: Option<Job>,
    on_missing: Option<MissingFn>,
    on_error: Option<ErrorFn>,
    status: Arc<StatusCell>,
}

impl StreamGoal {
    /// Creates a goal that hands the bytes of `name` to `process_data` on a
    /// worker thread.
    pub fn new<F>(name: impl Into<String>, process_data: F) -> Self
    where
        F: FnOnce(Vec<u8>) + Send + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            route_to_owning_thread: false,
            process_data: Box::new(process_data),
            sync_follow_up: None,
            on_missing: None,
            on_error: None,
            status: Arc::new(StatusCell(AtomicU8::new(GoalStatus::Queued as u8))),
        }
    }

    /// Runs `process_data` on the owning thread instead of a worker thread.
    pub fn route_to_owning_thread(mut self, route: bool) -> Self {
        self.route_to_owning_thread = route;
        self
    }

    /// Called instead of the error path when the resource does not exist.
    pub fn on_missing<F>(mut self, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_missing = Some(Box::new(handler));
        self
    }

    /// Called with a message when the goal fails. Without one, failures are
    /// logged.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(String) + Send + 'static,
    {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Runs on the owning thread right after `process_data` returns.
    ///
    /// Only honoured for goals routed to the owning thread.
    pub fn sync_follow_up<F>(mut self, follow_up: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.sync_follow_up = Some(Box::new(follow_up));
        self
    }

    /// The resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether processing happens on the owning thread.
    pub fn routes_to_owning_thread(&self) -> bool {
        self.route_to_owning_thread
    }

    /// An observer for this goal.
    pub fn handle(&self) -> GoalHandle {
        GoalHandle {
            name: self.name.clone(),
            route_to_owning_thread: self.route_to_owning_thread,
            status: self.status.clone(),
        }
    }

    pub(crate) fn mark(&self, status: GoalStatus) {
        self.status.set(status);
    }

    /// Splits the goal into the processing job for `data` and what is left
    /// to report a failure.
    pub(crate) fn into_dispatch(self, data: Vec<u8>) -> (Job, GoalFailure) {
        let StreamGoal {
            name,
            route_to_owning_thread,
            process_data,
            sync_follow_up,
            on_missing,
            on_error,
            status,
        } = self;

        let sync_follow_up = if route_to_owning_thread {
            sync_follow_up
        } else {
            if sync_follow_up.is_some() {
                log::debug!("Ignoring sync follow-up of '{name}': goal is not routed to the owning thread");
            }
            None
        };

        let job_name = name.clone();
        let job_status = status.clone();
        let job: Job = Box::new(move || {
            let processed = run_guarded(
                &format!("Processing streamed asset '{job_name}' failed"),
                move || process_data(data),
            );
            if processed.is_err() {
                job_status.set(GoalStatus::Failed);
                return;
            }
            job_status.set(GoalStatus::Complete);
            if let Some(follow_up) = sync_follow_up {
                let _ = run_guarded(
                    &format!("Sync follow-up of streamed asset '{job_name}' failed"),
                    follow_up,
                );
            }
        });

        let failure = GoalFailure {
            name,
            on_missing,
            on_error,
            status,
        };
        (job, failure)
    }

    pub(crate) fn into_failure(self) -> GoalFailure {
        GoalFailure {
            name: self.name,
            on_missing: self.on_missing,
            on_error: self.on_error,
            status: self.status,
        }
    }
}

impl fmt::Debug for StreamGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamGoal")
            .field("name", &self.name)
            .field("route_to_owning_thread", &self.route_to_owning_thread)
            .field("has_on_missing", &self.on_missing.is_some())
            .field("has_on_error", &self.on_error.is_some())
            .field("status", &self.status.get())
            .finish()
    }
}

/// The failure-reporting half of a goal.
pub(crate) struct GoalFailure {
    name: Arc<str>,
    on_missing: Option<MissingFn>,
    on_error: Option<ErrorFn>,
    status: Arc<StatusCell>,
}

impl GoalFailure {
    /// Reports that the resource does not exist.
    ///
    /// The status is published once the handler has returned.
    pub(crate) fn missing(self) {
        match self.on_missing {
            Some(handler) => {
                let _ = run_guarded(
                    "Exception in asset streaming error handler (caused by: file not found)",
                    handler,
                );
            }
            None => {
                let message = format!("File '{}' not found.", self.name);
                report_error(self.on_error, message);
            }
        }
        self.status.set(GoalStatus::Missing);
    }

    /// Reports a read or dispatch failure.
    pub(crate) fn error(self, message: String) {
        report_error(self.on_error, message);
        self.status.set(GoalStatus::Failed);
    }
}

fn report_error(on_error: Option<ErrorFn>, message: String) {
    match on_error {
        Some(handler) => {
            let context = format!("Exception in asset streaming error handler (caused by: {message})");
            let _ = run_guarded(&context, move || handler(message));
        }
        None => log::error!("Asset streaming engine encountered error: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn builder_sets_routing_and_name() {
        let goal = StreamGoal::new("models/tree.obj", |_| {}).route_to_owning_thread(true);
        assert_eq!(goal.name(), "models/tree.obj");
        assert!(goal.routes_to_owning_thread());

        let handle = goal.handle();
        assert_eq!(handle.name(), "models/tree.obj");
        assert!(handle.routes_to_owning_thread());
        assert_eq!(handle.status(), GoalStatus::Queued);
        assert!(!handle.is_finished());
    }

    #[test]
    fn missing_without_handler_falls_back_to_on_error() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        let goal = StreamGoal::new("ghost", |_| panic!("must not process"))
            .on_error(move |msg| sink.lock().unwrap().push(msg));
        let handle = goal.handle();

        goal.into_failure().missing();

        assert_eq!(*messages.lock().unwrap(), vec!["File 'ghost' not found.".to_string()]);
        assert_eq!(handle.status(), GoalStatus::Missing);
    }

    #[test]
    fn status_is_published_after_the_handler_returns() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let missing = StreamGoal::new("ghost", |_| {});
        let missing_handle = missing.handle();
        let (observer, sink) = (missing_handle.clone(), seen.clone());
        missing
            .on_missing(move || sink.lock().unwrap().push(observer.status()))
            .into_failure()
            .missing();

        let broken = StreamGoal::new("broken", |_| {});
        let broken_handle = broken.handle();
        let (observer, sink) = (broken_handle.clone(), seen.clone());
        broken
            .on_error(move |_| sink.lock().unwrap().push(observer.status()))
            .into_failure()
            .error("disk unplugged".into());

        // Neither handler saw a finished goal.
        assert_eq!(*seen.lock().unwrap(), vec![GoalStatus::Queued, GoalStatus::Queued]);
        assert_eq!(missing_handle.status(), GoalStatus::Missing);
        assert_eq!(broken_handle.status(), GoalStatus::Failed);
    }

    #[test]
    fn panicking_error_handler_is_contained() {
        let goal = StreamGoal::new("broken", |_| {}).on_error(|_| panic!("handler failure"));
        let handle = goal.handle();
        goal.into_failure().error("disk unplugged".into());
        assert_eq!(handle.status(), GoalStatus::Failed);
    }

    #[test]
    fn dispatch_job_processes_then_follows_up() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let process_order = order.clone();
        let follow_order = order.clone();
        let goal = StreamGoal::new("a", move |bytes| {
            process_order.lock().unwrap().push(format!("process {}", bytes.len()))
        })
        .route_to_owning_thread(true)
        .sync_follow_up(move || follow_order.lock().unwrap().push("follow-up".into()));
        let handle = goal.handle();

        let (job, _failure) = goal.into_dispatch(vec![1, 2, 3]);
        job();

        assert_eq!(*order.lock().unwrap(), vec!["process 3", "follow-up"]);
        assert_eq!(handle.status(), GoalStatus::Complete);
    }

    #[test]
    fn failed_processing_skips_follow_up() {
        let followed = Arc::new(Mutex::new(false));
        let flag = followed.clone();
        let goal = StreamGoal::new("a", |_| panic!("decode failure"))
            .route_to_owning_thread(true)
            .sync_follow_up(move || *flag.lock().unwrap() = true);
        let handle = goal.handle();

        let (job, _failure) = goal.into_dispatch(Vec::new());
        job();

        assert!(!*followed.lock().unwrap());
        assert_eq!(handle.status(), GoalStatus::Failed);
    }

    #[test]
    fn follow_up_is_dropped_for_worker_routed_goals() {
        let followed = Arc::new(Mutex::new(false));
        let flag = followed.clone();
        let goal = StreamGoal::new("c", |_| {}).sync_follow_up(move || *flag.lock().unwrap() = true);

        let (job, _failure) = goal.into_dispatch(vec![0]);
        job();

        assert!(!*followed.lock().unwrap());
    }
}
