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

//! Contracts for handing work to execution contexts.
//!
//! The scheduler never manages threads itself. Anything that must run "on some
//! worker thread" is boxed as a [`Job`] and handed to a [`WorkSubmitter`],
//! together with a [`TaskPriority`] hint the submitter is free to ignore.
//!
//! User callbacks report failure by panicking. Every boundary that invokes a
//! user callback goes through [`run_guarded`], which catches the unwind and
//! turns it into a log line, so a failing callback never takes down the
//! owning thread or a worker.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// A unit of work that runs exactly once on whichever thread receives it.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling hint attached to submitted work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskPriority {
    /// Work someone is actively waiting on.
    Normal,
    /// Background work that may yield to everything else.
    #[default]
    Low,
}

impl TaskPriority {
    /// Maps the "is this important" flag used by the task factories.
    pub fn from_important(important: bool) -> Self {
        if important {
            TaskPriority::Normal
        } else {
            TaskPriority::Low
        }
    }
}

/// A fire-and-forget facility that runs jobs on some worker thread.
///
/// Implementations must eventually run every submitted job unless the process
/// is shutting down. No ordering between jobs is implied.
pub trait WorkSubmitter: Send + Sync {
    /// Hands `job` over for execution at an unspecified future time.
    fn submit(&self, priority: TaskPriority, job: Job);
}

impl fmt::Debug for dyn WorkSubmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WorkSubmitter")
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs `callback`, catching any panic and reporting it under `context`.
///
/// Returns `Err` with the panic message when the callback panicked. The error
/// has already been logged; callers only need it when they route it further.
pub fn run_guarded<F>(context: &str, callback: F) -> Result<(), String>
where
    F: FnOnce(),
{
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => Ok(()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("{context}: {message}");
            Err(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_maps_important_flag() {
        assert_eq!(TaskPriority::from_important(true), TaskPriority::Normal);
        assert_eq!(TaskPriority::from_important(false), TaskPriority::Low);
        assert_eq!(TaskPriority::default(), TaskPriority::Low);
    }

    #[test]
    fn run_guarded_passes_through_success() {
        let mut ran = false;
        assert!(run_guarded("test", || ran = true).is_ok());
        assert!(ran);
    }

    #[test]
    fn run_guarded_reports_static_and_formatted_panics() {
        let err = run_guarded("test", || panic!("static message")).unwrap_err();
        assert_eq!(err, "static message");

        let code = 7;
        let err = run_guarded("test", || panic!("code {code}")).unwrap_err();
        assert_eq!(err, "code 7");
    }

    #[test]
    fn panic_message_handles_foreign_payloads() {
        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
