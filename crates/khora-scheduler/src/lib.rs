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

//! # Khora Scheduler
//!
//! Moves work onto the right execution context:
//!
//! - **sync tasks** run on the owning thread, once their delay has elapsed,
//!   when the frame loop calls [`Scheduler::run_all_sync_tasks`];
//! - **async tasks** run on worker threads supplied by a
//!   [`WorkSubmitter`](khora_core::task::WorkSubmitter), and can be chained
//!   or coalesced through [`AsyncTask::follow_with`] and
//!   [`AsyncTask::replace_or_follow_with`].
//!
//! ```rust
//! use std::sync::Arc;
//! use khora_core::OwningThread;
//! use khora_scheduler::{ManualSubmitter, Scheduler};
//!
//! let owner = OwningThread::claim();
//! let scheduler = Scheduler::new(owner.id(), Arc::new(ManualSubmitter::new()));
//!
//! scheduler.schedule_sync_task(|| println!("next frame"), 0.0);
//! assert_eq!(scheduler.run_all_sync_tasks(&owner, 1.0 / 60.0).unwrap(), 1);
//! ```

#![warn(missing_docs)]

mod async_task;
mod error;
mod scheduler;
mod submit;
mod sync_task;

pub use async_task::AsyncTask;
pub use error::SchedulerError;
pub use scheduler::Scheduler;
pub use submit::{ManualSubmitter, TokioSubmitter};
pub use sync_task::SyncTask;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a previous holder panicked.
///
/// User callbacks never run while one of these locks is held, so a poisoned
/// lock cannot hold half-updated state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
