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

use khora_core::OwnerId;

/// An error that can occur within the [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// Sync tasks were drained with a token from a different owning thread.
    #[error("sync tasks belong to owner {expected:?}, but were drained by owner {found:?}")]
    NotOwningThread {
        /// The owner the scheduler was built for.
        expected: OwnerId,
        /// The owner whose token was presented.
        found: OwnerId,
    },
    /// No tokio runtime is reachable from the calling thread.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}
