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

//! The public-facing SDK of the Khora runtime.
//!
//! [`Runtime`] owns the scheduler, the asset streaming engine and the async
//! worker pool; the host application drives it by calling
//! [`Runtime::tick`] once per frame from the thread that created it.

#![warn(missing_docs)]

mod config;
mod logging;
mod runtime;

pub use config::RuntimeConfig;
pub use logging::init_logging;
pub use runtime::Runtime;

/// Commonly used types, re-exported for convenience.
pub mod prelude {
    pub use crate::{init_logging, Runtime, RuntimeConfig};
    pub use khora_core::{OwningThread, TaskPriority};
    pub use khora_io::{GoalHandle, GoalStatus, MemoryStorage, StreamGoal, StreamingConfig};
    pub use khora_scheduler::{AsyncTask, Scheduler, SyncTask};
}
