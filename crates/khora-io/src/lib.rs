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

//! # Khora IO
//!
//! Streams named resources from an [`AssetStorage`](khora_core::vfs::AssetStorage)
//! on one dedicated thread, then hands the bytes to the
//! [`Scheduler`](khora_scheduler::Scheduler) for processing, either on the
//! owning thread or on a worker thread.

#![warn(missing_docs)]

mod engine;
mod error;
mod goal;
pub mod storage;

pub use engine::{AssetStreamingEngine, GoalQueue, StreamingConfig};
pub use error::StreamingError;
pub use goal::{ErrorFn, GoalHandle, GoalStatus, MissingFn, ProcessFn, StreamGoal};
pub use storage::{DirectoryStorage, MemoryStorage};
