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

use std::io;

/// An error that can occur while starting or stopping the streaming engine.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    /// `init` was called while the streaming thread is already running.
    #[error("the asset streaming thread is already running")]
    AlreadyRunning,
    /// The operating system refused to create the streaming thread.
    #[error("failed to spawn the asset streaming thread: {0}")]
    ThreadSpawn(#[source] io::Error),
    /// The streaming thread panicked outside of goal processing.
    #[error("the asset streaming thread panicked")]
    WorkerPanicked,
}
