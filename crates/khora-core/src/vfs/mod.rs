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

//! Virtual File System contract used by the asset streaming engine.
//!
//! The VFS resolves a resource name to its bytes. It distinguishes a resource
//! that simply does not exist (`Ok(None)`) from one that exists but could not
//! be read (`Err`), because the streaming engine routes those two cases to
//! different handlers.
//!
//! Implementations only need to be callable from the single streaming thread;
//! the `Send + Sync` bound exists so they can be shared behind an `Arc`.

use std::io;
use std::path::PathBuf;

/// An error raised by an [`AssetStorage`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The resource name is empty or escapes the storage root.
    #[error("invalid resource name '{0}'")]
    InvalidName(String),
    /// The resource exists but reading it failed.
    #[error("failed to read '{name}' from {}: {source}", path.display())]
    Io {
        /// The requested resource name.
        name: String,
        /// The backing path that was read.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A backend-specific failure that has no better category.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// A specialized `Result` type for storage reads.
pub type StorageResult<T> = Result<T, StorageError>;

/// Resolves resource names to complete byte buffers.
pub trait AssetStorage: Send + Sync {
    /// Reads the whole resource called `name`.
    ///
    /// Returns `Ok(None)` when no such resource exists. A returned buffer is
    /// always the complete resource, never a partial read.
    fn try_read(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Whether a resource called `name` exists, without reading it.
    fn contains(&self, name: &str) -> bool {
        matches!(self.try_read(name), Ok(Some(_)))
    }
}
