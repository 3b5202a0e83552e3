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

use khora_core::vfs::{AssetStorage, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Serves resources from an in-memory table.
///
/// Entries can be added or removed while the streaming thread reads.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the resource `name`.
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let data: Arc<[u8]> = Arc::from(data.into());
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), data);
    }

    /// Removes the resource `name`, returning whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no resources are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<N: Into<String>, D: Into<Vec<u8>>> FromIterator<(N, D)> for MemoryStorage {
    fn from_iter<I: IntoIterator<Item = (N, D)>>(iter: I) -> Self {
        let storage = MemoryStorage::new();
        for (name, data) in iter {
            storage.insert(name, data);
        }
        storage
    }
}

impl AssetStorage for MemoryStorage {
    fn try_read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(name).map(|data| data.to_vec()))
    }

    fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_read_remove() {
        let storage: MemoryStorage = [("a", b"alpha".to_vec())].into_iter().collect();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.try_read("a").unwrap(), Some(b"alpha".to_vec()));

        storage.insert("a", "replaced");
        assert_eq!(storage.try_read("a").unwrap(), Some(b"replaced".to_vec()));

        assert!(storage.remove("a"));
        assert!(!storage.remove("a"));
        assert!(storage.is_empty());
        assert_eq!(storage.try_read("a").unwrap(), None);
    }
}
