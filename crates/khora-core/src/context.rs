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

//! The owning-thread capability.
//!
//! Exactly one thread drives the per-frame loop and is allowed to drain
//! synchronous work. Instead of comparing ambient thread ids, that right is
//! carried by an [`OwningThread`] token: it is created on the owning thread,
//! it cannot leave it (the type is neither `Send` nor `Sync`), and services
//! remember only its [`OwnerId`] so they can verify the token they are handed.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// A copyable identifier for an [`OwningThread`] token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// The raw numeric value, mostly useful for logging.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Proof that the current code runs on the owning thread.
#[derive(Debug)]
pub struct OwningThread {
    id: OwnerId,
    _not_send: PhantomData<*const ()>,
}

impl OwningThread {
    /// Claims a fresh owning-thread identity for the calling thread.
    ///
    /// Every call yields a distinct id, so two independent runtimes in the
    /// same process never accept each other's token.
    pub fn claim() -> Self {
        let id = NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("Owning thread {:?} claimed identity {id}", std::thread::current().name());
        Self {
            id: OwnerId(id),
            _not_send: PhantomData,
        }
    }

    /// The identifier services store to recognise this token.
    pub fn id(&self) -> OwnerId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claimed_ids_are_unique() {
        let a = OwningThread::claim();
        let b = OwningThread::claim();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.id());
    }
}
