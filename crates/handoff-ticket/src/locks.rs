// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-key async mutexes.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes async work per key without a global lock.
#[derive(Debug)]
pub(crate) struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub(crate) async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drops locks nobody holds or waits on.
    ///
    /// A lock is only handed out while its shard is locked, so a strong
    /// count of one here means no guard or waiter exists.
    pub(crate) fn prune(&self) {
        self.locks.retain(|_, m| Arc::strong_count(m) > 1);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let locks = KeyedLocks::new();
        let guard = locks.lock(&"a").await;
        drop(locks.lock(&"b").await);

        locks.prune();
        assert_eq!(locks.len(), 1);

        drop(guard);
        locks.prune();
        assert_eq!(locks.len(), 0);
    }
}
