// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exclusive locks keyed by an identifier.
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

type Locks<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// Table of exclusive locks, one per key.
///
/// At most one [`Lock`] per key exists at any time. Acquiring a held key waits until the holder
/// releases it, keys never contend with each other. Entries are created on first use and removed
/// again as soon as nobody holds or waits for them.
///
/// Waiting is cancelled by dropping the future returned by [`LockTable::acquire`], a lock is
/// released by dropping it or calling [`Lock::release`]. Since releasing consumes the lock it can
/// not be released twice.
#[derive(Debug)]
pub struct LockTable<K> {
    locks: Locks<K>,
}

impl<K> LockTable<K>
where
    K: Clone + Debug + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            locks: Arc::default(),
        }
    }

    pub async fn acquire(&self, key: K) -> Lock<K> {
        let mutex = {
            let mut locks = lock_map(&self.locks);
            locks.entry(key.clone()).or_default().clone()
        };

        trace!(?key, "acquire lock");
        let guard = mutex.lock_owned().await;
        trace!(?key, "lock acquired");

        Lock {
            key,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Number of keys which are currently held or waited for.
    pub fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Default for LockTable<K>
where
    K: Clone + Debug + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive lock on one key of a [`LockTable`].
#[derive(Debug)]
pub struct Lock<K>
where
    K: Clone + Debug + Eq + Hash,
{
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Locks<K>,
}

impl<K> Lock<K>
where
    K: Clone + Debug + Eq + Hash,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn release(self) {
        drop(self);
    }
}

impl<K> Drop for Lock<K>
where
    K: Clone + Debug + Eq + Hash,
{
    fn drop(&mut self) {
        // Unlock before looking at the table, waiters hold their own reference to the mutex.
        drop(self.guard.take());

        let mut locks = lock_map(&self.locks);
        let unused = locks
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1);
        if unused {
            locks.remove(&self.key);
        }
        trace!(key = ?self.key, "lock released");
    }
}

// The map is only modified by single insert and remove calls, a panicking holder can't leave it
// in an inconsistent state.
fn lock_map<K>(locks: &Locks<K>) -> MutexGuard<'_, HashMap<K, Arc<AsyncMutex<()>>>> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::timeout;

    use super::LockTable;

    #[tokio::test]
    async fn exclusive_per_key() {
        let table = LockTable::new();

        let lock = table.acquire("pandas").await;
        assert_eq!(lock.key(), &"pandas");

        // Same key has to wait.
        assert!(
            timeout(Duration::from_millis(20), table.acquire("pandas"))
                .await
                .is_err()
        );

        // Other keys don't contend.
        let other = timeout(Duration::from_millis(20), table.acquire("otters"))
            .await
            .expect("unrelated key is free");
        assert_eq!(table.len(), 2);

        lock.release();
        other.release();
        let lock = timeout(Duration::from_millis(20), table.acquire("pandas"))
            .await
            .expect("key is free after release");
        drop(lock);
    }

    #[tokio::test]
    async fn entries_are_removed_when_unused() {
        let table = LockTable::new();
        assert!(table.is_empty());

        let lock = table.acquire(1).await;
        assert_eq!(table.len(), 1);
        drop(lock);
        assert!(table.is_empty());

        // A cancelled waiter does not leave an entry behind.
        let lock = table.acquire(2).await;
        assert!(
            timeout(Duration::from_millis(10), table.acquire(2))
                .await
                .is_err()
        );
        drop(lock);
        assert!(table.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waiters_are_serialized() {
        let table = Arc::new(LockTable::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = table.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            handles.push(tokio::spawn(async move {
                let _lock = table.acquire("pandas").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(table.is_empty());
    }
}
