// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::crypto::x25519::SecretKey;
use crate::traits::PerUserKeyring;
use crate::types::{Seqno, UserVersion};

/// Per-user keyring holding keys in memory, counting how often it was synced.
#[derive(Clone, Debug, Default)]
pub struct TestKeyring {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    keys: Mutex<HashMap<(UserVersion, Seqno), SecretKey>>,
    syncs: AtomicUsize,
    fail_sync: AtomicBool,
}

impl TestKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, me: UserVersion, seqno: Seqno, key: SecretKey) {
        self.inner.keys.lock().unwrap().insert((me, seqno), key);
    }

    pub fn sync_count(&self) -> usize {
        self.inner.syncs.load(Ordering::SeqCst)
    }

    /// Lets every following sync fail, as if the server was unreachable.
    pub fn fail_sync(&self, fail: bool) {
        self.inner.fail_sync.store(fail, Ordering::SeqCst);
    }
}

impl PerUserKeyring for TestKeyring {
    type Error = TestKeyringError;

    async fn sync(&self, _me: &UserVersion) -> Result<(), Self::Error> {
        self.inner.syncs.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_sync.load(Ordering::SeqCst) {
            return Err(TestKeyringError::SyncFailed);
        }
        Ok(())
    }

    async fn encryption_key(
        &self,
        me: &UserVersion,
        seqno: Seqno,
    ) -> Result<Option<SecretKey>, Self::Error> {
        Ok(self.inner.keys.lock().unwrap().get(&(*me, seqno)).cloned())
    }
}

#[derive(Debug, Error)]
pub enum TestKeyringError {
    #[error("could not sync per-user keyring")]
    SyncFailed,
}
