// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed test chains, a scripted server and an in-memory keyring to test loaders with.
mod chain;
mod keyring;
mod server;

use crate::crypto::x25519::SecretKey;
use crate::loader::{LoaderError, TeamLoader};
use crate::memory_store::MemoryStore;
use crate::types::{UserId, UserVersion};

pub use chain::{TestTeam, TestVerifier, TestVerifierError, VerifierCall};
pub use keyring::{TestKeyring, TestKeyringError};
pub use server::{TestServer, TestServerError};

pub type TestLoader = TeamLoader<MemoryStore, TestVerifier, TestServer, TestKeyring>;

pub type TestLoaderError = LoaderError<MemoryStore, TestVerifier, TestServer, TestKeyring>;

/// Member with a single per-user key at seqno 1.
#[derive(Clone, Debug)]
pub struct TestUser {
    pub me: UserVersion,
    pub per_user_key: SecretKey,
}

impl TestUser {
    pub fn new(id: u8) -> Self {
        Self {
            me: UserVersion::new(UserId::from_bytes([id; 16]), 1),
            per_user_key: SecretKey::from_bytes([id; 32]),
        }
    }

    /// Keyring containing our per-user key.
    pub fn keyring(&self) -> TestKeyring {
        let keyring = TestKeyring::new();
        keyring.insert(self.me, 1, self.per_user_key.clone());
        keyring
    }
}

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}
