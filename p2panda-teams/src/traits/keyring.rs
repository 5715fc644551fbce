// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::crypto::x25519::SecretKey;
use crate::types::{Seqno, UserVersion};

/// Our own rotating per-user encryption keys.
pub trait PerUserKeyring {
    type Error: Error + Send + Sync + 'static;

    /// Brings the local keyring up to date with the server.
    ///
    /// Needs to be called before a lookup, otherwise recently rotated keys might be missing.
    fn sync(&self, me: &UserVersion) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn encryption_key(
        &self,
        me: &UserVersion,
        seqno: Seqno,
    ) -> impl Future<Output = Result<Option<SecretKey>, Self::Error>> + Send;
}
