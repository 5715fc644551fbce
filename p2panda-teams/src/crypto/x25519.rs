// SPDX-License-Identifier: MIT OR Apache-2.0

//! Elliptic-curve Diffie–Hellman (ECDH) key agreement over Curve25519 (X25519).
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::secret::Secret;

pub const SECRET_KEY_SIZE: usize = 32;

pub const PUBLIC_KEY_SIZE: usize = 32;

/// Secret X25519 key, used both for per-user keys and for the encryption half of a per-team key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey(Secret<SECRET_KEY_SIZE>);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        Self(Secret::from_bytes(bytes))
    }

    pub fn public_key(&self) -> PublicKey {
        let secret = x25519_dalek::StaticSecret::from(*self.0.as_bytes());
        PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }

    /// Computes the shared secret with the other party.
    ///
    /// Fails if their public key is a low-order point which would lead to a predictable, all-zero
    /// agreement.
    pub fn calculate_agreement(
        &self,
        their_public: &PublicKey,
    ) -> Result<Secret<SECRET_KEY_SIZE>, X25519Error> {
        let secret = x25519_dalek::StaticSecret::from(*self.0.as_bytes());
        let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(their_public.0));
        if !shared.was_contributory() {
            return Err(X25519Error::NonContributory);
        }
        Ok(Secret::from_bytes(shared.to_bytes()))
    }
}

/// Public X25519 key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes")] [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, Error)]
pub enum X25519Error {
    #[error("key agreement with low-order public key")]
    NonContributory,
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;

    use super::{PublicKey, SecretKey, X25519Error};

    #[test]
    fn diffie_hellman() {
        let rng = Rng::from_seed([1; 32]);

        let alice = SecretKey::from_bytes(rng.random_array().unwrap());
        let bob = SecretKey::from_bytes(rng.random_array().unwrap());

        let alice_shared = alice.calculate_agreement(&bob.public_key()).unwrap();
        let bob_shared = bob.calculate_agreement(&alice.public_key()).unwrap();
        assert_eq!(alice_shared, bob_shared);
    }

    #[test]
    fn reject_low_order_point() {
        let alice = SecretKey::from_bytes([9; 32]);
        assert!(matches!(
            alice.calculate_agreement(&PublicKey::from_bytes([0; 32])),
            Err(X25519Error::NonContributory)
        ));
    }
}
