// SPDX-License-Identifier: MIT OR Apache-2.0

//! Edwards-Curve Digital Signature Algorithm (EdDSA) over Curve25519.
use std::fmt;

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::secret::Secret;

pub const SIGNING_KEY_SIZE: usize = 32;

pub const VERIFYING_KEY_SIZE: usize = 32;

pub const SIGNATURE_SIZE: usize = 64;

/// Secret Ed25519 key, the signing half of a per-team key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningKey(Secret<SIGNING_KEY_SIZE>);

impl SigningKey {
    pub fn from_bytes(bytes: [u8; SIGNING_KEY_SIZE]) -> Self {
        Self(Secret::from_bytes(bytes))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        let key = ed25519_dalek::SigningKey::from_bytes(self.0.as_bytes());
        VerifyingKey(key.verifying_key().to_bytes())
    }

    pub fn sign(&self, bytes: &[u8]) -> Signature {
        let key = ed25519_dalek::SigningKey::from_bytes(self.0.as_bytes());
        Signature(key.sign(bytes).to_bytes())
    }
}

/// Public Ed25519 key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerifyingKey(#[serde(with = "serde_bytes")] [u8; VERIFYING_KEY_SIZE]);

impl VerifyingKey {
    pub fn from_bytes(bytes: [u8; VERIFYING_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VERIFYING_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|_| SignatureError::InvalidKey)?;
        key.verify(bytes, &ed25519_dalek::Signature::from_bytes(&signature.0))
            .map_err(|_| SignatureError::VerificationFailed)
    }
}

impl fmt::Display for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "serde_bytes")] [u8; SIGNATURE_SIZE]);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("bytes do not represent a valid ed25519 public key")]
    InvalidKey,

    #[error("signature does not match public key and payload")]
    VerificationFailed,
}
