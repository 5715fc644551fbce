// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic derivation of per-team keypairs from a team secret.
use thiserror::Error;

use crate::crypto::Secret;
use crate::crypto::ed25519::{SigningKey, VerifyingKey};
use crate::crypto::kdf::{HkdfError, PER_TEAM_ENCRYPTION_KEY_INFO, PER_TEAM_SIGNING_KEY_INFO, hkdf};
use crate::crypto::x25519::{PublicKey, SecretKey};
use crate::types::Generation;

/// 256-bit per-team secret delivered in key boxes.
pub const PER_TEAM_KEY_SEED_SIZE: usize = 32;

pub type PerTeamKeySeed = Secret<PER_TEAM_KEY_SEED_SIZE>;

/// Signing and encryption keypair of one per-team key generation.
///
/// The same seed and generation always yield the same keys.
#[derive(Debug)]
pub struct TeamKeyManager {
    generation: Generation,
    signing_key: SigningKey,
    encryption_key: SecretKey,
}

impl TeamKeyManager {
    pub fn from_seed(
        seed: &PerTeamKeySeed,
        generation: Generation,
    ) -> Result<Self, KeyManagerError> {
        let generation_bytes = generation.to_be_bytes();

        let signing_bytes: [u8; 32] = hkdf(
            &[],
            seed.as_bytes(),
            &[PER_TEAM_SIGNING_KEY_INFO, &generation_bytes],
        )?;
        let encryption_bytes: [u8; 32] = hkdf(
            &[],
            seed.as_bytes(),
            &[PER_TEAM_ENCRYPTION_KEY_INFO, &generation_bytes],
        )?;

        Ok(Self {
            generation,
            signing_key: SigningKey::from_bytes(signing_bytes),
            encryption_key: SecretKey::from_bytes(encryption_bytes),
        })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn encryption_key(&self) -> &SecretKey {
        &self.encryption_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn encryption_public_key(&self) -> PublicKey {
        self.encryption_key.public_key()
    }
}

#[derive(Debug, Error)]
pub enum KeyManagerError {
    #[error(transparent)]
    Hkdf(#[from] HkdfError),
}

#[cfg(test)]
mod tests {
    use super::{PerTeamKeySeed, TeamKeyManager};

    #[test]
    fn derivation_is_deterministic() {
        let seed = PerTeamKeySeed::from_bytes([5; 32]);

        let first = TeamKeyManager::from_seed(&seed, 1).unwrap();
        let second = TeamKeyManager::from_seed(&seed, 1).unwrap();
        assert_eq!(first.verifying_key(), second.verifying_key());
        assert_eq!(first.encryption_public_key(), second.encryption_public_key());
    }

    #[test]
    fn generation_and_seed_change_keys() {
        let seed = PerTeamKeySeed::from_bytes([5; 32]);
        let gen_1 = TeamKeyManager::from_seed(&seed, 1).unwrap();
        let gen_2 = TeamKeyManager::from_seed(&seed, 2).unwrap();
        let other = TeamKeyManager::from_seed(&PerTeamKeySeed::from_bytes([6; 32]), 1).unwrap();

        assert_ne!(gen_1.verifying_key(), gen_2.verifying_key());
        assert_ne!(gen_1.encryption_public_key(), gen_2.encryption_public_key());
        assert_ne!(gen_1.verifying_key(), other.verifying_key());
        assert_ne!(gen_1.verifying_key().as_bytes(), gen_1.encryption_public_key().as_bytes());
    }
}
