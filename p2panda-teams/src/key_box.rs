// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted delivery of a per-team secret to a single member.
//!
//! A box is sealed towards one of the recipient's per-user encryption keys, which rotate over
//! time. The box names the seqno of the per-user key it was sealed for, the per-team key
//! generation of the secret inside and the X25519 key of the sender.
//!
//! The symmetric key is derived with HKDF from the X25519 agreement of sender and recipient, the
//! secret is then encrypted with XChaCha20-Poly1305. Generation and per-user-key seqno are bound
//! as associated data so a box can't be relabelled without failing to open.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::aead::{AeadError, AeadKey, AeadNonce, aead_decrypt, aead_encrypt};
use crate::crypto::kdf::{HkdfError, TEAM_BOX_KEY_INFO, hkdf};
use crate::crypto::x25519::{PublicKey, SecretKey, X25519Error};
use crate::crypto::{Rng, RngError};
use crate::key_manager::{PER_TEAM_KEY_SEED_SIZE, PerTeamKeySeed};
use crate::types::{Generation, Seqno};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamBox {
    /// Per-team key generation of the sealed secret.
    pub generation: Generation,

    /// Seqno of the recipient's per-user key this box was sealed for.
    pub per_user_key_seqno: Seqno,

    /// X25519 key of the device which sealed the box.
    pub sender_key: PublicKey,

    pub nonce: AeadNonce,

    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
}

impl TeamBox {
    pub fn seal(
        seed: &PerTeamKeySeed,
        generation: Generation,
        per_user_key_seqno: Seqno,
        sender_secret: &SecretKey,
        recipient_key: &PublicKey,
        rng: &Rng,
    ) -> Result<Self, BoxError> {
        let sender_key = sender_secret.public_key();
        let key = box_key(sender_secret, recipient_key)?;
        let nonce: AeadNonce = rng.random_array()?;
        let ciphertext = aead_encrypt(
            &key,
            seed.as_bytes(),
            &nonce,
            &associated_data(generation, per_user_key_seqno),
        )?;

        Ok(Self {
            generation,
            per_user_key_seqno,
            sender_key,
            nonce,
            ciphertext,
        })
    }

    /// Decrypts the per-team secret with the recipient's per-user key.
    pub fn open(&self, recipient_secret: &SecretKey) -> Result<PerTeamKeySeed, BoxError> {
        let key = box_key(recipient_secret, &self.sender_key)?;
        let plaintext = aead_decrypt(
            &key,
            &self.ciphertext,
            &self.nonce,
            &associated_data(self.generation, self.per_user_key_seqno),
        )?;
        PerTeamKeySeed::try_from_slice(&plaintext)
            .ok_or(BoxError::InvalidSeedSize(plaintext.len()))
    }
}

fn box_key(our_secret: &SecretKey, their_key: &PublicKey) -> Result<AeadKey, BoxError> {
    let shared_secret = our_secret.calculate_agreement(their_key)?;
    Ok(hkdf(&[], shared_secret.as_bytes(), &[TEAM_BOX_KEY_INFO])?)
}

fn associated_data(generation: Generation, per_user_key_seqno: Seqno) -> [u8; 16] {
    let mut aad = [0u8; 16];
    aad[..8].copy_from_slice(&generation.to_be_bytes());
    aad[8..].copy_from_slice(&per_user_key_seqno.to_be_bytes());
    aad
}

#[derive(Debug, Error)]
pub enum BoxError {
    #[error(transparent)]
    Agreement(#[from] X25519Error),

    #[error(transparent)]
    Hkdf(#[from] HkdfError),

    #[error(transparent)]
    Aead(#[from] AeadError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(
        "box contained {0} bytes, expected a {size} byte secret",
        size = PER_TEAM_KEY_SEED_SIZE
    )]
    InvalidSeedSize(usize),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::crypto::Rng;
    use crate::crypto::x25519::SecretKey;
    use crate::key_manager::PerTeamKeySeed;

    use super::{BoxError, TeamBox};

    #[test]
    fn seal_and_open() {
        let rng = Rng::from_seed([1; 32]);
        let sender = SecretKey::from_bytes(rng.random_array().unwrap());
        let recipient = SecretKey::from_bytes(rng.random_array().unwrap());
        let seed = PerTeamKeySeed::from_bytes(rng.random_array().unwrap());

        let team_box = TeamBox::seal(&seed, 3, 1, &sender, &recipient.public_key(), &rng).unwrap();
        assert_eq!(team_box.generation, 3);
        assert_eq!(team_box.sender_key, sender.public_key());
        assert_eq!(team_box.open(&recipient).unwrap(), seed);
    }

    #[test]
    fn wrong_key_or_tampering_fails() {
        let rng = Rng::from_seed([2; 32]);
        let sender = SecretKey::from_bytes(rng.random_array().unwrap());
        let recipient = SecretKey::from_bytes(rng.random_array().unwrap());
        let stranger = SecretKey::from_bytes(rng.random_array().unwrap());
        let seed = PerTeamKeySeed::from_bytes(rng.random_array().unwrap());

        let team_box = TeamBox::seal(&seed, 1, 1, &sender, &recipient.public_key(), &rng).unwrap();

        assert_matches!(team_box.open(&stranger), Err(BoxError::Aead(_)));

        let mut relabelled = team_box.clone();
        relabelled.generation = 2;
        assert_matches!(relabelled.open(&recipient), Err(BoxError::Aead(_)));

        let mut corrupted = team_box;
        corrupted.ciphertext[0] ^= 1;
        assert_matches!(corrupted.open(&recipient), Err(BoxError::Aead(_)));
    }
}
