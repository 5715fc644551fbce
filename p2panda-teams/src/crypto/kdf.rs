// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-based key derivation (HKDF) with SHA256 and the SHA256 digest used for identifiers.
//!
//! <https://www.rfc-editor.org/rfc/rfc5869>
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const SHA256_DIGEST_SIZE: usize = 32;

/// Domain separation label for the Ed25519 seed of a per-team key.
pub(crate) const PER_TEAM_SIGNING_KEY_INFO: &[u8] = b"p2panda-teams per-team-key eddsa v1";

/// Domain separation label for the X25519 secret of a per-team key.
pub(crate) const PER_TEAM_ENCRYPTION_KEY_INFO: &[u8] = b"p2panda-teams per-team-key x25519 v1";

/// Domain separation label for symmetric key-box keys.
pub(crate) const TEAM_BOX_KEY_INFO: &[u8] = b"p2panda-teams team-box v1";

pub fn hkdf<const N: usize>(salt: &[u8], ikm: &[u8], info: &[&[u8]]) -> Result<[u8; N], HkdfError> {
    let salt = if salt.is_empty() { None } else { Some(salt) };
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; N];
    hk.expand_multi_info(info, &mut okm)
        .map_err(|_| HkdfError::InvalidArguments)?;
    Ok(okm)
}

/// SHA2-256 hashing function.
pub fn sha2_256(messages: &[&[u8]]) -> [u8; SHA256_DIGEST_SIZE] {
    let mut hasher = Sha256::new();
    for message in messages {
        hasher.update(message);
    }
    hasher.finalize().into()
}

#[derive(Debug, Error)]
pub enum HkdfError {
    #[error("arguments too large for hkdf")]
    InvalidArguments,
}

#[cfg(test)]
mod tests {
    use super::{PER_TEAM_ENCRYPTION_KEY_INFO, PER_TEAM_SIGNING_KEY_INFO, hkdf};

    #[test]
    fn info_separates_domains() {
        let signing: [u8; 32] = hkdf(b"", b"seed", &[PER_TEAM_SIGNING_KEY_INFO]).unwrap();
        let encryption: [u8; 32] = hkdf(b"", b"seed", &[PER_TEAM_ENCRYPTION_KEY_INFO]).unwrap();
        let again: [u8; 32] = hkdf(b"", b"seed", &[PER_TEAM_SIGNING_KEY_INFO]).unwrap();
        assert_eq!(signing, again);
        assert_ne!(signing, encryption);
    }

    #[test]
    fn output_too_large() {
        assert!(hkdf::<{ 255 * 32 + 1 }>(b"", b"seed", &[]).is_err());
    }
}
