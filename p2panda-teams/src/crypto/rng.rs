// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Mutex;

use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use thiserror::Error;

/// Cryptographically-secure random number generator based on ChaCha20, used for box nonces and
/// fresh key material.
#[derive(Debug)]
pub struct Rng {
    rng: Mutex<rand_chacha::ChaCha20Rng>,
}

impl Default for Rng {
    fn default() -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_os_rng()),
        }
    }
}

impl Rng {
    /// Deterministic generator, only meant for tests and reproducible fixtures.
    #[cfg(any(test, feature = "test_utils"))]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_seed(seed)),
        }
    }

    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], RngError> {
        let mut rng = self.rng.lock().map_err(|_| RngError::LockPoisoned)?;
        let mut out = [0u8; N];
        rng.try_fill_bytes(&mut out)
            .map_err(|_| RngError::NotEnoughRandomness)?;
        Ok(out)
    }
}

#[derive(Debug, Error)]
pub enum RngError {
    #[error("rng lock is poisoned")]
    LockPoisoned,

    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}

#[cfg(test)]
mod tests {
    use super::Rng;

    #[test]
    fn seeded_rng_is_reproducible() {
        let first: [u8; 64] = Rng::from_seed([3; 32]).random_array().unwrap();
        let second: [u8; 64] = Rng::from_seed([3; 32]).random_array().unwrap();
        let other: [u8; 64] = Rng::from_seed([4; 32]).random_array().unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
    }
}
