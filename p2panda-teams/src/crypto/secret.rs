// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(not(test))]
use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

/// Fixed-size container for key seeds and other sensitive bytes.
///
/// Memory is zeroised on drop, comparison runs in constant time and the value is never printed in
/// debug output (outside of tests).
#[derive(Clone, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
#[cfg_attr(test, derive(Debug))]
pub struct Secret<const N: usize>(#[serde(with = "serde_bytes")] [u8; N]);

impl<const N: usize> Secret<N> {
    pub fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Copies the secret out of a byte slice of exactly `N` bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; N] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> PartialEq for Secret<N> {
    fn eq(&self, other: &Self) -> bool {
        secure_eq(&self.0, &other.0)
    }
}

#[cfg(not(test))]
impl<const N: usize> fmt::Debug for Secret<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&"***").finish()
    }
}

/// Constant-time comparison of two byte strings.
///
/// Slices of different length compare unequal, the length itself is not treated as secret.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::{Secret, secure_eq};

    #[test]
    fn constant_time_equality() {
        assert_eq!(Secret::from_bytes([7; 32]), Secret::from_bytes([7; 32]));
        assert_ne!(Secret::from_bytes([7; 32]), Secret::from_bytes([8; 32]));
        assert!(!secure_eq(&[1, 2, 3], &[1, 2]));
    }

    #[test]
    fn from_slice_requires_exact_size() {
        assert!(Secret::<32>::try_from_slice(&[1; 32]).is_some());
        assert!(Secret::<32>::try_from_slice(&[1; 31]).is_none());
        assert!(Secret::<32>::try_from_slice(&[1; 33]).is_none());
    }
}
