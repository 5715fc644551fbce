// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic primitives for opening key boxes and deriving per-team keys.
pub mod aead;
pub mod ed25519;
pub mod kdf;
mod rng;
mod secret;
pub mod x25519;

pub use rng::{Rng, RngError};
pub use secret::{Secret, secure_eq};
