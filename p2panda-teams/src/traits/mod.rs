// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces of the collaborators a team loader is composed of.
mod keyring;
mod server;
mod store;
mod verifier;

pub use keyring::PerUserKeyring;
pub use server::TeamServer;
pub use store::TeamStore;
pub use verifier::ChainVerifier;
