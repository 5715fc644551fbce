// SPDX-License-Identifier: MIT OR Apache-2.0

//! `p2panda-teams` maintains a locally cached, verified view of teams: groups whose membership,
//! roles and rotating keys are recorded in a signed chain of links ("sigchain").
//!
//! Team chains are fetched incrementally from a server which is not trusted. Every link is
//! verified before it is accepted and the secret of every per-team key generation is only kept
//! after the keys derived from it were compared against the keys the verified chain records. A
//! server can therefore withhold data, but it can neither forge chain state nor make members use
//! keys of its own choosing.
//!
//! ## Loading teams
//!
//! The [`TeamLoader`] is composed of four collaborators, each expressed as a trait:
//!
//! - a [`TeamStore`](traits::TeamStore) caching the last verified [`TeamData`] per team,
//! - a [`ChainVerifier`](traits::ChainVerifier) replaying and checking signed links,
//! - a [`TeamServer`](traits::TeamServer) delivering links, key boxes and reader key masks,
//! - a [`PerUserKeyring`](traits::PerUserKeyring) holding our own rotating per-user keys.
//!
//! Cached data is returned as long as it satisfies the requested minimum key generation. If not,
//! only the links following the cached state are fetched and merged onto it. Loads of the same
//! team are serialised through a per-team lock, loads of different teams never wait on each other.
//!
//! ```ignore
//! let loader = TeamLoader::new(store, verifier, server, keyring);
//!
//! let team = Team::load(&loader, &me, LoadTeamArgs::by_name("pandas").with_min_generation(2)).await?;
//! let keys = team.latest_key_manager()?;
//! ```
//!
//! ## Key boxes
//!
//! Per-team secrets are delivered in [`TeamBox`]es, encrypted towards one of the member's per-user
//! X25519 keys with XChaCha20-Poly1305. Signing (Ed25519) and encryption (X25519) keypairs of a
//! generation are derived deterministically from its secret with HKDF, see [`TeamKeyManager`].
mod chain;
mod config;
pub mod crypto;
mod freshness;
mod key_box;
mod key_manager;
mod loader;
mod lock_table;
mod memory_store;
mod opener;
mod server;
mod team;
mod team_data;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;
mod types;

pub use chain::{ChainState, ChainStateError, LinkId, PerTeamKey, RawLink};
pub use config::LoaderConfig;
pub use freshness::Freshness;
pub use key_box::{BoxError, TeamBox};
pub use key_manager::{KeyManagerError, PER_TEAM_KEY_SEED_SIZE, PerTeamKeySeed, TeamKeyManager};
pub use loader::{LoadInfo, LoadTeamArgs, LoaderError, TeamLoader, TeamTarget};
pub use lock_table::{Lock, LockTable};
pub use memory_store::{MemoryStore, MemoryStoreError};
pub use opener::{OpenError, open_and_verify};
pub use server::RawTeam;
pub use team::{Team, TeamError};
pub use team_data::{PerTeamKeySeedItem, ReaderKeyMask, TeamData, TeamDataError};
pub use types::{
    Generation, Seqno, TeamId, TeamIdError, TeamName, TeamNameError, TeamRole, UserId,
    UserVersion,
};
