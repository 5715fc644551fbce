// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory team store, keeping CBOR-encoded team data per team id.
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::trace;

use crate::team_data::{TeamData, TeamDataError};
use crate::traits::TeamStore;
use crate::types::TeamId;

/// Store keeping team data in memory.
///
/// Data is held in its encoded form, just as a persistent store would keep it, so every `get`
/// hands out an independent copy. Clones of the store share the same underlying map.
///
/// An existing entry is never replaced by data with a lower chain seqno.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    teams: Arc<RwLock<HashMap<TeamId, StoredTeam>>>,
}

#[derive(Debug)]
struct StoredTeam {
    latest_seqno: u64,
    bytes: Vec<u8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of teams currently held.
    pub async fn len(&self) -> usize {
        self.teams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.teams.read().await.is_empty()
    }

    pub async fn remove(&self, id: &TeamId) -> bool {
        self.teams.write().await.remove(id).is_some()
    }
}

impl TeamStore for MemoryStore {
    type Error = MemoryStoreError;

    async fn get(&self, id: &TeamId) -> Result<Option<TeamData>, Self::Error> {
        let teams = self.teams.read().await;
        let Some(stored) = teams.get(id) else {
            return Ok(None);
        };
        Ok(Some(TeamData::from_bytes(&stored.bytes)?))
    }

    async fn put(&self, data: &TeamData) -> Result<(), Self::Error> {
        let latest_seqno = data.chain().latest_seqno();
        let bytes = data.to_bytes()?;

        let mut teams = self.teams.write().await;
        if let Some(existing) = teams.get(data.id()) {
            if existing.latest_seqno > latest_seqno {
                trace!(
                    team_id = %data.id(),
                    existing = existing.latest_seqno,
                    latest_seqno,
                    "ignore team data older than stored one"
                );
                return Ok(());
            }
        }

        teams.insert(
            *data.id(),
            StoredTeam {
                latest_seqno,
                bytes,
            },
        );
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error(transparent)]
    Codec(#[from] TeamDataError),
}

#[cfg(test)]
mod tests {
    use crate::chain::{ChainState, PerTeamKey};
    use crate::key_manager::{PerTeamKeySeed, TeamKeyManager};
    use crate::team_data::{PerTeamKeySeedItem, TeamData};
    use crate::traits::TeamStore;
    use crate::types::TeamName;

    use super::MemoryStore;

    fn team_data(latest_seqno: u64) -> TeamData {
        let seed = PerTeamKeySeed::from_bytes([7; 32]);
        let keys = TeamKeyManager::from_seed(&seed, 1).unwrap();
        let name: TeamName = "otters".parse().unwrap();

        let mut chain = ChainState::new(name.to_team_id().unwrap(), name, [1; 32])
            .add_per_team_key(PerTeamKey {
                generation: 1,
                seqno: 1,
                signing_key: keys.verifying_key(),
                encryption_key: keys.encryption_public_key(),
            })
            .unwrap();
        for seqno in 2..=latest_seqno {
            chain = chain.append_link(seqno, [seqno as u8; 32]).unwrap();
        }

        TeamData::new(
            chain,
            PerTeamKeySeedItem {
                seed,
                generation: 1,
                seqno: 1,
            },
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn put_and_get() {
        let store = MemoryStore::new();
        let data = team_data(3);

        assert_eq!(store.get(data.id()).await.unwrap(), None);
        store.put(&data).await.unwrap();
        assert_eq!(store.get(data.id()).await.unwrap(), Some(data.clone()));
        assert_eq!(store.len().await, 1);

        // Clones share state.
        let other = store.clone();
        assert!(other.remove(data.id()).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn older_data_does_not_replace_newer() {
        let store = MemoryStore::new();
        let newer = team_data(5);
        let older = team_data(2);

        store.put(&newer).await.unwrap();
        store.put(&older).await.unwrap();
        assert_eq!(store.get(newer.id()).await.unwrap(), Some(newer.clone()));

        // Same seqno overwrites.
        store.put(&newer).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
