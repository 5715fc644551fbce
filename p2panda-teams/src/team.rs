// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use crate::chain::ChainState;
use crate::key_manager::{KeyManagerError, TeamKeyManager};
use crate::loader::{LoadTeamArgs, LoaderError, TeamLoader};
use crate::team_data::{PerTeamKeySeedItem, TeamData};
use crate::traits::{ChainVerifier, PerUserKeyring, TeamServer, TeamStore};
use crate::types::{Generation, Seqno, TeamId, TeamName, TeamRole, UserVersion};

/// Read-only view over loaded team data.
///
/// Role management and other chain-extending operations are built on top of this by the
/// application, they always start from a freshly loaded `Team`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Team {
    data: TeamData,
}

impl Team {
    /// Loads a team through the given loader.
    pub async fn load<S, V, R, K>(
        loader: &TeamLoader<S, V, R, K>,
        me: &UserVersion,
        args: LoadTeamArgs,
    ) -> Result<Self, LoaderError<S, V, R, K>>
    where
        S: TeamStore,
        V: ChainVerifier,
        R: TeamServer,
        K: PerUserKeyring,
    {
        let data = loader.load(me, args).await?;
        Ok(Self { data })
    }

    pub fn id(&self) -> &TeamId {
        self.data.id()
    }

    pub fn name(&self) -> &TeamName {
        self.chain().name()
    }

    pub fn chain(&self) -> &ChainState {
        self.data.chain()
    }

    pub fn latest_seqno(&self) -> Seqno {
        self.chain().latest_seqno()
    }

    /// Latest per-team key generation the chain knows about.
    pub fn generation(&self) -> Option<Generation> {
        self.chain().latest_generation()
    }

    pub fn member_role(&self, member: &UserVersion) -> TeamRole {
        self.chain().member_role(member)
    }

    pub fn seed_at_generation(&self, generation: Generation) -> Option<&PerTeamKeySeedItem> {
        self.data.seed_at_generation(generation)
    }

    /// Derives the per-team keypairs of a generation we hold the secret for.
    pub fn key_manager_at(&self, generation: Generation) -> Result<TeamKeyManager, TeamError> {
        let item = self
            .seed_at_generation(generation)
            .ok_or(TeamError::MissingSeed(generation))?;
        Ok(TeamKeyManager::from_seed(&item.seed, item.generation)?)
    }

    /// Derives the per-team keypairs of the latest generation we hold the secret for.
    pub fn latest_key_manager(&self) -> Result<TeamKeyManager, TeamError> {
        let item = self.data.latest_seed().ok_or(TeamError::NoSeeds)?;
        Ok(TeamKeyManager::from_seed(&item.seed, item.generation)?)
    }

    pub fn data(&self) -> &TeamData {
        &self.data
    }

    pub fn into_data(self) -> TeamData {
        self.data
    }
}

impl From<TeamData> for Team {
    fn from(data: TeamData) -> Self {
        Self { data }
    }
}

#[derive(Debug, Error)]
pub enum TeamError {
    #[error("no per-team secret held for generation {0}")]
    MissingSeed(Generation),

    #[error("no per-team secrets held for this team")]
    NoSeeds,

    #[error(transparent)]
    KeyManager(#[from] KeyManagerError),
}
