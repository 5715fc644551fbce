// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cached aggregate of everything we know about a team.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::ChainState;
use crate::key_manager::PerTeamKeySeed;
use crate::types::{Generation, Seqno, TeamId};

/// Decrypted per-team secret of one generation.
///
/// Only ever created after the keys derived from the seed matched the keys recorded in the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerTeamKeySeedItem {
    pub seed: PerTeamKeySeed,
    pub generation: Generation,

    /// Seqno of the chain link which introduced this generation.
    pub seqno: Seqno,
}

/// Opaque per-generation mask handed out to readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderKeyMask {
    pub application: u32,
    pub generation: Generation,
    #[serde(with = "serde_bytes")]
    pub mask: Vec<u8>,
}

/// Verified chain state together with the key material we could unlock for it.
///
/// This is the unit of caching. It is replaced as a whole on every successful load and never
/// mutated in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamData {
    chain: ChainState,
    per_team_key_seeds: Vec<PerTeamKeySeedItem>,
    reader_key_masks: Vec<ReaderKeyMask>,
}

impl TeamData {
    pub fn new(
        chain: ChainState,
        seed: PerTeamKeySeedItem,
        reader_key_masks: Vec<ReaderKeyMask>,
    ) -> Self {
        Self {
            chain,
            per_team_key_seeds: vec![seed],
            reader_key_masks,
        }
    }

    /// Returns the successor of this data after an incremental load.
    ///
    /// Existing seeds are kept in their order and a new seed is appended. Reader key masks from
    /// the server are appended as they are: they are neither validated nor deduplicated yet.
    pub fn merge(
        self,
        chain: ChainState,
        seed: Option<PerTeamKeySeedItem>,
        reader_key_masks: Vec<ReaderKeyMask>,
    ) -> Self {
        let mut per_team_key_seeds = self.per_team_key_seeds;
        per_team_key_seeds.extend(seed);

        let mut masks = self.reader_key_masks;
        masks.extend(reader_key_masks);

        Self {
            chain,
            per_team_key_seeds,
            reader_key_masks: masks,
        }
    }

    pub fn id(&self) -> &TeamId {
        self.chain.id()
    }

    pub fn chain(&self) -> &ChainState {
        &self.chain
    }

    pub fn per_team_key_seeds(&self) -> &[PerTeamKeySeedItem] {
        &self.per_team_key_seeds
    }

    pub fn reader_key_masks(&self) -> &[ReaderKeyMask] {
        &self.reader_key_masks
    }

    pub fn seed_at_generation(&self, generation: Generation) -> Option<&PerTeamKeySeedItem> {
        self.per_team_key_seeds
            .iter()
            .find(|item| item.generation == generation)
    }

    /// Returns the seed with the highest generation we hold.
    pub fn latest_seed(&self) -> Option<&PerTeamKeySeedItem> {
        self.per_team_key_seeds
            .iter()
            .max_by_key(|item| item.generation)
    }

    /// Encodes team data in CBOR format for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TeamDataError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| TeamDataError::Encode(err.to_string()))?;
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TeamDataError> {
        ciborium::de::from_reader(bytes).map_err(|err| TeamDataError::Decode(err.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum TeamDataError {
    #[error("could not encode team data: {0}")]
    Encode(String),

    #[error("could not decode corrupted team data: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::chain::ChainState;
    use crate::key_manager::PerTeamKeySeed;
    use crate::types::{TeamName, TeamRole, UserId, UserVersion};

    use super::{PerTeamKeySeedItem, ReaderKeyMask, TeamData, TeamDataError};

    fn seed_item(generation: u64) -> PerTeamKeySeedItem {
        PerTeamKeySeedItem {
            seed: PerTeamKeySeed::from_bytes([generation as u8; 32]),
            generation,
            seqno: generation,
        }
    }

    fn mask(generation: u64) -> ReaderKeyMask {
        ReaderKeyMask {
            application: 1,
            generation,
            mask: vec![generation as u8; 32],
        }
    }

    fn chain(seqno: u64) -> ChainState {
        let name: TeamName = "pandas".parse().unwrap();
        let mut y = ChainState::new(name.to_team_id().unwrap(), name, [0; 32]);
        for seqno in 2..=seqno {
            y = y.append_link(seqno, [seqno as u8; 32]).unwrap();
        }
        y
    }

    #[test]
    fn merge_appends_seeds_and_masks() {
        let data = TeamData::new(chain(1), seed_item(1), vec![mask(1)]);

        let data = data.merge(chain(3), Some(seed_item(2)), vec![mask(2), mask(1)]);
        assert_eq!(data.chain().latest_seqno(), 3);
        assert_eq!(data.per_team_key_seeds(), &[seed_item(1), seed_item(2)]);
        // Duplicate masks are kept.
        assert_eq!(data.reader_key_masks(), &[mask(1), mask(2), mask(1)]);
        assert_eq!(data.latest_seed(), Some(&seed_item(2)));
        assert_eq!(data.seed_at_generation(1), Some(&seed_item(1)));

        let data = data.merge(chain(4), None, Vec::new());
        assert_eq!(data.per_team_key_seeds().len(), 2);
        assert_eq!(data.chain().latest_seqno(), 4);
    }

    #[test]
    fn cbor_encoding() {
        let member = UserVersion::new(UserId::from_bytes([3; 16]), 1);
        let data = TeamData::new(
            chain(2).set_member_role(member, TeamRole::Admin),
            seed_item(1),
            vec![mask(1)],
        );

        let bytes = data.to_bytes().unwrap();
        assert_eq!(TeamData::from_bytes(&bytes).unwrap(), data);

        assert_matches!(
            TeamData::from_bytes(&bytes[..bytes.len() / 2]),
            Err(TeamDataError::Decode(_))
        );
    }
}
