// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verified state of a team's signature chain.
//!
//! A [`ChainState`] is the result of replaying all links of a team chain up to some sequence
//! number. It is only ever produced by a [`ChainVerifier`](crate::traits::ChainVerifier): the
//! builder methods consume the previous value and return a new one, a state which was handed out
//! is never changed in place.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::ed25519::VerifyingKey;
use crate::crypto::x25519::PublicKey;
use crate::types::{Generation, Seqno, TeamId, TeamName, TeamRole, UserVersion};

/// Hash identifying a chain link, used by the next link to point at its predecessor.
pub type LinkId = [u8; 32];

/// Signed chain link as delivered by the server.
///
/// The loader treats links as opaque, only the chain verifier knows how to parse them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink(#[serde(with = "serde_bytes")] Vec<u8>);

impl RawLink {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Public per-team keys the chain asserts for one generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerTeamKey {
    pub generation: Generation,

    /// Sequence number of the link which introduced this key.
    pub seqno: Seqno,

    pub signing_key: VerifyingKey,

    pub encryption_key: PublicKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    id: TeamId,
    name: TeamName,
    latest_seqno: Seqno,
    latest_link_id: LinkId,
    per_team_keys: BTreeMap<Generation, PerTeamKey>,
    members: BTreeMap<UserVersion, TeamRole>,
}

impl ChainState {
    /// Returns the state after the very first link of a chain.
    pub fn new(id: TeamId, name: TeamName, root_link_id: LinkId) -> Self {
        Self {
            id,
            name,
            latest_seqno: 1,
            latest_link_id: root_link_id,
            per_team_keys: BTreeMap::new(),
            members: BTreeMap::new(),
        }
    }

    /// Advances the chain by one link.
    pub fn append_link(mut self, seqno: Seqno, link_id: LinkId) -> Result<Self, ChainStateError> {
        if seqno != self.latest_seqno + 1 {
            return Err(ChainStateError::UnexpectedSeqno {
                expected: self.latest_seqno + 1,
                got: seqno,
            });
        }
        self.latest_seqno = seqno;
        self.latest_link_id = link_id;
        Ok(self)
    }

    /// Records the public keys of the next per-team key generation.
    pub fn add_per_team_key(mut self, key: PerTeamKey) -> Result<Self, ChainStateError> {
        let expected = self.latest_generation().map_or(1, |generation| generation + 1);
        if key.generation != expected {
            return Err(ChainStateError::UnexpectedGeneration {
                expected,
                got: key.generation,
            });
        }
        if key.seqno > self.latest_seqno {
            return Err(ChainStateError::KeyFromFuture(key.seqno));
        }
        self.per_team_keys.insert(key.generation, key);
        Ok(self)
    }

    /// Sets the role of a member, `TeamRole::None` removes them.
    pub fn set_member_role(mut self, member: UserVersion, role: TeamRole) -> Self {
        match role {
            TeamRole::None => self.members.remove(&member),
            role => self.members.insert(member, role),
        };
        self
    }

    pub fn id(&self) -> &TeamId {
        &self.id
    }

    pub fn name(&self) -> &TeamName {
        &self.name
    }

    pub fn latest_seqno(&self) -> Seqno {
        self.latest_seqno
    }

    pub fn latest_link_id(&self) -> &LinkId {
        &self.latest_link_id
    }

    pub fn per_team_key_at_generation(
        &self,
        generation: Generation,
    ) -> Result<&PerTeamKey, ChainStateError> {
        self.per_team_keys
            .get(&generation)
            .ok_or(ChainStateError::MissingGeneration(generation))
    }

    pub fn latest_per_team_key(&self) -> Option<&PerTeamKey> {
        self.per_team_keys.values().next_back()
    }

    pub fn latest_generation(&self) -> Option<Generation> {
        self.per_team_keys.keys().next_back().copied()
    }

    pub fn has_generation(&self, generation: Generation) -> bool {
        self.per_team_keys.contains_key(&generation)
    }

    pub fn member_role(&self, member: &UserVersion) -> TeamRole {
        self.members.get(member).copied().unwrap_or_default()
    }

    pub fn members(&self) -> impl Iterator<Item = (&UserVersion, &TeamRole)> {
        self.members.iter()
    }
}

#[derive(Debug, Error)]
pub enum ChainStateError {
    #[error("expected link with seqno {expected}, got {got}")]
    UnexpectedSeqno { expected: Seqno, got: Seqno },

    #[error("expected per-team key generation {expected}, got {got}")]
    UnexpectedGeneration { expected: Generation, got: Generation },

    #[error("per-team key claims to be introduced at future seqno {0}")]
    KeyFromFuture(Seqno),

    #[error("chain does not contain a per-team key at generation {0}")]
    MissingGeneration(Generation),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::crypto::ed25519::VerifyingKey;
    use crate::crypto::x25519::PublicKey;
    use crate::types::{TeamName, TeamRole, UserId, UserVersion};

    use super::{ChainState, ChainStateError, PerTeamKey};

    fn per_team_key(generation: u64, seqno: u64) -> PerTeamKey {
        PerTeamKey {
            generation,
            seqno,
            signing_key: VerifyingKey::from_bytes([generation as u8; 32]),
            encryption_key: PublicKey::from_bytes([generation as u8; 32]),
        }
    }

    fn root_state() -> ChainState {
        let name: TeamName = "pandas".parse().unwrap();
        ChainState::new(name.to_team_id().unwrap(), name, [1; 32])
    }

    #[test]
    fn contiguous_links_and_generations() {
        let y = root_state()
            .add_per_team_key(per_team_key(1, 1))
            .unwrap()
            .append_link(2, [2; 32])
            .unwrap()
            .append_link(3, [3; 32])
            .unwrap()
            .add_per_team_key(per_team_key(2, 3))
            .unwrap();

        assert_eq!(y.latest_seqno(), 3);
        assert_eq!(y.latest_link_id(), &[3; 32]);
        assert_eq!(y.latest_generation(), Some(2));
        assert_eq!(y.per_team_key_at_generation(1).unwrap().seqno, 1);
        assert!(y.has_generation(2));
        assert!(!y.has_generation(3));

        assert_matches!(
            y.clone().append_link(5, [5; 32]),
            Err(ChainStateError::UnexpectedSeqno { expected: 4, got: 5 })
        );
        assert_matches!(
            y.clone().add_per_team_key(per_team_key(4, 3)),
            Err(ChainStateError::UnexpectedGeneration { expected: 3, got: 4 })
        );
        assert_matches!(
            y.clone().add_per_team_key(per_team_key(3, 9)),
            Err(ChainStateError::KeyFromFuture(9))
        );
        assert_matches!(
            y.per_team_key_at_generation(7),
            Err(ChainStateError::MissingGeneration(7))
        );
    }

    #[test]
    fn member_roles() {
        let alice = UserVersion::new(UserId::from_bytes([1; 16]), 1);
        let bob = UserVersion::new(UserId::from_bytes([2; 16]), 1);

        let y = root_state()
            .set_member_role(alice, TeamRole::Owner)
            .set_member_role(bob, TeamRole::Reader);
        assert_eq!(y.member_role(&alice), TeamRole::Owner);
        assert_eq!(y.member_role(&bob), TeamRole::Reader);

        let y = y.set_member_role(bob, TeamRole::None);
        assert_eq!(y.member_role(&bob), TeamRole::None);
        assert_eq!(y.members().count(), 1);
    }
}
