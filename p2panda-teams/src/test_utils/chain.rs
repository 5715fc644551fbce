// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::{ChainState, ChainStateError, LinkId, PerTeamKey, RawLink};
use crate::crypto::Rng;
use crate::crypto::ed25519::{Signature, SignatureError, VerifyingKey};
use crate::crypto::kdf::sha2_256;
use crate::crypto::x25519::{PublicKey, SecretKey};
use crate::key_box::TeamBox;
use crate::key_manager::{PerTeamKeySeed, TeamKeyManager};
use crate::server::RawTeam;
use crate::team_data::ReaderKeyMask;
use crate::traits::ChainVerifier;
use crate::types::{Generation, Seqno, TeamId, TeamName, TeamRole, UserVersion};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SignedLink {
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
    signature: Signature,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LinkPayload {
    seqno: Seqno,
    prev: Option<LinkId>,
    team_id: TeamId,
    body: LinkBody,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
enum LinkBody {
    Root {
        name: TeamName,
        owner: UserVersion,
        signing_key: VerifyingKey,
        encryption_key: PublicKey,
    },
    RotateKey {
        signing_key: VerifyingKey,
        encryption_key: PublicKey,
    },
    ChangeMembership {
        member: UserVersion,
        role: TeamRole,
    },
}

fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).unwrap();
    bytes
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TestVerifierError> {
    ciborium::de::from_reader(bytes).map_err(|err| TestVerifierError::Decode(err.to_string()))
}

/// Author of a team chain, holding all per-team secrets.
///
/// Links are signed with the per-team signing key which is current before the link is applied,
/// the root link is signed with the first generation's key it introduces.
#[derive(Debug)]
pub struct TestTeam {
    id: TeamId,
    name: TeamName,
    links: Vec<RawLink>,
    latest_link_id: Option<LinkId>,
    seeds: Vec<PerTeamKeySeed>,
    sender_key: SecretKey,
    rng: Rng,
}

impl TestTeam {
    /// Creates a root team named `name` with `owner` as its first member.
    pub fn new(name: &str, owner: UserVersion, rng_seed: [u8; 32]) -> Self {
        let name: TeamName = name.parse().unwrap();
        let id = name.to_team_id().unwrap();
        Self::with_id(id, name, owner, rng_seed)
    }

    /// Creates a team with an id not derived from its name.
    pub fn with_id(id: TeamId, name: TeamName, owner: UserVersion, rng_seed: [u8; 32]) -> Self {
        let rng = Rng::from_seed(rng_seed);
        let sender_key = SecretKey::from_bytes(rng.random_array().unwrap());
        let seed = PerTeamKeySeed::from_bytes(rng.random_array().unwrap());
        let keys = TeamKeyManager::from_seed(&seed, 1).unwrap();

        let mut team = Self {
            id,
            name: name.clone(),
            links: Vec::new(),
            latest_link_id: None,
            seeds: vec![seed],
            sender_key,
            rng,
        };
        team.push_link(LinkBody::Root {
            name,
            owner,
            signing_key: keys.verifying_key(),
            encryption_key: keys.encryption_public_key(),
        });
        team
    }

    pub fn id(&self) -> &TeamId {
        &self.id
    }

    pub fn name(&self) -> &TeamName {
        &self.name
    }

    pub fn links(&self) -> &[RawLink] {
        &self.links
    }

    pub fn latest_seqno(&self) -> Seqno {
        self.links.len() as Seqno
    }

    pub fn generation(&self) -> Generation {
        self.seeds.len() as Generation
    }

    pub fn seed(&self, generation: Generation) -> &PerTeamKeySeed {
        &self.seeds[(generation - 1) as usize]
    }

    /// Appends a link rotating the per-team key to the next generation.
    pub fn rotate_key(&mut self) {
        let seed = PerTeamKeySeed::from_bytes(self.rng.random_array().unwrap());
        let keys = TeamKeyManager::from_seed(&seed, self.generation() + 1).unwrap();
        self.push_link(LinkBody::RotateKey {
            signing_key: keys.verifying_key(),
            encryption_key: keys.encryption_public_key(),
        });
        self.seeds.push(seed);
    }

    pub fn change_membership(&mut self, member: UserVersion, role: TeamRole) {
        self.push_link(LinkBody::ChangeMembership { member, role });
    }

    /// Seals the secret of a generation for a member's per-user key.
    pub fn seal_box(
        &self,
        generation: Generation,
        per_user_key_seqno: Seqno,
        recipient: &PublicKey,
    ) -> TeamBox {
        self.seal_box_with_seed(self.seed(generation), generation, per_user_key_seqno, recipient)
    }

    /// Seals an arbitrary secret, as a hostile server would.
    pub fn seal_box_with_seed(
        &self,
        seed: &PerTeamKeySeed,
        generation: Generation,
        per_user_key_seqno: Seqno,
        recipient: &PublicKey,
    ) -> TeamBox {
        TeamBox::seal(
            seed,
            generation,
            per_user_key_seqno,
            &self.sender_key,
            recipient,
            &self.rng,
        )
        .unwrap()
    }

    /// Response of an honest server for links after `low`.
    pub fn raw_team(
        &self,
        low: Seqno,
        key_box: Option<TeamBox>,
        reader_key_masks: Vec<ReaderKeyMask>,
    ) -> RawTeam {
        RawTeam {
            id: self.id,
            name: self.name.clone(),
            chain: self.links.iter().skip(low as usize).cloned().collect(),
            key_box,
            reader_key_masks,
        }
    }

    fn push_link(&mut self, body: LinkBody) {
        let signing_key = {
            let generation = self.generation();
            TeamKeyManager::from_seed(self.seed(generation), generation)
                .unwrap()
                .signing_key()
                .clone()
        };

        let payload = encode(&LinkPayload {
            seqno: self.latest_seqno() + 1,
            prev: self.latest_link_id,
            team_id: self.id,
            body,
        });
        let signature = signing_key.sign(&payload);
        let bytes = encode(&SignedLink { payload, signature });

        self.latest_link_id = Some(sha2_256(&[&bytes]));
        self.links.push(RawLink::from_bytes(bytes));
    }
}

/// Input a verifier was called with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierCall {
    /// Latest seqno of the extended state, `None` when creating a chain.
    pub prior_seqno: Option<Seqno>,
    pub links: usize,
}

/// Verifier for chains authored by [`TestTeam`].
///
/// Checks contiguous seqnos, the hash of the previous link, the team id and Ed25519 signatures
/// by the per-team key current at the time of signing. Team ids are not checked against names.
#[derive(Clone, Debug, Default)]
pub struct TestVerifier {
    calls: Arc<Mutex<Vec<VerifierCall>>>,
}

impl TestVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<VerifierCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, prior_seqno: Option<Seqno>, links: usize) {
        self.calls.lock().unwrap().push(VerifierCall { prior_seqno, links });
    }

    fn verify_root(raw: &RawLink) -> Result<ChainState, TestVerifierError> {
        let (signed, payload) = Self::parse(raw)?;

        let LinkBody::Root {
            name,
            owner,
            signing_key,
            encryption_key,
        } = payload.body
        else {
            return Err(TestVerifierError::MissingRoot);
        };

        if payload.seqno != 1 {
            return Err(ChainStateError::UnexpectedSeqno {
                expected: 1,
                got: payload.seqno,
            }
            .into());
        }
        if payload.prev.is_some() {
            return Err(TestVerifierError::InvalidPrevious(payload.seqno));
        }
        signing_key.verify(&signed.payload, &signed.signature)?;

        let y = ChainState::new(payload.team_id, name, sha2_256(&[raw.as_bytes()]))
            .add_per_team_key(PerTeamKey {
                generation: 1,
                seqno: 1,
                signing_key,
                encryption_key,
            })?
            .set_member_role(owner, TeamRole::Owner);
        Ok(y)
    }

    fn verify_link(y: ChainState, raw: &RawLink) -> Result<ChainState, TestVerifierError> {
        let (signed, payload) = Self::parse(raw)?;

        if &payload.team_id != y.id() {
            return Err(TestVerifierError::WrongTeam(payload.team_id));
        }
        if payload.prev.as_ref() != Some(y.latest_link_id()) {
            return Err(TestVerifierError::InvalidPrevious(payload.seqno));
        }

        let signing_key = y
            .latest_per_team_key()
            .map(|key| key.signing_key)
            .ok_or(TestVerifierError::NoSigningKey)?;
        signing_key.verify(&signed.payload, &signed.signature)?;

        let y = y.append_link(payload.seqno, sha2_256(&[raw.as_bytes()]))?;
        match payload.body {
            LinkBody::Root { .. } => Err(TestVerifierError::UnexpectedRoot(payload.seqno)),
            LinkBody::RotateKey {
                signing_key,
                encryption_key,
            } => {
                let generation = y.latest_generation().map_or(1, |generation| generation + 1);
                Ok(y.add_per_team_key(PerTeamKey {
                    generation,
                    seqno: payload.seqno,
                    signing_key,
                    encryption_key,
                })?)
            }
            LinkBody::ChangeMembership { member, role } => Ok(y.set_member_role(member, role)),
        }
    }

    fn parse(raw: &RawLink) -> Result<(SignedLink, LinkPayload), TestVerifierError> {
        let signed: SignedLink = decode(raw.as_bytes())?;
        let payload: LinkPayload = decode(&signed.payload)?;
        Ok((signed, payload))
    }
}

impl ChainVerifier for TestVerifier {
    type Error = TestVerifierError;

    fn create(&self, _me: &UserVersion, links: &[RawLink]) -> Result<ChainState, Self::Error> {
        self.record(None, links.len());
        let (root, rest) = links.split_first().ok_or(TestVerifierError::MissingRoot)?;
        let y = Self::verify_root(root)?;
        rest.iter().try_fold(y, Self::verify_link)
    }

    fn extend(
        &self,
        _me: &UserVersion,
        y: ChainState,
        links: &[RawLink],
    ) -> Result<ChainState, Self::Error> {
        self.record(Some(y.latest_seqno()), links.len());
        links.iter().try_fold(y, Self::verify_link)
    }
}

#[derive(Debug, Error)]
pub enum TestVerifierError {
    #[error("could not decode link: {0}")]
    Decode(String),

    #[error("chain does not start with a root link")]
    MissingRoot,

    #[error("unexpected root link at seqno {0}")]
    UnexpectedRoot(Seqno),

    #[error("link {0} does not point at the previous link")]
    InvalidPrevious(Seqno),

    #[error("link belongs to another team {0}")]
    WrongTeam(TeamId),

    #[error("chain has no per-team key to verify signatures with")]
    NoSigningKey,

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    ChainState(#[from] ChainStateError),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::chain::RawLink;
    use crate::traits::ChainVerifier;
    use crate::types::{TeamRole, UserId, UserVersion};

    use super::{TestTeam, TestVerifier, TestVerifierError, VerifierCall};

    fn user(id: u8) -> UserVersion {
        UserVersion::new(UserId::from_bytes([id; 16]), 1)
    }

    #[test]
    fn verify_full_and_extended_chain() {
        let mut team = TestTeam::new("pandas", user(1), [1; 32]);
        team.change_membership(user(2), TeamRole::Writer);
        let verifier = TestVerifier::new();

        let y = verifier.create(&user(1), team.links()).unwrap();
        assert_eq!(y.latest_seqno(), 2);
        assert_eq!(y.id(), team.id());
        assert_eq!(y.member_role(&user(1)), TeamRole::Owner);
        assert_eq!(y.member_role(&user(2)), TeamRole::Writer);

        team.rotate_key();
        team.change_membership(user(2), TeamRole::None);
        let y = verifier.extend(&user(1), y, &team.links()[2..]).unwrap();
        assert_eq!(y.latest_seqno(), 4);
        assert_eq!(y.latest_generation(), Some(2));
        assert_eq!(y.per_team_key_at_generation(2).unwrap().seqno, 3);
        assert_eq!(y.member_role(&user(2)), TeamRole::None);

        assert_eq!(
            verifier.calls(),
            vec![
                VerifierCall {
                    prior_seqno: None,
                    links: 2
                },
                VerifierCall {
                    prior_seqno: Some(2),
                    links: 2
                },
            ]
        );
    }

    #[test]
    fn reject_gaps_and_forgeries() {
        let mut team = TestTeam::new("pandas", user(1), [1; 32]);
        team.change_membership(user(2), TeamRole::Reader);
        team.change_membership(user(3), TeamRole::Reader);
        let verifier = TestVerifier::new();

        // Gap in the chain.
        let gapped = vec![team.links()[0].clone(), team.links()[2].clone()];
        assert_matches!(
            verifier.create(&user(1), &gapped),
            Err(TestVerifierError::InvalidPrevious(3))
        );

        // Link signed by another team's key.
        let other = TestTeam::with_id(*team.id(), team.name().clone(), user(1), [2; 32]);
        let mixed = vec![team.links()[0].clone(), other.links()[0].clone()];
        assert_matches!(verifier.create(&user(1), &mixed), Err(_));

        // Corrupted bytes.
        let mut bytes = team.links()[1].as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        let corrupted = vec![team.links()[0].clone(), RawLink::from_bytes(bytes)];
        assert!(verifier.create(&user(1), &corrupted).is_err());

        assert_matches!(
            verifier.create(&user(1), &[]),
            Err(TestVerifierError::MissingRoot)
        );
    }
}
