// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers for teams and users.
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::kdf::sha2_256;

/// Sequence number of a link in a signature chain, starting at 1.
pub type Seqno = u64;

/// Version counter of per-team key material, starting at 1 and increasing on every rotation.
pub type Generation = u64;

pub const TEAM_ID_SIZE: usize = 16;

/// Last byte of every root team id.
pub const ROOT_TEAM_ID_TAG: u8 = 0x24;

/// Last byte of every subteam id.
pub const SUBTEAM_ID_TAG: u8 = 0x25;

/// Globally unique identifier of a team.
///
/// Root team ids are derived deterministically from the team name, subteam ids are assigned by
/// the parent chain. The last byte tags which of both it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "TeamIdBytes")]
pub struct TeamId(#[serde(with = "serde_bytes")] [u8; TEAM_ID_SIZE]);

#[derive(Deserialize)]
struct TeamIdBytes(#[serde(with = "serde_bytes")] [u8; TEAM_ID_SIZE]);

impl TryFrom<TeamIdBytes> for TeamId {
    type Error = TeamIdError;

    fn try_from(value: TeamIdBytes) -> Result<Self, Self::Error> {
        Self::from_bytes(value.0)
    }
}

impl TeamId {
    pub fn from_bytes(bytes: [u8; TEAM_ID_SIZE]) -> Result<Self, TeamIdError> {
        match bytes[TEAM_ID_SIZE - 1] {
            ROOT_TEAM_ID_TAG | SUBTEAM_ID_TAG => Ok(Self(bytes)),
            tag => Err(TeamIdError::InvalidTag(tag)),
        }
    }

    pub fn as_bytes(&self) -> &[u8; TEAM_ID_SIZE] {
        &self.0
    }

    pub fn is_subteam(&self) -> bool {
        self.0[TEAM_ID_SIZE - 1] == SUBTEAM_ID_TAG
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for TeamId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for TeamId {
    type Err = TeamIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; TEAM_ID_SIZE] = hex::decode(value)?
            .try_into()
            .map_err(|bytes: Vec<u8>| TeamIdError::InvalidLength(bytes.len()))?;
        Self::from_bytes(bytes)
    }
}

#[derive(Debug, Error)]
pub enum TeamIdError {
    #[error("invalid team id length {0}, expected {size} bytes", size = TEAM_ID_SIZE)]
    InvalidLength(usize),

    #[error("invalid team id tag {0:#04x}")]
    InvalidTag(u8),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

const NAME_PART_MIN_LEN: usize = 2;

const NAME_PART_MAX_LEN: usize = 16;

/// Human-readable path of a team: the root team followed by optional subteam segments, written
/// as `root.sub.subsub`.
///
/// Names are case-insensitive and normalised to lowercase.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct TeamName(Vec<String>);

impl TeamName {
    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn is_subteam(&self) -> bool {
        self.0.len() > 1
    }

    /// Returns the name of the root team this name belongs to.
    pub fn root_ancestor(&self) -> TeamName {
        TeamName(self.0[..1].to_vec())
    }

    /// Derives the team id of a root team.
    ///
    /// Subteam ids can only be learned from the parent team's chain, resolving them is not
    /// supported.
    pub fn to_team_id(&self) -> Result<TeamId, TeamNameError> {
        if self.is_subteam() {
            return Err(TeamNameError::NotRootTeam(self.to_string()));
        }
        let digest = sha2_256(&[self.to_string().as_bytes()]);
        let mut bytes = [0u8; TEAM_ID_SIZE];
        bytes[..TEAM_ID_SIZE - 1].copy_from_slice(&digest[..TEAM_ID_SIZE - 1]);
        bytes[TEAM_ID_SIZE - 1] = ROOT_TEAM_ID_TAG;
        Ok(TeamId(bytes))
    }
}

impl Display for TeamName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for TeamName {
    type Err = TeamNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(TeamNameError::Empty);
        }
        let parts: Vec<String> = value.to_lowercase().split('.').map(str::to_owned).collect();
        Self::try_from(parts)
    }
}

impl TryFrom<Vec<String>> for TeamName {
    type Error = TeamNameError;

    /// Validates already lowercased name parts.
    fn try_from(parts: Vec<String>) -> Result<Self, Self::Error> {
        if parts.is_empty() {
            return Err(TeamNameError::Empty);
        }

        for part in &parts {
            let valid_len = (NAME_PART_MIN_LEN..=NAME_PART_MAX_LEN).contains(&part.len());
            let valid_chars = part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if !valid_len || !valid_chars {
                return Err(TeamNameError::InvalidPart(part.to_owned()));
            }
        }

        Ok(Self(parts))
    }
}

#[derive(Debug, Error)]
pub enum TeamNameError {
    #[error("team name is empty")]
    Empty,

    #[error(
        "invalid team name part '{0}', expected {min} to {max} characters of a-z, 0-9 or _",
        min = NAME_PART_MIN_LEN,
        max = NAME_PART_MAX_LEN
    )]
    InvalidPart(String),

    #[error("'{0}' is a subteam, only root team names map to a team id")]
    NotRootTeam(String),
}

pub const USER_ID_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(#[serde(with = "serde_bytes")] [u8; USER_ID_SIZE]);

impl UserId {
    pub fn from_bytes(bytes: [u8; USER_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; USER_ID_SIZE] {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A user at a specific incarnation of their account.
///
/// Resetting an account starts a new personal chain, the eldest seqno tells both apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserVersion {
    pub uid: UserId,
    pub eldest_seqno: Seqno,
}

impl UserVersion {
    pub fn new(uid: UserId, eldest_seqno: Seqno) -> Self {
        Self { uid, eldest_seqno }
    }
}

impl Display for UserVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{}", self.uid, self.eldest_seqno)
    }
}

/// Role of a member as recorded in a team chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TeamRole {
    #[default]
    None,
    Reader,
    Writer,
    Admin,
    Owner,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::{ROOT_TEAM_ID_TAG, TeamId, TeamIdError, TeamName, TeamNameError, TeamRole};

    #[test]
    fn parse_team_names() {
        let name: TeamName = "Pandas.Kitchen".parse().unwrap();
        assert_eq!(name.to_string(), "pandas.kitchen");
        assert!(name.is_subteam());
        assert_eq!(name.root_ancestor().to_string(), "pandas");

        assert_matches!("".parse::<TeamName>(), Err(TeamNameError::Empty));
        assert_matches!("p".parse::<TeamName>(), Err(TeamNameError::InvalidPart(_)));
        assert_matches!("pandas..x1".parse::<TeamName>(), Err(TeamNameError::InvalidPart(_)));
        assert_matches!("pan-das".parse::<TeamName>(), Err(TeamNameError::InvalidPart(_)));
    }

    #[test]
    fn root_team_id_is_deterministic() {
        let first = "pandas".parse::<TeamName>().unwrap().to_team_id().unwrap();
        let second = "PANDAS".parse::<TeamName>().unwrap().to_team_id().unwrap();
        let other = "otters".parse::<TeamName>().unwrap().to_team_id().unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.as_bytes()[15], ROOT_TEAM_ID_TAG);
        assert!(!first.is_subteam());

        assert_matches!(
            "pandas.kitchen".parse::<TeamName>().unwrap().to_team_id(),
            Err(TeamNameError::NotRootTeam(_))
        );
    }

    #[test]
    fn team_id_hex_roundtrip() {
        let id = "pandas".parse::<TeamName>().unwrap().to_team_id().unwrap();
        assert_eq!(id.to_string().parse::<TeamId>().unwrap(), id);

        assert_matches!("abcd".parse::<TeamId>(), Err(TeamIdError::InvalidLength(2)));
        assert_matches!(
            "00000000000000000000000000000000".parse::<TeamId>(),
            Err(TeamIdError::InvalidTag(0))
        );
    }

    #[test]
    fn deserialization_validates() {
        let decode_name = |parts: Vec<String>| {
            let mut bytes = Vec::new();
            ciborium::ser::into_writer(&parts, &mut bytes).unwrap();
            ciborium::de::from_reader::<TeamName, _>(&bytes[..])
        };
        assert!(decode_name(Vec::new()).is_err());
        assert!(decode_name(vec!["Pandas".into()]).is_err());
        assert_eq!(
            decode_name(vec!["pandas".into(), "kitchen".into()]).unwrap(),
            "pandas.kitchen".parse::<TeamName>().unwrap()
        );

        let decode_id = |bytes: [u8; 16]| {
            let mut encoded = Vec::new();
            ciborium::ser::into_writer(&serde_bytes::Bytes::new(&bytes), &mut encoded).unwrap();
            ciborium::de::from_reader::<TeamId, _>(&encoded[..])
        };
        assert!(decode_id([0; 16]).is_err());
        let id = "pandas".parse::<TeamName>().unwrap().to_team_id().unwrap();
        assert_eq!(decode_id(*id.as_bytes()).unwrap(), id);
    }

    #[test]
    fn roles_are_ordered() {
        assert!(TeamRole::Owner > TeamRole::Admin);
        assert!(TeamRole::Reader > TeamRole::None);
        assert_eq!(TeamRole::default(), TeamRole::None);
    }
}
