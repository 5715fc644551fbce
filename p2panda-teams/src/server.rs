// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::chain::RawLink;
use crate::key_box::TeamBox;
use crate::team_data::ReaderKeyMask;
use crate::types::{TeamId, TeamName};

/// Response of the server when asked for a team.
///
/// The server is not trusted: links are checked by the chain verifier and the key box by the
/// opener, `id` and `name` are informational only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTeam {
    pub id: TeamId,
    pub name: TeamName,

    /// Links at or above the requested low-water mark, in order.
    pub chain: Vec<RawLink>,

    /// Key box addressed to the requesting user for the latest generation the server offers.
    pub key_box: Option<TeamBox>,

    pub reader_key_masks: Vec<ReaderKeyMask>,
}
