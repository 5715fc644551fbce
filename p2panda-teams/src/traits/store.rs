// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::team_data::TeamData;
use crate::types::TeamId;

/// Key/value cache of the last known verified data per team.
///
/// Only single-key atomic overwrites are expected. Consistency between a `get` and a later `put`
/// of the same team is provided by the loader's per-team lock, not by the store.
pub trait TeamStore {
    type Error: Error + Send + Sync + 'static;

    fn get(
        &self,
        id: &TeamId,
    ) -> impl Future<Output = Result<Option<TeamData>, Self::Error>> + Send;

    /// Inserts or overwrites the data of a team.
    ///
    /// Implementations should not replace data with a later seqno by older data.
    fn put(&self, data: &TeamData) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
