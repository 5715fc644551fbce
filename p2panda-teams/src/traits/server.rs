// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::server::RawTeam;
use crate::types::{Seqno, TeamId};

/// Remote endpoint serving team chains and key boxes.
pub trait TeamServer {
    type Error: Error + Send + Sync + 'static;

    /// Fetches all links with a seqno greater than `low`, `0` returns the full chain.
    fn get_team(
        &self,
        id: &TeamId,
        low: Seqno,
    ) -> impl Future<Output = Result<RawTeam, Self::Error>> + Send;
}
