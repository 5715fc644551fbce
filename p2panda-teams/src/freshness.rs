// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::team_data::TeamData;
use crate::types::Generation;

/// Judgement whether cached team data can answer a load request without the server.
///
/// Computed at load time, it is never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Nothing usable is cached, data needs to be loaded from the server.
    Stale,

    /// Cached data is usable but should be refreshed soon.
    ///
    /// Cached data does not carry any time information yet, this is never returned by
    /// [`Freshness::compute`].
    Aged,

    /// Cached data can be used as-is.
    Fresh,
}

impl Freshness {
    /// Judges cached data against the minimum per-team key generation a caller requires.
    ///
    /// Without a requirement any cached data is fresh. With a requirement, the cached chain needs
    /// to know about a per-team key at that generation.
    pub fn compute(cached: Option<&TeamData>, min_generation: Option<Generation>) -> Self {
        match (cached, min_generation) {
            (None, _) => Freshness::Stale,
            (Some(_), None) => Freshness::Fresh,
            (Some(data), Some(generation)) => {
                if data.chain().has_generation(generation) {
                    Freshness::Fresh
                } else {
                    Freshness::Stale
                }
            }
        }
    }
}
