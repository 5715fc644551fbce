// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::chain::{ChainState, RawLink};
use crate::types::UserVersion;

/// Parses and verifies signed team chain links.
///
/// Implementations must reject out-of-order or gapped seqnos, links pointing at the wrong
/// predecessor and links without a valid signature of the key current at the time of signing.
/// Every error is terminal for the load it occurred in.
pub trait ChainVerifier {
    type Error: Error + Send + Sync + 'static;

    /// Replays a full chain, starting at its first link.
    fn create(&self, me: &UserVersion, links: &[RawLink]) -> Result<ChainState, Self::Error>;

    /// Continues a verified chain with links following its latest seqno.
    fn extend(
        &self,
        me: &UserVersion,
        y: ChainState,
        links: &[RawLink],
    ) -> Result<ChainState, Self::Error>;
}
