// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opening key boxes and verifying the derived per-team keys against the chain.
//!
//! A secret from a key box is only accepted if both keys derived from it are exactly the ones the
//! verified chain recorded for that generation. A server could otherwise hand out a secret of its
//! own choosing, and members would encrypt data towards keys the server controls.
use thiserror::Error;
use tracing::{debug, warn};

use crate::chain::ChainState;
use crate::crypto::secure_eq;
use crate::key_box::{BoxError, TeamBox};
use crate::key_manager::{KeyManagerError, TeamKeyManager};
use crate::team_data::PerTeamKeySeedItem;
use crate::traits::PerUserKeyring;
use crate::types::{Generation, Seqno, UserVersion};

/// Opens a key box addressed to us and checks the contained secret against the chain.
///
/// Neither the box nor the chain state are modified, the only side effect is syncing the
/// per-user keyring.
pub async fn open_and_verify<K>(
    keyring: &K,
    me: &UserVersion,
    team_box: &TeamBox,
    chain: &ChainState,
) -> Result<PerTeamKeySeedItem, OpenError<K::Error>>
where
    K: PerUserKeyring,
{
    let generation = team_box.generation;

    keyring.sync(me).await.map_err(OpenError::Keyring)?;
    let per_user_key = keyring
        .encryption_key(me, team_box.per_user_key_seqno)
        .await
        .map_err(OpenError::Keyring)?
        .ok_or(OpenError::MissingPerUserKey(team_box.per_user_key_seqno))?;

    let seed = team_box.open(&per_user_key).map_err(|err| {
        debug!(
            team_id = %chain.id(),
            generation,
            sender_key = %team_box.sender_key,
            "could not open key box: {err}"
        );
        OpenError::Decrypt(err)
    })?;

    let keys = TeamKeyManager::from_seed(&seed, generation)?;

    let chain_key = chain
        .per_team_key_at_generation(generation)
        .map_err(|_| OpenError::MissingGeneration(generation))?;

    if !secure_eq(
        keys.verifying_key().as_bytes(),
        chain_key.signing_key.as_bytes(),
    ) {
        warn!(
            team_id = %chain.id(),
            generation,
            "derived signing key does not match team chain, server might be hostile"
        );
        return Err(OpenError::SigningKeyMismatch(generation));
    }

    if !secure_eq(
        keys.encryption_public_key().as_bytes(),
        chain_key.encryption_key.as_bytes(),
    ) {
        warn!(
            team_id = %chain.id(),
            generation,
            "derived encryption key does not match team chain, server might be hostile"
        );
        return Err(OpenError::EncryptionKeyMismatch(generation));
    }

    Ok(PerTeamKeySeedItem {
        seed,
        generation,
        seqno: chain_key.seqno,
    })
}

#[derive(Debug, Error)]
pub enum OpenError<E> {
    /// Syncing or reading our per-user keyring failed.
    #[error("per-user keyring failed: {0}")]
    Keyring(E),

    #[error("no per-user key with seqno {0} in keyring")]
    MissingPerUserKey(Seqno),

    /// Box could not be decrypted with our key, it is corrupted or not meant for us.
    #[error("could not open key box: {0}")]
    Decrypt(BoxError),

    #[error(transparent)]
    KeyManager(#[from] KeyManagerError),

    #[error("team chain has no per-team key at generation {0}")]
    MissingGeneration(Generation),

    #[error("derived signing key did not match key in team chain at generation {0}")]
    SigningKeyMismatch(Generation),

    #[error("derived encryption key did not match key in team chain at generation {0}")]
    EncryptionKeyMismatch(Generation),
}
