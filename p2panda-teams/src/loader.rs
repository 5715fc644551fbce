// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cached, verified and single-flight loading of team state.
//!
//! A [`TeamLoader`] answers "give me the current state of this team". Cached data is used as long
//! as it satisfies the caller, otherwise only the links we are missing are fetched from the
//! server, verified and merged onto what we already know. Key material is only accepted after
//! the keys derived from it were checked against the verified chain.
//!
//! ## Limitations
//!
//! - Subteams can be loaded by id but not by name, see [`LoaderError::SubteamByName`].
//! - Parent or subteam chains are not loaded recursively, every team id is loaded as a
//!   standalone chain.
//! - A role change or promotion of the local user is not detected. Links which were hidden from
//!   us before (for example subteam creations only visible to admins) will not appear in
//!   incrementally loaded data: callers need to pass [`LoadTeamArgs::force_full_reload`] after
//!   such a change.
//! - Reader key masks are not validated or deduplicated, see [`TeamData::merge`].
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::config::LoaderConfig;
use crate::freshness::Freshness;
use crate::lock_table::{Lock, LockTable};
use crate::opener::{OpenError, open_and_verify};
use crate::server::RawTeam;
use crate::team_data::TeamData;
use crate::traits::{ChainVerifier, PerUserKeyring, TeamServer, TeamStore};
use crate::types::{Generation, Seqno, TeamId, TeamName, TeamNameError, UserVersion};

/// Team a load is asking for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TeamTarget {
    Id(TeamId),

    /// Name of a root team, resolved to its id without asking the server.
    Name(String),
}

/// Arguments of a single load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTeamArgs {
    target: TeamTarget,
    min_generation: Option<Generation>,
    force_full_reload: bool,
    force_sync: bool,
    no_network: bool,
}

impl LoadTeamArgs {
    pub fn by_id(id: TeamId) -> Self {
        Self::new(TeamTarget::Id(id))
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::new(TeamTarget::Name(name.into()))
    }

    fn new(target: TeamTarget) -> Self {
        Self {
            target,
            min_generation: None,
            force_full_reload: false,
            force_sync: false,
            no_network: false,
        }
    }

    /// Requires the loaded chain to know about the per-team key at this generation.
    pub fn with_min_generation(mut self, generation: Generation) -> Self {
        self.min_generation = Some(generation);
        self
    }

    /// Ignores the cache and replays the whole chain from the server.
    pub fn force_full_reload(mut self) -> Self {
        self.force_full_reload = true;
        self
    }

    /// Asks the server for new links even if the cache would be sufficient.
    pub fn force_sync(mut self) -> Self {
        self.force_sync = true;
        self
    }

    /// Fails instead of contacting the server.
    pub fn no_network(mut self) -> Self {
        self.no_network = true;
        self
    }

    pub fn target(&self) -> &TeamTarget {
        &self.target
    }

    pub fn min_generation(&self) -> Option<Generation> {
        self.min_generation
    }
}

/// What happened during a load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadInfo {
    /// Cached data was found for the team.
    pub hit_cache: bool,

    /// The server was asked for links.
    pub loaded_from_server: bool,

    /// The chain was replayed from its first link.
    pub loaded_from_scratch: bool,
}

/// Loads teams through a cache, a server and a chain verifier.
///
/// Loads of the same team are serialised: while one load is fetching, verifying and writing to
/// the store, other loads for that team wait and then observe the stored result. Loads of
/// different teams run fully in parallel.
///
/// Constructed once and shared by reference between all callers.
#[derive(Debug)]
pub struct TeamLoader<S, V, R, K> {
    store: S,
    verifier: V,
    server: R,
    keyring: K,
    locks: LockTable<TeamId>,
    config: LoaderConfig,
}

impl<S, V, R, K> TeamLoader<S, V, R, K>
where
    S: TeamStore,
    V: ChainVerifier,
    R: TeamServer,
    K: PerUserKeyring,
{
    pub fn new(store: S, verifier: V, server: R, keyring: K) -> Self {
        Self::with_config(store, verifier, server, keyring, LoaderConfig::default())
    }

    pub fn with_config(store: S, verifier: V, server: R, keyring: K, config: LoaderConfig) -> Self {
        Self {
            store,
            verifier,
            server,
            keyring,
            locks: LockTable::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loads a team on behalf of `me`.
    ///
    /// Dropping the returned future cancels the load. The per-team lock and any in-flight
    /// request are released and nothing is written to the store.
    pub async fn load(
        &self,
        me: &UserVersion,
        args: LoadTeamArgs,
    ) -> Result<TeamData, LoaderError<S, V, R, K>> {
        self.load_with_info(me, args).await.map(|(data, _)| data)
    }

    /// Loads a team, also returning how it was loaded.
    pub async fn load_with_info(
        &self,
        me: &UserVersion,
        args: LoadTeamArgs,
    ) -> Result<(TeamData, LoadInfo), LoaderError<S, V, R, K>> {
        let mut info = LoadInfo::default();
        let result = self.load_inner(me, &args, &mut info).await;
        match &result {
            Ok(data) => debug!(
                team_id = %data.id(),
                latest_seqno = data.chain().latest_seqno(),
                hit_cache = info.hit_cache,
                loaded_from_server = info.loaded_from_server,
                loaded_from_scratch = info.loaded_from_scratch,
                "loaded team"
            ),
            Err(err) => debug!(
                team = ?args.target,
                hit_cache = info.hit_cache,
                loaded_from_server = info.loaded_from_server,
                loaded_from_scratch = info.loaded_from_scratch,
                "failed loading team: {err}"
            ),
        }
        result.map(|data| (data, info))
    }

    async fn load_inner(
        &self,
        me: &UserVersion,
        args: &LoadTeamArgs,
        info: &mut LoadInfo,
    ) -> Result<TeamData, LoaderError<S, V, R, K>> {
        if args.min_generation == Some(0) {
            return Err(LoaderError::InvalidGeneration);
        }

        let (team_id, requested_name) = match &args.target {
            TeamTarget::Id(id) => (*id, None),
            TeamTarget::Name(name) => {
                let name: TeamName = name.parse()?;
                if name.is_subteam() {
                    return Err(LoaderError::SubteamByName(name));
                }
                (name.to_team_id()?, Some(name))
            }
        };

        let lock = self.acquire_lock(team_id).await?;

        let cached = if args.force_full_reload {
            None
        } else {
            self.store
                .get(&team_id)
                .await
                .map_err(LoaderError::Store)?
        };
        info.hit_cache = cached.is_some();

        let freshness = Freshness::compute(cached.as_ref(), args.min_generation);
        let needs_network = cached.is_none()
            || freshness != Freshness::Fresh
            || args.force_sync
            || args.force_full_reload;

        trace!(
            %team_id,
            ?freshness,
            needs_network,
            "checked cached team data"
        );

        let data = match cached {
            Some(cached) if !needs_network => cached,
            _ if args.no_network => return Err(LoaderError::NetworkDisallowed),
            None => {
                info.loaded_from_server = true;
                info.loaded_from_scratch = true;
                self.load_from_scratch(me, &team_id).await?
            }
            Some(cached) => {
                info.loaded_from_server = true;
                self.load_with_cached(me, cached).await?
            }
        };

        if data.id() != &team_id {
            return Err(LoaderError::WrongTeamId {
                expected: team_id,
                got: *data.id(),
            });
        }

        if let Some(name) = requested_name {
            if data.chain().name() != &name {
                return Err(LoaderError::WrongTeamName {
                    expected: name,
                    got: data.chain().name().clone(),
                });
            }
        }

        if let Some(generation) = args.min_generation {
            if !data.chain().has_generation(generation) {
                return Err(LoaderError::GenerationNotFound {
                    team_id,
                    generation,
                });
            }
        }

        self.store.put(&data).await.map_err(LoaderError::Store)?;
        lock.release();

        Ok(data)
    }

    async fn load_from_scratch(
        &self,
        me: &UserVersion,
        team_id: &TeamId,
    ) -> Result<TeamData, LoaderError<S, V, R, K>> {
        let raw = self.fetch(team_id, 0).await?;

        let chain = self
            .verifier
            .create(me, &raw.chain)
            .map_err(LoaderError::Verifier)?;

        let team_box = raw.key_box.ok_or(LoaderError::MissingKeyBox(*team_id))?;
        let seed = open_and_verify(&self.keyring, me, &team_box, &chain)
            .await
            .map_err(LoaderError::Open)?;

        debug!(
            %team_id,
            links = raw.chain.len(),
            generation = seed.generation,
            "loaded team from scratch"
        );

        Ok(TeamData::new(chain, seed, raw.reader_key_masks))
    }

    async fn load_with_cached(
        &self,
        me: &UserVersion,
        cached: TeamData,
    ) -> Result<TeamData, LoaderError<S, V, R, K>> {
        let team_id = *cached.id();
        let low = cached.chain().latest_seqno();
        let raw = self.fetch(&team_id, low).await?;

        let chain = self
            .verifier
            .extend(me, cached.chain().clone(), &raw.chain)
            .map_err(LoaderError::Verifier)?;

        if !raw.chain.is_empty() {
            debug!(
                %team_id,
                "loaded {} new links: seqno {} -> {}",
                raw.chain.len(),
                low,
                chain.latest_seqno()
            );
        }

        let seed = match raw.key_box {
            Some(team_box) if cached.seed_at_generation(team_box.generation).is_none() => Some(
                open_and_verify(&self.keyring, me, &team_box, &chain)
                    .await
                    .map_err(LoaderError::Open)?,
            ),
            Some(team_box) => {
                trace!(
                    %team_id,
                    generation = team_box.generation,
                    "skip key box for generation we already hold"
                );
                None
            }
            None => None,
        };

        Ok(cached.merge(chain, seed, raw.reader_key_masks))
    }

    async fn acquire_lock(&self, team_id: TeamId) -> Result<Lock<TeamId>, LoaderError<S, V, R, K>> {
        let acquire = self.locks.acquire(team_id);
        match self.config.lock_timeout {
            Some(duration) => with_timeout(duration, acquire)
                .await
                .ok_or(LoaderError::LockTimeout(team_id)),
            None => Ok(acquire.await),
        }
    }

    async fn fetch(&self, team_id: &TeamId, low: Seqno) -> Result<RawTeam, LoaderError<S, V, R, K>> {
        trace!(%team_id, low, "fetch team from server");
        let request = self.server.get_team(team_id, low);
        let result = match self.config.fetch_timeout {
            Some(duration) => with_timeout(duration, request)
                .await
                .ok_or(LoaderError::FetchTimeout(*team_id))?,
            None => request.await,
        };
        result.map_err(LoaderError::Server)
    }
}

async fn with_timeout<F: Future>(duration: Duration, future: F) -> Option<F::Output> {
    tokio::time::timeout(duration, future).await.ok()
}

#[derive(Debug, Error)]
pub enum LoaderError<S, V, R, K>
where
    S: TeamStore,
    V: ChainVerifier,
    R: TeamServer,
    K: PerUserKeyring,
{
    #[error("minimum per-team key generation needs to be at least 1")]
    InvalidGeneration,

    #[error(transparent)]
    InvalidTeamName(#[from] TeamNameError),

    #[error("loading subteams by name is not supported yet: {0}")]
    SubteamByName(TeamName),

    #[error("cannot load from server with no-network set")]
    NetworkDisallowed,

    #[error("team store failed: {0}")]
    Store(S::Error),

    #[error("team server failed: {0}")]
    Server(R::Error),

    #[error("team chain could not be verified: {0}")]
    Verifier(V::Error),

    #[error(transparent)]
    Open(OpenError<K::Error>),

    #[error("server did not send a key box for team {0}")]
    MissingKeyBox(TeamId),

    #[error("team {team_id} has no per-team key at generation {generation} on the server")]
    GenerationNotFound {
        team_id: TeamId,
        generation: Generation,
    },

    #[error("server returned wrong team, expected id {expected}, got {got}")]
    WrongTeamId { expected: TeamId, got: TeamId },

    #[error("server returned wrong team, expected name {expected}, got {got}")]
    WrongTeamName { expected: TeamName, got: TeamName },

    #[error("timed out waiting for another load of team {0}")]
    LockTimeout(TeamId),

    #[error("timed out fetching team {0} from server")]
    FetchTimeout(TeamId),
}
