// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::chain::RawLink;
use crate::key_box::TeamBox;
use crate::server::RawTeam;
use crate::team_data::ReaderKeyMask;
use crate::test_utils::TestTeam;
use crate::traits::TeamServer;
use crate::types::{Seqno, TeamId};

/// Scripted team server.
///
/// Serves whatever was published last for a team. Counts requests and the maximum number of
/// requests which were in flight at the same time, optionally delays every response and can be
/// told to misbehave.
#[derive(Clone, Debug, Default)]
pub struct TestServer {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    teams: Mutex<HashMap<TeamId, RawTeam>>,
    redirects: Mutex<HashMap<TeamId, TeamId>>,
    requests: Mutex<Vec<(TeamId, Seqno)>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl TestServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the full chain of a team together with a key box for the requesting member.
    pub fn publish(&self, team: &TestTeam, key_box: Option<TeamBox>) {
        self.publish_with_masks(team, key_box, Vec::new());
    }

    pub fn publish_with_masks(
        &self,
        team: &TestTeam,
        key_box: Option<TeamBox>,
        reader_key_masks: Vec<ReaderKeyMask>,
    ) {
        let raw = team.raw_team(0, key_box, reader_key_masks);
        self.inner.teams.lock().unwrap().insert(*team.id(), raw);
    }

    /// Answers requests for `requested` with the data of `served`.
    pub fn redirect(&self, requested: TeamId, served: TeamId) {
        self.inner
            .redirects
            .lock()
            .unwrap()
            .insert(requested, served);
    }

    /// Flips a bit in the signature of the link with the given seqno.
    pub fn corrupt_link(&self, id: &TeamId, seqno: Seqno) {
        let mut teams = self.inner.teams.lock().unwrap();
        let team = teams.get_mut(id).unwrap();
        let link = &mut team.chain[(seqno - 1) as usize];
        let mut bytes = link.as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        *link = RawLink::from_bytes(bytes);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.lock().unwrap() = latency;
    }

    /// All requests in the order they arrived, with the requested low seqno.
    pub fn requests(&self) -> Vec<(TeamId, Seqno)> {
        self.inner.requests.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

impl TeamServer for TestServer {
    type Error = TestServerError;

    async fn get_team(&self, id: &TeamId, low: Seqno) -> Result<RawTeam, Self::Error> {
        self.inner.requests.lock().unwrap().push((*id, low));
        let _in_flight = InFlight::new(self.inner.clone());

        let latency = *self.inner.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let served = self
            .inner
            .redirects
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(*id);
        let teams = self.inner.teams.lock().unwrap();
        let team = teams.get(&served).ok_or(TestServerError::UnknownTeam(*id))?;

        Ok(RawTeam {
            chain: team.chain.iter().skip(low as usize).cloned().collect(),
            ..team.clone()
        })
    }
}

/// Tracks a request in flight until it finished or was cancelled.
struct InFlight(Arc<Inner>);

impl InFlight {
    fn new(inner: Arc<Inner>) -> Self {
        let current = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(current, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Error)]
pub enum TestServerError {
    #[error("server does not know team {0}")]
    UnknownTeam(TeamId),
}
