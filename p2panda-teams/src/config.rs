// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a team loader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// How long a load waits for another load of the same team to finish, `None` waits forever.
    pub lock_timeout: Option<Duration>,

    /// How long a single request to the server may take, `None` waits forever.
    pub fetch_timeout: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Some(Duration::from_secs(30)),
            fetch_timeout: Some(Duration::from_secs(30)),
        }
    }
}
