//! Configuration schema (spec §6's "Configuration schema" table). Built
//! programmatically — construction, not file/CLI parsing, which stays out
//! of scope per spec §1 — but validated fail-fast with descriptive errors
//! the way the teacher's `Config::from_env` validates env-derived settings.

use std::time::Duration;

use crate::error::{CoordinatorError, Result};

/// Recognized options from spec §6, flattened into one struct (the crate
/// builds `Config` directly rather than parsing it from the environment —
/// see SPEC_FULL §1).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// URI of this node.
    pub local_member: String,
    /// Set of configured `ACTIVE` uris. `local_member` need not be a
    /// member — a coordinator not in its own member set builds a
    /// `PASSIVE` local endpoint (spec §4.4).
    pub members: Vec<String>,
    /// Global Raft election timeout.
    pub election_timeout: Duration,
    /// Global Raft heartbeat interval.
    pub heartbeat_interval: Duration,
}

impl CoordinatorConfig {
    /// Builds a config with the teacher's election/heartbeat defaults
    /// (`openraft`'s own defaults, mirrored in `raft.rs`'s `Config`
    /// construction): a 1.5s–3s randomized election timeout and a 500ms
    /// heartbeat.
    pub fn new(local_member: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            local_member: local_member.into(),
            members,
            election_timeout: Duration::from_millis(1500),
            heartbeat_interval: Duration::from_millis(500),
        }
    }

    pub fn with_election_timeout(mut self, timeout: Duration) -> Self {
        self.election_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Fail-fast validation: rejects an empty local uri, a member set
    /// with duplicates, or a heartbeat interval that can't possibly beat
    /// the election timeout (it would livelock the global group before
    /// any real traffic flows).
    pub fn validate(&self) -> Result<()> {
        if self.local_member.is_empty() {
            return Err(CoordinatorError::Configuration(
                "local_member must not be empty".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for uri in &self.members {
            if uri.is_empty() {
                return Err(CoordinatorError::Configuration(
                    "members must not contain an empty uri".into(),
                ));
            }
            if !seen.insert(uri.as_str()) {
                return Err(CoordinatorError::Configuration(format!(
                    "duplicate member uri '{uri}'"
                )));
            }
        }

        if self.heartbeat_interval >= self.election_timeout {
            return Err(CoordinatorError::Configuration(format!(
                "heartbeat_interval ({:?}) must be shorter than election_timeout ({:?})",
                self.heartbeat_interval, self.election_timeout
            )));
        }

        Ok(())
    }
}
