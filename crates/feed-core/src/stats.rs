//! Streaming session statistics.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Number of users reported in [`StatsSnapshot::top_users`].
pub const TOP_USERS: usize = 5;

/// Message count for a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserCount {
    pub user: String,
    pub messages: u64,
}

/// Point-in-time view of [`SessionStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_messages: u64,
    pub runtime_seconds: f64,
    pub messages_per_minute: f64,
    pub active_users: usize,
    /// At most [`TOP_USERS`] entries, highest count first. Users with equal
    /// counts appear in the order they were first seen.
    pub top_users: Vec<UserCount>,
}

/// Running counters for one subscriber session.
///
/// Per-user counts are kept in first-seen order with a side index, so an
/// update is a hash lookup plus an increment and ties in the top-user list
/// resolve deterministically.
#[derive(Debug, Clone)]
pub struct SessionStats {
    total_messages: u64,
    by_user: Vec<UserCount>,
    index: HashMap<String, usize>,
    started_at: Instant,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    /// Starts a new session clock now.
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    /// Starts a session whose clock began at `started_at`.
    pub fn started_at(started_at: Instant) -> Self {
        Self {
            total_messages: 0,
            by_user: Vec::new(),
            index: HashMap::new(),
            started_at,
        }
    }

    /// Records one message from `user`.
    pub fn update(&mut self, user: &str) {
        self.total_messages += 1;
        if let Some(&slot) = self.index.get(user) {
            self.by_user[slot].messages += 1;
        } else {
            self.index.insert(user.to_string(), self.by_user.len());
            self.by_user.push(UserCount {
                user: user.to_string(),
                messages: 1,
            });
        }
    }

    pub const fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub const fn start_time(&self) -> Instant {
        self.started_at
    }

    /// Messages seen from `user` so far.
    pub fn user_messages(&self, user: &str) -> u64 {
        self.index
            .get(user)
            .map_or(0, |&slot| self.by_user[slot].messages)
    }

    /// All per-user counts in first-seen order.
    pub fn messages_by_user(&self) -> &[UserCount] {
        &self.by_user
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Snapshot as of `now`. Does not mutate the counters.
    pub fn snapshot_at(&self, now: Instant) -> StatsSnapshot {
        let runtime = now.saturating_duration_since(self.started_at);

        // sort_by is stable, so equal counts keep first-seen order
        let mut ranked: Vec<&UserCount> = self.by_user.iter().collect();
        ranked.sort_by(|a, b| b.messages.cmp(&a.messages));
        let top_users = ranked.into_iter().take(TOP_USERS).cloned().collect();

        StatsSnapshot {
            total_messages: self.total_messages,
            runtime_seconds: runtime.as_secs_f64(),
            messages_per_minute: messages_per_minute(self.total_messages, runtime),
            active_users: self.by_user.len(),
            top_users,
        }
    }
}

/// Message rate over `runtime`, with runtime floored at one minute.
///
/// The floor keeps the rate finite right after start-up at the cost of
/// under-reporting it during the first minute of a session.
#[expect(
    clippy::cast_precision_loss,
    reason = "message counts stay far below 2^52"
)]
pub fn messages_per_minute(total: u64, runtime: Duration) -> f64 {
    let minutes = (runtime.as_secs_f64() / 60.0).max(1.0);
    total as f64 / minutes
}
