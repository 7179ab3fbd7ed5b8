//! Conversation context: bounded per-session turn history over `DashMap`.
//!
//! All access to one session goes through its map entry guard, so concurrent messages on the
//! same session id are serialized: `with_history` runs read-compose-append as one step.
//! Sessions are created on first use and removed by idle sweeping or by capacity eviction.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;

use crate::shared::ConversationTurn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Turns kept per session; the oldest is dropped first.
    pub capacity: usize,
    /// Live sessions kept; creating one more evicts the least recently active.
    pub max_sessions: usize,
    /// Sessions idle for longer than this are removed by `sweep_idle`.
    pub idle_ttl: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            capacity: 10,
            max_sessions: 10_000,
            idle_ttl: Duration::from_secs(3600),
        }
    }
}

/// Ordered turns of one session, oldest first.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
    last_activity: DateTime<Utc>,
}

impl SessionHistory {
    fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
            last_activity: Utc::now(),
        }
    }

    /// Appends a turn, evicting the oldest one when over capacity.
    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
        self.last_activity = Utc::now();
    }

    /// Last `n` turns in chronological order.
    pub fn recent(&self, n: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Thread-safe session store.
pub struct SessionStore {
    sessions: DashMap<String, SessionHistory>,
    policy: SessionPolicy,
}

impl SessionStore {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            policy,
        }
    }

    /// Runs `f` on the session's history while holding its entry lock, creating the session
    /// if needed. `f` must not call back into this store.
    pub fn with_history<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionHistory) -> R) -> R {
        if !self.sessions.contains_key(session_id) {
            self.evict_for_new_session();
        }
        let capacity = self.policy.capacity;
        let mut history = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionHistory::new(capacity));
        f(&mut history)
    }

    pub fn append(&self, session_id: &str, turn: ConversationTurn) {
        self.with_history(session_id, |h| h.push(turn));
    }

    /// Last `n` turns of the session, chronological; empty for an unknown session.
    pub fn recent(&self, session_id: &str, n: usize) -> Vec<ConversationTurn> {
        self.sessions
            .get(session_id)
            .map(|h| h.recent(n))
            .unwrap_or_default()
    }

    pub fn session_len(&self, session_id: &str) -> usize {
        self.sessions.get(session_id).map(|h| h.len()).unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Removes sessions idle for longer than the policy TTL as of `now`. Returns how many.
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> usize {
        let ttl = chrono::Duration::from_std(self.policy.idle_ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let before = self.sessions.len();
        self.sessions.retain(|_, h| now - h.last_activity <= ttl);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::info!(target: "helpdesk::session", removed, "Swept idle sessions");
        }
        removed
    }

    fn evict_for_new_session(&self) {
        while self.sessions.len() >= self.policy.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|e| e.value().last_activity)
                .map(|e| e.key().clone());
            let Some(key) = oldest else { break };
            self.sessions.remove(&key);
            tracing::debug!(target: "helpdesk::session", session_id = %key, "Evicted least recently active session");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionPolicy::default())
    }
}
