use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The persisted form of a queued message.
///
/// Records are stored as JSON in the queue's primary tree, keyed by `id`.
/// Lifecycle state is derived from the fields rather than stored:
///
/// - PENDING: not done and `visible_at <= now`
/// - CLAIMED: ack present, not done and `visible_at > now`
/// - DONE: `done_at` is set
/// - EXPIRED: `expires_at <= now`, which overrides every other state
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub payload: Value,
    pub ack: Option<String>,
    pub visible_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tries: u32,
    pub occurrences: u32,
    pub dedup_hash: Option<String>,
    pub done_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Record {
    /// A fresh, never-claimed record.
    pub fn new(id: String, payload: Value, now: DateTime<Utc>, visible_at: DateTime<Utc>) -> Self {
        Self {
            id,
            payload,
            ack: None,
            visible_at,
            created_at: now,
            updated_at: now,
            tries: 0,
            occurrences: 1,
            dedup_hash: None,
            done_at: None,
            expires_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Eligible for `get`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        !self.is_done() && !self.is_expired(now) && self.visible_at <= now
    }

    /// Leased to a consumer whose visibility window has not lapsed.
    pub fn is_in_flight(&self, now: DateTime<Utc>) -> bool {
        self.ack.is_some() && !self.is_done() && !self.is_expired(now) && self.visible_at > now
    }

    /// Holds `token` as its current, still-live lease.
    pub fn holds_lease(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.is_in_flight(now) && self.ack.as_deref() == Some(token)
    }

    /// Open records can absorb duplicate submissions.
    pub fn accepts_merge(&self, now: DateTime<Utc>) -> bool {
        !self.is_done() && !self.is_expired(now)
    }
}
