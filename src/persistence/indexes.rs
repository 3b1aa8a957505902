//! Tree naming and key encoding for a queue's collection.
//!
//! Each queue owns one primary tree and four index trees in the shared sled
//! database:
//!
//! - `messages/{queue}`: `id -> Record (JSON)`
//! - `index/visible/{queue}`: `{visible_at}{created_at}{id} -> id`, open records only
//! - `index/dedup/{queue}`: `{dedup_hash} -> id`, open records only
//! - `index/ack/{queue}`: `{ack_token} -> id`, claimed records only
//! - `index/expiry/{queue}`: `{expires_at}{id} -> id`, records with an expiry
//!
//! Timestamps are encoded as big-endian microseconds since the epoch so that
//! lexicographic key order is chronological order.

use chrono::{DateTime, Utc};

use crate::persistence::record::Record;

/// The secondary indexes maintained for every queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Visible,
    Dedup,
    Ack,
    Expiry,
}

impl IndexKind {
    pub const ALL: [IndexKind; 4] = [
        IndexKind::Visible,
        IndexKind::Dedup,
        IndexKind::Ack,
        IndexKind::Expiry,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndexKind::Visible => "visible",
            IndexKind::Dedup => "dedup",
            IndexKind::Ack => "ack",
            IndexKind::Expiry => "expiry",
        }
    }
}

/// Name of the primary tree holding a queue's records.
pub fn records_tree(queue: &str) -> String {
    format!("messages/{queue}")
}

/// Name of one of a queue's index trees.
pub fn index_tree(kind: IndexKind, queue: &str) -> String {
    format!("index/{}/{queue}", kind.name())
}

/// Encode a timestamp as 8 big-endian bytes of microseconds.
pub fn encode_ts(ts: DateTime<Utc>) -> [u8; 8] {
    // pre-epoch timestamps never occur for queue records
    (ts.timestamp_micros().max(0) as u64).to_be_bytes()
}

/// Exclusive upper bound for keys whose leading timestamp is `<= ts`.
pub fn ts_upper_bound(ts: DateTime<Utc>) -> [u8; 8] {
    (ts.timestamp_micros().max(0) as u64)
        .saturating_add(1)
        .to_be_bytes()
}

/// Claim-order key: earliest visibility first, then creation time, then id.
pub fn visible_key(record: &Record) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + record.id.len());
    key.extend_from_slice(&encode_ts(record.visible_at));
    key.extend_from_slice(&encode_ts(record.created_at));
    key.extend_from_slice(record.id.as_bytes());
    key
}

pub fn expiry_key(expires_at: DateTime<Utc>, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + id.len());
    key.extend_from_slice(&encode_ts(expires_at));
    key.extend_from_slice(id.as_bytes());
    key
}

/// Every index entry a record should have, as `(index kind, key)` pairs.
pub fn entries_for(record: &Record) -> Vec<(IndexKind, Vec<u8>)> {
    let mut entries = Vec::with_capacity(4);
    if !record.is_done() {
        entries.push((IndexKind::Visible, visible_key(record)));
        if let Some(hash) = &record.dedup_hash {
            entries.push((IndexKind::Dedup, hash.as_bytes().to_vec()));
        }
        if let Some(ack) = &record.ack {
            entries.push((IndexKind::Ack, ack.as_bytes().to_vec()));
        }
    }
    if let Some(expires_at) = record.expires_at {
        entries.push((IndexKind::Expiry, expiry_key(expires_at, &record.id)));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn record(id: &str, created_secs: i64, visible_secs: i64) -> Record {
        let created = Utc.timestamp_opt(created_secs, 0).unwrap();
        let visible = Utc.timestamp_opt(visible_secs, 0).unwrap();
        Record::new(id.to_string(), json!("m"), created, visible)
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let t = Utc.timestamp_opt(1_725_000_000, 0).unwrap();
        assert!(encode_ts(t) < encode_ts(t + Duration::microseconds(1)));
        assert!(encode_ts(t) < encode_ts(t + Duration::days(3650)));
    }

    #[test]
    fn upper_bound_includes_the_instant_itself() {
        let t = Utc.timestamp_opt(1_725_000_000, 0).unwrap();
        let r = record("a", 1_725_000_000, 1_725_000_000);
        assert!(visible_key(&r).as_slice() < &ts_upper_bound(t)[..]);

        let later = record("b", 1_725_000_000, 1_725_000_001);
        assert!(visible_key(&later).as_slice() > &ts_upper_bound(t)[..]);
    }

    #[test]
    fn visible_keys_order_by_visibility_then_creation() {
        let early_visible = record("z", 200, 100);
        let late_visible = record("a", 100, 200);
        assert!(visible_key(&early_visible) < visible_key(&late_visible));

        let older = record("z", 100, 300);
        let newer = record("a", 101, 300);
        assert!(visible_key(&older) < visible_key(&newer));
    }

    #[test]
    fn done_records_keep_only_their_expiry_entry() {
        let mut r = record("a", 100, 100);
        r.dedup_hash = Some("h".to_string());
        r.ack = Some("t".to_string());
        r.expires_at = Some(Utc.timestamp_opt(500, 0).unwrap());
        assert_eq!(entries_for(&r).len(), 4);

        r.ack = None;
        r.done_at = Some(Utc.timestamp_opt(150, 0).unwrap());
        let entries = entries_for(&r);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, IndexKind::Expiry);
    }

    #[test]
    fn tree_names_cannot_collide_across_queues() {
        assert_ne!(records_tree("q"), index_tree(IndexKind::Visible, "q"));
        assert_ne!(index_tree(IndexKind::Ack, "q"), index_tree(IndexKind::Dedup, "q"));
        assert_eq!(index_tree(IndexKind::Expiry, "jobs"), "index/expiry/jobs");
        assert_eq!(records_tree("jobs"), "messages/jobs");
    }
}
