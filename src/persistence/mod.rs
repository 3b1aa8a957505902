//! The `persistence` module defines the backing-store seam of the queue.
//!
//! The engine never locks anything itself. Every mutating queue operation is a
//! single call to one of the atomic primitives below, and the store is the
//! only serialization point between concurrent producers and consumers.
//!
//! `SledStore` implements the trait on top of sled, using multi-tree
//! transactions so that a record and all of its index entries change together.

pub mod indexes;
pub mod record;
pub mod sled_store;

use chrono::{DateTime, Utc};

use crate::utils::error::StoreResult;

pub use record::Record;
pub use sled_store::SledStore;

/// Which record an atomic select-and-mutate call operates on.
#[derive(Debug, Clone, Copy)]
pub enum Selector<'a> {
    /// The claimable record with the smallest `(visible_at, created_at, id)`.
    Claimable { now: DateTime<Utc> },
    /// The record currently leased under `token`, lease still live at `now`.
    Ack { token: &'a str, now: DateTime<Utc> },
}

/// Storage trait for all queue persistence. Implementations must be thread-safe
/// and every method must be atomic with respect to concurrent callers.
pub trait Store: Send + Sync {
    /// Insert a brand new record.
    fn insert(&self, queue: &str, record: &Record) -> StoreResult<()>;

    /// Atomically merge into the open record carrying `record.dedup_hash`, or
    /// insert `record` when there is none. Returns the resulting record and
    /// whether a merge happened.
    fn merge_or_insert(
        &self,
        queue: &str,
        record: &Record,
        now: DateTime<Utc>,
        merge: &dyn Fn(&mut Record),
    ) -> StoreResult<(Record, bool)>;

    /// Atomically select one record, apply `update` and return the updated
    /// record, or `None` when nothing matched.
    fn find_one_and_update(
        &self,
        queue: &str,
        selector: Selector<'_>,
        update: &dyn Fn(&mut Record),
    ) -> StoreResult<Option<Record>>;

    /// Physically delete every record with `expires_at <= now`, in any state.
    fn delete_expired(&self, queue: &str, now: DateTime<Utc>) -> StoreResult<usize>;

    /// Count records matching `predicate`.
    fn count(&self, queue: &str, predicate: &dyn Fn(&Record) -> bool) -> StoreResult<u64>;

    /// Whether any record matches `predicate`.
    fn any(&self, queue: &str, predicate: &dyn Fn(&Record) -> bool) -> StoreResult<bool>;

    /// Create the queue's indexes if missing and repair stale entries.
    /// Idempotent.
    fn ensure_indexes(&self, queue: &str) -> StoreResult<()>;
}
