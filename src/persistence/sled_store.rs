//! Persistence layer backed by `sled`
//!
//! Every queue is a collection of five trees (see `indexes`). All mutations go
//! through a single multi-tree transaction, so a record and its index entries
//! are always observed together and concurrent claimers are serialized by
//! sled rather than by any lock in this crate.
//!
//! Index scans (claim order, expiry) run outside the transaction to find
//! candidates; each candidate is then re-checked inside the transaction before
//! it is mutated, which is what makes select-and-mutate atomic.

use std::path::Path;

use chrono::{DateTime, Utc};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use tracing::debug;

use crate::config::StoreSettings;
use crate::persistence::indexes::{self, IndexKind, entries_for, ts_upper_bound};
use crate::persistence::record::Record;
use crate::persistence::{Selector, Store};
use crate::utils::error::{StoreError, StoreResult};

type TxResult<T> = ConflictableTransactionResult<T, StoreError>;

#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open the database configured under `store.path`.
    pub fn from_settings(settings: &StoreSettings) -> StoreResult<Self> {
        Self::open(&settings.path)
    }

    /// An in-memory database removed when the last handle is dropped.
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Flush dirty buffers to disk, returning the number of bytes flushed.
    pub fn flush(&self) -> StoreResult<usize> {
        Ok(self.db.flush()?)
    }

    fn collection(&self, queue: &str) -> StoreResult<Collection> {
        Ok(Collection {
            records: self.db.open_tree(indexes::records_tree(queue))?,
            visible: self.db.open_tree(indexes::index_tree(IndexKind::Visible, queue))?,
            dedup: self.db.open_tree(indexes::index_tree(IndexKind::Dedup, queue))?,
            ack: self.db.open_tree(indexes::index_tree(IndexKind::Ack, queue))?,
            expiry: self.db.open_tree(indexes::index_tree(IndexKind::Expiry, queue))?,
        })
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .finish()
    }
}

/// The trees backing a single queue.
struct Collection {
    records: Tree,
    visible: Tree,
    dedup: Tree,
    ack: Tree,
    expiry: Tree,
}

impl Collection {
    fn index(&self, kind: IndexKind) -> &Tree {
        match kind {
            IndexKind::Visible => &self.visible,
            IndexKind::Dedup => &self.dedup,
            IndexKind::Ack => &self.ack,
            IndexKind::Expiry => &self.expiry,
        }
    }

    /// Run `f` atomically across all five trees. sled retries `f` on conflict,
    /// so it must not have side effects outside the transaction.
    fn transaction<A>(&self, f: impl Fn(&CollectionTx<'_>) -> TxResult<A>) -> StoreResult<A> {
        (
            &self.records,
            &self.visible,
            &self.dedup,
            &self.ack,
            &self.expiry,
        )
            .transaction(|(records, visible, dedup, ack, expiry)| {
                f(&CollectionTx {
                    records,
                    visible,
                    dedup,
                    ack,
                    expiry,
                })
            })
            .map_err(|err| match err {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => StoreError::Sled(err),
            })
    }
}

struct CollectionTx<'a> {
    records: &'a TransactionalTree,
    visible: &'a TransactionalTree,
    dedup: &'a TransactionalTree,
    ack: &'a TransactionalTree,
    expiry: &'a TransactionalTree,
}

impl CollectionTx<'_> {
    fn index(&self, kind: IndexKind) -> &TransactionalTree {
        match kind {
            IndexKind::Visible => self.visible,
            IndexKind::Dedup => self.dedup,
            IndexKind::Ack => self.ack,
            IndexKind::Expiry => self.expiry,
        }
    }

    fn load(&self, id: &[u8]) -> TxResult<Option<Record>> {
        match self.records.get(id)? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(abort),
            None => Ok(None),
        }
    }

    /// Replace `old` with `new`, keeping every index in step. `new = None`
    /// deletes the record.
    fn write(&self, old: Option<&Record>, new: Option<&Record>) -> TxResult<()> {
        if let Some(old) = old {
            for (kind, key) in entries_for(old) {
                self.index(kind).remove(key)?;
            }
            if new.is_none() {
                self.records.remove(old.id.as_bytes())?;
            }
        }
        if let Some(new) = new {
            let bytes = serde_json::to_vec(new).map_err(abort)?;
            self.records.insert(new.id.as_bytes(), bytes)?;
            for (kind, key) in entries_for(new) {
                self.index(kind).insert(key, new.id.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Apply `update` to the record and persist it.
    fn update(&self, current: &Record, update: &dyn Fn(&mut Record)) -> TxResult<Record> {
        let mut updated = current.clone();
        update(&mut updated);
        self.write(Some(current), Some(&updated))?;
        Ok(updated)
    }
}

fn abort(err: impl Into<StoreError>) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(err.into())
}

impl Store for SledStore {
    fn insert(&self, queue: &str, record: &Record) -> StoreResult<()> {
        let col = self.collection(queue)?;
        col.transaction(|tx| tx.write(None, Some(record)))
    }

    fn merge_or_insert(
        &self,
        queue: &str,
        record: &Record,
        now: DateTime<Utc>,
        merge: &dyn Fn(&mut Record),
    ) -> StoreResult<(Record, bool)> {
        let Some(hash) = record.dedup_hash.as_deref() else {
            self.insert(queue, record)?;
            return Ok((record.clone(), false));
        };

        let col = self.collection(queue)?;
        col.transaction(|tx| {
            if let Some(id) = tx.dedup.get(hash.as_bytes())? {
                if let Some(existing) = tx.load(&id)? {
                    if existing.accepts_merge(now) {
                        let merged = tx.update(&existing, merge)?;
                        return Ok((merged, true));
                    }
                    if existing.is_expired(now) {
                        tx.write(Some(&existing), None)?;
                    }
                }
            }
            tx.write(None, Some(record))?;
            Ok((record.clone(), false))
        })
    }

    fn find_one_and_update(
        &self,
        queue: &str,
        selector: Selector<'_>,
        update: &dyn Fn(&mut Record),
    ) -> StoreResult<Option<Record>> {
        let col = self.collection(queue)?;
        match selector {
            Selector::Claimable { now } => {
                for entry in col.visible.range(..ts_upper_bound(now)) {
                    let (key, id) = entry?;
                    let claimed = col.transaction(|tx| {
                        // another claimer may have taken it since the scan
                        if tx.visible.get(&key)?.is_none() {
                            return Ok(None);
                        }
                        match tx.load(&id)? {
                            Some(current) if current.is_claimable(now) => {
                                tx.update(&current, update).map(Some)
                            }
                            _ => Ok(None),
                        }
                    })?;
                    if claimed.is_some() {
                        return Ok(claimed);
                    }
                }
                Ok(None)
            }
            Selector::Ack { token, now } => col.transaction(|tx| {
                let Some(id) = tx.ack.get(token.as_bytes())? else {
                    return Ok(None);
                };
                match tx.load(&id)? {
                    Some(current) if current.holds_lease(token, now) => {
                        tx.update(&current, update).map(Some)
                    }
                    _ => Ok(None),
                }
            }),
        }
    }

    fn delete_expired(&self, queue: &str, now: DateTime<Utc>) -> StoreResult<usize> {
        let col = self.collection(queue)?;
        let mut deleted = 0;
        for entry in col.expiry.range(..ts_upper_bound(now)) {
            let (key, id) = entry?;
            let removed = col.transaction(|tx| {
                if tx.expiry.get(&key)?.is_none() {
                    return Ok(false);
                }
                match tx.load(&id)? {
                    Some(current) if current.is_expired(now) => {
                        tx.write(Some(&current), None)?;
                        Ok(true)
                    }
                    Some(_) => Ok(false),
                    None => {
                        tx.expiry.remove(key.clone())?;
                        Ok(false)
                    }
                }
            })?;
            if removed {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn count(&self, queue: &str, predicate: &dyn Fn(&Record) -> bool) -> StoreResult<u64> {
        let col = self.collection(queue)?;
        let mut matched = 0;
        for entry in col.records.iter() {
            let (_, bytes) = entry?;
            let record: Record = serde_json::from_slice(&bytes)?;
            if predicate(&record) {
                matched += 1;
            }
        }
        Ok(matched)
    }

    fn any(&self, queue: &str, predicate: &dyn Fn(&Record) -> bool) -> StoreResult<bool> {
        let col = self.collection(queue)?;
        for entry in col.records.iter() {
            let (_, bytes) = entry?;
            let record: Record = serde_json::from_slice(&bytes)?;
            if predicate(&record) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn ensure_indexes(&self, queue: &str) -> StoreResult<()> {
        // opening the collection creates any missing index tree
        let col = self.collection(queue)?;

        for entry in col.records.iter() {
            let (id, _) = entry?;
            col.transaction(|tx| {
                if let Some(current) = tx.load(&id)? {
                    tx.write(Some(&current), Some(&current))?;
                }
                Ok(())
            })?;
        }

        let mut dangling = 0;
        for kind in IndexKind::ALL {
            for entry in col.index(kind).iter() {
                let (key, id) = entry?;
                let removed = col.transaction(|tx| {
                    if tx.index(kind).get(&key)?.as_deref() != Some(&id[..]) {
                        return Ok(false);
                    }
                    let owned = match tx.load(&id)? {
                        Some(record) => entries_for(&record)
                            .into_iter()
                            .any(|(k, expected)| k == kind && expected[..] == key[..]),
                        None => false,
                    };
                    if !owned {
                        tx.index(kind).remove(key.clone())?;
                    }
                    Ok(!owned)
                })?;
                if removed {
                    dangling += 1;
                }
            }
        }

        debug!(queue, dangling, "indexes ensured");
        Ok(())
    }
}
