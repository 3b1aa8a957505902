//! Queue engine
//!
//! `Queue<T>` holds no mutable state of its own: a store handle, a queue name
//! and the lease/expiry policy. Every mutating operation is exactly one
//! atomic store call, so a failed call never leaves a half-applied change and
//! concurrent producers and consumers need no coordination beyond the store.
//!
//! Timestamps are truncated to microseconds, the resolution of the store's
//! ordered indexes.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::QueueSettings;
use crate::dedup::{DedupKey, derive_hash};
use crate::persistence::{Record, Selector, Store};
use crate::queue::message::{AddOptions, GetOptions, Message};
use crate::utils::error::{QueueError, Result};
use crate::utils::ids::{new_ack_token, new_message_id};

/// Lease length used when neither the queue nor the call overrides it.
pub const DEFAULT_VISIBILITY: Duration = Duration::from_secs(30);

pub struct Queue<T> {
    store: Arc<dyn Store>,
    name: String,
    visibility: Duration,
    expiry: Option<Duration>,
    _payload: PhantomData<fn() -> T>,
}

/// Validating builder for `Queue`.
pub struct QueueBuilder<T> {
    store: Option<Arc<dyn Store>>,
    name: Option<String>,
    visibility: Duration,
    expiry: Option<Duration>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Default for QueueBuilder<T> {
    fn default() -> Self {
        Self {
            store: None,
            name: None,
            visibility: DEFAULT_VISIBILITY,
            expiry: None,
            _payload: PhantomData,
        }
    }
}

impl<T> QueueBuilder<T> {
    pub fn store<S: Store + 'static>(mut self, store: Arc<S>) -> Self {
        self.store = Some(store as Arc<dyn Store>);
        self
    }

    pub fn shared_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Default lease length for `get`.
    pub fn visibility(mut self, visibility: Duration) -> Self {
        self.visibility = visibility;
        self
    }

    /// Lifetime of every record, measured from its creation.
    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Validate the configuration. Performs no store access.
    pub fn build(self) -> Result<Queue<T>> {
        let store = self
            .store
            .ok_or_else(|| QueueError::Configuration("please provide a store".to_string()))?;
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| QueueError::Configuration("please provide a queue name".to_string()))?;
        if self.visibility.is_zero() {
            return Err(QueueError::Configuration(
                "visibility must be greater than zero".to_string(),
            ));
        }
        if self.expiry.is_some_and(|expiry| expiry.is_zero()) {
            return Err(QueueError::Configuration(
                "expiry must be greater than zero".to_string(),
            ));
        }

        Ok(Queue {
            store,
            name,
            visibility: self.visibility,
            expiry: self.expiry,
            _payload: PhantomData,
        })
    }
}

impl<T> Queue<T> {
    pub fn builder() -> QueueBuilder<T> {
        QueueBuilder::default()
    }

    /// Build a queue from loaded settings.
    pub fn from_settings(store: Arc<dyn Store>, settings: &QueueSettings) -> Result<Self> {
        let mut builder = Self::builder()
            .shared_store(store)
            .name(settings.name.clone())
            .visibility(secs_to_duration("visibility_secs", settings.visibility_secs)?);
        if let Some(expiry) = settings.expiry_secs {
            builder = builder.expiry(secs_to_duration("expiry_secs", expiry)?);
        }
        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility(&self) -> Duration {
        self.visibility
    }

    pub fn expiry(&self) -> Option<Duration> {
        self.expiry
    }

    /// Acknowledge the message leased under `token`, retiring it for good.
    ///
    /// Fails with `UnknownAck` when the token was never issued, was already
    /// used, lost its lease, or belongs to an expired record.
    pub fn ack(&self, token: &str) -> Result<String> {
        let now = now();
        let retire = |record: &mut Record| {
            record.ack = None;
            record.done_at = Some(now);
            record.updated_at = now;
        };

        match self
            .store
            .find_one_and_update(&self.name, Selector::Ack { token, now }, &retire)?
        {
            Some(record) => {
                debug!(queue = %self.name, id = %record.id, "message acked");
                Ok(record.id)
            }
            None => {
                warn!(queue = %self.name, token, "unidentified ack");
                Err(QueueError::UnknownAck(token.to_string()))
            }
        }
    }

    /// Delete every expired record now. Returns how many were removed.
    pub fn sweep(&self) -> Result<usize> {
        self.sweep_at(now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        // records written under an earlier expiry setting are swept too
        let deleted = self.store.delete_expired(&self.name, now)?;
        if deleted > 0 {
            info!(queue = %self.name, deleted, "expired messages removed");
        }
        Ok(deleted)
    }

    /// Messages claimable right now.
    pub fn size(&self) -> Result<u64> {
        let now = now();
        Ok(self.store.count(&self.name, &|r: &Record| r.is_claimable(now))?)
    }

    /// Every message still retained, whatever its state.
    pub fn total(&self) -> Result<u64> {
        let now = now();
        Ok(self.store.count(&self.name, &|r: &Record| !r.is_expired(now))?)
    }

    /// Messages currently leased to a consumer.
    pub fn in_flight(&self) -> Result<u64> {
        let now = now();
        Ok(self.store.count(&self.name, &|r: &Record| r.is_in_flight(now))?)
    }

    /// Acknowledged messages still retained.
    pub fn done(&self) -> Result<u64> {
        let now = now();
        Ok(self
            .store
            .count(&self.name, &|r: &Record| r.is_done() && !r.is_expired(now))?)
    }

    /// Make sure the claim, dedup, ack and expiry indexes exist and are
    /// consistent with the stored records. Safe to call repeatedly.
    pub fn create_indexes(&self) -> Result<()> {
        self.store.ensure_indexes(&self.name)?;
        Ok(())
    }
}

impl<T: Serialize + DeserializeOwned> Queue<T> {
    /// Enqueue `payload`, returning the message id.
    ///
    /// With a dedup key, a payload whose hash matches a message that is not
    /// yet done is merged into it: the existing id is returned and its
    /// `occurrences` count is bumped.
    pub fn add(&self, payload: &T, dedup: Option<DedupKey>, options: AddOptions) -> Result<String> {
        let payload = serde_json::to_value(payload).map_err(QueueError::Payload)?;
        let now = now();
        let mut record = Record::new(
            new_message_id(),
            payload,
            now,
            offset(now, options.delay)?,
        );
        if let Some(expiry) = self.expiry {
            record.expires_at = Some(offset(now, expiry)?);
        }

        let Some(key) = dedup else {
            self.store.insert(&self.name, &record)?;
            debug!(queue = %self.name, id = %record.id, "message added");
            return Ok(record.id);
        };

        record.dedup_hash = Some(derive_hash(&record.payload, &key));
        let bump = |existing: &mut Record| {
            existing.occurrences += 1;
            existing.updated_at = now;
        };
        let (stored, merged) = self.store.merge_or_insert(&self.name, &record, now, &bump)?;
        if merged {
            debug!(queue = %self.name, id = %stored.id, occurrences = stored.occurrences, "duplicate merged");
        } else {
            debug!(queue = %self.name, id = %stored.id, "message added");
        }
        Ok(stored.id)
    }

    /// Claim the next visible message, or `None` when nothing is claimable.
    ///
    /// Expired records are removed first. The claimed message stays hidden
    /// from other consumers for the visibility window and must be acked
    /// within it.
    pub fn get(&self, options: GetOptions) -> Result<Option<Message<T>>> {
        let now = now();
        self.sweep_at(now)?;

        let lease = options
            .visibility
            .filter(|lease| !lease.is_zero())
            .unwrap_or(self.visibility);
        let visible_at = offset(now, lease)?;
        let token = new_ack_token();
        let claim = |record: &mut Record| {
            record.ack = Some(token.clone());
            record.visible_at = visible_at;
            record.tries += 1;
            record.updated_at = now;
        };

        let Some(record) = self
            .store
            .find_one_and_update(&self.name, Selector::Claimable { now }, &claim)?
        else {
            return Ok(None);
        };
        debug!(queue = %self.name, id = %record.id, tries = record.tries, "message claimed");
        Message::from_record(record).map(Some)
    }

    /// Whether any retained message has a payload equal to `value`, or, with
    /// `field`, a payload whose `field` equals `value`.
    pub fn has<V: Serialize + ?Sized>(&self, value: &V, field: Option<&str>) -> Result<bool> {
        let value = serde_json::to_value(value).map_err(QueueError::Payload)?;
        let now = now();
        let matches = |record: &Record| {
            !record.is_expired(now)
                && match field {
                    Some(field) => record.payload.get(field) == Some(&value),
                    None => record.payload == value,
                }
        };
        Ok(self.store.any(&self.name, &matches)?)
    }
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("expiry", &self.expiry)
            .finish()
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn offset(now: DateTime<Utc>, by: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(by)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .map(|at| at.trunc_subsecs(6))
        .ok_or_else(|| QueueError::Configuration(format!("duration out of range: {by:?}")))
}

pub(crate) fn secs_to_duration(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| QueueError::Configuration(format!("{field} must be a non-negative number")))
}
