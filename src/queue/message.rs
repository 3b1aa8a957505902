use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::persistence::Record;
use crate::utils::error::{QueueError, Result, StoreError};

/// A claimed message, as handed to a consumer by `Queue::get`.
///
/// The consumer owns the message until it calls `Queue::ack` with `ack` or
/// until the visibility window lapses, whichever comes first.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    pub id: String,
    pub ack: String,
    pub payload: T,
    pub tries: u32,
    pub occurrences: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T: DeserializeOwned> Message<T> {
    pub(crate) fn from_record(record: Record) -> Result<Self> {
        let ack = record.ack.ok_or_else(|| {
            StoreError::CorruptIndex(format!("claimed record {} has no ack token", record.id))
        })?;
        let payload = serde_json::from_value(record.payload).map_err(QueueError::Payload)?;
        Ok(Self {
            id: record.id,
            ack,
            payload,
            tries: record.tries,
            occurrences: record.occurrences,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Options for `Queue::add`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AddOptions {
    /// How long the message stays invisible after being added.
    pub delay: Duration,
}

impl AddOptions {
    pub fn delay(delay: Duration) -> Self {
        Self { delay }
    }

    /// Fractional seconds; negative or non-finite values count as no delay.
    pub fn delay_secs(secs: f64) -> Self {
        Self::delay(Duration::try_from_secs_f64(secs).unwrap_or_default())
    }
}

/// Options for `Queue::get`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GetOptions {
    /// Lease length for this claim; the queue default when `None` or zero.
    pub visibility: Option<Duration>,
}

impl GetOptions {
    pub fn visibility(visibility: Duration) -> Self {
        Self {
            visibility: Some(visibility),
        }
    }

    /// Negative or non-finite values fall back to the queue default.
    pub fn visibility_secs(secs: f64) -> Self {
        Self {
            visibility: Duration::try_from_secs_f64(secs).ok(),
        }
    }
}
