//! # docqueue
//!
//! `docqueue` is an at-least-once, FIFO-biased message queue layered on a
//! shared document store. Producers add payloads; consumers claim one message
//! at a time under a time-bounded lease, process it and acknowledge it.
//! Messages whose lease lapses without an ack are redelivered.
//!
//! ## Core Modules
//!
//! - `queue`: The engine: `add`, `get`, `ack`, `has` and the statistics.
//! - `persistence`: The `Store` seam and its sled implementation, including
//!   the claim, dedup, ack and expiry indexes.
//! - `dedup`: Canonical hashing of payloads for duplicate detection.
//! - `config`: Loading settings from files and environment variables.
//! - `utils`: Error types, identifier generation and logging setup.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use docqueue::{AddOptions, GetOptions, Queue, SledStore};
//!
//! # fn main() -> docqueue::Result<()> {
//! let store = Arc::new(SledStore::open("docqueue_db")?);
//! let queue: Queue<String> = Queue::builder().store(store).name("emails").build()?;
//! queue.create_indexes()?;
//!
//! queue.add(&"hello".to_string(), None, AddOptions::default())?;
//! if let Some(message) = queue.get(GetOptions::default())? {
//!     println!("processing {}", message.payload);
//!     queue.ack(&message.ack)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dedup;
pub mod persistence;
pub mod queue;
pub mod utils;

pub use dedup::DedupKey;
pub use persistence::{SledStore, Store};
pub use queue::{AddOptions, GetOptions, Message, Queue, QueueBuilder};
pub use utils::error::{QueueError, Result, StoreError};
