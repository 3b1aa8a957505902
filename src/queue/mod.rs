//! The queue engine: the claim/lease/retry/expiry/dedup state machine.
//!
//! Producers call `Queue::add`; consumers poll `Queue::get`, process the
//! returned message and retire it with `Queue::ack`. Unacknowledged messages
//! become claimable again once their visibility window lapses.

pub mod engine;
pub mod message;
pub mod sweeper;

pub use engine::{DEFAULT_VISIBILITY, Queue, QueueBuilder};
pub use message::{AddOptions, GetOptions, Message};
