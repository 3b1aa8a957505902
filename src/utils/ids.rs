//! Identifier generation for messages and ack tokens.
//!
//! Both are random UUID v4 values, so concurrent producers and consumers never
//! receive the same value. Ack tokens use the unhyphenated form.

use uuid::Uuid;

/// Generate a new message id.
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new single-use ack token for a claim.
pub fn new_ack_token() -> String {
    Uuid::new_v4().simple().to_string()
}
