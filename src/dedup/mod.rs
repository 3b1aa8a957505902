//! Dedup key derivation.
//!
//! A dedup key selects what part of a payload identifies duplicates. The
//! selected value is canonicalized (object keys sorted recursively, compact
//! JSON) and fingerprinted with SHA-256, so two payloads that are equal as
//! values always produce the same hash regardless of how they were built.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Selects which part of a payload is used to detect duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupKey {
    /// Hash the whole payload.
    Payload,
    /// Hash the value of a top-level field. Payloads that are not objects, or
    /// that lack the field, are hashed whole.
    Field(String),
}

impl DedupKey {
    pub fn field(name: impl Into<String>) -> Self {
        DedupKey::Field(name.into())
    }
}

/// Derive the dedup hash of `payload` for the given key.
pub fn derive_hash(payload: &Value, key: &DedupKey) -> String {
    let selected = match key {
        DedupKey::Payload => payload,
        DedupKey::Field(name) => payload.get(name.as_str()).unwrap_or(payload),
    };
    format!("{:x}", Sha256::digest(canonicalize(selected).as_bytes()))
}

/// Encode a JSON value deterministically: compact, with object keys sorted.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // keys are plain strings; Value's Display escapes them
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
