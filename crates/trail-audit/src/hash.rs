//! Canonical hashing primitives.
//!
//! Every digest in an audit trail (hash-chain links, state hashes, and the
//! JWS payload each entry signs) is `sha256:` followed by the lowercase hex
//! SHA-256 of the value's canonical JSON.
//!
//! Unsigned projection layout (the value an entry's hash commits to):
//!   - `id`
//!   - `timestamp`
//!   - `action`: `name`, `parameters`, and `type` only when present
//!   - `notificationHashes`
//!   - `stateHash`
//!   - `previousHash` (JSON `null` for the first entry)
//!
//! The `proof` is excluded; it signs this projection.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use trail_contracts::audit::AuditEntry;

use crate::canonical::canonical_json;

/// Prefix on every digest produced by this module.
pub const HASH_PREFIX: &str = "sha256:";

/// Hash a JSON value: `sha256:` + hex(SHA-256(canonical JSON)).
pub fn canonical_hash(value: &Value) -> String {
    let digest = Sha256::digest(canonical_json(value).as_bytes());
    format!("{HASH_PREFIX}{}", hex::encode(digest))
}

/// The fields of `entry` covered by hash links and signatures.
pub fn unsigned_projection(entry: &AuditEntry) -> Value {
    let mut action = Map::new();
    if let Some(kind) = entry.action.kind {
        action.insert("type".to_string(), json!(kind.as_str()));
    }
    action.insert("name".to_string(), json!(entry.action.name));
    action.insert(
        "parameters".to_string(),
        Value::Object(entry.action.parameters.clone()),
    );

    json!({
        "id": entry.id,
        "timestamp": entry.timestamp,
        "action": action,
        "notificationHashes": entry.notification_hashes,
        "stateHash": entry.state_hash,
        "previousHash": entry.previous_hash,
    })
}

/// Canonical hash of `entry`'s unsigned projection.
///
/// This is both the value the next entry's `previousHash` must equal and
/// the payload the entry's own JWS signs.
pub fn entry_hash(entry: &AuditEntry) -> String {
    canonical_hash(&unsigned_projection(entry))
}
