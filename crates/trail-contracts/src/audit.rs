//! Audit document types.
//!
//! An audit document is the JSON transcript a protocol runtime emits for one
//! protocol instance: `{ "audit_log": [AuditEntry...], "state": {...} }`.
//! String fields default to `""` when absent so that the structure validator
//! can report them as blank instead of the whole document failing to parse.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The ordered transcript of one protocol instance's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    /// Entries in causal order; entry 0 is the constructor.
    #[serde(rename = "audit_log", default)]
    pub entries: Vec<AuditEntry>,

    /// The protocol state after the last entry.
    #[serde(default = "empty_object")]
    pub state: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl AuditLog {
    /// The final entry, if any.
    pub fn last_entry(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }
}

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// `urn:npl:{host}/npl/{package}/{Protocol}/{uuid}#{index}`
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub action: Action,

    #[serde(default)]
    pub notification_hashes: Vec<String>,

    /// `sha256:`-prefixed canonical hash of the protocol state after this action.
    #[serde(default)]
    pub state_hash: String,

    /// Canonical hash of the previous entry's unsigned projection.
    /// `None` only for entry 0.
    #[serde(default)]
    pub previous_hash: Option<String>,

    #[serde(default)]
    pub proof: Proof,
}

/// The action an entry records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Absent in older audits; see [`ActionKind`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActionKind>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// The closed set of action kinds a protocol runtime records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Constructor,
    Permission,
    Obligation,
}

impl ActionKind {
    /// The kind to assume when an entry omits `action.type`: the first entry
    /// always constructs the instance, everything after it is a permission.
    pub fn inferred(index: usize) -> Self {
        if index == 0 {
            ActionKind::Constructor
        } else {
            ActionKind::Permission
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Constructor => "constructor",
            ActionKind::Permission => "permission",
            ActionKind::Obligation => "obligation",
        }
    }
}

/// Detached signature envelope over an entry's unsigned projection hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type", default)]
    pub proof_type: String,

    #[serde(default)]
    pub created: String,

    /// `did:web:...#key-id`
    #[serde(default)]
    pub verification_method: String,

    #[serde(default)]
    pub proof_purpose: String,

    /// Compact JWS: `header.payload.signature`, each base64url.
    #[serde(default)]
    pub jws: String,
}
